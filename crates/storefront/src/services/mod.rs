//! Local state and account services.
//!
//! - `session` - the logged-in shopper's persisted identity and balance
//! - `preferences` - display preferences that outlive a session
//! - `account` - login, registration, route guard and account views
//! - `persist` - atomic JSON files backing both stores
//! - `token` - bearer token expiry checks

pub mod account;
pub mod persist;
pub mod preferences;
pub mod session;
pub mod token;
