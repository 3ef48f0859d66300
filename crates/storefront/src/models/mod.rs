//! Domain models owned by the storefront client.

pub mod session;

pub use session::Session;
