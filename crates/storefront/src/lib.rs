//! cartsync storefront core.
//!
//! Keeps a client-side cart in step with a remote store service, places
//! orders against the shopper's wallet, and filters the product catalog.
//! Presentation is left to the caller: components emit
//! [`events::UiEvent`]s and expose view models, nothing here renders.
//!
//! Start from [`state::Storefront`], which wires every component together.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod models;
pub mod search;
pub mod services;
pub mod state;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod testing;

pub use error::{Result, StoreError, ValidationError};
pub use state::Storefront;
