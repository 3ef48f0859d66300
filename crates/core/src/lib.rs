//! cartsync core - shared domain types.
//!
//! This crate provides the types used across all cartsync components:
//! - `storefront` - Session store, gateway, cart engine, checkout, search
//! - `cli` - Terminal front end driving the storefront core
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no persistence. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, credentials, and
//!   the catalog/order/theme records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
