//! Core types for cartsync.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod credential;
pub mod email;
pub mod id;
pub mod money;
pub mod order;
pub mod product;
pub mod theme;

pub use credential::{CredentialError, Password, Username};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use order::{Order, OrderItem, UserProfile};
pub use product::{Product, Rating};
pub use theme::{ThemeMode, ThemeModeError};
