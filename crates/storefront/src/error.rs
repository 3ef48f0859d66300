//! Unified error handling for storefront operations.
//!
//! Every fallible operation returns [`StoreError`]. Callers never inspect
//! the variants to build UI text themselves; [`StoreError::user_message`]
//! is the one place a failure becomes something a shopper reads.

use thiserror::Error;

use cartsync_core::{CredentialError, EmailError, Money, ProductId};

use crate::services::persist::PersistError;

/// Shown when the remote service rejects the bearer token.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Local precondition failures. Nothing was sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error("Login to add an item to the cart")]
    NotLoggedIn,

    #[error("Item already in cart. Use the cart sidebar to update quantity or remove item.")]
    AlreadyInCart(ProductId),

    #[error("Product {0} is not in the catalog")]
    UnknownProduct(ProductId),

    #[error("Quantity must be between {min} and {max} (got {quantity})")]
    QuantityOutOfRange { quantity: u32, min: u32, max: u32 },

    #[error("You must add items to cart first")]
    CartEmpty,

    #[error("Please add a new address before proceeding.")]
    AddressRequired,

    #[error("Address cannot be empty")]
    AddressBlank,

    #[error("You do not have enough balance in your wallet for this purchase")]
    InsufficientBalance { total: Money, balance: Money },

    #[error("An order is already being placed")]
    CheckoutInProgress,
}

/// Storefront error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a body that could not be decoded.
    #[error("Invalid response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The service answered with a structured failure.
    #[error("{message}")]
    Application {
        status: Option<u16>,
        code: Option<u16>,
        message: String,
    },

    /// The service rejected the bearer token, or there was none to send.
    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// A local precondition failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Reading or writing local state failed.
    #[error("Storage error: {0}")]
    Storage(#[from] PersistError),
}

impl StoreError {
    /// Build an [`StoreError::Application`] with only a message.
    #[must_use]
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Build an [`StoreError::Unauthenticated`].
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Network failure or undecodable response.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Parse(_))
    }

    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    #[must_use]
    pub const fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// Text suitable for a shopper-facing notice.
    ///
    /// Service-provided messages are shown verbatim. Transport failures get
    /// a generic retry hint; internal details stay in the logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http(_) | Self::Parse(_) => {
                "Something went wrong. Check that the backend is running, reachable and returns valid JSON."
                    .to_string()
            }
            Self::Application { message, .. } => message.clone(),
            Self::Unauthenticated { .. } => SESSION_EXPIRED_MESSAGE.to_string(),
            Self::Validation(err) => err.to_string(),
            Self::Storage(_) => "Could not save data on this device.".to_string(),
        }
    }
}

/// Result type alias for `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;
