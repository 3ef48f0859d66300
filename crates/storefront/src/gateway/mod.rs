//! Remote catalog, cart and account gateway.
//!
//! # Architecture
//!
//! - [`StoreGateway`] is the seam every component talks through
//! - [`HttpGateway`] implements it over REST/JSON with `reqwest`
//! - The product listing is cached in memory via `moka`
//! - Authenticated calls read the bearer token from the
//!   [`SessionStore`](crate::services::session::SessionStore) at call time
//!
//! # Failure classification
//!
//! | Outcome                                            | Error                     |
//! |----------------------------------------------------|---------------------------|
//! | connection failure, undecodable body               | `Http` / `Parse`          |
//! | HTTP 401, or body `code` of 401                    | `Unauthenticated`         |
//! | authenticated call with no stored token            | `Unauthenticated`         |
//! | body carrying `message`                            | `Application`             |
//! | other non-success status without a usable body    | `Application("HTTP nnn")` |

mod http;
pub mod types;

use std::future::Future;

use cartsync_core::{Email, Order, Password, Product, ProductId, UserId, UserProfile, Username};

use crate::error::Result;

pub use http::HttpGateway;
pub use types::{CartItem, LoginResult};

/// Address value the service stores for accounts that never set one.
pub const ADDRESS_NOT_SET: &str = "ADDRESS_NOT_SET";

/// Operations against the remote store service.
pub trait StoreGateway: Send + Sync {
    /// Full product catalog. No authentication.
    fn list_products(&self) -> impl Future<Output = Result<Vec<Product>>> + Send;

    /// Server-side cart of the logged-in shopper.
    fn get_cart(&self) -> impl Future<Output = Result<Vec<CartItem>>> + Send;

    /// Add a product line, or overwrite its quantity if present.
    fn upsert_cart_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Set the quantity of an existing line. Zero removes it.
    fn set_cart_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Shipping address, `None` when unset.
    fn get_address(&self, user_id: &UserId)
    -> impl Future<Output = Result<Option<String>>> + Send;

    fn set_address(
        &self,
        user_id: &UserId,
        address: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Place an order for the whole server-side cart.
    fn checkout(&self) -> impl Future<Output = Result<()>> + Send;

    fn login(
        &self,
        email: &Email,
        password: &Password,
    ) -> impl Future<Output = Result<LoginResult>> + Send;

    fn register(
        &self,
        username: &Username,
        email: &Email,
        password: &Password,
    ) -> impl Future<Output = Result<()>> + Send;

    fn list_orders(&self) -> impl Future<Output = Result<Vec<Order>>> + Send;

    fn get_user(&self, user_id: &UserId) -> impl Future<Output = Result<UserProfile>> + Send;

    fn delete_user(&self, user_id: &UserId) -> impl Future<Output = Result<()>> + Send;
}

/// Map the service's "no address" encodings to `None`.
#[must_use]
pub fn normalize_address(raw: Option<String>) -> Option<String> {
    raw.filter(|a| {
        let a = a.trim();
        !a.is_empty() && a != ADDRESS_NOT_SET
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address(None), None);
        assert_eq!(normalize_address(Some(ADDRESS_NOT_SET.into())), None);
        assert_eq!(normalize_address(Some("  ".into())), None);
        assert_eq!(
            normalize_address(Some("12 Baker St".into())),
            Some("12 Baker St".into())
        );
    }
}
