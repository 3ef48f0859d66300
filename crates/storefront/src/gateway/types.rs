//! Request and response bodies exchanged with the remote service.
//!
//! Wire shapes stay private to the gateway; callers get the flattened
//! public types defined at the top of this file.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use cartsync_core::{Money, ProductId, UserId};

// =============================================================================
// Public Types
// =============================================================================

/// One line of the server-side cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Result of a successful login. `Debug` redacts the token.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: SecretString,
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub wallet_balance: Money,
}

// =============================================================================
// Responses
// =============================================================================

/// Failure body: `{"message": "...", "code": 401}`. `code` may be a number
/// or a numeric string.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn code(&self) -> Option<u16> {
        match self.code.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CartEnvelope {
    #[serde(default)]
    pub cart_items: Vec<WireCartItem>,
}

/// Cart lines carry the product id either directly or inside an embedded
/// product record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCartItem {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub product: Option<ProductRef>,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductRef {
    #[serde(rename = "_id")]
    pub id: ProductId,
}

impl WireCartItem {
    pub fn into_item(self) -> Option<CartItem> {
        let product_id = self.product_id.or_else(|| self.product.map(|p| p.id))?;
        Some(CartItem {
            product_id,
            quantity: self.quantity,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddressBody {
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub tokens: Tokens,
    pub user: LoginUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Tokens {
    pub access: AccessToken,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccessToken {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub wallet_money: Money,
}

impl From<LoginResponse> for LoginResult {
    fn from(response: LoginResponse) -> Self {
        Self {
            token: SecretString::from(response.tokens.access.token),
            user_id: response.user.id,
            email: response.user.email,
            username: response.user.name,
            wallet_balance: response.user.wallet_money,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CartLineBody<'a> {
    pub product_id: &'a ProductId,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddressUpdate<'a> {
    pub address: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterBody<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}
