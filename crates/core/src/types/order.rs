//! Read-only records owned by the remote service: orders and user profiles.
//!
//! The client never constructs an [`Order`]; one is created server-side as a
//! side effect of checkout and only ever read back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, OrderId, Product, ProductId, UserId};

/// One product/quantity pairing inside a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub product: Product,
}

impl OrderItem {
    /// Line price at the product's listed cost.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.product.cost.times(self.quantity)
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "orderItems", default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    #[must_use]
    pub fn total(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

/// The account record returned by `GET /users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub address: Option<String>,
    pub wallet_money: Money,
}
