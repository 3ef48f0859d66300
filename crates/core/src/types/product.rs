//! Catalog product record.

use serde::{Deserialize, Serialize};

use crate::{Money, ProductId};

/// Aggregate product rating, whole stars out of five.
///
/// Out-of-range values from the service are clamped into `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;

    #[must_use]
    pub fn new(stars: i64) -> Self {
        // clamp keeps the value in 0..=5 so the cast is lossless
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self(stars.clamp(0, i64::from(Self::MAX)) as u8)
    }

    #[must_use]
    pub const fn stars(self) -> u8 {
        self.0
    }
}

impl From<i64> for Rating {
    fn from(stars: i64) -> Self {
        Self::new(stars)
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        Self::from(rating.0)
    }
}

/// A product as listed by the remote catalog.
///
/// Immutable once fetched; cart lines refer to products by [`ProductId`] and
/// resolve them against the current catalog rather than copying them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    pub category: String,
    /// Unit cost in minor currency units.
    pub cost: Money,
    #[serde(default)]
    pub rating: Rating,
    /// Image URL.
    #[serde(rename = "image", default)]
    pub image_ref: String,
}

impl Product {
    /// Case-insensitive substring match against name or category.
    ///
    /// `needle_upper` must already be uppercased.
    #[must_use]
    pub fn matches_upper(&self, needle_upper: &str) -> bool {
        self.name.to_uppercase().contains(needle_upper)
            || self.category.to_uppercase().contains(needle_upper)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_service_shape() {
        let json = r#"{
            "_id": "BW0jAAeDJmlZCF8i",
            "name": "Running Shoe",
            "category": "Footwear",
            "cost": 500,
            "rating": 4,
            "image": "https://cdn.example.com/shoe.png"
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id.as_str(), "BW0jAAeDJmlZCF8i");
        assert_eq!(product.cost, Money::from_minor(500));
        assert_eq!(product.rating.stars(), 4);
        assert_eq!(product.image_ref, "https://cdn.example.com/shoe.png");
    }

    #[test]
    fn test_rating_is_clamped() {
        assert_eq!(Rating::new(9).stars(), 5);
        assert_eq!(Rating::new(-1).stars(), 0);
    }

    #[test]
    fn test_matches_name_or_category() {
        let product = Product {
            id: ProductId::new("p1"),
            name: "Running Shoe".into(),
            category: "Footwear".into(),
            cost: Money::from_minor(500),
            rating: Rating::new(4),
            image_ref: String::new(),
        };
        assert!(product.matches_upper("SHOE"));
        assert!(product.matches_upper("FOOT"));
        assert!(!product.matches_upper("HAT"));
    }
}
