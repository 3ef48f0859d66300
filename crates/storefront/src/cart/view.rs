//! Cart view models for display.

use std::collections::BTreeMap;

use cartsync_core::{Money, Product, ProductId};

use crate::search::Catalog;

/// Shown in place of an empty cart.
pub const EMPTY_CART_MESSAGE: &str = "Add an item to cart and it will show up here";

/// Cart line resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineView {
    pub product: Product,
    pub quantity: u32,
    pub line_total: Money,
}

/// Renderable cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartView {
    /// Nothing to show; render [`EMPTY_CART_MESSAGE`].
    Empty,
    Items {
        lines: Vec<CartLineView>,
        item_count: u32,
        total: Money,
    },
}

impl CartView {
    /// Resolve raw lines against `catalog`.
    ///
    /// Lines whose product is not in the catalog are left out of the lines,
    /// the item count and the total.
    #[must_use]
    pub fn resolve(lines: &BTreeMap<ProductId, u32>, catalog: &Catalog) -> Self {
        let lines: Vec<CartLineView> = lines
            .iter()
            .filter_map(|(id, &quantity)| {
                let product = catalog.find(id)?;
                Some(CartLineView {
                    line_total: product.cost.times(quantity),
                    product: product.clone(),
                    quantity,
                })
            })
            .collect();

        if lines.is_empty() {
            return Self::Empty;
        }

        let item_count = lines
            .iter()
            .fold(0_u32, |count, l| count.saturating_add(l.quantity));
        let total = lines.iter().map(|l| l.line_total).sum();
        Self::Items {
            lines,
            item_count,
            total,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLineView] {
        match self {
            Self::Empty => &[],
            Self::Items { lines, .. } => lines,
        }
    }

    #[must_use]
    pub const fn total(&self) -> Money {
        match self {
            Self::Empty => Money::ZERO,
            Self::Items { total, .. } => *total,
        }
    }

    #[must_use]
    pub const fn item_count(&self) -> u32 {
        match self {
            Self::Empty => 0,
            Self::Items { item_count, .. } => *item_count,
        }
    }
}
