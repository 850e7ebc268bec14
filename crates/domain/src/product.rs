//! Catalog products as seen by the fulfillment core.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The subset of a catalog product the core reads: its current price and
/// stock. Only `stock` is ever written by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub stock: u32,
}

impl Product {
    /// Creates a product with a fresh identifier.
    pub fn new(name: impl Into<String>, unit_price: Money, stock: u32) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            unit_price,
            stock,
        }
    }

    /// Checks that `quantity` units could be taken from current stock.
    pub fn ensure_available(&self, quantity: u32) -> Result<(), DomainError> {
        if self.stock < quantity {
            return Err(DomainError::InsufficientStock {
                product_id: self.id,
                requested: quantity,
                available: self.stock,
            });
        }
        Ok(())
    }
}
