//! Cart aggregate: a user's staging area for an order.

use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::product::Product;

/// A user's cart. There is at most one per user, created lazily on first
/// access and never deleted; placing an order only empties it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line. `unit_price` is the price snapshot taken when the line was
/// added (or last merged), not the live catalog price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The write needed to add a product to a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartLine {
    /// The product is new to the cart.
    Insert(CartItem),
    /// The product already has a line; its quantity and price are replaced.
    Merge {
        item_id: CartItemId,
        quantity: u32,
        unit_price: Money,
    },
}

impl Cart {
    /// Creates an empty cart for a user.
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::new(),
            user_id,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of `unit_price * quantity` over every line.
    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Returns the line holding `product_id`, if any.
    pub fn item_for_product(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Works out how adding `quantity` units of `product` changes the cart.
    ///
    /// The requested quantity is checked against stock first. When the
    /// product is already in the cart the merged quantity is checked again
    /// and the line takes the product's current price.
    pub fn plan_add(&self, product: &Product, quantity: u32) -> Result<CartLine, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        product.ensure_available(quantity)?;

        match self.item_for_product(product.id) {
            Some(existing) => {
                let merged = existing.quantity.saturating_add(quantity);
                product.ensure_available(merged)?;
                Ok(CartLine::Merge {
                    item_id: existing.id,
                    quantity: merged,
                    unit_price: product.unit_price,
                })
            }
            None => Ok(CartLine::Insert(CartItem::new(
                self.id,
                product.id,
                quantity,
                product.unit_price,
            ))),
        }
    }
}

impl CartItem {
    /// Creates a new line with a price snapshot.
    pub fn new(cart_id: CartId, product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        let now = Utc::now();
        Self {
            id: CartItemId::new(),
            cart_id,
            product_id,
            quantity,
            unit_price,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    /// Validates a replacement quantity for this line against the product's
    /// current stock. The stored price is left as it is.
    pub fn check_quantity(product: &Product, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        product.ensure_available(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_with(product: &Product, quantity: u32, price: Money) -> Cart {
        let mut cart = Cart::new(UserId::new());
        let item = CartItem::new(cart.id, product.id, quantity, price);
        cart.items.push(item);
        cart
    }

    #[test]
    fn new_cart_is_empty() {
        let cart = Cart::new(UserId::new());
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Money::zero());
    }

    #[test]
    fn plan_add_inserts_new_line_at_current_price() {
        let cart = Cart::new(UserId::new());
        let product = Product::new("Widget", Money::from_cents(1000), 10);

        match cart.plan_add(&product, 3).unwrap() {
            CartLine::Insert(item) => {
                assert_eq!(item.cart_id, cart.id);
                assert_eq!(item.product_id, product.id);
                assert_eq!(item.quantity, 3);
                assert_eq!(item.unit_price, Money::from_cents(1000));
            }
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn plan_add_merges_and_refreshes_price() {
        let product = Product::new("Widget", Money::from_cents(1200), 10);
        let cart = cart_with(&product, 4, Money::from_cents(1000));
        let existing = cart.items[0].id;

        assert_eq!(
            cart.plan_add(&product, 3).unwrap(),
            CartLine::Merge {
                item_id: existing,
                quantity: 7,
                unit_price: Money::from_cents(1200),
            }
        );
    }

    #[test]
    fn plan_add_checks_merged_quantity_against_stock() {
        let product = Product::new("Widget", Money::from_cents(1000), 10);
        let cart = cart_with(&product, 4, Money::from_cents(1000));

        assert_eq!(
            cart.plan_add(&product, 7),
            Err(DomainError::InsufficientStock {
                product_id: product.id,
                requested: 11,
                available: 10,
            })
        );
    }

    #[test]
    fn plan_add_rejects_request_above_stock_before_merging() {
        let product = Product::new("Widget", Money::from_cents(1000), 2);
        let cart = Cart::new(UserId::new());

        assert!(matches!(
            cart.plan_add(&product, 3),
            Err(DomainError::InsufficientStock { requested: 3, .. })
        ));
    }

    #[test]
    fn plan_add_rejects_zero_quantity() {
        let product = Product::new("Widget", Money::from_cents(1000), 2);
        let cart = Cart::new(UserId::new());
        assert_eq!(
            cart.plan_add(&product, 0),
            Err(DomainError::InvalidQuantity { quantity: 0 })
        );
    }

    #[test]
    fn total_uses_snapshot_prices() {
        let widget = Product::new("Widget", Money::from_cents(9999), 10);
        let gadget = Product::new("Gadget", Money::from_cents(9999), 10);
        let mut cart = cart_with(&widget, 2, Money::from_cents(1000));
        cart.items
            .push(CartItem::new(cart.id, gadget.id, 1, Money::from_cents(2500)));

        assert_eq!(cart.total(), Money::from_cents(4500));
    }

    #[test]
    fn check_quantity_validates_against_stock() {
        let product = Product::new("Widget", Money::from_cents(1000), 5);
        assert!(CartItem::check_quantity(&product, 5).is_ok());
        assert!(CartItem::check_quantity(&product, 6).is_err());
        assert_eq!(
            CartItem::check_quantity(&product, 0),
            Err(DomainError::InvalidQuantity { quantity: 0 })
        );
    }
}
