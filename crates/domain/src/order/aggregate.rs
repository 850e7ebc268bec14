//! Order aggregate.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::error::DomainError;

use super::{OrderStatus, PaymentStatus, ShippingStatus};

/// Checkout details supplied by the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub payment_method: String,
    pub shipping_method: String,
    pub shipping_address: String,
    pub notes: Option<String>,
}

/// A placed order.
///
/// Items and `total_price` are fixed when the order is built from a cart and
/// never recalculated from the catalog afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_price: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_status: ShippingStatus,
    pub payment_method: String,
    pub shipping_method: String,
    pub shipping_address: String,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order line, copied from a cart line at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Builds a pending order from the cart's current lines, in cart order.
    pub fn from_cart(cart: &Cart, details: OrderDetails) -> Result<Self, DomainError> {
        if cart.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let now = Utc::now();
        let id = OrderId::new();
        let items = cart
            .items
            .iter()
            .map(|line| OrderItem {
                id: OrderItemId::new(),
                order_id: id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                created_at: now,
            })
            .collect::<Vec<_>>();
        let total_price = items.iter().map(OrderItem::line_total).sum();

        Ok(Self {
            id,
            user_id: cart.user_id,
            items,
            total_price,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            shipping_status: ShippingStatus::Pending,
            payment_method: details.payment_method,
            shipping_method: details.shipping_method,
            shipping_address: details.shipping_address,
            tracking_number: None,
            notes: details.notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Checks that the order may be cancelled.
    pub fn ensure_cancellable(&self) -> Result<(), DomainError> {
        if !self.status.can_cancel() {
            return Err(DomainError::InvalidOrderState {
                current: self.status,
                action: "cancel",
            });
        }
        Ok(())
    }

    /// Checks an administrative status change.
    ///
    /// Cancellation has its own path because it must release stock. Terminal
    /// orders stay where they are, and an order that has left `Pending` cannot
    /// return to it.
    pub fn ensure_status_change(&self, next: OrderStatus) -> Result<(), DomainError> {
        let reopens = next == OrderStatus::Pending && self.status != OrderStatus::Pending;
        if next == OrderStatus::Cancelled || self.status.is_terminal() || reopens {
            return Err(DomainError::InvalidOrderState {
                current: self.status,
                action: "change the status of",
            });
        }
        Ok(())
    }
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}
