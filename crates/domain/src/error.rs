//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::order::OrderStatus;
use crate::payment::TransactionStatus;

/// Business rules a request can violate.
///
/// Every variant describes a caller error: the request was well-formed but the
/// current state of the store does not allow it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Quantities on cart lines must be at least one.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Not enough units on hand to satisfy the request.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// An order cannot be placed from a cart with no items.
    #[error("Cart is empty")]
    EmptyCart,

    /// The order's lifecycle status does not allow the action.
    #[error("Invalid order state: cannot {action} an order in {current} status")]
    InvalidOrderState {
        current: OrderStatus,
        action: &'static str,
    },

    /// The payment transaction already reached a terminal status.
    #[error("Invalid transaction state: cannot {action} a {current} transaction")]
    InvalidTransactionState {
        current: TransactionStatus,
        action: &'static str,
    },
}

/// A stored or submitted status string did not name a known status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} status: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}
