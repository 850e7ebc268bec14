//! Domain layer for the storefront backend.
//!
//! This crate holds the entities and rules that do not depend on storage:
//! - `Product` stock checks
//! - `Cart` line items and the merge-on-add rule
//! - `Order` snapshots built from a cart, with three independent status axes
//! - `PaymentTransaction` and the transaction -> payment status mapping

pub mod cart;
pub mod error;
pub mod order;
pub mod payment;
pub mod product;

pub use cart::{Cart, CartItem, CartLine};
pub use common::{
    CartId, CartItemId, Money, OrderId, OrderItemId, ProductId, TransactionId, UserId,
};
pub use error::{DomainError, ParseStatusError};
pub use order::{Order, OrderDetails, OrderItem, OrderStatus, PaymentStatus, ShippingStatus};
pub use payment::{PaymentTransaction, TransactionStatus};
pub use product::Product;
