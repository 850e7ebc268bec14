//! Shared types for the storefront backend.
//!
//! Every entity identifier gets its own newtype so a cart item id can never be
//! passed where an order id is expected. Currency is always [`Money`], an
//! integer number of cents.

mod ids;
mod money;

pub use ids::{CartId, CartItemId, OrderId, OrderItemId, ProductId, TransactionId, UserId};
pub use money::Money;
