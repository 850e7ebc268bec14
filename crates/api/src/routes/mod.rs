//! HTTP route handlers and shared state.

pub mod cart;
pub mod ops;
pub mod orders;
pub mod payments;

use std::str::FromStr;

use common::{OrderId, UserId};
use fulfillment::{
    CancellationService, CartService, CheckoutService, OrderQueries, OrderView, PaymentService,
    StubGateway,
};
use store::Store;

use crate::error::ApiError;
use crate::validation::ValidationRules;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub store: S,
    pub carts: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub cancellation: CancellationService<S>,
    pub payments: PaymentService<S, StubGateway>,
    pub orders: OrderQueries<S>,
    pub rules: ValidationRules,
}

/// Parses a path or body identifier.
fn parse_id<T>(field: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {field}: {e}")))
}

/// Loads an order and checks it belongs to the requesting user. Orders of
/// other users are reported as missing.
async fn owned_order<S: Store>(
    state: &AppState<S>,
    user_id: UserId,
    order_id: OrderId,
) -> Result<OrderView, ApiError> {
    let view = state.orders.get_order(order_id).await?;
    if view.order.user_id != user_id {
        return Err(ApiError::NotFound(format!("Order not found: {order_id}")));
    }
    Ok(view)
}
