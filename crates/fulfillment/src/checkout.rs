//! Order placement: turning a cart into an order.

use std::time::Instant;

use common::UserId;
use domain::{Cart, Order, OrderDetails};
use store::{CartRepository, InventoryLedger, OrderRepository, Store, UnitOfWork};

use crate::error::{FulfillmentError, Result};

/// Places orders from carts.
pub struct CheckoutService<S: Store> {
    store: S,
}

impl<S: Store> CheckoutService<S> {
    /// Creates a new checkout service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Converts the user's cart into a pending order.
    ///
    /// Runs as one unit of work: the order header, its items, every stock
    /// reservation and the cart clear commit together. On any failure the
    /// unit is dropped and the cart, stock and order tables are exactly as
    /// they were before the call.
    #[tracing::instrument(skip(self, details))]
    pub async fn place_order(&self, user_id: UserId, details: OrderDetails) -> Result<Order> {
        let started = Instant::now();
        let result = self.try_place_order(user_id, details).await;
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    items = order.items.len(),
                    total = %order.total_price,
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.reason()).increment(1);
                tracing::warn!(reason = e.reason(), error = %e, "order rejected");
            }
        }

        result
    }

    async fn try_place_order(&self, user_id: UserId, details: OrderDetails) -> Result<Order> {
        validate_details(&details)?;

        let mut unit = self.store.begin().await?;

        // A user who never opened a cart has nothing to check out.
        let cart = unit
            .lock_cart(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id));
        let order = Order::from_cart(&cart, details)?;

        unit.insert_order(&order).await?;
        for item in &order.items {
            unit.insert_order_item(item).await?;
            unit.reserve(item.product_id, item.quantity).await?;
        }

        unit.clear_cart(cart.id).await?;
        unit.commit().await?;

        Ok(order)
    }
}

fn validate_details(details: &OrderDetails) -> Result<()> {
    let required = [
        ("payment_method", &details.payment_method),
        ("shipping_method", &details.shipping_method),
        ("shipping_address", &details.shipping_address),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(FulfillmentError::Validation(format!("{field} is required")));
        }
    }
    Ok(())
}
