//! Order cancellation.

use chrono::Utc;
use common::OrderId;
use domain::{Order, OrderStatus};
use store::{EntityKind, InventoryLedger, OrderRepository, Store, UnitOfWork};

use crate::error::{FulfillmentError, Result};

/// Cancels pending orders and puts their stock back.
pub struct CancellationService<S: Store> {
    store: S,
}

impl<S: Store> CancellationService<S> {
    /// Creates a new cancellation service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Cancels a pending order.
    ///
    /// Every item's quantity is released and the status flips to cancelled in
    /// the same unit. Orders in any other status are rejected untouched.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, order_id: OrderId) -> Result<Order> {
        let mut unit = self.store.begin().await?;
        let mut order = unit
            .lock_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(EntityKind::Order, order_id))?;

        order.ensure_cancellable()?;

        for item in &order.items {
            let stock = unit.release(item.product_id, item.quantity).await?;
            tracing::debug!(
                product_id = %item.product_id,
                quantity = item.quantity,
                stock,
                "stock restored"
            );
        }
        unit.update_order_status(order_id, OrderStatus::Cancelled)
            .await?;
        unit.commit().await?;

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, items = order.items.len(), "order cancelled");

        Ok(order)
    }
}
