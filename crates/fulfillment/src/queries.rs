//! Order reads and administrative status edits.

use common::{OrderId, UserId};
use domain::{Order, OrderStatus, PaymentTransaction, ShippingStatus};
use store::{EntityKind, OrderRepository, PageRequest, PaymentRepository, Store, UnitOfWork};

use crate::error::{FulfillmentError, Result};

/// An order together with every payment attempt made against it.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub order: Order,
    pub transactions: Vec<PaymentTransaction>,
}

/// One page of orders.
#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub page: PageRequest,
    pub total: u64,
}

impl OrderPage {
    pub fn total_pages(&self) -> u64 {
        self.page.total_pages(self.total)
    }
}

/// Read side of orders plus the status edits that need no orchestration.
pub struct OrderQueries<S: Store> {
    store: S,
}

impl<S: Store> OrderQueries<S> {
    /// Creates a new order query service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderView> {
        let mut unit = self.store.begin().await?;
        let order = unit
            .find_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(EntityKind::Order, order_id))?;
        let transactions = unit.transactions_for_order(order_id).await?;
        unit.rollback().await?;

        Ok(OrderView {
            order,
            transactions,
        })
    }

    /// A user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId, page: PageRequest) -> Result<OrderPage> {
        let mut unit = self.store.begin().await?;
        let (orders, total) = unit.list_orders(user_id, page).await?;
        unit.rollback().await?;

        Ok(OrderPage {
            orders,
            page,
            total,
        })
    }

    /// Every user's orders, newest first. Administrative.
    #[tracing::instrument(skip(self))]
    pub async fn list_all_orders(&self, page: PageRequest) -> Result<OrderPage> {
        let mut unit = self.store.begin().await?;
        let (orders, total) = unit.list_all_orders(page).await?;
        unit.rollback().await?;

        Ok(OrderPage {
            orders,
            page,
            total,
        })
    }

    /// Moves an order to a new lifecycle status. Cancellation is refused
    /// here because it must restore stock.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order> {
        let mut unit = self.store.begin().await?;
        let mut order = Self::locked(&mut unit, order_id).await?;

        order.ensure_status_change(status)?;
        unit.update_order_status(order_id, status).await?;
        unit.commit().await?;

        tracing::info!(%order_id, from = %order.status, to = %status, "order status changed");
        order.status = status;
        Ok(order)
    }

    /// Sets the shipping status, recording a tracking number when given.
    #[tracing::instrument(skip(self))]
    pub async fn update_shipping(
        &self,
        order_id: OrderId,
        status: ShippingStatus,
        tracking_number: Option<String>,
    ) -> Result<Order> {
        let mut unit = self.store.begin().await?;
        let mut order = Self::locked(&mut unit, order_id).await?;

        unit.update_shipping(order_id, status, tracking_number.as_deref())
            .await?;
        unit.commit().await?;

        tracing::info!(%order_id, shipping_status = %status, "shipping status changed");
        order.shipping_status = status;
        if tracking_number.is_some() {
            order.tracking_number = tracking_number;
        }
        Ok(order)
    }

    async fn locked(unit: &mut S::Unit, order_id: OrderId) -> Result<Order> {
        unit.lock_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(EntityKind::Order, order_id))
    }
}
