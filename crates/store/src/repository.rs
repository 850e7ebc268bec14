use async_trait::async_trait;
use common::{CartId, CartItemId, Money, OrderId, ProductId, TransactionId, UserId};
use domain::{
    Cart, CartItem, Order, OrderItem, OrderStatus, PaymentStatus, PaymentTransaction, Product,
    ShippingStatus, TransactionStatus,
};

use crate::Result;

/// A page of a listing. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Normalises raw query values: page defaults to 1, and a limit outside
    /// `1..=100` falls back to the default.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = limit
            .filter(|l| (1..=Self::MAX_LIMIT).contains(l))
            .unwrap_or(Self::DEFAULT_LIMIT);
        Self { page, limit }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Number of pages needed for `total` rows.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Opens units of work against a backing store.
#[async_trait]
pub trait Store: Send + Sync {
    type Unit: UnitOfWork;

    /// Begins a new unit of work (a database transaction).
    async fn begin(&self) -> Result<Self::Unit>;
}

/// A single all-or-nothing transaction over every aggregate.
///
/// Writes become visible to other units only after `commit`. Dropping the
/// unit without committing discards every write made through it.
#[async_trait]
pub trait UnitOfWork:
    ProductCatalog + InventoryLedger + CartRepository + OrderRepository + PaymentRepository + Send
{
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Read access to the catalog owned by the catalog collaborator.
#[async_trait]
pub trait ProductCatalog {
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>>;
}

/// Per-product stock counts.
#[async_trait]
pub trait InventoryLedger {
    /// Takes `quantity` units from stock if at least that many are on hand.
    ///
    /// Fails with `InsufficientStock` and writes nothing otherwise. Concurrent
    /// reservations of the same product are serialised by the store, so the
    /// check and the decrement happen as one step. Returns the remaining stock.
    async fn reserve(&mut self, product_id: ProductId, quantity: u32) -> Result<u32>;

    /// Puts `quantity` previously reserved units back. Returns the new stock.
    async fn release(&mut self, product_id: ProductId, quantity: u32) -> Result<u32>;
}

#[async_trait]
pub trait CartRepository {
    /// Loads a user's cart with its items in insertion order.
    async fn find_cart(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Like `find_cart`, but also locks the cart row until the unit ends so
    /// concurrent writers to the same cart queue up behind this one.
    async fn lock_cart(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Inserts an empty cart unless the user already has one.
    async fn create_cart_if_missing(&mut self, cart: &Cart) -> Result<()>;

    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<()>;

    async fn update_cart_item(
        &mut self,
        item_id: CartItemId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<bool>;

    async fn delete_cart_item(&mut self, item_id: CartItemId) -> Result<bool>;

    /// Deletes every item in the cart, keeping the cart itself.
    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64>;
}

#[async_trait]
pub trait OrderRepository {
    /// Inserts the order header. Items are inserted separately.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()>;

    /// Loads an order with its items.
    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Like `find_order`, but locks the order row until the unit ends.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// A user's orders, newest first, plus the total count.
    async fn list_orders(&mut self, user_id: UserId, page: PageRequest)
    -> Result<(Vec<Order>, u64)>;

    /// Every user's orders, newest first, plus the total count.
    async fn list_all_orders(&mut self, page: PageRequest) -> Result<(Vec<Order>, u64)>;

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<bool>;

    async fn update_payment_status(&mut self, id: OrderId, status: PaymentStatus)
    -> Result<bool>;

    /// Sets the shipping status, and the tracking number when one is given.
    async fn update_shipping(
        &mut self,
        id: OrderId,
        status: ShippingStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool>;
}

#[async_trait]
pub trait PaymentRepository {
    async fn insert_transaction(&mut self, transaction: &PaymentTransaction) -> Result<()>;

    async fn find_transaction(&mut self, id: TransactionId)
    -> Result<Option<PaymentTransaction>>;

    /// Like `find_transaction`, but locks the row until the unit ends.
    async fn lock_transaction(&mut self, id: TransactionId)
    -> Result<Option<PaymentTransaction>>;

    /// Every attempt against an order, oldest first.
    async fn transactions_for_order(&mut self, order_id: OrderId)
    -> Result<Vec<PaymentTransaction>>;

    async fn update_transaction_status(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<bool>;
}
