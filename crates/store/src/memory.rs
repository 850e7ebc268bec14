use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CartId, CartItemId, Money, OrderId, ProductId, TransactionId, UserId};
use domain::{
    Cart, CartItem, Order, OrderItem, OrderStatus, PaymentStatus, PaymentTransaction, Product,
    ShippingStatus, TransactionStatus,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    EntityKind, Result, StoreError,
    repository::{
        CartRepository, InventoryLedger, OrderRepository, PageRequest, PaymentRepository,
        ProductCatalog, Store, UnitOfWork,
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: HashMap<ProductId, Product>,
    carts: HashMap<UserId, Cart>,
    orders: HashMap<OrderId, Order>,
    transactions: HashMap<TransactionId, PaymentTransaction>,
    /// Insertion order of orders and transactions, like the `seq` columns.
    order_seq: HashMap<OrderId, u64>,
    transaction_seq: HashMap<TransactionId, u64>,
    next_seq: u64,
}

impl MemoryState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// One page of orders, newest first.
    fn page_orders(&self, user_id: Option<UserId>, page: PageRequest) -> (Vec<Order>, u64) {
        let mut orders: Vec<&Order> = self
            .orders
            .values()
            .filter(|o| user_id.is_none_or(|id| o.user_id == id))
            .collect();
        orders.sort_by_key(|o| {
            std::cmp::Reverse((o.created_at, self.order_seq.get(&o.id).copied()))
        });

        let total = orders.len() as u64;
        let page_items = orders
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        (page_items, total)
    }
}

/// In-memory store implementation for testing.
///
/// A unit of work holds the store's lock for its whole lifetime and writes to
/// a private copy of the state, which replaces the shared state on commit.
/// Units are therefore fully serialised, which is stricter than the row
/// locks the PostgreSQL store takes but gives the same observable outcomes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog product.
    pub async fn insert_product(&self, product: Product) {
        self.state
            .lock()
            .await
            .products
            .insert(product.id, product);
    }

    /// Returns the committed stock for a product.
    pub async fn stock_of(&self, id: ProductId) -> Option<u32> {
        self.state.lock().await.products.get(&id).map(|p| p.stock)
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the number of committed order items across all orders.
    pub async fn order_item_count(&self) -> usize {
        self.state
            .lock()
            .await
            .orders
            .values()
            .map(|o| o.items.len())
            .sum()
    }
}

/// A unit of work over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryUnit {
    shared: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl Store for InMemoryStore {
    type Unit = InMemoryUnit;

    async fn begin(&self) -> Result<InMemoryUnit> {
        let shared = self.state.clone().lock_owned().await;
        let working = shared.clone();
        Ok(InMemoryUnit { shared, working })
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnit {
    async fn commit(self) -> Result<()> {
        let Self { mut shared, working } = self;
        *shared = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

impl InMemoryUnit {
    fn cart_mut(&mut self, cart_id: CartId) -> Option<&mut Cart> {
        self.working.carts.values_mut().find(|c| c.id == cart_id)
    }

    fn cart_item_mut(&mut self, item_id: CartItemId) -> Option<&mut CartItem> {
        self.working
            .carts
            .values_mut()
            .flat_map(|c| c.items.iter_mut())
            .find(|i| i.id == item_id)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryUnit {
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }
}

#[async_trait]
impl InventoryLedger for InMemoryUnit {
    async fn reserve(&mut self, product_id: ProductId, quantity: u32) -> Result<u32> {
        let product = self
            .working
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Product, product_id))?;

        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= quantity;
        Ok(product.stock)
    }

    async fn release(&mut self, product_id: ProductId, quantity: u32) -> Result<u32> {
        let product = self
            .working
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Product, product_id))?;

        product.stock = product.stock.saturating_add(quantity);
        Ok(product.stock)
    }
}

#[async_trait]
impl CartRepository for InMemoryUnit {
    async fn find_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self.working.carts.get(&user_id).cloned())
    }

    async fn lock_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        self.find_cart(user_id).await
    }

    async fn create_cart_if_missing(&mut self, cart: &Cart) -> Result<()> {
        self.working
            .carts
            .entry(cart.user_id)
            .or_insert_with(|| Cart {
                items: Vec::new(),
                ..cart.clone()
            });
        Ok(())
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<()> {
        let cart = self
            .cart_mut(item.cart_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Cart, item.cart_id))?;
        cart.items.push(item.clone());
        cart.updated_at = Utc::now();
        Ok(())
    }

    async fn update_cart_item(
        &mut self,
        item_id: CartItemId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<bool> {
        match self.cart_item_mut(item_id) {
            Some(item) => {
                item.quantity = quantity;
                item.unit_price = unit_price;
                item.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_cart_item(&mut self, item_id: CartItemId) -> Result<bool> {
        for cart in self.working.carts.values_mut() {
            if let Some(pos) = cart.items.iter().position(|i| i.id == item_id) {
                cart.items.remove(pos);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        match self.cart_mut(cart_id) {
            Some(cart) => {
                let removed = cart.items.len() as u64;
                cart.items.clear();
                Ok(removed)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl OrderRepository for InMemoryUnit {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let header = Order {
            items: Vec::new(),
            ..order.clone()
        };
        self.working.orders.insert(order.id, header);
        let seq = self.working.next_seq();
        self.working.order_seq.insert(order.id, seq);
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        let order = self
            .working
            .orders
            .get_mut(&item.order_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Order, item.order_id))?;
        order.items.push(item.clone());
        Ok(())
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.find_order(id).await
    }

    async fn list_orders(
        &mut self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64)> {
        Ok(self.working.page_orders(Some(user_id), page))
    }

    async fn list_all_orders(&mut self, page: PageRequest) -> Result<(Vec<Order>, u64)> {
        Ok(self.working.page_orders(None, page))
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<bool> {
        Ok(self.update_order(id, |o| o.status = status))
    }

    async fn update_payment_status(
        &mut self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<bool> {
        Ok(self.update_order(id, |o| o.payment_status = status))
    }

    async fn update_shipping(
        &mut self,
        id: OrderId,
        status: ShippingStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool> {
        Ok(self.update_order(id, |o| {
            o.shipping_status = status;
            if let Some(tracking) = tracking_number {
                o.tracking_number = Some(tracking.to_string());
            }
        }))
    }
}

impl InMemoryUnit {
    fn update_order(&mut self, id: OrderId, change: impl FnOnce(&mut Order)) -> bool {
        match self.working.orders.get_mut(&id) {
            Some(order) => {
                change(order);
                order.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PaymentRepository for InMemoryUnit {
    async fn insert_transaction(&mut self, transaction: &PaymentTransaction) -> Result<()> {
        if !self.working.orders.contains_key(&transaction.order_id) {
            return Err(StoreError::not_found(
                EntityKind::Order,
                transaction.order_id,
            ));
        }
        self.working
            .transactions
            .insert(transaction.id, transaction.clone());
        let seq = self.working.next_seq();
        self.working.transaction_seq.insert(transaction.id, seq);
        Ok(())
    }

    async fn find_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<PaymentTransaction>> {
        Ok(self.working.transactions.get(&id).cloned())
    }

    async fn lock_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<PaymentTransaction>> {
        self.find_transaction(id).await
    }

    async fn transactions_for_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<Vec<PaymentTransaction>> {
        let mut transactions: Vec<PaymentTransaction> = self
            .working
            .transactions
            .values()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect();
        transactions.sort_by_key(|t| self.working.transaction_seq.get(&t.id).copied());
        Ok(transactions)
    }

    async fn update_transaction_status(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<bool> {
        match self.working.transactions.get_mut(&id) {
            Some(transaction) => {
                transaction.status = status;
                transaction.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
