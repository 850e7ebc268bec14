use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use common::{
    CartId, CartItemId, Money, OrderId, OrderItemId, ProductId, TransactionId, UserId,
};
use domain::{
    Cart, CartItem, Order, OrderItem, OrderStatus, ParseStatusError, PaymentStatus,
    PaymentTransaction, Product, ShippingStatus, TransactionStatus,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    EntityKind, Result, StoreError,
    repository::{
        CartRepository, InventoryLedger, OrderRepository, PageRequest, PaymentRepository,
        ProductCatalog, Store, UnitOfWork,
    },
};

const CART_COLUMNS: &str =
    "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = $1";
const CART_ITEM_COLUMNS: &str =
    "SELECT id, cart_id, product_id, quantity, price_cents, created_at, updated_at FROM cart_items";
const ORDER_COLUMNS: &str = r#"
    SELECT id, user_id, total_price_cents, status, payment_status, shipping_status,
           payment_method, shipping_method, shipping_address, tracking_number, notes,
           created_at, updated_at
    FROM orders
"#;
const ORDER_ITEM_COLUMNS: &str =
    "SELECT id, order_id, product_id, quantity, price_cents, created_at FROM order_items";
const TRANSACTION_COLUMNS: &str = r#"
    SELECT id, order_id, amount_cents, payment_method, status, reference, payment_data,
           created_at, updated_at
    FROM transactions
"#;

/// PostgreSQL-backed store implementation.
///
/// Stock checks rely on row-level locks: a reservation is a single
/// conditional `UPDATE`, so two units reserving the same product queue on
/// the product row and the second re-checks stock after the first commits.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts or replaces a catalog product. Used for seeding; product
    /// maintenance otherwise belongs to the catalog.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.unit_price.cents())
        .bind(i64::from(product.stock))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// A unit of work backed by one PostgreSQL transaction.
pub struct PgUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Store for PostgresStore {
    type Unit = PgUnit;

    async fn begin(&self) -> Result<PgUnit> {
        let tx = self.pool.begin().await?;
        Ok(PgUnit { tx })
    }
}

#[async_trait]
impl UnitOfWork for PgUnit {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn decode_error(
    column: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

fn get_u32(row: &PgRow, column: &str) -> sqlx::Result<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).map_err(|e| decode_error(column, e))
}

fn get_money(row: &PgRow, column: &str) -> sqlx::Result<Money> {
    Ok(Money::from_cents(row.try_get(column)?))
}

fn get_status<T>(row: &PgRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr<Err = ParseStatusError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| decode_error(column, e))
}

fn row_to_product(row: &PgRow) -> sqlx::Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        unit_price: get_money(row, "price_cents")?,
        stock: get_u32(row, "stock")?,
    })
}

fn row_to_cart(row: &PgRow) -> sqlx::Result<Cart> {
    Ok(Cart {
        id: CartId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        items: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_item(row: &PgRow) -> sqlx::Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::from_uuid(row.try_get("id")?),
        cart_id: CartId::from_uuid(row.try_get("cart_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        quantity: get_u32(row, "quantity")?,
        unit_price: get_money(row, "price_cents")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: &PgRow) -> sqlx::Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        items: Vec::new(),
        total_price: get_money(row, "total_price_cents")?,
        status: get_status(row, "status")?,
        payment_status: get_status(row, "payment_status")?,
        shipping_status: get_status(row, "shipping_status")?,
        payment_method: row.try_get("payment_method")?,
        shipping_method: row.try_get("shipping_method")?,
        shipping_address: row.try_get("shipping_address")?,
        tracking_number: row.try_get("tracking_number")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_item(row: &PgRow) -> sqlx::Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        quantity: get_u32(row, "quantity")?,
        unit_price: get_money(row, "price_cents")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_transaction(row: &PgRow) -> sqlx::Result<PaymentTransaction> {
    Ok(PaymentTransaction {
        id: TransactionId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        amount: get_money(row, "amount_cents")?,
        payment_method: row.try_get("payment_method")?,
        status: get_status(row, "status")?,
        reference: row.try_get("reference")?,
        payment_data: row.try_get("payment_data")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl PgUnit {
    async fn load_cart(&mut self, user_id: UserId, for_update: bool) -> Result<Option<Cart>> {
        let sql = if for_update {
            format!("{CART_COLUMNS} FOR UPDATE")
        } else {
            CART_COLUMNS.to_string()
        };
        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut cart = row_to_cart(&row)?;

        let items = sqlx::query(&format!("{CART_ITEM_COLUMNS} WHERE cart_id = $1 ORDER BY seq"))
            .bind(cart.id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;
        cart.items = items
            .iter()
            .map(row_to_cart_item)
            .collect::<sqlx::Result<_>>()?;

        Ok(Some(cart))
    }

    async fn load_order(&mut self, id: OrderId, for_update: bool) -> Result<Option<Order>> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let row = sqlx::query(&format!("{ORDER_COLUMNS} WHERE id = $1{lock}"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut order = row_to_order(&row)?;

        let items = sqlx::query(&format!(
            "{ORDER_ITEM_COLUMNS} WHERE order_id = $1 ORDER BY seq"
        ))
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        order.items = items
            .iter()
            .map(row_to_order_item)
            .collect::<sqlx::Result<_>>()?;

        Ok(Some(order))
    }

    async fn load_transaction(
        &mut self,
        id: TransactionId,
        for_update: bool,
    ) -> Result<Option<PaymentTransaction>> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let row = sqlx::query(&format!("{TRANSACTION_COLUMNS} WHERE id = $1{lock}"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.as_ref().map(row_to_transaction).transpose()?)
    }

    /// One page of orders, newest first, optionally restricted to one user.
    async fn page_orders(
        &mut self,
        user_id: Option<UserId>,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64)> {
        let owner = user_id.map(|id| id.as_uuid());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE ($1::uuid IS NULL OR user_id = $1)",
        )
        .bind(owner)
        .fetch_one(&mut *self.tx)
        .await?;

        let rows = sqlx::query(&format!(
            "{ORDER_COLUMNS} WHERE ($1::uuid IS NULL OR user_id = $1) \
             ORDER BY created_at DESC, seq DESC LIMIT $2 OFFSET $3"
        ))
        .bind(owner)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut orders = rows
            .iter()
            .map(row_to_order)
            .collect::<sqlx::Result<Vec<_>>>()?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let item_rows = sqlx::query(&format!(
            "{ORDER_ITEM_COLUMNS} WHERE order_id = ANY($1) ORDER BY seq"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let item = row_to_order_item(row)?;
            items_by_order.entry(item.order_id).or_default().push(item);
        }
        for order in &mut orders {
            order.items = items_by_order.remove(&order.id).unwrap_or_default();
        }

        Ok((orders, total.max(0) as u64))
    }

    async fn current_stock(&mut self, product_id: ProductId) -> Result<Option<u32>> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        stock
            .map(|s| u32::try_from(s).map_err(|e| decode_error("stock", e).into()))
            .transpose()
    }
}

#[async_trait]
impl ProductCatalog for PgUnit {
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.as_ref().map(row_to_product).transpose()?)
    }
}

#[async_trait]
impl InventoryLedger for PgUnit {
    async fn reserve(&mut self, product_id: ProductId, quantity: u32) -> Result<u32> {
        // The WHERE clause is re-evaluated after any competing writer commits.
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(remaining) = remaining {
            tracing::debug!(%product_id, quantity, remaining, "stock reserved");
            return u32::try_from(remaining).map_err(|e| decode_error("stock", e).into());
        }

        match self.current_stock(product_id).await? {
            Some(available) => Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available,
            }),
            None => Err(StoreError::not_found(EntityKind::Product, product_id)),
        }
    }

    async fn release(&mut self, product_id: ProductId, quantity: u32) -> Result<u32> {
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *self.tx)
        .await?;

        let stock = stock.ok_or_else(|| StoreError::not_found(EntityKind::Product, product_id))?;
        tracing::debug!(%product_id, quantity, stock, "stock released");
        u32::try_from(stock).map_err(|e| decode_error("stock", e).into())
    }
}

#[async_trait]
impl CartRepository for PgUnit {
    async fn find_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        self.load_cart(user_id, false).await
    }

    async fn lock_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        self.load_cart(user_id, true).await
    }

    async fn create_cart_if_missing(&mut self, cart: &Cart) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(cart.id.as_uuid())
        .bind(cart.user_id.as_uuid())
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, price_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.cart_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(i64::from(item.quantity))
        .bind(item.unit_price.cents())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_cart_item(
        &mut self,
        item_id: CartItemId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cart_items
            SET quantity = $2, price_cents = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(item_id.as_uuid())
        .bind(i64::from(quantity))
        .bind(unit_price.cents())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_cart_item(&mut self, item_id: CartItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(item_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrderRepository for PgUnit {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, total_price_cents, status, payment_status, shipping_status,
                payment_method, shipping_method, shipping_address, tracking_number, notes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.total_price.cents())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.shipping_status.as_str())
        .bind(&order.payment_method)
        .bind(&order.shipping_method)
        .bind(&order.shipping_address)
        .bind(order.tracking_number.as_deref())
        .bind(order.notes.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity, price_cents, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(i64::from(item.quantity))
        .bind(item.unit_price.cents())
        .bind(item.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.load_order(id, false).await
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.load_order(id, true).await
    }

    async fn list_orders(
        &mut self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64)> {
        self.page_orders(Some(user_id), page).await
    }

    async fn list_all_orders(&mut self, page: PageRequest) -> Result<(Vec<Order>, u64)> {
        self.page_orders(None, page).await
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<bool> {
        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(status.as_str())
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_payment_status(
        &mut self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(status.as_str())
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_shipping(
        &mut self,
        id: OrderId,
        status: ShippingStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET shipping_status = $2,
                tracking_number = COALESCE($3, tracking_number),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(tracking_number)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PaymentRepository for PgUnit {
    async fn insert_transaction(&mut self, transaction: &PaymentTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, order_id, amount_cents, payment_method, status, reference, payment_data,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.order_id.as_uuid())
        .bind(transaction.amount.cents())
        .bind(&transaction.payment_method)
        .bind(transaction.status.as_str())
        .bind(&transaction.reference)
        .bind(transaction.payment_data.as_deref())
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<PaymentTransaction>> {
        self.load_transaction(id, false).await
    }

    async fn lock_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<PaymentTransaction>> {
        self.load_transaction(id, true).await
    }

    async fn transactions_for_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<Vec<PaymentTransaction>> {
        let rows = sqlx::query(&format!(
            "{TRANSACTION_COLUMNS} WHERE order_id = $1 ORDER BY seq"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .iter()
            .map(row_to_transaction)
            .collect::<sqlx::Result<_>>()?)
    }

    async fn update_transaction_status(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE transactions SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(status.as_str())
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
