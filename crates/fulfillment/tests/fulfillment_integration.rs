//! Integration tests for the fulfillment services against the in-memory store.

use async_trait::async_trait;
use domain::{
    DomainError, Money, OrderDetails, OrderStatus, PaymentStatus, PaymentTransaction, Product,
    ProductId, ShippingStatus, TransactionStatus, UserId,
};
use fulfillment::{
    CancellationService, CartService, CheckoutService, ErrorKind, FulfillmentError,
    OrderQueries, PaymentGateway, PaymentService, StubGateway,
};
use store::{EntityKind, InMemoryStore, PageRequest};

struct TestHarness {
    store: InMemoryStore,
    carts: CartService<InMemoryStore>,
    checkout: CheckoutService<InMemoryStore>,
    cancellation: CancellationService<InMemoryStore>,
    payments: PaymentService<InMemoryStore, StubGateway>,
    queries: OrderQueries<InMemoryStore>,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        Self {
            carts: CartService::new(store.clone()),
            checkout: CheckoutService::new(store.clone()),
            cancellation: CancellationService::new(store.clone()),
            payments: PaymentService::new(store.clone(), StubGateway),
            queries: OrderQueries::new(store.clone()),
            store,
        }
    }

    async fn product(&self, price_cents: i64, stock: u32) -> Product {
        let product = Product::new("Widget", Money::from_cents(price_cents), stock);
        self.store.insert_product(product.clone()).await;
        product
    }

    /// Replaces a product's stock the way a catalog edit would.
    async fn set_stock(&self, product: &Product, stock: u32) {
        self.store
            .insert_product(Product {
                stock,
                ..product.clone()
            })
            .await;
    }

    async fn stock(&self, product: &Product) -> u32 {
        self.store.stock_of(product.id).await.unwrap()
    }
}

fn details() -> OrderDetails {
    OrderDetails {
        payment_method: "credit_card".to_string(),
        shipping_method: "standard".to_string(),
        shipping_address: "1 Main St, Springfield".to_string(),
        notes: Some("leave at the door".to_string()),
    }
}

#[tokio::test]
async fn place_order_reserves_stock_and_empties_cart() {
    let h = TestHarness::new();
    let user = UserId::new();
    let phone = h.product(39900, 50).await;
    let laptop = h.product(42900, 30).await;

    h.carts.add_item(user, phone.id, 2).await.unwrap();
    h.carts.add_item(user, laptop.id, 1).await.unwrap();

    let order = h.checkout.place_order(user, details()).await.unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.shipping_status, ShippingStatus::Pending);
    assert_eq!(order.total_price, Money::from_cents(2 * 39900 + 42900));
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].product_id, phone.id);
    assert_eq!(order.items[1].product_id, laptop.id);
    assert_eq!(order.notes.as_deref(), Some("leave at the door"));

    assert_eq!(h.stock(&phone).await, 48);
    assert_eq!(h.stock(&laptop).await, 29);
    assert!(h.carts.get_or_create(user).await.unwrap().is_empty());

    let view = h.queries.get_order(order.id).await.unwrap();
    assert_eq!(view.order, order);
    assert!(view.transactions.is_empty());
}

#[tokio::test]
async fn failed_reservation_leaves_everything_untouched() {
    let h = TestHarness::new();
    let user = UserId::new();
    let first = h.product(1000, 10).await;
    let second = h.product(2000, 10).await;
    let third = h.product(3000, 10).await;

    h.carts.add_item(user, first.id, 2).await.unwrap();
    h.carts.add_item(user, second.id, 3).await.unwrap();
    h.carts.add_item(user, third.id, 5).await.unwrap();

    // The catalog drops the last line's stock after it was carted.
    h.set_stock(&third, 4).await;

    let err = h.checkout.place_order(user, details()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    assert!(matches!(
        err,
        FulfillmentError::Rule(DomainError::InsufficientStock {
            product_id,
            requested: 5,
            available: 4,
        }) if product_id == third.id
    ));

    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.store.order_item_count().await, 0);
    assert_eq!(h.stock(&first).await, 10);
    assert_eq!(h.stock(&second).await, 10);
    assert_eq!(h.stock(&third).await, 4);

    let cart = h.carts.get_or_create(user).await.unwrap();
    assert_eq!(cart.items.len(), 3);
    assert_eq!(
        cart.items.iter().map(|i| i.quantity).collect::<Vec<_>>(),
        vec![2, 3, 5]
    );
}

#[tokio::test]
async fn empty_cart_never_creates_an_order() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product(1000, 5).await;

    // No cart at all.
    let err = h.checkout.place_order(user, details()).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Rule(DomainError::EmptyCart)));

    // A cart that was emptied.
    h.carts.add_item(user, product.id, 1).await.unwrap();
    h.carts.clear(user).await.unwrap();
    let err = h.checkout.place_order(user, details()).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Rule(DomainError::EmptyCart)));

    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.stock(&product).await, 5);
}

#[tokio::test]
async fn blank_shipping_details_are_a_validation_error() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product(1000, 5).await;
    h.carts.add_item(user, product.id, 1).await.unwrap();

    let err = h
        .checkout
        .place_order(
            user,
            OrderDetails {
                shipping_method: String::new(),
                ..details()
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.carts.get_or_create(user).await.unwrap().items.len(), 1);
}

#[tokio::test]
async fn cancellation_restores_exactly_what_was_reserved() {
    let h = TestHarness::new();
    let user = UserId::new();
    let p1 = h.product(1000, 10).await;
    let p2 = h.product(500, 10).await;

    h.carts.add_item(user, p1.id, 2).await.unwrap();
    h.carts.add_item(user, p2.id, 1).await.unwrap();
    let order = h.checkout.place_order(user, details()).await.unwrap();
    assert_eq!(h.stock(&p1).await, 8);
    assert_eq!(h.stock(&p2).await, 9);

    let cancelled = h.cancellation.cancel(order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(h.stock(&p1).await, 10);
    assert_eq!(h.stock(&p2).await, 10);

    let err = h.cancellation.cancel(order.id).await.unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::Rule(DomainError::InvalidOrderState {
            current: OrderStatus::Cancelled,
            ..
        })
    ));
    assert_eq!(h.stock(&p1).await, 10);
    assert_eq!(h.stock(&p2).await, 10);
}

#[tokio::test]
async fn cancellation_is_only_allowed_from_pending() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product(1000, 10).await;
    h.carts.add_item(user, product.id, 3).await.unwrap();
    let order = h.checkout.place_order(user, details()).await.unwrap();

    h.queries
        .update_order_status(order.id, OrderStatus::Processing)
        .await
        .unwrap();

    let err = h.cancellation.cancel(order.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    assert_eq!(h.stock(&product).await, 7);

    let view = h.queries.get_order(order.id).await.unwrap();
    assert_eq!(view.order.status, OrderStatus::Processing);
}

#[tokio::test]
async fn cancelling_unknown_order_is_not_found() {
    let h = TestHarness::new();
    let err = h
        .cancellation
        .cancel(domain::OrderId::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::NotFound {
            entity: EntityKind::Order,
            ..
        }
    ));
}

#[tokio::test]
async fn stock_is_conserved_across_orders_and_cancellations() {
    let h = TestHarness::new();
    let product = h.product(100, 20).await;
    let mut reserved = 0;
    let mut released = 0;
    let mut orders = Vec::new();

    for quantity in [3, 5, 2, 4] {
        let user = UserId::new();
        h.carts.add_item(user, product.id, quantity).await.unwrap();
        orders.push(h.checkout.place_order(user, details()).await.unwrap());
        reserved += quantity;
    }
    for order in orders.iter().step_by(2) {
        h.cancellation.cancel(order.id).await.unwrap();
        released += order.items[0].quantity;
    }

    assert_eq!(h.stock(&product).await, 20 - reserved + released);
}

#[tokio::test]
async fn add_merges_into_existing_line() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product(1000, 10).await;

    h.carts.add_item(user, product.id, 4).await.unwrap();

    let err = h.carts.add_item(user, product.id, 7).await.unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::Rule(DomainError::InsufficientStock {
            requested: 11,
            available: 10,
            ..
        })
    ));
    let cart = h.carts.get_or_create(user).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 4);

    let cart = h.carts.add_item(user, product.id, 3).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 7);
    assert_eq!(cart.total(), Money::from_cents(7000));
}

#[tokio::test]
async fn merge_refreshes_price_but_update_keeps_snapshot() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product(1000, 10).await;

    let cart = h.carts.add_item(user, product.id, 1).await.unwrap();
    let item_id = cart.items[0].id;

    let repriced = Product {
        unit_price: Money::from_cents(1200),
        ..product.clone()
    };
    h.store.insert_product(repriced.clone()).await;

    let cart = h.carts.update_item(user, item_id, 2).await.unwrap();
    assert_eq!(cart.items[0].unit_price, Money::from_cents(1000));

    let cart = h.carts.add_item(user, product.id, 1).await.unwrap();
    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.items[0].unit_price, Money::from_cents(1200));
}

#[tokio::test]
async fn update_item_checks_stock_and_quantity() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product(1000, 5).await;
    let cart = h.carts.add_item(user, product.id, 1).await.unwrap();
    let item_id = cart.items[0].id;

    let err = h.carts.update_item(user, item_id, 6).await.unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::Rule(DomainError::InsufficientStock { .. })
    ));

    let err = h.carts.update_item(user, item_id, 0).await.unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::Rule(DomainError::InvalidQuantity { quantity: 0 })
    ));

    let cart = h.carts.update_item(user, item_id, 5).await.unwrap();
    assert_eq!(cart.items[0].quantity, 5);
}

#[tokio::test]
async fn cart_items_are_scoped_to_their_owner() {
    let h = TestHarness::new();
    let owner = UserId::new();
    let other = UserId::new();
    let product = h.product(1000, 5).await;
    let cart = h.carts.add_item(owner, product.id, 1).await.unwrap();
    let item_id = cart.items[0].id;

    let err = h.carts.remove_item(other, item_id).await.unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::NotFound {
            entity: EntityKind::CartItem,
            ..
        }
    ));

    let cart = h.carts.remove_item(owner, item_id).await.unwrap();
    assert!(cart.is_empty());
}

#[tokio::test]
async fn adding_unknown_product_is_not_found() {
    let h = TestHarness::new();
    let err = h
        .carts
        .add_item(UserId::new(), ProductId::new(), 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::NotFound {
            entity: EntityKind::Product,
            ..
        }
    ));
}

#[tokio::test]
async fn concurrent_orders_for_last_unit_never_oversell() {
    let h = TestHarness::new();
    let product = h.product(1000, 1).await;
    let alice = UserId::new();
    let bob = UserId::new();
    h.carts.add_item(alice, product.id, 1).await.unwrap();
    h.carts.add_item(bob, product.id, 1).await.unwrap();

    let (a, b) = tokio::join!(
        h.checkout.place_order(alice, details()),
        h.checkout.place_order(bob, details())
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(FulfillmentError::Rule(DomainError::InsufficientStock { .. }))
    )));
    assert_eq!(h.stock(&product).await, 0);
    assert_eq!(h.store.order_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_on_a_multithreaded_runtime() {
    let h = std::sync::Arc::new(TestHarness::new());
    let product = h.product(1000, 3).await;

    let mut users = Vec::new();
    for _ in 0..8 {
        let user = UserId::new();
        h.carts.add_item(user, product.id, 1).await.unwrap();
        users.push(user);
    }

    let mut handles = Vec::new();
    for user in users {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.checkout.place_order(user, details()).await.is_ok()
        }));
    }

    let mut placed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            placed += 1;
        }
    }

    assert_eq!(placed, 3);
    assert_eq!(h.stock(&product).await, 0);
}

async fn fifty_dollar_order(h: &TestHarness) -> domain::Order {
    let user = UserId::new();
    let product = h.product(2500, 10).await;
    h.carts.add_item(user, product.id, 2).await.unwrap();
    h.checkout.place_order(user, details()).await.unwrap()
}

#[tokio::test]
async fn verified_payment_marks_order_paid() {
    let h = TestHarness::new();
    let order = fifty_dollar_order(&h).await;
    assert_eq!(order.total_price.to_string(), "$50.00");

    let transaction = h
        .payments
        .create(order.id, "credit_card".to_string(), None)
        .await
        .unwrap();
    assert_eq!(transaction.amount, Money::from_cents(5000));
    assert_eq!(transaction.status, TransactionStatus::Pending);
    assert!(transaction.reference.starts_with("TXN_"));

    let settled = h
        .payments
        .verify(transaction.id, &transaction.reference, None)
        .await
        .unwrap();
    assert_eq!(settled.status, TransactionStatus::Completed);

    let view = h.queries.get_order(order.id).await.unwrap();
    assert_eq!(view.order.payment_status, PaymentStatus::Paid);
    assert_eq!(view.transactions.len(), 1);
    assert_eq!(view.transactions[0].status, TransactionStatus::Completed);
}

#[tokio::test]
async fn mismatched_reference_fails_payment() {
    let h = TestHarness::new();
    let order = fifty_dollar_order(&h).await;
    let transaction = h
        .payments
        .create(order.id, "credit_card".to_string(), Some("card=4242".to_string()))
        .await
        .unwrap();

    let settled = h
        .payments
        .verify(transaction.id, "TXN_0_deadbeef", None)
        .await
        .unwrap();
    assert_eq!(settled.status, TransactionStatus::Failed);

    let view = h.queries.get_order(order.id).await.unwrap();
    assert_eq!(view.order.payment_status, PaymentStatus::Failed);
    assert_eq!(
        h.payments.get(transaction.id).await.unwrap().payment_data.as_deref(),
        Some("card=4242")
    );
}

#[tokio::test]
async fn settled_transactions_are_terminal() {
    let h = TestHarness::new();
    let order = fifty_dollar_order(&h).await;
    let transaction = h
        .payments
        .create(order.id, "credit_card".to_string(), None)
        .await
        .unwrap();

    h.payments.cancel(transaction.id).await.unwrap();
    let view = h.queries.get_order(order.id).await.unwrap();
    assert_eq!(view.order.payment_status, PaymentStatus::Cancelled);

    let err = h
        .payments
        .verify(transaction.id, &transaction.reference, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::Rule(DomainError::InvalidTransactionState {
            current: TransactionStatus::Cancelled,
            ..
        })
    ));
    let view = h.queries.get_order(order.id).await.unwrap();
    assert_eq!(view.order.payment_status, PaymentStatus::Cancelled);
}

#[tokio::test]
async fn stale_attempt_still_drives_payment_status() {
    let h = TestHarness::new();
    let order = fifty_dollar_order(&h).await;
    let first = h
        .payments
        .create(order.id, "credit_card".to_string(), None)
        .await
        .unwrap();
    let second = h
        .payments
        .create(order.id, "credit_card".to_string(), None)
        .await
        .unwrap();

    h.payments
        .verify(second.id, &second.reference, None)
        .await
        .unwrap();
    h.payments.verify(first.id, "wrong", None).await.unwrap();

    let view = h.queries.get_order(order.id).await.unwrap();
    assert_eq!(view.order.payment_status, PaymentStatus::Failed);
    assert_eq!(view.transactions.len(), 2);
}

#[tokio::test]
async fn payment_for_unknown_order_is_not_found() {
    let h = TestHarness::new();
    let err = h
        .payments
        .create(domain::OrderId::new(), "credit_card".to_string(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

struct UnreachableGateway;

#[async_trait]
impl PaymentGateway for UnreachableGateway {
    async fn verify(
        &self,
        _transaction: &PaymentTransaction,
        _submitted_reference: &str,
        _payment_data: Option<&str>,
    ) -> Result<TransactionStatus, FulfillmentError> {
        Err(FulfillmentError::Gateway("connection refused".to_string()))
    }
}

#[tokio::test]
async fn gateway_failure_leaves_transaction_pending() {
    let h = TestHarness::new();
    let order = fifty_dollar_order(&h).await;
    let transaction = h
        .payments
        .create(order.id, "credit_card".to_string(), None)
        .await
        .unwrap();

    let payments = PaymentService::new(h.store.clone(), UnreachableGateway);
    let err = payments
        .verify(transaction.id, &transaction.reference, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);

    let reloaded = h.payments.get(transaction.id).await.unwrap();
    assert_eq!(reloaded.status, TransactionStatus::Pending);
    let view = h.queries.get_order(order.id).await.unwrap();
    assert_eq!(view.order.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn status_edits_refuse_cancellation() {
    let h = TestHarness::new();
    let order = fifty_dollar_order(&h).await;

    let err = h
        .queries
        .update_order_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BusinessRule);

    let shipped = h
        .queries
        .update_order_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
}

#[tokio::test]
async fn delivered_orders_cannot_be_reopened_and_cancelled() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product(1000, 5).await;
    h.carts.add_item(user, product.id, 2).await.unwrap();
    let order = h.checkout.place_order(user, details()).await.unwrap();

    h.queries
        .update_order_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap();

    let err = h
        .queries
        .update_order_status(order.id, OrderStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::Rule(DomainError::InvalidOrderState {
            current: OrderStatus::Delivered,
            ..
        })
    ));

    let err = h.cancellation.cancel(order.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BusinessRule);

    let view = h.queries.get_order(order.id).await.unwrap();
    assert_eq!(view.order.status, OrderStatus::Delivered);
    assert_eq!(h.stock(&product).await, 3);
}

#[tokio::test]
async fn shipping_updates_keep_tracking_number() {
    let h = TestHarness::new();
    let order = fifty_dollar_order(&h).await;

    h.queries
        .update_shipping(order.id, ShippingStatus::Shipped, Some("1Z999AA1".to_string()))
        .await
        .unwrap();
    let delivered = h
        .queries
        .update_shipping(order.id, ShippingStatus::Delivered, None)
        .await
        .unwrap();

    assert_eq!(delivered.shipping_status, ShippingStatus::Delivered);
    assert_eq!(delivered.tracking_number.as_deref(), Some("1Z999AA1"));
    let view = h.queries.get_order(order.id).await.unwrap();
    assert_eq!(view.order.tracking_number.as_deref(), Some("1Z999AA1"));
}

#[tokio::test]
async fn list_orders_is_paged_newest_first() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product(100, 100).await;

    let mut placed = Vec::new();
    for _ in 0..3 {
        h.carts.add_item(user, product.id, 1).await.unwrap();
        placed.push(h.checkout.place_order(user, details()).await.unwrap().id);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let page = h
        .queries
        .list_orders(user, PageRequest::new(Some(1), Some(2)))
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(
        page.orders.iter().map(|o| o.id).collect::<Vec<_>>(),
        vec![placed[2], placed[1]]
    );

    let other = h
        .queries
        .list_orders(UserId::new(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(other.total, 0);
}

#[tokio::test]
async fn list_all_orders_covers_every_user() {
    let h = TestHarness::new();
    let product = h.product(100, 100).await;
    let alice = UserId::new();
    let bob = UserId::new();

    let mut placed = Vec::new();
    for user in [alice, bob, alice] {
        h.carts.add_item(user, product.id, 1).await.unwrap();
        placed.push(h.checkout.place_order(user, details()).await.unwrap().id);
    }

    let page = h
        .queries
        .list_all_orders(PageRequest::new(Some(1), Some(10)))
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.total_pages(), 1);
    assert_eq!(
        page.orders.iter().map(|o| o.id).collect::<Vec<_>>(),
        vec![placed[2], placed[1], placed[0]]
    );

    let second = h
        .queries
        .list_all_orders(PageRequest::new(Some(2), Some(2)))
        .await
        .unwrap();
    assert_eq!(second.orders.len(), 1);
    assert_eq!(second.orders[0].id, placed[0]);
}
