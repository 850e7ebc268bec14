use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Money, OrderDetails, Product, UserId};
use fulfillment::{CancellationService, CartService, CheckoutService};
use store::InMemoryStore;

fn details() -> OrderDetails {
    OrderDetails {
        payment_method: "credit_card".to_string(),
        shipping_method: "standard".to_string(),
        shipping_address: "1 Main St".to_string(),
        notes: None,
    }
}

async fn seeded_store(lines: usize) -> (InMemoryStore, Vec<Product>) {
    let store = InMemoryStore::new();
    let mut products = Vec::with_capacity(lines);
    for i in 0..lines {
        let product = Product::new(format!("Product {i}"), Money::from_cents(1000), u32::MAX);
        store.insert_product(product.clone()).await;
        products.push(product);
    }
    (store, products)
}

fn bench_place_order(c: &mut Criterion, lines: usize) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, products) = rt.block_on(seeded_store(lines));
    let carts = CartService::new(store.clone());
    let checkout = CheckoutService::new(store);

    c.bench_function(&format!("checkout/place_order_{lines}_lines"), |b| {
        b.iter(|| {
            rt.block_on(async {
                let user = UserId::new();
                for product in &products {
                    carts.add_item(user, product.id, 1).await.unwrap();
                }
                checkout.place_order(user, details()).await.unwrap();
            });
        });
    });
}

fn bench_place_order_single_line(c: &mut Criterion) {
    bench_place_order(c, 1);
}

fn bench_place_order_ten_lines(c: &mut Criterion) {
    bench_place_order(c, 10);
}

fn bench_place_and_cancel(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, products) = rt.block_on(seeded_store(3));
    let carts = CartService::new(store.clone());
    let checkout = CheckoutService::new(store.clone());
    let cancellation = CancellationService::new(store);

    c.bench_function("checkout/place_and_cancel", |b| {
        b.iter(|| {
            rt.block_on(async {
                let user = UserId::new();
                for product in &products {
                    carts.add_item(user, product.id, 2).await.unwrap();
                }
                let order = checkout.place_order(user, details()).await.unwrap();
                cancellation.cancel(order.id).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_place_order_single_line,
    bench_place_order_ten_lines,
    bench_place_and_cancel
);
criterion_main!(benches);
