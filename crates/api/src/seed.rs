//! Demo catalog for running without a database.

use domain::{Money, Product};
use store::InMemoryStore;

/// A small fixed catalog: (name, unit price in whole currency units, stock).
const DEMO_PRODUCTS: &[(&str, i64, u32)] = &[
    ("iPhone 15 Pro", 39900, 50),
    ("MacBook Air M2", 42900, 30),
    ("Cotton Oxford Shirt", 1290, 100),
    ("Slim Fit Jeans", 1890, 75),
    ("Running Shoes", 3290, 80),
    ("Adjustable Dumbbell Set", 4590, 25),
    ("Clean Code", 890, 40),
    ("Design Patterns", 1290, 35),
];

pub fn demo_catalog() -> Vec<Product> {
    DEMO_PRODUCTS
        .iter()
        .map(|(name, price, stock)| Product::new(*name, Money::from_dollars(*price), *stock))
        .collect()
}

/// Loads the demo catalog into an in-memory store and returns what was added.
pub async fn seed_demo_catalog(store: &InMemoryStore) -> Vec<Product> {
    let products = demo_catalog();
    for product in &products {
        store.insert_product(product.clone()).await;
        tracing::info!(
            product_id = %product.id,
            name = %product.name,
            price = %product.unit_price,
            stock = product.stock,
            "seeded product"
        );
    }
    products
}
