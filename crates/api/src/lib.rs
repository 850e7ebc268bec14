//! HTTP API server with observability for the storefront order core.
//!
//! Exposes the cart, checkout, cancellation, and payment operations under
//! `/api/v1`, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod seed;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use fulfillment::{
    CancellationService, CartService, CheckoutService, OrderQueries, PaymentService, StubGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::{AppState, cart, ops, orders, payments};
use validation::ValidationRules;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(ops::metrics))
        .with_state(metrics_handle);

    let v1 = Router::new()
        .route(
            "/cart",
            get(cart::get::<S>)
                .post(cart::add::<S>)
                .delete(cart::clear::<S>),
        )
        .route(
            "/cart/{item_id}",
            put(cart::update::<S>).delete(cart::remove::<S>),
        )
        .route(
            "/orders",
            post(orders::create::<S>).get(orders::list::<S>),
        )
        .route("/orders/admin", get(orders::list_all::<S>))
        .route("/orders/{id}", get(orders::get::<S>))
        .route("/orders/{id}/cancel", put(orders::cancel::<S>))
        .route("/orders/{id}/status", put(orders::update_status::<S>))
        .route("/orders/{id}/shipping", put(orders::update_shipping::<S>))
        .route("/payments", post(payments::create::<S>))
        .route("/payments/{id}", get(payments::get::<S>))
        .route("/payments/{id}/verify", post(payments::verify::<S>))
        .route("/payments/{id}/cancel", put(payments::cancel::<S>));

    Router::new()
        .route("/health", get(ops::health::<S>))
        .nest("/api/v1", v1)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state: every service shares the one store, and
/// payments are confirmed by the stub gateway.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    rules: ValidationRules,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        carts: CartService::new(store.clone()),
        checkout: CheckoutService::new(store.clone()),
        cancellation: CancellationService::new(store.clone()),
        payments: PaymentService::new(store.clone(), StubGateway),
        orders: OrderQueries::new(store.clone()),
        store,
        rules,
    })
}
