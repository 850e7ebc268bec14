//! Order placement, lookup, cancellation, and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Order, OrderDetails, OrderItem, OrderStatus, PaymentStatus, ShippingStatus};
use fulfillment::OrderView;
use serde::{Deserialize, Serialize};
use store::{PageRequest, Store};

use super::payments::TransactionResponse;
use super::{AppState, owned_order, parse_id};
use crate::error::ApiError;
use crate::identity::{AdminUser, CurrentUser};

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub payment_method: String,
    pub shipping_method: String,
    pub shipping_address: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct UpdateShippingRequest {
    pub shipping_status: String,
    pub tracking_number: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_status: ShippingStatus,
    pub payment_method: String,
    pub shipping_method: String,
    pub shipping_address: String,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub total_price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub transactions: Vec<TransactionResponse>,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            id: item.id.to_string(),
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            status: order.status,
            payment_status: order.payment_status,
            shipping_status: order.shipping_status,
            items: order.items.iter().map(OrderItemResponse::from).collect(),
            total_price_cents: order.total_price.cents(),
            payment_method: order.payment_method,
            shipping_method: order.shipping_method,
            shipping_address: order.shipping_address,
            tracking_number: order.tracking_number,
            notes: order.notes,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl From<OrderView> for OrderDetailResponse {
    fn from(view: OrderView) -> Self {
        Self {
            order: view.order.into(),
            transactions: view.transactions.into_iter().map(Into::into).collect(),
        }
    }
}

// -- Handlers --

/// POST /orders: place an order from the caller's cart.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let rules = &state.rules;
    let details = OrderDetails {
        payment_method: rules.required("payment_method", &req.payment_method)?,
        shipping_method: rules.required("shipping_method", &req.shipping_method)?,
        shipping_address: rules.required("shipping_address", &req.shipping_address)?,
        notes: rules.notes(req.notes)?,
    };

    let order = state.checkout.place_order(user_id, details).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let page = PageRequest::new(query.page, query.limit);
    let result = state.orders.list_orders(user_id, page).await?;
    let total_pages = result.total_pages();

    Ok(Json(OrderListResponse {
        orders: result.orders.into_iter().map(Into::into).collect(),
        page: page.page,
        limit: page.limit,
        total: result.total,
        total_pages,
    }))
}

/// GET /orders/{id}: one of the caller's orders with its payment attempts.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderDetailResponse>, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    let view = owned_order(&state, user_id, order_id).await?;
    Ok(Json(view.into()))
}

/// PUT /orders/{id}/cancel: cancel a pending order and restore its stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    owned_order(&state, user_id, order_id).await?;

    let order = state.cancellation.cancel(order_id).await?;
    Ok(Json(order.into()))
}

/// GET /orders/admin: every user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_all<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin_id): AdminUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let page = PageRequest::new(query.page, query.limit);
    let result = state.orders.list_all_orders(page).await?;
    let total_pages = result.total_pages();

    Ok(Json(OrderListResponse {
        orders: result.orders.into_iter().map(Into::into).collect(),
        page: page.page,
        limit: page.limit,
        total: result.total,
        total_pages,
    }))
}

/// PUT /orders/{id}/status: administrative lifecycle change.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    let status: OrderStatus = req.status.trim().parse()?;

    let order = state.orders.update_order_status(order_id, status).await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/shipping: administrative shipping change.
#[tracing::instrument(skip(state, req))]
pub async fn update_shipping<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateShippingRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    let status: ShippingStatus = req.shipping_status.trim().parse()?;
    let tracking_number = state.rules.optional(req.tracking_number);

    let order = state
        .orders
        .update_shipping(order_id, status, tracking_number)
        .await?;
    Ok(Json(order.into()))
}
