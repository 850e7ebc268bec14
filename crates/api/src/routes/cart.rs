//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CartItemId, ProductId};
use domain::{Cart, CartItem};
use serde::{Deserialize, Serialize};
use store::Store;

use super::{AppState, parse_id};
use crate::error::ApiError;
use crate::identity::CurrentUser;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub id: String,
    pub user_id: String,
    pub items: Vec<CartItemResponse>,
    pub total_cents: i64,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<&CartItem> for CartItemResponse {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.to_string(),
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            line_total_cents: item.line_total().cents(),
        }
    }
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            id: cart.id.to_string(),
            user_id: cart.user_id.to_string(),
            items: cart.items.iter().map(CartItemResponse::from).collect(),
            total_cents: cart.total().cents(),
        }
    }
}

// -- Handlers --

/// GET /cart: the caller's cart, created on first access.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_or_create(user_id).await?;
    Ok(Json(cart.into()))
}

/// POST /cart: add a product, merging with an existing line.
#[tracing::instrument(skip(state, req))]
pub async fn add<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id: ProductId = parse_id("product_id", &req.product_id)?;
    let quantity = state.rules.quantity(req.quantity)?;

    let cart = state.carts.add_item(user_id, product_id, quantity).await?;
    Ok(Json(cart.into()))
}

/// PUT /cart/{item_id}: replace a line's quantity.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(item_id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let item_id: CartItemId = parse_id("item_id", &item_id)?;
    let quantity = state.rules.quantity(req.quantity)?;

    let cart = state.carts.update_item(user_id, item_id, quantity).await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/{item_id}: remove one line.
#[tracing::instrument(skip(state))]
pub async fn remove<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(item_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let item_id: CartItemId = parse_id("item_id", &item_id)?;
    let cart = state.carts.remove_item(user_id, item_id).await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart: remove every line.
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.carts.clear(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
