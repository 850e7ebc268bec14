//! Payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, TransactionId, UserId};
use domain::{PaymentTransaction, TransactionStatus};
use serde::{Deserialize, Serialize};
use store::Store;

use super::{AppState, owned_order, parse_id};
use crate::error::ApiError;
use crate::identity::CurrentUser;

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub payment_method: String,
    pub payment_data: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    /// The external reference issued when the payment was created.
    pub transaction_id: String,
    pub payment_data: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct TransactionResponse {
    pub id: String,
    pub order_id: String,
    pub amount_cents: i64,
    pub payment_method: String,
    pub status: TransactionStatus,
    pub transaction_id: String,
    pub payment_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentTransaction> for TransactionResponse {
    fn from(transaction: PaymentTransaction) -> Self {
        Self {
            id: transaction.id.to_string(),
            order_id: transaction.order_id.to_string(),
            amount_cents: transaction.amount.cents(),
            payment_method: transaction.payment_method,
            status: transaction.status,
            transaction_id: transaction.reference,
            payment_data: transaction.payment_data,
            created_at: transaction.created_at,
            updated_at: transaction.updated_at,
        }
    }
}

// -- Handlers --

/// POST /payments: open a payment attempt for one of the caller's orders.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let order_id: OrderId = parse_id("order_id", &req.order_id)?;
    let payment_method = state.rules.required("payment_method", &req.payment_method)?;
    owned_order(&state, user_id, order_id).await?;

    let transaction = state
        .payments
        .create(order_id, payment_method, req.payment_data)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction.into())))
}

/// GET /payments/{id}: one of the caller's payment attempts.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let transaction = owned_transaction(&state, user_id, &id).await?;
    Ok(Json(transaction.into()))
}

/// POST /payments/{id}/verify: settle an attempt by checking its reference.
#[tracing::instrument(skip(state, req))]
pub async fn verify<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let submitted = state.rules.required("transaction_id", &req.transaction_id)?;
    let transaction = owned_transaction(&state, user_id, &id).await?;

    let settled = state
        .payments
        .verify(transaction.id, &submitted, req.payment_data.as_deref())
        .await?;
    Ok(Json(settled.into()))
}

/// PUT /payments/{id}/cancel: cancel a pending attempt.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let transaction = owned_transaction(&state, user_id, &id).await?;
    let settled = state.payments.cancel(transaction.id).await?;
    Ok(Json(settled.into()))
}

async fn owned_transaction<S: Store>(
    state: &AppState<S>,
    user_id: UserId,
    raw_id: &str,
) -> Result<PaymentTransaction, ApiError> {
    let transaction_id: TransactionId = parse_id("payment id", raw_id)?;
    let transaction = state.payments.get(transaction_id).await?;
    match owned_order(state, user_id, transaction.order_id).await {
        Ok(_) => Ok(transaction),
        Err(ApiError::NotFound(_)) => Err(ApiError::NotFound(format!(
            "Transaction not found: {transaction_id}"
        ))),
        Err(e) => Err(e),
    }
}
