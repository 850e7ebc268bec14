//! Fulfillment error types.

use domain::DomainError;
use store::{EntityKind, StoreError};
use thiserror::Error;

/// Broad classification of a failure, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input that never reached storage.
    Validation,
    /// A business rule rejected the request; nothing was changed.
    BusinessRule,
    /// A referenced entity does not exist.
    NotFound,
    /// Storage or another collaborator failed.
    Infrastructure,
}

/// Errors that can occur during fulfillment operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Input rejected before any storage access.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A business rule violation.
    #[error(transparent)]
    Rule(#[from] DomainError),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    /// The payment gateway could not be reached or answered badly.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl FulfillmentError {
    pub fn not_found(entity: EntityKind, id: impl std::fmt::Display) -> Self {
        FulfillmentError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillmentError::Validation(_) => ErrorKind::Validation,
            FulfillmentError::Rule(_) => ErrorKind::BusinessRule,
            FulfillmentError::NotFound { .. } => ErrorKind::NotFound,
            FulfillmentError::Gateway(_) | FulfillmentError::Store(_) => {
                ErrorKind::Infrastructure
            }
        }
    }

    /// Short machine-readable label, used as a metrics tag.
    pub fn reason(&self) -> &'static str {
        match self {
            FulfillmentError::Validation(_) => "validation",
            FulfillmentError::Rule(DomainError::EmptyCart) => "empty_cart",
            FulfillmentError::Rule(DomainError::InsufficientStock { .. }) => {
                "insufficient_stock"
            }
            FulfillmentError::Rule(DomainError::InvalidQuantity { .. }) => "invalid_quantity",
            FulfillmentError::Rule(DomainError::InvalidOrderState { .. }) => "invalid_order_state",
            FulfillmentError::Rule(DomainError::InvalidTransactionState { .. }) => {
                "invalid_transaction_state"
            }
            FulfillmentError::NotFound { .. } => "not_found",
            FulfillmentError::Gateway(_) => "gateway",
            FulfillmentError::Store(_) => "storage",
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => FulfillmentError::NotFound { entity, id },
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => FulfillmentError::Rule(DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            }),
            other => FulfillmentError::Store(other),
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
