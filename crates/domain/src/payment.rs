//! Payment transactions and their status machine.
//!
//! ```text
//! Pending ──┬──► Completed   (order payment_status = paid)
//!           ├──► Failed      (order payment_status = failed)
//!           └──► Cancelled   (order payment_status = cancelled)
//! ```
//!
//! All three outcomes are terminal.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, TransactionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, ParseStatusError};
use crate::order::{Order, PaymentStatus};

/// Status of a single payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// The order payment status this transaction status implies.
    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            TransactionStatus::Pending => PaymentStatus::Pending,
            TransactionStatus::Completed => PaymentStatus::Paid,
            TransactionStatus::Failed => PaymentStatus::Failed,
            TransactionStatus::Cancelled => PaymentStatus::Cancelled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(ParseStatusError {
                kind: "transaction",
                value: other.to_string(),
            }),
        }
    }
}

/// One payment attempt against an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: TransactionId,
    pub order_id: OrderId,
    /// Copied from the order total when the attempt was created.
    pub amount: Money,
    pub payment_method: String,
    pub status: TransactionStatus,
    /// External-facing reference the payer must echo back to verify.
    pub reference: String,
    pub payment_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    /// Opens a pending attempt for the order's current total.
    pub fn for_order(
        order: &Order,
        payment_method: impl Into<String>,
        payment_data: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            order_id: order.id,
            amount: order.total_price,
            payment_method: payment_method.into(),
            status: TransactionStatus::Pending,
            reference: Self::generate_reference(now),
            payment_data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds a reference of the form `TXN_<unix-seconds>_<8 hex chars>`.
    pub fn generate_reference(at: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("TXN_{}_{}", at.timestamp(), &suffix[..8])
    }

    /// Moves a pending attempt to `outcome` and returns the payment status
    /// the parent order must take.
    pub fn settle(&mut self, outcome: TransactionStatus) -> Result<PaymentStatus, DomainError> {
        if self.status.is_terminal() || !outcome.is_terminal() {
            return Err(DomainError::InvalidTransactionState {
                current: self.status,
                action: "settle",
            });
        }
        self.status = outcome;
        self.updated_at = Utc::now();
        Ok(outcome.payment_status())
    }
}
