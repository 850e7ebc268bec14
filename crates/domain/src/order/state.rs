//! Order status axes.
//!
//! An order carries three independent statuses. Only `OrderStatus` gates
//! the fulfillment core; `PaymentStatus` is driven by payment transactions
//! and `ShippingStatus` is a plain field maintained by administrators.
//!
//! ```text
//! OrderStatus:   Pending ──► Processing ──► Shipped ──► Delivered
//!                   │
//!                   └──► Cancelled   (only from Pending, restores stock)
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseStatusError;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, stock reserved, nothing shipped yet.
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    /// Cancelled with its stock released (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Payment status of an order, derived from its transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

/// Shipping status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShippingStatus {
    #[default]
    Pending,
    Shipped,
    Delivered,
}

impl ShippingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingStatus::Pending => "pending",
            ShippingStatus::Shipped => "shipped",
            ShippingStatus::Delivered => "delivered",
        }
    }
}

macro_rules! status_text {
    ($ty:ty, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s == <$ty>::$variant.as_str() {
                        return Ok(<$ty>::$variant);
                    }
                )+
                Err(ParseStatusError {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }
    };
}

status_text!(OrderStatus, "order", [Pending, Processing, Shipped, Delivered, Cancelled]);
status_text!(PaymentStatus, "payment", [Pending, Paid, Failed, Cancelled]);
status_text!(ShippingStatus, "shipping", [Pending, Shipped, Delivered]);
