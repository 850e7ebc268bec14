//! Payment gateway port and the stub verifier.

use async_trait::async_trait;
use domain::{PaymentTransaction, TransactionStatus};

use crate::error::FulfillmentError;

/// Confirms payment attempts with an external provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Decides the terminal status of a pending attempt given what the
    /// client submitted. Must return `Completed` or `Failed`.
    async fn verify(
        &self,
        transaction: &PaymentTransaction,
        submitted_reference: &str,
        payment_data: Option<&str>,
    ) -> Result<TransactionStatus, FulfillmentError>;
}

/// Gateway that accepts a payment when the submitted reference equals the
/// one issued at creation. No provider is contacted.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubGateway;

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn verify(
        &self,
        transaction: &PaymentTransaction,
        submitted_reference: &str,
        _payment_data: Option<&str>,
    ) -> Result<TransactionStatus, FulfillmentError> {
        if transaction.reference == submitted_reference {
            Ok(TransactionStatus::Completed)
        } else {
            Ok(TransactionStatus::Failed)
        }
    }
}
