//! Payment attempts and their effect on order payment status.

use common::{OrderId, TransactionId};
use domain::{PaymentTransaction, TransactionStatus};
use store::{EntityKind, OrderRepository, PaymentRepository, Store, UnitOfWork};

use crate::error::{FulfillmentError, Result};
use crate::gateway::PaymentGateway;

/// Creates and settles payment transactions.
///
/// Settling a transaction and updating the parent order's payment status
/// always commit together.
pub struct PaymentService<S: Store, G: PaymentGateway> {
    store: S,
    gateway: G,
}

impl<S: Store, G: PaymentGateway> PaymentService<S, G> {
    /// Creates a new payment service.
    pub fn new(store: S, gateway: G) -> Self {
        Self { store, gateway }
    }

    /// Opens a pending attempt for the order's stored total.
    #[tracing::instrument(skip(self, payment_data))]
    pub async fn create(
        &self,
        order_id: OrderId,
        payment_method: String,
        payment_data: Option<String>,
    ) -> Result<PaymentTransaction> {
        if payment_method.trim().is_empty() {
            return Err(FulfillmentError::Validation(
                "payment_method is required".to_string(),
            ));
        }

        let mut unit = self.store.begin().await?;
        let order = unit
            .find_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(EntityKind::Order, order_id))?;

        let transaction = PaymentTransaction::for_order(&order, payment_method, payment_data);
        unit.insert_transaction(&transaction).await?;
        unit.commit().await?;

        metrics::counter!("payments_created_total").increment(1);
        tracing::info!(
            transaction_id = %transaction.id,
            reference = %transaction.reference,
            amount = %transaction.amount,
            "payment created"
        );

        Ok(transaction)
    }

    /// Loads a transaction.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, transaction_id: TransactionId) -> Result<PaymentTransaction> {
        let mut unit = self.store.begin().await?;
        let transaction = unit
            .find_transaction(transaction_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(EntityKind::Transaction, transaction_id))?;
        unit.rollback().await?;
        Ok(transaction)
    }

    /// Verifies a pending attempt through the gateway. A matching reference
    /// completes it and marks the order paid; anything else fails both.
    #[tracing::instrument(skip(self, payment_data))]
    pub async fn verify(
        &self,
        transaction_id: TransactionId,
        submitted_reference: &str,
        payment_data: Option<&str>,
    ) -> Result<PaymentTransaction> {
        let mut unit = self.store.begin().await?;
        let transaction = Self::locked_pending(&mut unit, transaction_id).await?;

        let outcome = self
            .gateway
            .verify(&transaction, submitted_reference, payment_data)
            .await?;

        Self::settle(unit, transaction, outcome).await
    }

    /// Cancels a pending attempt and marks the order's payment cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, transaction_id: TransactionId) -> Result<PaymentTransaction> {
        let mut unit = self.store.begin().await?;
        let transaction = Self::locked_pending(&mut unit, transaction_id).await?;
        Self::settle(unit, transaction, TransactionStatus::Cancelled).await
    }

    async fn locked_pending(
        unit: &mut S::Unit,
        transaction_id: TransactionId,
    ) -> Result<PaymentTransaction> {
        let transaction = unit
            .lock_transaction(transaction_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(EntityKind::Transaction, transaction_id))?;

        if transaction.status.is_terminal() {
            return Err(domain::DomainError::InvalidTransactionState {
                current: transaction.status,
                action: "settle",
            }
            .into());
        }
        Ok(transaction)
    }

    async fn settle(
        mut unit: S::Unit,
        mut transaction: PaymentTransaction,
        outcome: TransactionStatus,
    ) -> Result<PaymentTransaction> {
        let payment_status = transaction.settle(outcome)?;
        unit.update_transaction_status(transaction.id, outcome)
            .await?;

        let attempts = unit.transactions_for_order(transaction.order_id).await?;
        if let Some(latest) = attempts.last().filter(|latest| latest.id != transaction.id) {
            tracing::warn!(
                transaction_id = %transaction.id,
                latest_transaction_id = %latest.id,
                "settling a superseded payment attempt; order payment status follows it"
            );
        }

        let updated = unit
            .update_payment_status(transaction.order_id, payment_status)
            .await?;
        if !updated {
            return Err(FulfillmentError::not_found(
                EntityKind::Order,
                transaction.order_id,
            ));
        }
        unit.commit().await?;

        metrics::counter!("payments_settled_total", "status" => outcome.as_str()).increment(1);
        tracing::info!(
            transaction_id = %transaction.id,
            order_id = %transaction.order_id,
            status = %outcome,
            %payment_status,
            "payment settled"
        );

        Ok(transaction)
    }
}
