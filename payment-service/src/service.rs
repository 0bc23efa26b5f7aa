//! Payment orchestration.
//!
//! `PaymentService` is the only writer of payment state. Each call runs its
//! collaborators strictly in sequence:
//!
//! ```text
//! process: verify order -> idempotency check -> validate card -> create PROCESSING
//!          -> charge -> COMPLETED | FAILED -> notify order (best-effort)
//! refund:  load (owner-scoped) -> must be COMPLETED -> refund -> REFUNDED
//!          -> notify order (best-effort)
//! ```
//!
//! The idempotency pre-check only saves work. The store's "one COMPLETED
//! payment per order" guard is what actually holds the invariant when two
//! requests for the same order race.

use crate::clients::{CardService, OrderService};
use crate::error::PaymentError;
use crate::gateway::PaymentGateway;
use crate::mapper::to_response;
use crate::models::{NewPayment, Payment};
use crate::store::{PaymentStore, StoreError};
use crate::validation::{PaymentCommand, RefundCommand};
use chrono::{DateTime, Utc};
use shared::{OrderStatusSignal, PaymentResponse, PaymentStatus};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const TRANSACTION_ID_PREFIX: &str = "TXN-";
const TRANSACTION_ID_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    cards: Arc<dyn CardService>,
    orders: Arc<dyn OrderService>,
    gateway: Arc<dyn PaymentGateway>,
}

pub fn generate_transaction_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}{}", TRANSACTION_ID_PREFIX, suffix)
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        cards: Arc<dyn CardService>,
        orders: Arc<dyn OrderService>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            store,
            cards,
            orders,
            gateway,
        }
    }

    pub async fn process_payment(
        &self,
        user_id: &str,
        token: &str,
        command: PaymentCommand,
    ) -> Result<PaymentResponse, PaymentError> {
        let order_id = command.order_id;
        info!(user_id, order_id, "Processing payment");

        if let Err(e) = self.orders.verify(order_id, token).await {
            error!(order_id, "Order not found or order service unavailable: {}", e);
            return Err(PaymentError::OrderNotFound(order_id));
        }

        if let Some(existing) = self.store.find_by_order(order_id).await? {
            if existing.status == PaymentStatus::Completed {
                warn!(order_id, transaction_id = %existing.transaction_id, "Order already paid");
                return Err(PaymentError::PaymentAlreadyProcessed(order_id));
            }
        }

        let validation = self.cards.validate(&command.card, token).await.map_err(|e| {
            error!(order_id, "Card validation failed: {}", e);
            PaymentError::CardValidationUnavailable
        })?;
        if !validation.valid {
            let message = validation.message.unwrap_or_default();
            warn!(order_id, "Card rejected: {}", message);
            return Err(PaymentError::CardValidationFailed(message));
        }
        let (Some(card_last_four), Some(card_type)) = (
            validation.card_last_four.filter(|value| !value.trim().is_empty()),
            validation.card_type.filter(|value| !value.trim().is_empty()),
        ) else {
            error!(order_id, "Card service accepted the card without a card summary");
            return Err(PaymentError::CardValidationUnavailable);
        };

        let transaction_id = self.next_transaction_id().await?;
        let mut payment = self
            .store
            .create(NewPayment {
                user_id: user_id.to_string(),
                order_id,
                amount: command.amount,
                currency: command.currency,
                card_last_four,
                card_type,
                transaction_id,
            })
            .await?;

        if let Err(e) = self.gateway.charge(&payment).await {
            let reason = e.to_string();
            payment.fail(reason.clone());
            self.store.update(&payment).await?;
            error!(order_id, transaction_id = %payment.transaction_id, "Payment failed: {}", reason);
            return Err(PaymentError::PaymentProcessingFailed(reason));
        }

        payment.complete();
        let payment = match self.store.update(&payment).await {
            Ok(stored) => stored,
            Err(StoreError::DuplicateCompleted { .. }) => {
                return Err(self.reverse_duplicate(payment).await);
            }
            Err(e) => return Err(e.into()),
        };

        self.notify_order(order_id, OrderStatusSignal::Processing, token).await;
        info!(order_id, transaction_id = %payment.transaction_id, "Payment completed");

        Ok(to_response(&payment))
    }

    pub async fn get_payment_by_id(&self, payment_id: i64, user_id: &str) -> Result<PaymentResponse, PaymentError> {
        self.store
            .find_by_id_and_user(payment_id, user_id)
            .await?
            .map(|payment| to_response(&payment))
            .ok_or(PaymentError::PaymentNotFound(payment_id))
    }

    pub async fn get_user_payments(&self, user_id: &str) -> Result<Vec<PaymentResponse>, PaymentError> {
        Ok(self
            .store
            .find_by_user(user_id)
            .await?
            .iter()
            .map(to_response)
            .collect())
    }

    pub async fn get_payment_by_order_id(&self, order_id: i64, user_id: &str) -> Result<PaymentResponse, PaymentError> {
        self.store
            .find_by_order_and_user(order_id, user_id)
            .await?
            .map(|payment| to_response(&payment))
            .ok_or(PaymentError::PaymentNotFoundForOrder(order_id))
    }

    pub async fn get_payment_by_transaction_id(
        &self,
        transaction_id: &str,
        user_id: &str,
    ) -> Result<PaymentResponse, PaymentError> {
        self.store
            .find_by_transaction_id(transaction_id)
            .await?
            .filter(|payment| payment.user_id == user_id)
            .map(|payment| to_response(&payment))
            .ok_or_else(|| PaymentError::PaymentNotFoundForTransaction(transaction_id.to_string()))
    }

    /// Refunds a completed payment in full.
    ///
    /// A failed refund leaves the payment COMPLETED and may be retried: the
    /// gateway keys refunds by transaction id.
    pub async fn refund_payment(
        &self,
        user_id: &str,
        token: &str,
        command: RefundCommand,
    ) -> Result<PaymentResponse, PaymentError> {
        info!(user_id, payment_id = command.payment_id, "Processing refund");

        let mut payment = self
            .store
            .find_by_id_and_user(command.payment_id, user_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound(command.payment_id))?;

        if payment.status != PaymentStatus::Completed {
            return Err(PaymentError::InvalidRefundState(payment.status));
        }

        if let Some(requested) = command.amount {
            if requested != payment.amount {
                return Err(PaymentError::PartialRefundUnsupported {
                    requested,
                    captured: payment.amount,
                });
            }
        }

        self.gateway
            .refund(&payment, command.reason.as_deref())
            .await
            .map_err(|e| {
                error!(transaction_id = %payment.transaction_id, "Refund failed: {}", e);
                PaymentError::RefundProcessingFailed(e.to_string())
            })?;

        payment.refund();
        let payment = match self.store.update(&payment).await {
            Ok(stored) => stored,
            Err(StoreError::StaleTransition { .. }) => {
                let current = self
                    .store
                    .find_by_id_and_user(payment.id, user_id)
                    .await?
                    .map(|current| current.status)
                    .unwrap_or(PaymentStatus::Refunded);
                return Err(PaymentError::InvalidRefundState(current));
            }
            Err(e) => return Err(e.into()),
        };

        self.notify_order(payment.order_id, OrderStatusSignal::Cancelled, token).await;
        info!(transaction_id = %payment.transaction_id, "Refund completed");

        Ok(to_response(&payment))
    }

    /// PROCESSING payments created before `older_than`.
    pub async fn stale_processing(&self, older_than: DateTime<Utc>) -> Result<Vec<Payment>, PaymentError> {
        Ok(self
            .store
            .find_by_status(PaymentStatus::Processing)
            .await?
            .into_iter()
            .filter(|payment| payment.created_at < older_than)
            .collect())
    }

    async fn next_transaction_id(&self) -> Result<String, PaymentError> {
        for _ in 0..TRANSACTION_ID_ATTEMPTS {
            let candidate = generate_transaction_id();
            if self.store.find_by_transaction_id(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            warn!(transaction_id = %candidate, "Transaction id collision, regenerating");
        }
        Err(StoreError::DuplicateTransactionId(TRANSACTION_ID_PREFIX.to_string()).into())
    }

    /// Another request completed this order first. Record this attempt as
    /// FAILED and give the funds back.
    async fn reverse_duplicate(&self, mut payment: Payment) -> PaymentError {
        let order_id = payment.order_id;
        warn!(order_id, transaction_id = %payment.transaction_id, "Concurrent payment completed the order first");

        if let Err(e) = self.gateway.refund(&payment, Some("duplicate payment for order")).await {
            error!(transaction_id = %payment.transaction_id, "Could not reverse duplicate charge: {}", e);
        }

        payment.fail("Payment already completed for this order");
        if let Err(e) = self.store.update(&payment).await {
            error!(transaction_id = %payment.transaction_id, "Could not record duplicate payment as failed: {}", e);
        }

        PaymentError::PaymentAlreadyProcessed(order_id)
    }

    async fn notify_order(&self, order_id: i64, status: OrderStatusSignal, token: &str) {
        if let Err(e) = self.orders.update_status(order_id, status, token).await {
            warn!(order_id, %status, "Order status update failed: {}", e);
        }
    }
}
