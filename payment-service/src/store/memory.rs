use super::{PaymentStore, StoreError};
use crate::models::{NewPayment, Payment};
use async_trait::async_trait;
use chrono::Utc;
use shared::PaymentStatus;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    payments: BTreeMap<i64, Payment>,
    next_id: i64,
}

/// A thread-safe in-memory payment store.
///
/// Every write happens under one lock, so the uniqueness guards that Postgres
/// enforces with indexes hold here as well.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.payments.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn newest_first(payments: &mut [Payment]) {
    payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// The order's COMPLETED payment, else its most recent one.
fn preferred_for_order(inner: &Inner, order_id: i64, user_id: Option<&str>) -> Option<Payment> {
    let mut matching: Vec<Payment> = inner
        .payments
        .values()
        .filter(|payment| payment.order_id == order_id)
        .filter(|payment| user_id.map_or(true, |user_id| payment.user_id == user_id))
        .cloned()
        .collect();
    newest_first(&mut matching);

    match matching
        .iter()
        .position(|payment| payment.status == PaymentStatus::Completed)
    {
        Some(index) => Some(matching.swap_remove(index)),
        None => matching.into_iter().next(),
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .payments
            .values()
            .any(|existing| existing.transaction_id == payment.transaction_id)
        {
            return Err(StoreError::DuplicateTransactionId(payment.transaction_id));
        }

        inner.next_id += 1;
        let stored = payment.into_payment(inner.next_id, Utc::now());
        inner.payments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, payment: &Payment) -> Result<Payment, StoreError> {
        let mut inner = self.inner.write().await;

        let current = inner
            .payments
            .get(&payment.id)
            .ok_or(StoreError::Missing(payment.id))?;
        if !current.status.can_transition_to(payment.status) {
            return Err(StoreError::StaleTransition {
                id: payment.id,
                to: payment.status,
            });
        }

        if payment.status == PaymentStatus::Completed
            && inner.payments.values().any(|other| {
                other.id != payment.id
                    && other.order_id == current.order_id
                    && other.status == PaymentStatus::Completed
            })
        {
            return Err(StoreError::DuplicateCompleted {
                order_id: current.order_id,
            });
        }

        let stored = inner
            .payments
            .get_mut(&payment.id)
            .ok_or(StoreError::Missing(payment.id))?;
        stored.status = payment.status;
        stored.failure_reason = payment.failure_reason.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn find_by_id_and_user(&self, id: i64, user_id: &str) -> Result<Option<Payment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .get(&id)
            .filter(|payment| payment.user_id == user_id)
            .cloned())
    }

    async fn find_by_order(&self, order_id: i64) -> Result<Option<Payment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(preferred_for_order(&inner, order_id, None))
    }

    async fn find_by_order_and_user(&self, order_id: i64, user_id: &str) -> Result<Option<Payment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(preferred_for_order(&inner, order_id, Some(user_id)))
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Payment>, StoreError> {
        let inner = self.inner.read().await;
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|payment| payment.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut payments);
        Ok(payments)
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .find(|payment| payment.transaction_id == transaction_id)
            .cloned())
    }

    async fn find_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>, StoreError> {
        let inner = self.inner.read().await;
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|payment| payment.status == status)
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(payments)
    }
}
