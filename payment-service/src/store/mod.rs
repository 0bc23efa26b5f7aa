mod memory;
mod postgres;

pub use memory::InMemoryPaymentStore;
pub use postgres::{DbPool, PgPaymentStore};

use crate::models::{NewPayment, Payment};
use async_trait::async_trait;
use shared::PaymentStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("order {order_id} already has a completed payment")]
    DuplicateCompleted { order_id: i64 },
    #[error("transaction id {0} is already in use")]
    DuplicateTransactionId(String),
    #[error("payment {id} cannot move to {to}: stored status is no longer a predecessor")]
    StaleTransition { id: i64, to: PaymentStatus },
    #[error("payment {0} does not exist")]
    Missing(i64),
    #[error("corrupt payment record: {0}")]
    Corrupt(String),
}

/// Persistence boundary for payments.
///
/// Absence is reported as `None`/empty, never as an error. `update` only
/// persists `status` and `failure_reason`, and only when the stored status is a
/// legal predecessor of the new one.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create(&self, payment: NewPayment) -> Result<Payment, StoreError>;

    async fn update(&self, payment: &Payment) -> Result<Payment, StoreError>;

    /// Returns `None` both when the id is unknown and when it belongs to another user.
    async fn find_by_id_and_user(&self, id: i64, user_id: &str) -> Result<Option<Payment>, StoreError>;

    /// The order's COMPLETED payment if it has one, otherwise its most recent payment.
    async fn find_by_order(&self, order_id: i64) -> Result<Option<Payment>, StoreError>;

    /// Same preference as `find_by_order`, among `user_id`'s payments only.
    async fn find_by_order_and_user(&self, order_id: i64, user_id: &str) -> Result<Option<Payment>, StoreError>;

    /// Most recent first.
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Payment>, StoreError>;

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, StoreError>;

    async fn find_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>, StoreError>;
}
