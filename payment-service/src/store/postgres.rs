use super::{PaymentStore, StoreError};
use crate::models::{NewPayment, NewPaymentRow, Payment, PaymentRow};
use crate::schema::payments;
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shared::PaymentStatus;

pub type DbPool = Pool<AsyncPgConnection>;

type PooledConnection<'a> = bb8::PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Postgres-backed store. The partial unique index on
/// `payments(order_id) WHERE status = 'COMPLETED'` is what enforces one
/// completed payment per order; a violation surfaces as `DuplicateCompleted`.
#[derive(Clone)]
pub struct PgPaymentStore {
    pool: DbPool,
}

impl PgPaymentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<PooledConnection<'_>, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }

    /// The order's COMPLETED payment, else its most recent one.
    async fn preferred_for_order(&self, order_id: i64, user_id: Option<&str>) -> Result<Option<Payment>, StoreError> {
        let mut conn = self.conn().await?;

        let completed = for_order(order_id, user_id)
            .filter(payments::status.eq(PaymentStatus::Completed.as_str()))
            .select(PaymentRow::as_select())
            .first::<PaymentRow>(&mut conn)
            .await
            .optional()?;
        if let Some(row) = completed {
            return into_payment(row).map(Some);
        }

        for_order(order_id, user_id)
            .order((payments::created_at.desc(), payments::id.desc()))
            .select(PaymentRow::as_select())
            .first::<PaymentRow>(&mut conn)
            .await
            .optional()?
            .map(into_payment)
            .transpose()
    }
}

fn into_payment(row: PaymentRow) -> Result<Payment, StoreError> {
    Payment::try_from(row).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn into_payments(rows: Vec<PaymentRow>) -> Result<Vec<Payment>, StoreError> {
    rows.into_iter().map(into_payment).collect()
}

fn for_order(order_id: i64, user_id: Option<&str>) -> payments::BoxedQuery<'_, Pg> {
    let mut query = payments::table.filter(payments::order_id.eq(order_id)).into_boxed();
    if let Some(user_id) = user_id {
        query = query.filter(payments::user_id.eq(user_id));
    }
    query
}

fn is_unique_violation(error: &DieselError) -> bool {
    matches!(error, DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn create(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut conn = self.conn().await?;
        let transaction_id = payment.transaction_id.clone();

        let row = diesel::insert_into(payments::table)
            .values(&NewPaymentRow::new(payment, Utc::now()))
            .returning(PaymentRow::as_returning())
            .get_result::<PaymentRow>(&mut conn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateTransactionId(transaction_id)
                } else {
                    StoreError::Database(e)
                }
            })?;

        into_payment(row)
    }

    async fn update(&self, payment: &Payment) -> Result<Payment, StoreError> {
        let mut conn = self.conn().await?;
        let predecessors: Vec<String> = payment
            .status
            .predecessors()
            .iter()
            .map(|status| status.to_string())
            .collect();

        let updated = diesel::update(
            payments::table
                .filter(payments::id.eq(payment.id))
                .filter(payments::status.eq_any(predecessors)),
        )
        .set((
            payments::status.eq(payment.status.to_string()),
            payments::failure_reason.eq(payment.failure_reason.clone()),
            payments::updated_at.eq(Utc::now()),
        ))
        .returning(PaymentRow::as_returning())
        .get_result::<PaymentRow>(&mut conn)
        .await
        .optional();

        match updated {
            Ok(Some(row)) => into_payment(row),
            Ok(None) => {
                let exists = payments::table
                    .filter(payments::id.eq(payment.id))
                    .select(payments::id)
                    .first::<i64>(&mut conn)
                    .await
                    .optional()?
                    .is_some();
                if exists {
                    Err(StoreError::StaleTransition {
                        id: payment.id,
                        to: payment.status,
                    })
                } else {
                    Err(StoreError::Missing(payment.id))
                }
            }
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateCompleted {
                order_id: payment.order_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id_and_user(&self, id: i64, user_id: &str) -> Result<Option<Payment>, StoreError> {
        let mut conn = self.conn().await?;
        payments::table
            .filter(payments::id.eq(id))
            .filter(payments::user_id.eq(user_id))
            .select(PaymentRow::as_select())
            .first::<PaymentRow>(&mut conn)
            .await
            .optional()?
            .map(into_payment)
            .transpose()
    }

    async fn find_by_order(&self, order_id: i64) -> Result<Option<Payment>, StoreError> {
        self.preferred_for_order(order_id, None).await
    }

    async fn find_by_order_and_user(&self, order_id: i64, user_id: &str) -> Result<Option<Payment>, StoreError> {
        self.preferred_for_order(order_id, Some(user_id)).await
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Payment>, StoreError> {
        let mut conn = self.conn().await?;
        let rows = payments::table
            .filter(payments::user_id.eq(user_id))
            .order((payments::created_at.desc(), payments::id.desc()))
            .select(PaymentRow::as_select())
            .load::<PaymentRow>(&mut conn)
            .await?;
        into_payments(rows)
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, StoreError> {
        let mut conn = self.conn().await?;
        payments::table
            .filter(payments::transaction_id.eq(transaction_id))
            .select(PaymentRow::as_select())
            .first::<PaymentRow>(&mut conn)
            .await
            .optional()?
            .map(into_payment)
            .transpose()
    }

    async fn find_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>, StoreError> {
        let mut conn = self.conn().await?;
        let rows = payments::table
            .filter(payments::status.eq(status.as_str()))
            .order(payments::created_at.asc())
            .select(PaymentRow::as_select())
            .load::<PaymentRow>(&mut conn)
            .await?;
        into_payments(rows)
    }
}
