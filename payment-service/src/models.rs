use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use shared::PaymentStatus;

/// A payment as held by the record store.
///
/// Only `status`, `failure_reason` and `updated_at` change after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: i64,
    pub user_id: String,
    pub order_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub card_last_four: String,
    pub card_type: String,
    pub transaction_id: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn complete(&mut self) {
        self.status = PaymentStatus::Completed;
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason.into());
    }

    pub fn refund(&mut self) {
        self.status = PaymentStatus::Refunded;
    }
}

/// Everything the orchestrator knows before a payment is stored.
/// The store assigns the id, the initial PROCESSING status and both timestamps.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: String,
    pub order_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub card_last_four: String,
    pub card_type: String,
    pub transaction_id: String,
}

impl NewPayment {
    pub fn into_payment(self, id: i64, now: DateTime<Utc>) -> Payment {
        Payment {
            id,
            user_id: self.user_id,
            order_id: self.order_id,
            amount: self.amount,
            currency: self.currency,
            status: PaymentStatus::Processing,
            card_last_four: self.card_last_four,
            card_type: self.card_type,
            transaction_id: self.transaction_id,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentRow {
    pub id: i64,
    pub user_id: String,
    pub order_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub card_last_four: String,
    pub card_type: String,
    pub transaction_id: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::payments)]
pub struct NewPaymentRow {
    pub user_id: String,
    pub order_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub card_last_four: String,
    pub card_type: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewPaymentRow {
    pub fn new(payment: NewPayment, now: DateTime<Utc>) -> Self {
        Self {
            user_id: payment.user_id,
            order_id: payment.order_id,
            amount: payment.amount,
            currency: payment.currency,
            status: PaymentStatus::Processing.to_string(),
            card_last_four: payment.card_last_four,
            card_type: payment.card_type,
            transaction_id: payment.transaction_id,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TryFrom<PaymentRow> for Payment {
    type Error = shared::UnknownPaymentStatus;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            order_id: row.order_id,
            amount: row.amount,
            currency: row.currency,
            status: row.status.parse()?,
            card_last_four: row.card_last_four,
            card_type: row.card_type,
            transaction_id: row.transaction_id,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> PaymentRow {
        let now = Utc::now();
        PaymentRow {
            id: 7,
            user_id: "alice".to_string(),
            order_id: 100,
            amount: BigDecimal::from(50),
            currency: "USD".to_string(),
            status: status.to_string(),
            card_last_four: "4242".to_string(),
            card_type: "VISA".to_string(),
            transaction_id: "TXN-0A1B2C3D".to_string(),
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_converts_to_payment() {
        let payment = Payment::try_from(row("COMPLETED")).unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.transaction_id, "TXN-0A1B2C3D");
    }

    #[test]
    fn row_with_unknown_status_is_rejected() {
        assert!(Payment::try_from(row("SETTLED")).is_err());
    }

    #[test]
    fn fail_records_reason() {
        let mut payment = Payment::try_from(row("PROCESSING")).unwrap();
        payment.fail("gateway declined");
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.failure_reason.as_deref(), Some("gateway declined"));
    }
}
