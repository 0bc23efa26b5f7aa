//! Request validation. Incoming bodies become commands only when every field
//! constraint holds; otherwise the caller gets a field → message map.

use crate::error::PaymentError;
use bigdecimal::BigDecimal;
use shared::{CardDetails, PaymentRequest, RefundRequest};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct PaymentCommand {
    pub order_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub card: CardDetails,
}

#[derive(Debug, Clone)]
pub struct RefundCommand {
    pub payment_id: i64,
    pub amount: Option<BigDecimal>,
    pub reason: Option<String>,
}

#[derive(Default)]
struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    fn add(&mut self, field: &str, message: &str) {
        self.0.entry(field.to_string()).or_insert_with(|| message.to_string());
    }

    fn not_blank(&mut self, field: &str, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.add(field, message);
        }
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, PaymentError> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(PaymentError::Validation(self.0))
        }
    }
}

fn below_minimum(amount: &BigDecimal) -> bool {
    *amount < BigDecimal::new(1.into(), 2)
}

/// Amounts are stored as NUMERIC(19, 2); anything finer would be rounded on insert.
fn too_precise(amount: &BigDecimal) -> bool {
    let (_, scale) = amount.normalized().as_bigint_and_exponent();
    scale > 2
}

impl TryFrom<PaymentRequest> for PaymentCommand {
    type Error = PaymentError;

    fn try_from(request: PaymentRequest) -> Result<Self, Self::Error> {
        let mut errors = FieldErrors::default();

        if request.order_id.is_none() {
            errors.add("orderId", "Order ID is required");
        }
        match &request.amount {
            None => errors.add("amount", "Amount is required"),
            Some(amount) if below_minimum(amount) => {
                errors.add("amount", "Amount must be greater than 0")
            }
            Some(amount) if too_precise(amount) => {
                errors.add("amount", "Amount must have at most 2 decimal places")
            }
            Some(_) => {}
        }
        errors.not_blank("currency", &request.currency, "Currency is required");
        match &request.card_details {
            None => errors.add("cardDetails", "Card details are required"),
            Some(card) => {
                errors.not_blank("cardDetails.cardNumber", &card.card_number, "Card number is required");
                errors.not_blank(
                    "cardDetails.cardHolderName",
                    &card.card_holder_name,
                    "Card holder name is required",
                );
                errors.not_blank("cardDetails.expiryMonth", &card.expiry_month, "Expiry month is required");
                errors.not_blank("cardDetails.expiryYear", &card.expiry_year, "Expiry year is required");
                errors.not_blank("cardDetails.cvv", &card.cvv, "CVV is required");
            }
        }

        let PaymentRequest {
            order_id,
            amount,
            currency,
            card_details,
        } = request;
        errors.finish(|| PaymentCommand {
            order_id: order_id.unwrap_or_default(),
            amount: amount.unwrap_or_default(),
            currency: currency.trim().to_string(),
            card: card_details.unwrap_or_default(),
        })
    }
}

impl TryFrom<RefundRequest> for RefundCommand {
    type Error = PaymentError;

    fn try_from(request: RefundRequest) -> Result<Self, Self::Error> {
        let mut errors = FieldErrors::default();

        if request.payment_id.is_none() {
            errors.add("paymentId", "Payment ID is required");
        }
        match &request.amount {
            Some(amount) if below_minimum(amount) => {
                errors.add("amount", "Refund amount must be greater than 0")
            }
            Some(amount) if too_precise(amount) => {
                errors.add("amount", "Refund amount must have at most 2 decimal places")
            }
            _ => {}
        }

        let RefundRequest {
            payment_id,
            amount,
            reason,
        } = request;
        errors.finish(|| RefundCommand {
            payment_id: payment_id.unwrap_or_default(),
            amount,
            reason: reason.filter(|reason| !reason.trim().is_empty()),
        })
    }
}
