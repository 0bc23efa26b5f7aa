use crate::models::Payment;
use shared::PaymentResponse;

/// Projects a stored payment into its external shape.
pub fn to_response(payment: &Payment) -> PaymentResponse {
    PaymentResponse {
        id: payment.id,
        order_id: payment.order_id,
        amount: payment.amount.clone(),
        currency: payment.currency.clone(),
        status: payment.status,
        card_last_four: payment.card_last_four.clone(),
        card_type: payment.card_type.clone(),
        transaction_id: payment.transaction_id.clone(),
        failure_reason: payment.failure_reason.clone(),
        created_at: payment.created_at,
        updated_at: payment.updated_at,
    }
}
