use crate::store::StoreError;
use axum::http::StatusCode;
use bigdecimal::BigDecimal;
use shared::PaymentStatus;
use std::collections::BTreeMap;
use thiserror::Error;

/// Every failure that can leave the orchestrator or the HTTP layer.
/// Collaborator errors never cross this boundary unwrapped.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Order not found: {0}")]
    OrderNotFound(i64),
    #[error("Payment not found with id: {0}")]
    PaymentNotFound(i64),
    #[error("Payment not found for order: {0}")]
    PaymentNotFoundForOrder(i64),
    #[error("Payment not found for transaction: {0}")]
    PaymentNotFoundForTransaction(String),
    #[error("Payment already completed for order: {0}")]
    PaymentAlreadyProcessed(i64),
    #[error("Card validation service unavailable")]
    CardValidationUnavailable,
    #[error("Card validation failed: {0}")]
    CardValidationFailed(String),
    #[error("Payment processing failed: {0}")]
    PaymentProcessingFailed(String),
    #[error("Can only refund completed payments. Current status: {0}")]
    InvalidRefundState(PaymentStatus),
    #[error("Partial refunds are not supported: requested {requested}, captured {captured}")]
    PartialRefundUnsupported {
        requested: BigDecimal,
        captured: BigDecimal,
    },
    #[error("Refund processing failed: {0}")]
    RefundProcessingFailed(String),
    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("No route for {0}")]
    RouteNotFound(String),
    #[error("Request timed out")]
    RequestTimeout,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::OrderNotFound(_)
            | PaymentError::PaymentNotFound(_)
            | PaymentError::PaymentNotFoundForOrder(_)
            | PaymentError::PaymentNotFoundForTransaction(_)
            | PaymentError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::CardValidationFailed(_)
            | PaymentError::PartialRefundUnsupported { .. }
            | PaymentError::Validation(_)
            | PaymentError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            PaymentError::PaymentAlreadyProcessed(_) | PaymentError::InvalidRefundState(_) => {
                StatusCode::CONFLICT
            }
            PaymentError::CardValidationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::PaymentProcessingFailed(_) | PaymentError::RefundProcessingFailed(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PaymentError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            PaymentError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            PaymentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to API callers. Internal failures are not described.
    pub fn public_message(&self) -> String {
        match self {
            PaymentError::Store(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        }
    }
}
