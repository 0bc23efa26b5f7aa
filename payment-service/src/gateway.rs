//! Settlement: the step that actually moves funds.
//!
//! The orchestrator only sees the [`PaymentGateway`] trait. Both operations are
//! keyed by the payment's transaction id, so a gateway must treat a repeated
//! call for the same transaction as the same operation. That is what makes a
//! refund safe to reissue after a failed attempt.

use crate::models::Payment;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment declined by gateway: {0}")]
    Declined(String),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, payment: &Payment) -> Result<(), GatewayError>;

    async fn refund(&self, payment: &Payment, reason: Option<&str>) -> Result<(), GatewayError>;
}

/// Stands in for a real gateway: waits for `latency` and succeeds with
/// probability `success_rate`.
pub struct SimulatedGateway {
    latency: Duration,
    success_rate: f64,
}

impl SimulatedGateway {
    pub fn new(latency: Duration, success_rate: f64) -> Self {
        Self {
            latency,
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }

    async fn settle(&self) -> bool {
        tokio::time::sleep(self.latency).await;
        rand::random::<f64>() < self.success_rate
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 1.0)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, payment: &Payment) -> Result<(), GatewayError> {
        debug!(transaction_id = %payment.transaction_id, "Charging {} {}", payment.amount, payment.currency);
        if self.settle().await {
            Ok(())
        } else {
            Err(GatewayError::Declined(format!(
                "charge for {} was not approved",
                payment.transaction_id
            )))
        }
    }

    async fn refund(&self, payment: &Payment, reason: Option<&str>) -> Result<(), GatewayError> {
        debug!(
            transaction_id = %payment.transaction_id,
            reason = reason.unwrap_or(""),
            "Refunding {} {}",
            payment.amount,
            payment.currency
        );
        if self.settle().await {
            Ok(())
        } else {
            Err(GatewayError::Unavailable(format!(
                "refund for {} could not be settled",
                payment.transaction_id
            )))
        }
    }
}
