use crate::service::PaymentService;
use chrono::Utc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

/// Periodically reports payments stuck in PROCESSING, typically left behind by
/// a request that was cancelled mid-settlement. Reporting only: the record
/// keeps its last applied state.
pub struct ProcessingMonitor {
    service: PaymentService,
    interval: Duration,
    threshold: Duration,
}

impl ProcessingMonitor {
    pub fn new(service: PaymentService, interval: Duration, threshold: Duration) -> Self {
        Self {
            service,
            interval,
            threshold,
        }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.interval);

        loop {
            interval.tick().await;

            match self.check().await {
                Ok(0) => {}
                Ok(count) => info!("{} payments waiting on settlement past threshold", count),
                Err(e) => error!("Error checking stale payments: {}", e),
            }
        }
    }

    pub async fn check(&self) -> Result<usize, crate::error::PaymentError> {
        let threshold = chrono::Duration::from_std(self.threshold).unwrap_or_else(|_| chrono::Duration::zero());
        let stale = self.service.stale_processing(Utc::now() - threshold).await?;

        for payment in &stale {
            warn!(
                payment_id = payment.id,
                order_id = payment.order_id,
                transaction_id = %payment.transaction_id,
                created_at = %payment.created_at,
                "Payment still PROCESSING"
            );
        }

        Ok(stale.len())
    }
}
