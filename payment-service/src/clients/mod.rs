//! Outbound calls to the card and order services.

mod card;
mod order;

pub use card::CardServiceClient;
pub use order::OrderServiceClient;

use async_trait::async_trait;
use serde_json::{Map, Value};
use shared::{CardDetails, CardValidationResponse, OrderStatusSignal};
use thiserror::Error;

/// Any failure talking to a collaborator: transport, timeout, non-2xx status or
/// an unreadable body. `service` names the collaborator ("Card" or "Order").
#[derive(Debug, Error)]
#[error("Error communicating with {service} service: {message}")]
pub struct ServiceCommunicationError {
    pub service: &'static str,
    pub message: String,
}

impl ServiceCommunicationError {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

/// The order as returned by the order service. Only its existence matters here.
pub type OrderData = Map<String, Value>;

#[async_trait]
pub trait CardService: Send + Sync {
    async fn validate(
        &self,
        card: &CardDetails,
        token: &str,
    ) -> Result<CardValidationResponse, ServiceCommunicationError>;
}

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn verify(&self, order_id: i64, token: &str) -> Result<OrderData, ServiceCommunicationError>;

    async fn update_status(
        &self,
        order_id: i64,
        status: OrderStatusSignal,
        token: &str,
    ) -> Result<(), ServiceCommunicationError>;
}
