use super::{OrderData, OrderService, ServiceCommunicationError};
use async_trait::async_trait;
use reqwest::Client;
use shared::{OrderStatusSignal, OrderStatusUpdate};
use std::time::Duration;
use tracing::{debug, error};

const SERVICE: &str = "Order";

pub struct OrderServiceClient {
    client: Client,
    base_url: String,
}

impl OrderServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OrderService for OrderServiceClient {
    async fn verify(&self, order_id: i64, token: &str) -> Result<OrderData, ServiceCommunicationError> {
        debug!("Fetching order {}", order_id);

        let response = self
            .client
            .get(format!("{}/api/orders/{}", self.base_url, order_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ServiceCommunicationError::new(SERVICE, e.to_string()))?;

        if !response.status().is_success() {
            error!("Error fetching order {}: HTTP {}", order_id, response.status());
            return Err(ServiceCommunicationError::new(
                SERVICE,
                format!("HTTP {}", response.status()),
            ));
        }

        response
            .json::<OrderData>()
            .await
            .map_err(|e| ServiceCommunicationError::new(SERVICE, e.to_string()))
    }

    async fn update_status(
        &self,
        order_id: i64,
        status: OrderStatusSignal,
        token: &str,
    ) -> Result<(), ServiceCommunicationError> {
        debug!("Updating order {} status to {}", order_id, status);

        let response = self
            .client
            .put(format!("{}/api/orders/{}/status", self.base_url, order_id))
            .bearer_auth(token)
            .json(&OrderStatusUpdate { status })
            .send()
            .await
            .map_err(|e| ServiceCommunicationError::new(SERVICE, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceCommunicationError::new(
                SERVICE,
                format!("HTTP {}", response.status()),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn verify_returns_order_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/100"))
            .and(header("authorization", "Bearer t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 100,
                "status": "PENDING"
            })))
            .mount(&server)
            .await;

        let client = OrderServiceClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let order = client.verify(100, "t").await.unwrap();
        assert_eq!(order["id"], 100);
    }

    #[tokio::test]
    async fn missing_order_is_a_communication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = OrderServiceClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = client.verify(404, "t").await.unwrap_err();
        assert_eq!(err.service, "Order");
    }

    #[tokio::test]
    async fn verify_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": 1 }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = OrderServiceClient::new(&server.uri(), Duration::from_millis(50)).unwrap();
        assert!(client.verify(1, "t").await.is_err());
    }

    #[tokio::test]
    async fn update_status_puts_signal() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/orders/7/status"))
            .and(header("authorization", "Bearer t"))
            .and(body_json(json!({ "status": "CANCELLED" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = OrderServiceClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        client
            .update_status(7, OrderStatusSignal::Cancelled, "t")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_status_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = OrderServiceClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        assert!(client
            .update_status(7, OrderStatusSignal::Processing, "t")
            .await
            .is_err());
    }
}
