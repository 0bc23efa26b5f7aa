use super::{CardService, ServiceCommunicationError};
use async_trait::async_trait;
use reqwest::Client;
use shared::{CardDetails, CardValidationRequest, CardValidationResponse};
use std::time::Duration;
use tracing::{debug, error};

const SERVICE: &str = "Card";

pub struct CardServiceClient {
    client: Client,
    base_url: String,
}

impl CardServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn failure(message: impl Into<String>) -> ServiceCommunicationError {
        let error = ServiceCommunicationError::new(SERVICE, message);
        error!("Error validating card: {}", error.message);
        error
    }
}

/// An accepted card must come back with its masked summary.
fn has_card_summary(result: &CardValidationResponse) -> bool {
    let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
    present(&result.card_type) && present(&result.card_last_four)
}

#[async_trait]
impl CardService for CardServiceClient {
    async fn validate(
        &self,
        card: &CardDetails,
        token: &str,
    ) -> Result<CardValidationResponse, ServiceCommunicationError> {
        debug!("Validating card with Card service");

        let response = self
            .client
            .post(format!("{}/api/cards/validate", self.base_url))
            .bearer_auth(token)
            .json(&CardValidationRequest::from(card))
            .send()
            .await
            .map_err(|e| Self::failure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::failure(format!("HTTP {}", response.status())));
        }

        let result = response
            .json::<CardValidationResponse>()
            .await
            .map_err(|e| Self::failure(e.to_string()))?;

        if result.valid && !has_card_summary(&result) {
            return Err(Self::failure("accepted card without cardType and cardLastFour"));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn card() -> CardDetails {
        CardDetails {
            card_number: "4242424242424242".to_string(),
            card_holder_name: "Ada Lovelace".to_string(),
            expiry_month: "12".to_string(),
            expiry_year: "2030".to_string(),
            cvv: "123".to_string(),
        }
    }

    #[tokio::test]
    async fn forwards_card_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cards/validate"))
            .and(header("authorization", "Bearer user-token"))
            .and(body_json(json!({
                "cardNumber": "4242424242424242",
                "cardHolderName": "Ada Lovelace",
                "expiryMonth": "12",
                "expiryYear": "2030",
                "cvv": "123"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valid": true,
                "cardType": "VISA",
                "cardLastFour": "4242",
                "message": "ok",
                "validationToken": "vt-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CardServiceClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let result = client.validate(&card(), "user-token").await.unwrap();

        assert!(result.valid);
        assert_eq!(result.card_last_four.as_deref(), Some("4242"));
        assert_eq!(result.card_type.as_deref(), Some("VISA"));
        assert_eq!(result.validation_token.as_deref(), Some("vt-1"));
    }

    #[tokio::test]
    async fn invalid_card_is_a_result_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cards/validate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valid": false,
                "message": "insufficient funds"
            })))
            .mount(&server)
            .await;

        let client = CardServiceClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let result = client.validate(&card(), "t").await.unwrap();

        assert!(!result.valid);
        assert_eq!(result.message.as_deref(), Some("insufficient funds"));
    }

    #[tokio::test]
    async fn accepted_card_without_summary_is_a_communication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cards/validate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valid": true,
                "cardType": "VISA"
            })))
            .mount(&server)
            .await;

        let client = CardServiceClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = client.validate(&card(), "t").await.unwrap_err();

        assert_eq!(err.service, "Card");
        assert!(err.message.contains("cardLastFour"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_communication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = CardServiceClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = client.validate(&card(), "t").await.unwrap_err();

        assert_eq!(err.service, "Card");
        assert!(err.to_string().starts_with("Error communicating with Card service"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_communication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = CardServiceClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
        assert!(client.validate(&card(), "t").await.is_err());
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "valid": true }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = CardServiceClient::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let err = client.validate(&card(), "t").await.unwrap_err();
        assert_eq!(err.service, "Card");
    }
}
