#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use payment_service::clients::{CardService, OrderData, OrderService, ServiceCommunicationError};
use payment_service::gateway::{GatewayError, PaymentGateway};
use payment_service::models::Payment;
use payment_service::service::PaymentService;
use payment_service::store::InMemoryPaymentStore;
use payment_service::validation::{PaymentCommand, RefundCommand};
use shared::{CardDetails, CardValidationResponse, OrderStatusSignal};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOKEN: &str = "caller-token";

#[derive(Default)]
pub struct FakeOrders {
    pub existing: Mutex<HashSet<i64>>,
    pub unreachable: AtomicBool,
    pub reject_updates: AtomicBool,
    pub verify_calls: AtomicUsize,
    pub updates: Mutex<Vec<(i64, OrderStatusSignal)>>,
}

impl FakeOrders {
    pub fn add(&self, order_id: i64) {
        self.existing.lock().unwrap().insert(order_id);
    }

    pub fn updates(&self) -> Vec<(i64, OrderStatusSignal)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderService for FakeOrders {
    async fn verify(&self, order_id: i64, _token: &str) -> Result<OrderData, ServiceCommunicationError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ServiceCommunicationError::new("Order", "operation timed out"));
        }
        if !self.existing.lock().unwrap().contains(&order_id) {
            return Err(ServiceCommunicationError::new("Order", "HTTP 404 Not Found"));
        }
        let mut order = OrderData::new();
        order.insert("id".to_string(), order_id.into());
        Ok(order)
    }

    async fn update_status(
        &self,
        order_id: i64,
        status: OrderStatusSignal,
        _token: &str,
    ) -> Result<(), ServiceCommunicationError> {
        self.updates.lock().unwrap().push((order_id, status));
        if self.reject_updates.load(Ordering::SeqCst) {
            return Err(ServiceCommunicationError::new("Order", "HTTP 503 Service Unavailable"));
        }
        Ok(())
    }
}

pub struct FakeCards {
    pub response: Mutex<CardValidationResponse>,
    pub unreachable: AtomicBool,
    pub calls: AtomicUsize,
    pub tokens: Mutex<Vec<String>>,
}

impl Default for FakeCards {
    fn default() -> Self {
        Self {
            response: Mutex::new(valid_card("4242")),
            unreachable: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCards {
    pub fn respond_with(&self, response: CardValidationResponse) {
        *self.response.lock().unwrap() = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardService for FakeCards {
    async fn validate(
        &self,
        _card: &CardDetails,
        token: &str,
    ) -> Result<CardValidationResponse, ServiceCommunicationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.to_string());
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ServiceCommunicationError::new("Card", "connection refused"));
        }
        Ok(self.response.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub decline_charges: AtomicBool,
    pub fail_refunds: AtomicBool,
    pub delay_ms: AtomicUsize,
    pub charges: AtomicUsize,
    pub refunds: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn refunded_transactions(&self) -> Vec<String> {
        self.refunds.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn charge(&self, _payment: &Payment) -> Result<(), GatewayError> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst) as u64;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.decline_charges.load(Ordering::SeqCst) {
            return Err(GatewayError::Declined("issuer declined".to_string()));
        }
        Ok(())
    }

    async fn refund(&self, payment: &Payment, _reason: Option<&str>) -> Result<(), GatewayError> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("gateway timeout".to_string()));
        }
        self.refunds.lock().unwrap().push(payment.transaction_id.clone());
        Ok(())
    }
}

pub fn valid_card(last_four: &str) -> CardValidationResponse {
    CardValidationResponse {
        valid: true,
        card_type: Some("VISA".to_string()),
        card_last_four: Some(last_four.to_string()),
        message: Some("Card is valid".to_string()),
        validation_token: Some("vt-123".to_string()),
    }
}

pub fn rejected_card(message: &str) -> CardValidationResponse {
    CardValidationResponse {
        valid: false,
        message: Some(message.to_string()),
        ..Default::default()
    }
}

pub fn card_details() -> CardDetails {
    CardDetails {
        card_number: "4242424242424242".to_string(),
        card_holder_name: "Ada Lovelace".to_string(),
        expiry_month: "12".to_string(),
        expiry_year: "2030".to_string(),
        cvv: "123".to_string(),
    }
}

pub fn payment_command(order_id: i64, amount: &str) -> PaymentCommand {
    PaymentCommand {
        order_id,
        amount: amount.parse::<BigDecimal>().unwrap(),
        currency: "USD".to_string(),
        card: card_details(),
    }
}

pub fn full_refund(payment_id: i64) -> RefundCommand {
    RefundCommand {
        payment_id,
        amount: None,
        reason: Some("customer request".to_string()),
    }
}

/// Fakes for every collaborator wired into a `PaymentService`.
pub struct Harness {
    pub store: InMemoryPaymentStore,
    pub orders: Arc<FakeOrders>,
    pub cards: Arc<FakeCards>,
    pub gateway: Arc<FakeGateway>,
    pub service: PaymentService,
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemoryPaymentStore::new();
        let orders = Arc::new(FakeOrders::default());
        let cards = Arc::new(FakeCards::default());
        let gateway = Arc::new(FakeGateway::default());
        let service = PaymentService::new(
            Arc::new(store.clone()),
            cards.clone(),
            orders.clone(),
            gateway.clone(),
        );
        Self {
            store,
            orders,
            cards,
            gateway,
            service,
        }
    }

    pub fn with_orders(order_ids: &[i64]) -> Self {
        let harness = Self::new();
        for order_id in order_ids {
            harness.orders.add(*order_id);
        }
        harness
    }
}
