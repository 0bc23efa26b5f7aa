use crate::auth::JwtVerifier;
use crate::error::PaymentError;
use crate::service::PaymentService;
use crate::validation::{PaymentCommand, RefundCommand};
use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequestParts, Path, Request, State,
    },
    http::{header::AUTHORIZATION, request::Parts, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use shared::{ErrorResponse, PaymentRequest, PaymentResponse, RefundRequest};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct AppState {
    pub service: PaymentService,
    pub verifier: Arc<JwtVerifier>,
}

/// A domain failure bound to the request path it happened on.
#[derive(Debug)]
pub struct ApiError {
    error: PaymentError,
    path: String,
}

impl ApiError {
    pub fn new(error: PaymentError, uri: &Uri) -> Self {
        Self {
            error,
            path: uri.path().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        if status.is_server_error() {
            error!(path = %self.path, "Request failed: {}", self.error);
        } else {
            debug!(path = %self.path, "Request rejected: {}", self.error);
        }

        let mut body = ErrorResponse::new(status.as_u16(), self.error.public_message(), self.path);
        if let PaymentError::Validation(errors) = self.error {
            body = body.with_errors(errors);
        }
        (status, Json(body)).into_response()
    }
}

/// The authenticated caller: user id from the token's subject, plus the raw
/// token for forwarding to the card and order services.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let unauthorized = |message: String| ApiError::new(PaymentError::Unauthorized(message), &parts.uri);

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| unauthorized("Missing bearer token".to_string()))?;

        let claims = state
            .verifier
            .verify(token)
            .map_err(|e| unauthorized(format!("Invalid token: {}", e)))?;

        Ok(Self {
            user_id: claims.sub,
            token: token.to_string(),
        })
    }
}

pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/api/payments", post(create_payment).get(list_payments))
        .route("/api/payments/refund", post(refund_payment))
        .route("/api/payments/order/:order_id", get(get_payment_by_order))
        .route(
            "/api/payments/transaction/:transaction_id",
            get(get_payment_by_transaction),
        )
        .route("/api/payments/:id", get(get_payment))
        .route("/health", get(health_check))
        .fallback(no_route)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(timeout_envelope))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn no_route(method: Method, uri: Uri) -> ApiError {
    ApiError::new(PaymentError::RouteNotFound(format!("{} {}", method, uri.path())), &uri)
}

/// `TimeoutLayer` answers with a bare 408; give it the usual error body.
async fn timeout_envelope(request: Request, next: Next) -> Response {
    let uri = request.uri().clone();
    let response = next.run(request).await;
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return ApiError::new(PaymentError::RequestTimeout, &uri).into_response();
    }
    response
}

fn malformed(uri: &Uri, message: String) -> ApiError {
    ApiError::new(PaymentError::MalformedRequest(message), uri)
}

pub async fn create_payment(
    State(state): State<AppState>,
    uri: Uri,
    user: AuthenticatedUser,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let Json(request) = payload.map_err(|e| malformed(&uri, e.body_text()))?;
    let command = PaymentCommand::try_from(request).map_err(|e| ApiError::new(e, &uri))?;
    info!(user_id = %user.user_id, order_id = command.order_id, "Payment request");

    let response = state
        .service
        .process_payment(&user.user_id, &user.token, command)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    uri: Uri,
    user: AuthenticatedUser,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    debug!(user_id = %user.user_id, "Fetching payments");
    state
        .service
        .get_user_payments(&user.user_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, &uri))
}

pub async fn get_payment(
    State(state): State<AppState>,
    uri: Uri,
    user: AuthenticatedUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let Path(id) = id.map_err(|e| malformed(&uri, e.body_text()))?;
    debug!(user_id = %user.user_id, payment_id = id, "Fetching payment");
    state
        .service
        .get_payment_by_id(id, &user.user_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, &uri))
}

pub async fn get_payment_by_order(
    State(state): State<AppState>,
    uri: Uri,
    user: AuthenticatedUser,
    order_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let Path(order_id) = order_id.map_err(|e| malformed(&uri, e.body_text()))?;
    debug!(user_id = %user.user_id, order_id, "Fetching payment for order");
    state
        .service
        .get_payment_by_order_id(order_id, &user.user_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, &uri))
}

pub async fn get_payment_by_transaction(
    State(state): State<AppState>,
    uri: Uri,
    user: AuthenticatedUser,
    Path(transaction_id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    state
        .service
        .get_payment_by_transaction_id(&transaction_id, &user.user_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, &uri))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    uri: Uri,
    user: AuthenticatedUser,
    payload: Result<Json<RefundRequest>, JsonRejection>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| malformed(&uri, e.body_text()))?;
    let command = RefundCommand::try_from(request).map_err(|e| ApiError::new(e, &uri))?;
    info!(user_id = %user.user_id, payment_id = command.payment_id, "Refund request");

    state
        .service
        .refund_payment(&user.user_id, &user.token, command)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, &uri))
}

pub async fn health_check() -> &'static str {
    "OK"
}
