//! HTTP Handlers
//!
//! Thin shims over the medpay-billing core operations: each handler
//! deserializes a typed request, delegates, and maps the result into the
//! JSON envelope. All validation and provider logic lives in the billing
//! crate so that every transport shares one implementation.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};

use medpay_billing::{
    AddSubscriptionItemRequest, BillingError, CancelSubscriptionRequest, CheckoutRequest,
    CreatedCheckoutSession, PortalRequest, RemoveSubscriptionItemRequest, checkout, portal,
    subscription,
};

use crate::state::AppState;

// ============================================================================
// Error envelope
// ============================================================================

/// Error envelope: `{ "error": <message>, "type": <provider tag, optional> }`
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
}

/// Billing error adapted to an HTTP response.
pub struct ApiError(BillingError);

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BillingError::Validation(_) | BillingError::Signature(_) => StatusCode::BAD_REQUEST,
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::Config(_) | BillingError::Provider { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = ErrorBody {
            kind: self.0.kind().map(String::from),
            error: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Open a subscription-mode checkout session
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CreatedCheckoutSession>, ApiError> {
    let session =
        checkout::create_subscription_session(state.gateway.as_ref(), &state.config, request)
            .await?;
    Ok(Json(session))
}

/// Open a one-time payment checkout session
pub async fn create_payment_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CreatedCheckoutSession>, ApiError> {
    let session =
        checkout::create_one_time_session(state.gateway.as_ref(), &state.config, request).await?;
    Ok(Json(session))
}

/// Retrieve a checkout session, customer and subscription expanded
pub async fn get_checkout_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = checkout::retrieve_session(state.gateway.as_ref(), &session_id).await?;
    Ok(Json(session))
}

/// Retrieve a subscription, customer and payment method expanded
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let subscription =
        subscription::retrieve_subscription(state.gateway.as_ref(), &subscription_id).await?;
    Ok(Json(subscription))
}

/// Cancel a subscription at period end (default) or immediately
pub async fn cancel_subscription(
    State(state): State<AppState>,
    Json(request): Json<CancelSubscriptionRequest>,
) -> Result<Json<Value>, ApiError> {
    let subscription = subscription::cancel_subscription(state.gateway.as_ref(), request).await?;
    Ok(Json(subscription))
}

/// Create a customer portal redirect URL
pub async fn create_portal_session(
    State(state): State<AppState>,
    Json(request): Json<PortalRequest>,
) -> Result<Json<Value>, ApiError> {
    let url =
        portal::create_portal_session(state.gateway.as_ref(), &state.config, request).await?;
    Ok(Json(json!({ "url": url })))
}

/// Add a line item to a subscription
pub async fn add_subscription_item(
    State(state): State<AppState>,
    Json(request): Json<AddSubscriptionItemRequest>,
) -> Result<Json<Value>, ApiError> {
    let item = subscription::add_subscription_item(state.gateway.as_ref(), request).await?;
    Ok(Json(item))
}

/// Remove a subscription line item
pub async fn remove_subscription_item(
    State(state): State<AppState>,
    Json(request): Json<RemoveSubscriptionItemRequest>,
) -> Result<Json<Value>, ApiError> {
    let item = subscription::remove_subscription_item(state.gateway.as_ref(), request).await?;
    Ok(Json(item))
}

/// Stripe webhook endpoint.
///
/// Takes the raw body bytes: signature verification needs the exact bytes as
/// sent, so this route must never go through JSON extraction.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| BillingError::Signature("missing stripe-signature header".into()))?;

    state.webhooks.handle(&body, signature)?;

    // Acknowledge everything that verifies, or the provider will retry.
    Ok(Json(json!({ "received": true })))
}

/// Fallback for unknown routes
pub async fn route_not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Route not found" })),
    )
}

/// Build the application router. Middleware (CORS, tracing) is layered on in
/// `main`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/create-payment-session", post(create_payment_session))
        .route("/checkout-session/{id}", get(get_checkout_session))
        .route("/subscription/{id}", get(get_subscription))
        .route("/cancel-subscription", post(cancel_subscription))
        .route("/create-portal-session", post(create_portal_session))
        .route("/add-subscription-item", post(add_subscription_item))
        .route("/remove-subscription-item", post(remove_subscription_item))
        .route("/webhook", post(stripe_webhook))
        .fallback(route_not_found)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use medpay_billing::{BillingConfig, MockGateway, SignatureVerifier, WebhookHandler};

    use super::*;

    const WEBHOOK_SECRET: &str = "whsec_test_secret_12345";

    fn test_router(gateway: Arc<MockGateway>) -> Router {
        let state = AppState {
            gateway,
            webhooks: Arc::new(WebhookHandler::new(SignatureVerifier::new(WEBHOOK_SECRET))),
            config: Arc::new(BillingConfig::new(
                "sk_test_x",
                WEBHOOK_SECRET,
                "https://example.com",
            )),
        };
        router(state)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    #[tokio::test]
    async fn test_create_checkout_session_returns_session_and_url() {
        let app = test_router(Arc::new(MockGateway::new()));

        let response = app
            .oneshot(post_json(
                "/create-checkout-session",
                json!({ "priceId": "price_123", "customerEmail": "a@b.com" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(!body["sessionId"].as_str().unwrap().is_empty());
        assert!(
            body["url"]
                .as_str()
                .unwrap()
                .starts_with("https://checkout.stripe.com")
        );
    }

    #[tokio::test]
    async fn test_missing_price_id_is_400_and_no_provider_call() {
        let gateway = Arc::new(MockGateway::new());
        let app = test_router(gateway.clone());

        for uri in ["/create-checkout-session", "/create-payment-session"] {
            let response = app
                .clone()
                .oneshot(post_json(uri, json!({ "customerEmail": "a@b.com" })))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            assert_eq!(body["error"], json!("Price ID is required"));
        }

        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_retrieve_unknown_ids_are_404_not_500() {
        let app = test_router(Arc::new(MockGateway::new()));

        let response = app
            .clone()
            .oneshot(get_req("/checkout-session/cs_missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(get_req("/subscription/sub_missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_retrieve_seeded_session_is_returned_verbatim() {
        let gateway = MockGateway::new().with_session(
            "cs_test_1",
            json!({
                "id": "cs_test_1",
                "object": "checkout.session",
                "customer": { "id": "cus_1", "email": "a@b.com" },
                "subscription": { "id": "sub_1" },
            }),
        );
        let app = test_router(Arc::new(gateway));

        let response = app
            .oneshot(get_req("/checkout-session/cs_test_1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["customer"]["email"], json!("a@b.com"));
        assert_eq!(body["subscription"]["id"], json!("sub_1"));
    }

    #[tokio::test]
    async fn test_cancel_subscription_defaults_to_period_end() {
        let app = test_router(Arc::new(MockGateway::new()));

        let response = app
            .oneshot(post_json(
                "/cancel-subscription",
                json!({ "subscriptionId": "sub_123" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["cancel_at_period_end"], json!(true));
        assert_eq!(body["status"], json!("active"));
    }

    #[tokio::test]
    async fn test_cancel_subscription_immediately() {
        let app = test_router(Arc::new(MockGateway::new()));

        let response = app
            .oneshot(post_json(
                "/cancel-subscription",
                json!({ "subscriptionId": "sub_123", "cancelAtPeriodEnd": false }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("canceled"));
    }

    #[tokio::test]
    async fn test_cancel_subscription_without_id_is_400() {
        let app = test_router(Arc::new(MockGateway::new()));

        let response = app
            .oneshot(post_json("/cancel-subscription", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_portal_session() {
        let app = test_router(Arc::new(MockGateway::new()));

        let response = app
            .clone()
            .oneshot(post_json("/create-portal-session", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json(
                "/create-portal-session",
                json!({ "customerId": "cus_123" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(
            body["url"]
                .as_str()
                .unwrap()
                .starts_with("https://billing.stripe.com/")
        );
    }

    #[tokio::test]
    async fn test_subscription_item_roundtrip() {
        let app = test_router(Arc::new(MockGateway::new()));

        let response = app
            .clone()
            .oneshot(post_json(
                "/add-subscription-item",
                json!({ "subscriptionId": "sub_123", "priceId": "price_addon" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let item = body_json(response).await;
        let item_id = item["id"].as_str().unwrap();

        let response = app
            .oneshot(post_json(
                "/remove-subscription-item",
                json!({ "subscriptionItemId": item_id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let deleted = body_json(response).await;
        assert_eq!(deleted["deleted"], json!(true));
    }

    #[tokio::test]
    async fn test_add_subscription_item_requires_both_ids() {
        let app = test_router(Arc::new(MockGateway::new()));

        let response = app
            .oneshot(post_json(
                "/add-subscription-item",
                json!({ "subscriptionId": "sub_123" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_missing_signature_is_400() {
        let gateway = Arc::new(MockGateway::new());
        let app = test_router(gateway.clone());

        let response = app
            .oneshot(post_json("/webhook", json!({ "type": "customer.created" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_webhook_tampered_signature_is_400() {
        let app = test_router(Arc::new(MockGateway::new()));

        let payload = json!({ "type": "customer.created", "data": { "object": {} } }).to_string();
        let header_value = SignatureVerifier::new(WEBHOOK_SECRET).sign(b"other payload", now());

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("stripe-signature", header_value)
            .body(Body::from(payload))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_valid_signature_unknown_type_is_acknowledged() {
        let app = test_router(Arc::new(MockGateway::new()));

        let payload = json!({ "type": "charge.refunded", "data": { "object": {} } }).to_string();
        let header_value =
            SignatureVerifier::new(WEBHOOK_SECRET).sign(payload.as_bytes(), now());

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("stripe-signature", header_value)
            .body(Body::from(payload))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "received": true }));
    }

    #[tokio::test]
    async fn test_webhook_recognized_event_is_acknowledged() {
        let app = test_router(Arc::new(MockGateway::new()));

        let payload = json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "customer_email": "a@b.com",
                "amount_total": 4900,
            }}
        })
        .to_string();
        let header_value =
            SignatureVerifier::new(WEBHOOK_SECRET).sign(payload.as_bytes(), now());

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("stripe-signature", header_value)
            .body(Body::from(payload))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "received": true }));
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_router(Arc::new(MockGateway::new()));

        let response = app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("ok"));
        assert!(body["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_unknown_route_envelope() {
        let app = test_router(Arc::new(MockGateway::new()));

        let response = app.oneshot(get_req("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], json!("Route not found"));
    }
}
