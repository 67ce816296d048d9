//! medpay HTTP Server
//!
//! Axum-based payment gateway for the medication-oversight client: checkout
//! sessions, subscription management, the customer portal, and the Stripe
//! webhook endpoint. All billing logic lives in medpay-billing; this binary
//! wires the transport.

mod handlers;
mod state;

use std::sync::Arc;

use axum::http::{HeaderName, Method, header};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medpay_billing::{BillingConfig, SignatureVerifier, StripeGateway, WebhookHandler};

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = Arc::new(BillingConfig::from_env()?);

    let live_mode = config.secret_key().starts_with("sk_live");
    tracing::info!(
        mode = if live_mode { "LIVE" } else { "TEST" },
        client_url = config.client_url(),
        "Stripe configured"
    );

    // One gateway per process, injected into every handler
    let gateway = Arc::new(StripeGateway::new(&config));
    let webhooks = Arc::new(WebhookHandler::new(SignatureVerifier::new(
        config.webhook_secret(),
    )));

    let state = AppState {
        gateway,
        webhooks,
        config,
    };

    // CORS: any origin, with credentials, for the browser-embedded payment
    // widget. tower-http rejects the Any + credentials combination, so the
    // request origin is mirrored instead.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("stripe-signature"),
        ]);

    let app = handlers::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("medpay server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                    - Health check");
    tracing::info!("  POST /create-checkout-session   - Subscription checkout");
    tracing::info!("  POST /create-payment-session    - One-time checkout");
    tracing::info!("  GET  /checkout-session/{{id}}     - Session details");
    tracing::info!("  GET  /subscription/{{id}}         - Subscription details");
    tracing::info!("  POST /cancel-subscription       - Cancel (soft or immediate)");
    tracing::info!("  POST /create-portal-session     - Customer portal URL");
    tracing::info!("  POST /add-subscription-item     - Add line item");
    tracing::info!("  POST /remove-subscription-item  - Remove line item");
    tracing::info!("  POST /webhook                   - Stripe webhook");

    axum::serve(listener, app).await?;

    Ok(())
}
