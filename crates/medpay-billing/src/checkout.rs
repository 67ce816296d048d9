//! Checkout Session Operations
//!
//! Translates validated client requests into provider checkout-session
//! calls. Validation always runs before the gateway is touched; a request
//! without a price reference never reaches the provider.

use std::collections::HashMap;

use serde::Deserialize;

use crate::config::BillingConfig;
use crate::error::{BillingError, Result};
use crate::gateway::{CheckoutMode, CheckoutSessionSpec, CreatedCheckoutSession, PaymentGateway};

/// Request to open a checkout session.
///
/// `price_id` is an opaque provider reference. Lives for one request;
/// nothing is stored.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub price_id: Option<String>,

    #[serde(default = "default_quantity")]
    pub quantity: u64,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Default for CheckoutRequest {
    fn default() -> Self {
        Self {
            price_id: None,
            quantity: default_quantity(),
            customer_email: None,
            metadata: HashMap::new(),
        }
    }
}

fn default_quantity() -> u64 {
    1
}

/// Open a subscription-mode checkout session. The session is tagged
/// `service_type = "subscription"` and the caller's metadata is copied onto
/// the subscription Stripe creates from it.
pub async fn create_subscription_session(
    gateway: &dyn PaymentGateway,
    config: &BillingConfig,
    request: CheckoutRequest,
) -> Result<CreatedCheckoutSession> {
    create_session(gateway, config, CheckoutMode::Subscription, request).await
}

/// Open a one-time payment checkout session, tagged `service_type = "one_time"`.
pub async fn create_one_time_session(
    gateway: &dyn PaymentGateway,
    config: &BillingConfig,
    request: CheckoutRequest,
) -> Result<CreatedCheckoutSession> {
    create_session(gateway, config, CheckoutMode::OneTime, request).await
}

async fn create_session(
    gateway: &dyn PaymentGateway,
    config: &BillingConfig,
    mode: CheckoutMode,
    request: CheckoutRequest,
) -> Result<CreatedCheckoutSession> {
    let price_id = request
        .price_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| BillingError::validation("Price ID is required"))?
        .to_string();

    if request.quantity == 0 {
        return Err(BillingError::validation("Quantity must be at least 1"));
    }

    let subscription_metadata = match mode {
        CheckoutMode::Subscription => Some(request.metadata.clone()),
        CheckoutMode::OneTime => None,
    };

    let mut metadata = request.metadata;
    metadata.insert("service_type".to_string(), mode.service_type().to_string());

    let session = gateway
        .create_checkout_session(CheckoutSessionSpec {
            mode,
            price_id,
            quantity: request.quantity,
            customer_email: request.customer_email,
            metadata,
            subscription_metadata,
            success_url: config.success_url(),
            cancel_url: config.cancel_url(),
        })
        .await?;

    tracing::info!(
        session_id = %session.session_id,
        mode = mode.service_type(),
        "checkout session created"
    );

    Ok(session)
}

/// Retrieve a checkout session with its customer and subscription expanded.
/// Unknown ids surface as [`BillingError::NotFound`].
pub async fn retrieve_session(
    gateway: &dyn PaymentGateway,
    session_id: &str,
) -> Result<serde_json::Value> {
    gateway.retrieve_checkout_session(session_id).await
}
