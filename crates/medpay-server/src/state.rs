//! Application State

use std::sync::Arc;

use medpay_billing::{BillingConfig, PaymentGateway, WebhookHandler};

/// Shared application state.
///
/// The gateway is constructed once at startup and injected here; handlers
/// never reach for a global client.
#[derive(Clone)]
pub struct AppState {
    /// Payment gateway (Stripe in production, mock in tests)
    pub gateway: Arc<dyn PaymentGateway>,

    /// Webhook verification and dispatch
    pub webhooks: Arc<WebhookHandler>,

    /// Billing configuration (redirect URLs, secrets)
    pub config: Arc<BillingConfig>,
}
