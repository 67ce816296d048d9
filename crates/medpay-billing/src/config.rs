//! Billing Configuration
//!
//! All secrets are loaded from environment variables; nothing is read from
//! disk. The client base URL anchors every redirect Stripe sends the
//! customer back to.

use crate::error::{BillingError, Result};

/// Configuration for the billing layer.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Stripe API secret key (sk_...)
    secret_key: String,

    /// Webhook signing secret (whsec_...). Never logged.
    webhook_secret: String,

    /// Public base URL of the client application, without trailing slash
    client_url: String,
}

impl BillingConfig {
    pub fn new(
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        client_url: impl Into<String>,
    ) -> Self {
        let client_url = client_url.into();
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            client_url: client_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required: `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`, `CLIENT_URL`.
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| BillingError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| BillingError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;
        let client_url = std::env::var("CLIENT_URL")
            .map_err(|_| BillingError::Config("CLIENT_URL not set".into()))?;

        Ok(Self::new(secret_key, webhook_secret, client_url))
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    pub fn client_url(&self) -> &str {
        &self.client_url
    }

    /// Where Stripe redirects after a completed checkout. The
    /// `{CHECKOUT_SESSION_ID}` placeholder is substituted by Stripe.
    pub fn success_url(&self) -> String {
        format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", self.client_url)
    }

    /// Where Stripe redirects when the customer abandons checkout.
    pub fn cancel_url(&self) -> String {
        format!("{}/canceled", self.client_url)
    }

    /// Where the customer portal returns the customer to.
    pub fn portal_return_url(&self) -> String {
        format!("{}/account", self.client_url)
    }
}
