//! Customer Portal
//!
//! Creates single-use redirect URLs into the provider's self-service billing
//! portal. No local state.

use serde::Deserialize;

use crate::config::BillingConfig;
use crate::error::{BillingError, Result};
use crate::gateway::PaymentGateway;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
}

/// Create a portal session for a customer; the portal returns them to the
/// configured account page when they are done.
pub async fn create_portal_session(
    gateway: &dyn PaymentGateway,
    config: &BillingConfig,
    request: PortalRequest,
) -> Result<String> {
    let customer_id = request
        .customer_id
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| BillingError::validation("Customer ID is required"))?;

    gateway
        .create_portal_session(customer_id, &config.portal_return_url())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockGateway;

    fn config() -> BillingConfig {
        BillingConfig::new("sk_test_x", "whsec_x", "https://example.com")
    }

    #[tokio::test]
    async fn test_missing_customer_id_is_validation_error() {
        let gateway = MockGateway::new();

        let result = create_portal_session(&gateway, &config(), PortalRequest::default()).await;
        assert!(matches!(result, Err(BillingError::Validation(_))));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_portal_url_returned() {
        let gateway = MockGateway::new();

        let url = create_portal_session(
            &gateway,
            &config(),
            PortalRequest {
                customer_id: Some("cus_123".into()),
            },
        )
        .await
        .unwrap();
        assert!(url.starts_with("https://billing.stripe.com/"));
    }
}
