//! Subscription Operations
//!
//! Retrieval, cancellation, and line-item changes. The cancel boolean is the
//! one consequential branch in the handler surface: period-end cancellation
//! keeps the customer's access until the billing boundary, immediate
//! cancellation revokes it now.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{BillingError, Result};
use crate::gateway::PaymentGateway;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSubscriptionRequest {
    #[serde(default)]
    pub subscription_id: Option<String>,

    /// When true (the default), the subscription stays active until the end
    /// of the current billing period.
    #[serde(default = "default_true")]
    pub cancel_at_period_end: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSubscriptionItemRequest {
    #[serde(default)]
    pub subscription_id: Option<String>,

    #[serde(default)]
    pub price_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSubscriptionItemRequest {
    #[serde(default)]
    pub subscription_item_id: Option<String>,
}

/// Retrieve a subscription with its customer and default payment method
/// expanded.
pub async fn retrieve_subscription(
    gateway: &dyn PaymentGateway,
    subscription_id: &str,
) -> Result<Value> {
    gateway.retrieve_subscription(subscription_id).await
}

/// Cancel a subscription, softly or immediately, and return the updated
/// provider object verbatim.
pub async fn cancel_subscription(
    gateway: &dyn PaymentGateway,
    request: CancelSubscriptionRequest,
) -> Result<Value> {
    let subscription_id = required(request.subscription_id, "Subscription ID is required")?;

    let subscription = if request.cancel_at_period_end {
        gateway.flag_cancel_at_period_end(&subscription_id).await?
    } else {
        gateway.cancel_subscription_now(&subscription_id).await?
    };

    tracing::info!(
        subscription_id = %subscription_id,
        at_period_end = request.cancel_at_period_end,
        "subscription cancellation requested"
    );

    Ok(subscription)
}

/// Add a line item to a subscription, prorating the remainder of the period.
pub async fn add_subscription_item(
    gateway: &dyn PaymentGateway,
    request: AddSubscriptionItemRequest,
) -> Result<Value> {
    let (subscription_id, price_id) = match (
        non_empty(request.subscription_id),
        non_empty(request.price_id),
    ) {
        (Some(subscription_id), Some(price_id)) => (subscription_id, price_id),
        _ => {
            return Err(BillingError::validation(
                "Subscription ID and Price ID are required",
            ));
        }
    };

    gateway
        .create_subscription_item(&subscription_id, &price_id)
        .await
}

/// Remove a subscription line item, with the same proration policy reversed.
pub async fn remove_subscription_item(
    gateway: &dyn PaymentGateway,
    request: RemoveSubscriptionItemRequest,
) -> Result<Value> {
    let item_id = required(
        request.subscription_item_id,
        "Subscription Item ID is required",
    )?;

    gateway.delete_subscription_item(&item_id).await
}

fn required(value: Option<String>, message: &str) -> Result<String> {
    non_empty(value).ok_or_else(|| BillingError::validation(message))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
