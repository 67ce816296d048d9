//! Live Stripe Gateway
//!
//! [`PaymentGateway`] implementation backed by the async-stripe client. One
//! instance is built at process startup from [`BillingConfig`] and shared for
//! the process lifetime. No retries: every provider failure is mapped and
//! reported synchronously to the caller.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use stripe::{
    BillingPortalSession, CheckoutSession, CheckoutSessionBillingAddressCollection,
    CheckoutSessionId, CheckoutSessionMode, Client, CreateBillingPortalSession,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionPaymentMethodTypes, CreateCheckoutSessionSubscriptionData,
    CreateSubscriptionItem, CustomerId, ErrorCode, PriceId, StripeError, Subscription,
    SubscriptionId, SubscriptionItem, SubscriptionItemId, SubscriptionProrationBehavior,
    UpdateSubscription,
};

use crate::config::BillingConfig;
use crate::error::{BillingError, Result};
use crate::gateway::{CheckoutMode, CheckoutSessionSpec, CreatedCheckoutSession, PaymentGateway};

/// Stripe-backed payment gateway.
pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    pub fn new(config: &BillingConfig) -> Self {
        Self {
            client: Client::new(config.secret_key()),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        spec: CheckoutSessionSpec,
    ) -> Result<CreatedCheckoutSession> {
        let mut params = CreateCheckoutSession::new();
        params.mode = Some(match spec.mode {
            CheckoutMode::Subscription => CheckoutSessionMode::Subscription,
            CheckoutMode::OneTime => CheckoutSessionMode::Payment,
        });
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(spec.price_id.clone()),
            quantity: Some(spec.quantity),
            ..Default::default()
        }]);
        params.customer_email = spec.customer_email.as_deref();
        params.success_url = Some(&spec.success_url);
        params.cancel_url = Some(&spec.cancel_url);
        params.billing_address_collection =
            Some(CheckoutSessionBillingAddressCollection::Required);
        params.metadata = Some(spec.metadata.clone());

        if let Some(subscription_metadata) = &spec.subscription_metadata {
            params.allow_promotion_codes = Some(true);
            params.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
                metadata: Some(subscription_metadata.clone()),
                ..Default::default()
            });
        }

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(map_stripe_error)?;

        let url = session
            .url
            .ok_or_else(|| BillingError::provider("No checkout URL returned", None))?;

        Ok(CreatedCheckoutSession {
            session_id: session.id.to_string(),
            url,
        })
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<Value> {
        let id: CheckoutSessionId = session_id.parse().map_err(|_| {
            BillingError::not_found(format!("No such checkout session: '{session_id}'"))
        })?;

        let session = CheckoutSession::retrieve(&self.client, &id, &["customer", "subscription"])
            .await
            .map_err(map_stripe_error)?;

        to_json(&session)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Value> {
        let id = parse_subscription_id(subscription_id)?;

        let subscription =
            Subscription::retrieve(&self.client, &id, &["customer", "default_payment_method"])
                .await
                .map_err(map_stripe_error)?;

        to_json(&subscription)
    }

    async fn flag_cancel_at_period_end(&self, subscription_id: &str) -> Result<Value> {
        let id = parse_subscription_id(subscription_id)?;

        let params = UpdateSubscription {
            cancel_at_period_end: Some(true),
            ..Default::default()
        };

        let subscription = Subscription::update(&self.client, &id, params)
            .await
            .map_err(map_stripe_error)?;

        to_json(&subscription)
    }

    async fn cancel_subscription_now(&self, subscription_id: &str) -> Result<Value> {
        let id = parse_subscription_id(subscription_id)?;

        let subscription = Subscription::cancel(&self.client, &id, Default::default())
            .await
            .map_err(map_stripe_error)?;

        to_json(&subscription)
    }

    async fn create_subscription_item(
        &self,
        subscription_id: &str,
        price_id: &str,
    ) -> Result<Value> {
        let subscription = parse_subscription_id(subscription_id)?;
        let price: PriceId = price_id
            .parse()
            .map_err(|_| BillingError::not_found(format!("No such price: '{price_id}'")))?;

        let mut params = CreateSubscriptionItem::new(subscription);
        params.price = Some(price);
        params.proration_behavior = Some(SubscriptionProrationBehavior::CreateProrations);

        let item = SubscriptionItem::create(&self.client, params)
            .await
            .map_err(map_stripe_error)?;

        to_json(&item)
    }

    async fn delete_subscription_item(&self, item_id: &str) -> Result<Value> {
        let id: SubscriptionItemId = item_id.parse().map_err(|_| {
            BillingError::not_found(format!("No such subscription item: '{item_id}'"))
        })?;

        let deleted = SubscriptionItem::delete(&self.client, &id)
            .await
            .map_err(map_stripe_error)?;

        to_json(&deleted)
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String> {
        let customer: CustomerId = customer_id
            .parse()
            .map_err(|_| BillingError::not_found(format!("No such customer: '{customer_id}'")))?;

        let mut params = CreateBillingPortalSession::new(customer);
        params.return_url = Some(return_url);

        let session = BillingPortalSession::create(&self.client, params)
            .await
            .map_err(map_stripe_error)?;

        Ok(session.url)
    }
}

fn parse_subscription_id(subscription_id: &str) -> Result<SubscriptionId> {
    subscription_id.parse().map_err(|_| {
        BillingError::not_found(format!("No such subscription: '{subscription_id}'"))
    })
}

fn to_json<T: Serialize>(object: &T) -> Result<Value> {
    serde_json::to_value(object).map_err(|e| BillingError::provider(e.to_string(), None))
}

/// Map a Stripe SDK error onto the billing taxonomy. A provider 404 (or the
/// `resource_missing` code) becomes [`BillingError::NotFound`]; everything
/// else passes the provider's message and error-type tag through verbatim.
fn map_stripe_error(error: StripeError) -> BillingError {
    match error {
        StripeError::Stripe(request_error) => {
            let missing = request_error.http_status == 404
                || matches!(request_error.code, Some(ErrorCode::ResourceMissing));
            let message = request_error
                .message
                .clone()
                .unwrap_or_else(|| "Unknown provider error".to_string());

            if missing {
                BillingError::NotFound(message)
            } else {
                BillingError::provider(message, Some(format!("{:?}", request_error.error_type)))
            }
        }
        other => BillingError::provider(other.to_string(), None),
    }
}
