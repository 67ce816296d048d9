//! Payment Gateway Abstraction
//!
//! Every Stripe round trip goes through the [`PaymentGateway`] trait. One
//! implementation is constructed per process at startup and passed by
//! reference into the core operations; there is no module-level client
//! singleton. Provider-owned objects (sessions, subscriptions, items) cross
//! the trait as [`serde_json::Value`] because the contract with callers is
//! verbatim passthrough.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Which kind of checkout session to open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckoutMode {
    /// Recurring subscription
    Subscription,
    /// One-time payment
    OneTime,
}

impl CheckoutMode {
    /// Metadata tag recorded on the session for later attribution.
    pub fn service_type(self) -> &'static str {
        match self {
            CheckoutMode::Subscription => "subscription",
            CheckoutMode::OneTime => "one_time",
        }
    }
}

/// Fully validated parameters for a checkout-session creation call.
#[derive(Clone, Debug)]
pub struct CheckoutSessionSpec {
    pub mode: CheckoutMode,
    pub price_id: String,
    pub quantity: u64,
    pub customer_email: Option<String>,
    /// Session metadata, already tagged with `service_type`
    pub metadata: HashMap<String, String>,
    /// Caller metadata to copy onto the created subscription
    /// (subscription mode only)
    pub subscription_metadata: Option<HashMap<String, String>>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Result of creating a checkout session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCheckoutSession {
    /// Stripe session ID
    pub session_id: String,

    /// Hosted checkout URL to redirect the customer to
    pub url: String,
}

/// Stripe operations used by the handler surface.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session.
    async fn create_checkout_session(
        &self,
        spec: CheckoutSessionSpec,
    ) -> Result<CreatedCheckoutSession>;

    /// Retrieve a checkout session with `customer` and `subscription`
    /// expanded.
    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<Value>;

    /// Retrieve a subscription with `customer` and `default_payment_method`
    /// expanded.
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Value>;

    /// Soft-cancel: flag the subscription to end at the period boundary,
    /// leaving it active until then.
    async fn flag_cancel_at_period_end(&self, subscription_id: &str) -> Result<Value>;

    /// Hard-cancel: end the subscription immediately.
    async fn cancel_subscription_now(&self, subscription_id: &str) -> Result<Value>;

    /// Add a line item to a subscription, with prorations.
    async fn create_subscription_item(
        &self,
        subscription_id: &str,
        price_id: &str,
    ) -> Result<Value>;

    /// Remove a subscription line item.
    async fn delete_subscription_item(&self, item_id: &str) -> Result<Value>;

    /// Create a single-use customer portal URL.
    async fn create_portal_session(&self, customer_id: &str, return_url: &str)
        -> Result<String>;
}

/// Mock gateway for tests.
///
/// Mutations synthesize plausible provider objects; retrievals are strict and
/// only return objects seeded with [`MockGateway::with_session`] /
/// [`MockGateway::with_subscription`].
#[cfg(any(test, feature = "mock-gateway"))]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::error::{BillingError, Result};

    use super::{CheckoutSessionSpec, CreatedCheckoutSession, PaymentGateway};

    #[derive(Default)]
    pub struct MockGateway {
        session_counter: AtomicU64,
        calls: Mutex<Vec<&'static str>>,
        checkout_specs: Mutex<Vec<CheckoutSessionSpec>>,
        sessions: Mutex<HashMap<String, Value>>,
        subscriptions: Mutex<HashMap<String, Value>>,
    }

    impl MockGateway {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a retrievable checkout session.
        pub fn with_session(self, id: impl Into<String>, object: Value) -> Self {
            self.sessions.lock().unwrap().insert(id.into(), object);
            self
        }

        /// Seed a retrievable subscription.
        pub fn with_subscription(self, id: impl Into<String>, object: Value) -> Self {
            self.subscriptions.lock().unwrap().insert(id.into(), object);
            self
        }

        /// Number of provider calls made, across all operations.
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Specs passed to `create_checkout_session`, in order.
        pub fn checkout_specs(&self) -> Vec<CheckoutSessionSpec> {
            self.checkout_specs.lock().unwrap().clone()
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn create_checkout_session(
            &self,
            spec: CheckoutSessionSpec,
        ) -> Result<CreatedCheckoutSession> {
            self.record("create_checkout_session");
            let n = self.session_counter.fetch_add(1, Ordering::SeqCst);
            let id = format!("cs_mock_{n}");
            self.checkout_specs.lock().unwrap().push(spec);
            Ok(CreatedCheckoutSession {
                url: format!("https://checkout.stripe.com/c/pay/{id}"),
                session_id: id,
            })
        }

        async fn retrieve_checkout_session(&self, session_id: &str) -> Result<Value> {
            self.record("retrieve_checkout_session");
            self.sessions
                .lock()
                .unwrap()
                .get(session_id)
                .cloned()
                .ok_or_else(|| {
                    BillingError::not_found(format!("No such checkout session: '{session_id}'"))
                })
        }

        async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Value> {
            self.record("retrieve_subscription");
            self.subscriptions
                .lock()
                .unwrap()
                .get(subscription_id)
                .cloned()
                .ok_or_else(|| {
                    BillingError::not_found(format!("No such subscription: '{subscription_id}'"))
                })
        }

        async fn flag_cancel_at_period_end(&self, subscription_id: &str) -> Result<Value> {
            self.record("flag_cancel_at_period_end");
            let mut object = self
                .subscriptions
                .lock()
                .unwrap()
                .get(subscription_id)
                .cloned()
                .unwrap_or_else(|| {
                    json!({
                        "id": subscription_id,
                        "object": "subscription",
                        "status": "active",
                    })
                });
            object["cancel_at_period_end"] = json!(true);
            Ok(object)
        }

        async fn cancel_subscription_now(&self, subscription_id: &str) -> Result<Value> {
            self.record("cancel_subscription_now");
            Ok(json!({
                "id": subscription_id,
                "object": "subscription",
                "status": "canceled",
                "cancel_at_period_end": false,
            }))
        }

        async fn create_subscription_item(
            &self,
            subscription_id: &str,
            price_id: &str,
        ) -> Result<Value> {
            self.record("create_subscription_item");
            let n = self.session_counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!({
                "id": format!("si_mock_{n}"),
                "object": "subscription_item",
                "subscription": subscription_id,
                "price": { "id": price_id },
            }))
        }

        async fn delete_subscription_item(&self, item_id: &str) -> Result<Value> {
            self.record("delete_subscription_item");
            Ok(json!({
                "id": item_id,
                "object": "subscription_item",
                "deleted": true,
            }))
        }

        async fn create_portal_session(
            &self,
            _customer_id: &str,
            _return_url: &str,
        ) -> Result<String> {
            self.record("create_portal_session");
            let n = self.session_counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://billing.stripe.com/session/bps_mock_{n}"))
        }
    }
}
