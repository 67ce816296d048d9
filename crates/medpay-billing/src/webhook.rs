//! Webhook Handling
//!
//! Each delivery makes a single pass: received -> verified -> dispatched.
//! Verification failure is the only fatal path. Once the signature checks
//! out the event is classified on its `type` field, a structured summary is
//! logged, and the delivery is acknowledged, including unrecognized types,
//! since anything short of an acknowledgment makes the provider retry.
//!
//! No event is persisted or turned into local state; durable state lives
//! entirely with the provider.

use serde_json::Value;

use crate::error::Result;
use crate::signature::SignatureVerifier;

/// Classified webhook event with the fields worth logging.
#[derive(Clone, Debug, PartialEq)]
pub enum WebhookEvent {
    /// Checkout completed, payment collected
    CheckoutCompleted {
        session_id: String,
        customer_email: Option<String>,
        amount_total: Option<i64>,
    },

    SubscriptionCreated {
        subscription_id: String,
        customer_id: Option<String>,
        status: Option<String>,
    },

    SubscriptionUpdated {
        subscription_id: String,
        status: Option<String>,
        current_period_end: Option<i64>,
    },

    SubscriptionDeleted {
        subscription_id: String,
        customer_id: Option<String>,
    },

    InvoicePaid {
        invoice_id: String,
        amount_paid: Option<i64>,
        subscription_id: Option<String>,
    },

    InvoicePaymentFailed {
        invoice_id: String,
        customer_id: Option<String>,
        attempt_count: Option<i64>,
    },

    CustomerCreated {
        customer_id: String,
        email: Option<String>,
    },

    /// Anything else: logged and acknowledged, never rejected
    Other { event_type: String },
}

/// Verifies and dispatches inbound webhook deliveries.
pub struct WebhookHandler {
    verifier: SignatureVerifier,
}

impl WebhookHandler {
    pub fn new(verifier: SignatureVerifier) -> Self {
        Self { verifier }
    }

    /// Process one delivery: verify the signature over the exact raw bytes,
    /// classify, log. Returns the classified event; the transport answers
    /// with an acknowledgment whenever this returns `Ok`.
    pub fn handle(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent> {
        self.verifier.verify(signature_header, payload)?;

        let event = match serde_json::from_slice::<Value>(payload) {
            Ok(body) => classify(&body),
            Err(error) => {
                // Signed but unparsable: still acknowledged to stop retries.
                tracing::warn!(%error, "verified webhook payload is not valid JSON");
                WebhookEvent::Other {
                    event_type: "unknown".into(),
                }
            }
        };

        log_event(&event);
        Ok(event)
    }
}

/// Branch on the declared `type` field of a verified event body.
pub fn classify(body: &Value) -> WebhookEvent {
    let event_type = body["type"].as_str().unwrap_or("unknown");
    let object = &body["data"]["object"];

    match event_type {
        "checkout.session.completed" => WebhookEvent::CheckoutCompleted {
            session_id: str_field(object, "id"),
            customer_email: object["customer_email"].as_str().map(String::from),
            amount_total: object["amount_total"].as_i64(),
        },
        "customer.subscription.created" => WebhookEvent::SubscriptionCreated {
            subscription_id: str_field(object, "id"),
            customer_id: object["customer"].as_str().map(String::from),
            status: object["status"].as_str().map(String::from),
        },
        "customer.subscription.updated" => WebhookEvent::SubscriptionUpdated {
            subscription_id: str_field(object, "id"),
            status: object["status"].as_str().map(String::from),
            current_period_end: object["current_period_end"].as_i64(),
        },
        "customer.subscription.deleted" => WebhookEvent::SubscriptionDeleted {
            subscription_id: str_field(object, "id"),
            customer_id: object["customer"].as_str().map(String::from),
        },
        "invoice.payment_succeeded" => WebhookEvent::InvoicePaid {
            invoice_id: str_field(object, "id"),
            amount_paid: object["amount_paid"].as_i64(),
            subscription_id: object["subscription"].as_str().map(String::from),
        },
        "invoice.payment_failed" => WebhookEvent::InvoicePaymentFailed {
            invoice_id: str_field(object, "id"),
            customer_id: object["customer"].as_str().map(String::from),
            attempt_count: object["attempt_count"].as_i64(),
        },
        "customer.created" => WebhookEvent::CustomerCreated {
            customer_id: str_field(object, "id"),
            email: object["email"].as_str().map(String::from),
        },
        other => WebhookEvent::Other {
            event_type: other.to_string(),
        },
    }
}

fn str_field(object: &Value, key: &str) -> String {
    object[key].as_str().unwrap_or_default().to_string()
}

fn log_event(event: &WebhookEvent) {
    match event {
        WebhookEvent::CheckoutCompleted {
            session_id,
            customer_email,
            amount_total,
        } => {
            tracing::info!(
                session_id = %session_id,
                customer_email = ?customer_email,
                amount_total = ?amount_total,
                "payment successful"
            );
        }
        WebhookEvent::SubscriptionCreated {
            subscription_id,
            customer_id,
            status,
        } => {
            tracing::info!(
                subscription_id = %subscription_id,
                customer_id = ?customer_id,
                status = ?status,
                "subscription created"
            );
        }
        WebhookEvent::SubscriptionUpdated {
            subscription_id,
            status,
            current_period_end,
        } => {
            tracing::info!(
                subscription_id = %subscription_id,
                status = ?status,
                current_period_end = ?current_period_end,
                "subscription updated"
            );
        }
        WebhookEvent::SubscriptionDeleted {
            subscription_id,
            customer_id,
        } => {
            tracing::info!(
                subscription_id = %subscription_id,
                customer_id = ?customer_id,
                "subscription canceled"
            );
        }
        WebhookEvent::InvoicePaid {
            invoice_id,
            amount_paid,
            subscription_id,
        } => {
            tracing::info!(
                invoice_id = %invoice_id,
                amount_paid = ?amount_paid,
                subscription_id = ?subscription_id,
                "invoice paid"
            );
        }
        WebhookEvent::InvoicePaymentFailed {
            invoice_id,
            customer_id,
            attempt_count,
        } => {
            tracing::warn!(
                invoice_id = %invoice_id,
                customer_id = ?customer_id,
                attempt_count = ?attempt_count,
                "invoice payment failed"
            );
        }
        WebhookEvent::CustomerCreated { customer_id, email } => {
            tracing::info!(
                customer_id = %customer_id,
                email = ?email,
                "customer created"
            );
        }
        WebhookEvent::Other { event_type } => {
            tracing::debug!(event_type = %event_type, "unhandled webhook event");
        }
    }
}
