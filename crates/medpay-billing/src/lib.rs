//! # medpay-billing
//!
//! Stripe billing layer for the medpay gateway. This crate owns every
//! interaction with the payment provider; the HTTP server is a thin shim
//! over the operations exported here.
//!
//! ```text
//! ┌────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │   Client   │────▶│  medpay-server   │────▶│  medpay-billing │──▶ Stripe
//! │  (browser) │     │  (axum shims)    │     │  (this crate)   │
//! └────────────┘     └──────────────────┘     └─────────────────┘
//!                                                      ▲
//!                        signed webhook deliveries ────┘
//! ```
//!
//! Nothing here outlives one request/response cycle: there is no store, no
//! cache, and no reconciliation. Customers, subscriptions, sessions, and
//! invoices are all provider-owned and are returned to callers verbatim.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medpay_billing::{BillingConfig, CheckoutRequest, StripeGateway, checkout};
//!
//! let config = BillingConfig::from_env()?;
//! let gateway = StripeGateway::new(&config);
//!
//! let session = checkout::create_subscription_session(&gateway, &config, CheckoutRequest {
//!     price_id: Some("price_123".into()),
//!     ..Default::default()
//! }).await?;
//!
//! // Redirect the customer to: session.url
//! ```

pub mod checkout;
pub mod portal;
pub mod subscription;
pub mod webhook;

mod config;
mod error;
mod gateway;
mod live;
mod signature;

pub use checkout::CheckoutRequest;
pub use config::BillingConfig;
pub use error::{BillingError, Result};
pub use gateway::{
    CheckoutMode, CheckoutSessionSpec, CreatedCheckoutSession, PaymentGateway,
};
pub use live::StripeGateway;
pub use portal::PortalRequest;
pub use signature::SignatureVerifier;
pub use subscription::{
    AddSubscriptionItemRequest, CancelSubscriptionRequest, RemoveSubscriptionItemRequest,
};
pub use webhook::{WebhookEvent, WebhookHandler};

#[cfg(feature = "mock-gateway")]
pub use gateway::mock::MockGateway;
