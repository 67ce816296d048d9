//! Billing Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, BillingError>;

/// Billing-related errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Missing or malformed required field in a client request
    #[error("{0}")]
    Validation(String),

    /// Referenced provider object does not exist
    #[error("{0}")]
    NotFound(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    Signature(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other failure surfaced by the payment provider.
    /// The message is passed through verbatim for operator visibility.
    #[error("{message}")]
    Provider {
        message: String,
        /// Provider-side error-type tag, if one was reported
        kind: Option<String>,
    },
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BillingError::NotFound(message.into())
    }

    pub fn provider(message: impl Into<String>, kind: Option<String>) -> Self {
        BillingError::Provider {
            message: message.into(),
            kind,
        }
    }

    /// Provider error-type tag for the error envelope, when one exists
    pub fn kind(&self) -> Option<&str> {
        match self {
            BillingError::Provider { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }
}
