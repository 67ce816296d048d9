//! Webhook Signature Verification
//!
//! Implements Stripe's v1 signing scheme for webhook payloads: the
//! `stripe-signature` header carries `t=<unix>,v1=<hex>`, where the
//! signature is HMAC-SHA256 over `{timestamp}.{raw body}` keyed with the
//! `whsec_` secret. Verification requires the exact bytes as sent; a
//! reparsed body will not match. Comparison is constant-time and the
//! timestamp is bounded to reject replays.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{BillingError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Default replay window: Stripe recommends 5 minutes.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);
/// Tolerated clock drift for timestamps in the future.
const DEFAULT_MAX_DRIFT: Duration = Duration::from_secs(60);

/// Parsed `stripe-signature` header components.
#[derive(Debug, Clone)]
struct ParsedSignature {
    timestamp: i64,
    signature: String,
}

/// Verifier for signed webhook payloads.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    max_age: Duration,
    max_drift: Duration,
}

impl SignatureVerifier {
    pub fn new(webhook_secret: &str) -> Self {
        Self {
            secret: webhook_secret.as_bytes().to_vec(),
            max_age: DEFAULT_MAX_AGE,
            max_drift: DEFAULT_MAX_DRIFT,
        }
    }

    /// Verify the signature header against the raw request body.
    ///
    /// Any failure (malformed header, stale timestamp, mismatch) is a
    /// [`BillingError::Signature`]; the payload must not be processed.
    pub fn verify(&self, signature_header: &str, payload: &[u8]) -> Result<()> {
        let parsed = self.parse_signature_header(signature_header)?;
        self.validate_timestamp(parsed.timestamp)?;

        let expected = self.compute_signature(parsed.timestamp, payload);

        if !constant_time_eq(&parsed.signature, &expected) {
            tracing::warn!(
                timestamp = parsed.timestamp,
                "webhook signature verification failed"
            );
            return Err(BillingError::Signature(
                "signature does not match payload".into(),
            ));
        }

        Ok(())
    }

    /// Format: `t=1614556800,v1=abcdef...`; other schemes are ignored for
    /// forward compatibility.
    fn parse_signature_header(&self, header: &str) -> Result<ParsedSignature> {
        let mut timestamp: Option<i64> = None;
        let mut signature: Option<String> = None;

        for part in header.split(',') {
            let part = part.trim();
            if let Some(value) = part.strip_prefix("t=") {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    BillingError::Signature("invalid timestamp in signature header".into())
                })?);
            } else if let Some(value) = part.strip_prefix("v1=") {
                signature = Some(value.to_string());
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| BillingError::Signature("missing timestamp (t=)".into()))?;
        let signature =
            signature.ok_or_else(|| BillingError::Signature("missing v1 signature".into()))?;

        // SHA-256 is 32 bytes = 64 hex chars
        if signature.len() != 64 || !signature.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BillingError::Signature(
                "v1 signature is not 64 hex characters".into(),
            ));
        }

        Ok(ParsedSignature {
            timestamp,
            signature,
        })
    }

    fn validate_timestamp(&self, timestamp: i64) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| BillingError::Signature(e.to_string()))?
            .as_secs() as i64;

        let age = now - timestamp;

        if age > self.max_age.as_secs() as i64 {
            return Err(BillingError::Signature(format!(
                "timestamp too old ({age}s, max {}s)",
                self.max_age.as_secs()
            )));
        }

        if age < -(self.max_drift.as_secs() as i64) {
            return Err(BillingError::Signature(format!(
                "timestamp {}s in the future",
                -age
            )));
        }

        Ok(())
    }

    /// HMAC-SHA256 over `{timestamp}.{raw body}`, lowercase hex.
    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Produce a valid header value for a payload. Used to forge signed
    /// requests in tests and local tooling.
    #[doc(hidden)]
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        format!("t={timestamp},v1={}", self.compute_signature(timestamp, payload))
    }
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
