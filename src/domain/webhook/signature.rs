//! Webhook signature verification.
//!
//! Implements verification of the provider's standard-webhooks signing
//! scheme: the signed content is `{id}.{timestamp}.{body}`, MACed with
//! HMAC-SHA256 under a base64-encoded shared secret, and the signature
//! header carries one or more space-delimited base64 candidates. Includes
//! timestamp validation to prevent replay attacks.
//!
//! Verification is pure: no side effects, and nothing is written anywhere
//! until a delivery has passed this gate.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed age for a delivery (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Maximum allowed clock skew for future timestamps (1 minute).
pub const DEFAULT_MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Timestamps above this are interpreted as milliseconds since epoch.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// The webhook header triple as extracted from a request.
///
/// All values are optional at this level; the verifier decides which
/// absences are fatal. The delivery id doubles as the idempotency key
/// downstream, where an empty value counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookHeaders {
    /// `webhook-id` header value.
    pub id: Option<String>,
    /// `webhook-signature` header value (space-delimited candidates).
    pub signature: Option<String>,
    /// `webhook-timestamp` header value (seconds or ms since epoch).
    pub timestamp: Option<String>,
}

impl WebhookHeaders {
    pub fn new(
        id: Option<String>,
        signature: Option<String>,
        timestamp: Option<String>,
    ) -> Self {
        Self {
            id,
            signature,
            timestamp,
        }
    }

    /// The delivery id used for deduplication, `None` when absent or empty.
    pub fn delivery_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// The id as it participates in the signed content: an absent header
    /// signs as the empty string, mirroring what permissive transports
    /// forward.
    fn signing_id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }
}

/// Verifier for provider webhook signatures.
pub struct WebhookVerifier {
    /// Shared signing secret, `whsec_`-prefixed base64.
    secret: SecretString,
    tolerance_secs: i64,
    max_clock_skew_secs: i64,
}

impl WebhookVerifier {
    /// Creates a verifier with the given signing secret and default
    /// timestamp window.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::new(secret.into()),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
            max_clock_skew_secs: DEFAULT_MAX_CLOCK_SKEW_SECS,
        }
    }

    /// Overrides the replay-protection window.
    pub fn with_tolerance(mut self, tolerance_secs: i64, max_clock_skew_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self.max_clock_skew_secs = max_clock_skew_secs;
        self
    }

    /// Verifies that `raw_body` was signed by the configured secret.
    ///
    /// # Verification steps
    ///
    /// 1. Decode the signing key from the configured secret
    /// 2. Validate the timestamp against the replay window
    /// 3. Compute HMAC-SHA256 over `{id}.{timestamp}.{body}`
    /// 4. Compare against every `v1` candidate in the signature header
    ///    using constant-time comparison; any match succeeds
    ///
    /// The body must be the raw received bytes: re-serialization before
    /// this point would change the MAC input.
    ///
    /// # Errors
    ///
    /// - `MissingSecret` / `MalformedSecret` - configuration faults
    /// - `MissingHeader` / `MalformedHeader` - unverifiable request
    /// - `StaleTimestamp` - outside the allowed window
    /// - `BadSignature` - no candidate matched
    pub fn verify(&self, raw_body: &[u8], headers: &WebhookHeaders) -> Result<(), WebhookError> {
        let key = self.signing_key()?;

        let timestamp_raw = headers
            .timestamp
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(WebhookError::MissingHeader("webhook-timestamp"))?;
        let timestamp: i64 =
            timestamp_raw
                .trim()
                .parse()
                .map_err(|_| WebhookError::MalformedHeader {
                    header: "webhook-timestamp",
                    reason: "not a unix timestamp".to_string(),
                })?;
        self.validate_timestamp(normalize_to_seconds(timestamp))?;

        let signature_header = headers
            .signature
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(WebhookError::MissingHeader("webhook-signature"))?;

        // The MAC covers the timestamp exactly as transmitted, not the
        // normalized value.
        let expected = compute_signature(&key, headers.signing_id(), timestamp_raw, raw_body);

        for candidate in signature_header.split_whitespace() {
            let encoded = match candidate.split_once(',') {
                // Versioned candidate: only v1 is HMAC-SHA256.
                Some(("v1", sig)) => sig,
                Some(_) => continue,
                None => candidate,
            };
            let Ok(decoded) = STANDARD.decode(encoded) else {
                continue;
            };
            if constant_time_compare(&expected, &decoded) {
                return Ok(());
            }
        }

        Err(WebhookError::BadSignature)
    }

    /// Decodes the configured secret into raw key bytes.
    fn signing_key(&self) -> Result<Vec<u8>, WebhookError> {
        let secret = self.secret.expose_secret();
        if secret.is_empty() {
            return Err(WebhookError::MissingSecret);
        }
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        STANDARD
            .decode(encoded)
            .map_err(|_| WebhookError::MalformedSecret)
    }

    /// Validates that the timestamp is within the replay window.
    fn validate_timestamp(&self, timestamp: i64) -> Result<(), WebhookError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > self.tolerance_secs {
            return Err(WebhookError::StaleTimestamp);
        }
        if age < -self.max_clock_skew_secs {
            return Err(WebhookError::StaleTimestamp);
        }

        Ok(())
    }
}

/// Computes the HMAC-SHA256 over the signed content `{id}.{ts}.{body}`.
fn compute_signature(key: &[u8], id: &str, timestamp_raw: &str, body: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(timestamp_raw.as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

/// Interprets millisecond timestamps as seconds.
fn normalize_to_seconds(timestamp: i64) -> i64 {
    if timestamp > MILLIS_THRESHOLD {
        timestamp / 1000
    } else {
        timestamp
    }
}

/// Constant-time comparison of two byte slices.
///
/// Prevents timing attacks that could leak information about the expected
/// signature.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
