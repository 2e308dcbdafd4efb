//! Webhook verification configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Webhook verification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Shared signing secret from the provider dashboard (whsec_...)
    pub signing_secret: String,

    /// Maximum delivery age accepted, in seconds
    #[serde(default = "default_tolerance")]
    pub tolerance_secs: i64,

    /// Clock skew allowed for future timestamps, in seconds
    #[serde(default = "default_max_clock_skew")]
    pub max_clock_skew_secs: i64,
}

impl WebhookConfig {
    /// Validate webhook configuration
    ///
    /// The secret is required here, at startup: a missing secret must
    /// never degrade into per-request 401s.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.signing_secret.is_empty() {
            return Err(ValidationError::MissingRequired("WEBHOOK_SIGNING_SECRET"));
        }
        if self.tolerance_secs <= 0 || self.max_clock_skew_secs < 0 {
            return Err(ValidationError::InvalidToleranceWindow);
        }
        Ok(())
    }
}

fn default_tolerance() -> i64 {
    crate::domain::webhook::DEFAULT_TOLERANCE_SECS
}

fn default_max_clock_skew() -> i64 {
    crate::domain::webhook::DEFAULT_MAX_CLOCK_SKEW_SECS
}
