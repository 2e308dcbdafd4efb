//! Webhook error types for the ingestion pipeline.
//!
//! Defines all error conditions that can occur between receiving a raw
//! delivery and recording its terminal status, with HTTP status code
//! mapping and retryability semantics. Duplicate deliveries are not an
//! error and never appear here; the pipeline reports them as a success
//! outcome.

use axum::http::StatusCode;
use thiserror::Error;

use crate::ports::StoreError;

/// Errors that occur during webhook ingestion.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No signing secret is configured.
    ///
    /// A configuration fault, not a verification failure: the caller must
    /// answer 500 so the provider keeps retrying until an operator fixes
    /// the deployment, rather than 401 which would mark the delivery as
    /// permanently rejected.
    #[error("webhook signing secret is not configured")]
    MissingSecret,

    /// The configured secret could not be decoded as a signing key.
    #[error("webhook signing secret is malformed")]
    MalformedSecret,

    /// A required webhook header is absent.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// A webhook header carried a value that cannot be interpreted.
    #[error("malformed header {header}: {reason}")]
    MalformedHeader {
        header: &'static str,
        reason: String,
    },

    /// No candidate signature matched the computed one.
    #[error("signature verification failed")]
    BadSignature,

    /// The delivery timestamp falls outside the allowed skew window.
    #[error("timestamp outside the allowed window")]
    StaleTimestamp,

    /// The body passed verification but is not a parseable event.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The event ledger's backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The domain event handler rejected or failed to apply the event.
    /// The ledger row has already been finalized as `Failed`.
    #[error("event processing failed: {0}")]
    Handler(String),
}

impl WebhookError {
    /// Returns true if the provider should redeliver this webhook.
    ///
    /// Redelivery only helps for transient faults; a delivery the provider
    /// retries with the same signature will fail verification the same way
    /// every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingSecret | WebhookError::Store(_) | WebhookError::Handler(_)
        )
    }

    /// Maps the error to the HTTP status code returned to the provider.
    ///
    /// Status codes drive the provider's retry behavior: 2xx acknowledges,
    /// 4xx stops redelivery, 5xx triggers redelivery.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Verification failures - never retried without a new signature
            WebhookError::MalformedSecret
            | WebhookError::MissingHeader(_)
            | WebhookError::MalformedHeader { .. }
            | WebhookError::BadSignature
            | WebhookError::StaleTimestamp => StatusCode::UNAUTHORIZED,

            // Permanent input fault
            WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,

            // Configuration and transient faults - provider will retry
            WebhookError::MissingSecret
            | WebhookError::Store(_)
            | WebhookError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable category for response bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookError::MissingSecret => "configuration_error",
            WebhookError::MalformedSecret
            | WebhookError::MissingHeader(_)
            | WebhookError::MalformedHeader { .. }
            | WebhookError::BadSignature
            | WebhookError::StaleTimestamp => "verification_failed",
            WebhookError::MalformedPayload(_) => "malformed_payload",
            WebhookError::Store(_) => "store_error",
            WebhookError::Handler(_) => "processing_failed",
        }
    }
}

/// Errors raised by a domain event handler.
///
/// These are recorded verbatim into the ledger row's `error_message` and
/// reported upward as a processing failure.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A field the handler requires is absent from the payload.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The payload does not have the shape this handler expects.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The handler's own persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
