//! HTTP DTOs for the webhook endpoint.
//!
//! These types define the JSON bodies the provider sees. They are the
//! boundary between HTTP and the pipeline; nothing here carries more than
//! a short message string.

use serde::Serialize;
use uuid::Uuid;

/// Acknowledgement body for accepted deliveries.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub success: bool,
    /// Set when the delivery was processed by this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Ledger id of the processed event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    /// Set on the dedup short-circuit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookAckResponse {
    /// Acknowledgement for a freshly processed delivery.
    pub fn processed(event_type: impl Into<String>, event_id: Uuid) -> Self {
        Self {
            success: true,
            event_type: Some(event_type.into()),
            event_id: Some(event_id),
            message: None,
        }
    }

    /// Acknowledgement for a delivery that was handled before.
    pub fn already_processed() -> Self {
        Self {
            success: true,
            event_type: None,
            event_id: None,
            message: Some("already processed".to_string()),
        }
    }
}

/// Error body for rejected deliveries.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}
