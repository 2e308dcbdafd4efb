//! Inbound webhook event envelope.
//!
//! Defines the structure for parsing provider webhook payloads after
//! signature verification. Only the fields needed to route an event are
//! interpreted here; `data` stays opaque until a domain handler picks it
//! up.

use serde::{Deserialize, Serialize};

/// A verified webhook event as sent by the provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundEvent {
    /// Provider account the event belongs to.
    #[serde(default)]
    pub business_id: Option<String>,

    /// Dot-separated event category (e.g. "subscription.active").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Provider-reported occurrence time, as transmitted.
    #[serde(default)]
    pub timestamp: Option<String>,

    /// Event-type-specific document, opaque to the pipeline.
    #[serde(default)]
    pub data: serde_json::Value,
}
