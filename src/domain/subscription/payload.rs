//! Typed view over the subscription event payload.
//!
//! The pipeline keeps the payload opaque; this module is the only place
//! the subscription fields are interpreted. Everything except the two
//! stable external identities is optional on the wire.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::webhook::HandlerError;

/// Normalized subscription state applied to the store.
///
/// A renewal is not a state of its own: it maps to `Active` and only
/// refreshes billing metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }
}

/// Customer identity embedded in a subscription event.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CustomerInfo {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl CustomerInfo {
    /// Display name, falling back to the email address.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.email,
        }
    }
}

/// Subscription event payload as sent by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionPayload {
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerInfo>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub recurring_pre_tax_amount: Option<i64>,
    #[serde(default)]
    pub payment_frequency_interval: Option<String>,
    #[serde(default)]
    pub next_billing_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl SubscriptionPayload {
    /// Parses the opaque event data into the typed payload.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, HandlerError> {
        serde_json::from_value(value.clone())
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))
    }

    /// The provider's subscription id; required for the upsert.
    pub fn require_subscription_id(&self) -> Result<&str, HandlerError> {
        self.subscription_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(HandlerError::MissingField("subscription_id"))
    }

    /// The provider's customer identity; required for the upsert.
    pub fn require_customer(&self) -> Result<&CustomerInfo, HandlerError> {
        self.customer
            .as_ref()
            .filter(|c| !c.customer_id.is_empty())
            .ok_or(HandlerError::MissingField("customer_id"))
    }

    /// Billing cadence, lowercased, defaulting to monthly.
    pub fn billing_interval(&self) -> String {
        self.payment_frequency_interval
            .as_deref()
            .filter(|i| !i.is_empty())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "month".to_string())
    }
}
