//! SubscriptionStore port - persistence for the subscription event handler.
//!
//! The handler's effect is two idempotent upserts: a customer keyed on the
//! provider's customer id, then a subscription keyed on the provider's
//! subscription id. Repeating either with identical input must converge on
//! the same rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::event_ledger::StoreError;

/// Customer fields carried by a subscription event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerUpsert {
    /// Provider-assigned customer id (stable across events).
    pub external_customer_id: String,
    pub email: String,
    pub name: String,
}

/// Subscription fields carried by a subscription event.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionUpsert {
    /// Provider-assigned subscription id (stable across events).
    pub external_subscription_id: String,
    /// Internal id of the owning customer row.
    pub customer_id: Uuid,
    pub product_id: String,
    /// Normalized status ("active" or "cancelled").
    pub status: String,
    /// Billing cadence, lowercased (e.g. "month", "year").
    pub billing_interval: String,
    /// Recurring pre-tax amount in the smallest currency unit.
    pub amount: i64,
    pub currency: String,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Port for customer and subscription persistence.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or update a customer, returning its internal id.
    async fn upsert_customer(&self, customer: CustomerUpsert) -> Result<Uuid, StoreError>;

    /// Insert or update a subscription.
    async fn upsert_subscription(
        &self,
        subscription: SubscriptionUpsert,
    ) -> Result<(), StoreError>;
}
