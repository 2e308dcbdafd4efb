//! Subscription event handler.
//!
//! Applies one subscription event to domain state: upsert the customer,
//! then upsert the subscription under the normalized status. Both writes
//! key on the provider's stable external identities, so replaying the
//! same payload converges on the same rows.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::webhook::{DomainEventHandler, HandlerError};
use crate::ports::{CustomerUpsert, SubscriptionStore, SubscriptionUpsert};

use super::payload::{SubscriptionPayload, SubscriptionStatus};

/// Handler for `subscription.*` events.
pub struct SubscriptionEventHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriptionEventHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Resolves the status the subscription row should end up in.
    ///
    /// The dispatcher's normalized status wins; the payload's own status
    /// field is a fallback for routes registered without one.
    fn resolve_status(
        payload: &SubscriptionPayload,
        registered: Option<&str>,
    ) -> Result<SubscriptionStatus, HandlerError> {
        let raw = registered
            .or(payload.status.as_deref())
            .unwrap_or("active");
        SubscriptionStatus::parse(raw)
            .ok_or_else(|| HandlerError::InvalidPayload(format!("unsupported status: {}", raw)))
    }
}

#[async_trait]
impl DomainEventHandler for SubscriptionEventHandler {
    async fn handle(
        &self,
        payload: &serde_json::Value,
        status: Option<&str>,
    ) -> Result<(), HandlerError> {
        let event = SubscriptionPayload::from_value(payload)?;
        let customer = event.require_customer()?;
        let subscription_id = event.require_subscription_id()?;
        let status = Self::resolve_status(&event, status)?;

        let customer_id = self
            .store
            .upsert_customer(CustomerUpsert {
                external_customer_id: customer.customer_id.clone(),
                email: customer.email.clone(),
                name: customer.display_name().to_string(),
            })
            .await?;

        self.store
            .upsert_subscription(SubscriptionUpsert {
                external_subscription_id: subscription_id.to_string(),
                customer_id,
                product_id: event
                    .product_id
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                status: status.as_str().to_string(),
                billing_interval: event.billing_interval(),
                amount: event.recurring_pre_tax_amount.unwrap_or(0),
                currency: event.currency.clone().unwrap_or_else(|| "USD".to_string()),
                next_billing_date: event.next_billing_date,
                cancelled_at: event.cancelled_at,
            })
            .await?;

        tracing::info!(
            subscription_id,
            customer_id = %customer.customer_id,
            status = status.as_str(),
            "subscription upserted"
        );

        Ok(())
    }
}
