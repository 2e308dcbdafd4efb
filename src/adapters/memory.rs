//! In-memory port implementations for testing.
//!
//! Deterministic, lock-based stands-ins for the Postgres adapters, with
//! accessors for test assertions.
//!
//! # Security Note
//!
//! These adapters are for **testing only** and should not be used in
//! production: they use `.expect()` on lock operations, which panics if a
//! lock is poisoned, and nothing is durable.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::ports::{
    CustomerUpsert, EventLedger, EventStatus, InsertOutcome, LedgerRecord, ProcessingOutcome,
    StoreError, SubscriptionStore, SubscriptionUpsert,
};

/// In-memory event ledger.
///
/// `insert_pending` performs its duplicate check and insert under a single
/// write lock, giving the same atomicity the Postgres unique index
/// provides, so concurrency tests against this ledger are meaningful.
pub struct InMemoryEventLedger {
    records: RwLock<Vec<LedgerRecord>>,
}

impl InMemoryEventLedger {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    // === Test Helpers ===

    /// Returns a snapshot of all rows (for test assertions).
    pub fn records(&self) -> Vec<LedgerRecord> {
        self.records.read().expect("ledger lock poisoned").clone()
    }
}

impl Default for InMemoryEventLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLedger for InMemoryEventLedger {
    async fn find_by_delivery_id(
        &self,
        delivery_id: &str,
    ) -> Result<Option<LedgerRecord>, StoreError> {
        let records = self.records.read().expect("ledger lock poisoned");
        Ok(records
            .iter()
            .find(|r| r.delivery_id.as_deref() == Some(delivery_id))
            .cloned())
    }

    async fn insert_pending(
        &self,
        delivery_id: Option<&str>,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<InsertOutcome, StoreError> {
        let mut records = self.records.write().expect("ledger lock poisoned");

        if let Some(id) = delivery_id {
            if records.iter().any(|r| r.delivery_id.as_deref() == Some(id)) {
                return Ok(InsertOutcome::DuplicateDelivery);
            }
        }

        let record = LedgerRecord {
            id: Uuid::new_v4(),
            delivery_id: delivery_id.map(str::to_string),
            event_type: event_type.to_string(),
            payload: payload.clone(),
            status: EventStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        records.push(record.clone());
        Ok(InsertOutcome::Inserted(record))
    }

    async fn finalize(
        &self,
        record_id: Uuid,
        outcome: ProcessingOutcome,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().expect("ledger lock poisoned");
        if let Some(record) = records.iter_mut().find(|r| r.id == record_id) {
            // Terminal states are never overwritten.
            if record.status.is_terminal() {
                return Ok(());
            }
            match outcome {
                ProcessingOutcome::Processed => {
                    record.status = EventStatus::Processed;
                }
                ProcessingOutcome::Failed(message) => {
                    record.status = EventStatus::Failed;
                    record.error_message = Some(message);
                }
            }
            record.processed_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// A customer row held by the in-memory store.
#[derive(Debug, Clone)]
pub struct StoredCustomer {
    pub id: Uuid,
    pub external_customer_id: String,
    pub email: String,
    pub name: String,
}

/// In-memory customer/subscription store.
pub struct InMemorySubscriptionStore {
    customers: RwLock<HashMap<String, StoredCustomer>>,
    subscriptions: RwLock<HashMap<String, SubscriptionUpsert>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            customers: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    // === Test Helpers ===

    pub fn customer(&self, external_id: &str) -> Option<StoredCustomer> {
        self.customers
            .read()
            .expect("store lock poisoned")
            .get(external_id)
            .cloned()
    }

    pub fn subscription(&self, external_id: &str) -> Option<SubscriptionUpsert> {
        self.subscriptions
            .read()
            .expect("store lock poisoned")
            .get(external_id)
            .cloned()
    }

    pub fn customer_count(&self) -> usize {
        self.customers.read().expect("store lock poisoned").len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().expect("store lock poisoned").len()
    }
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn upsert_customer(&self, customer: CustomerUpsert) -> Result<Uuid, StoreError> {
        let mut customers = self.customers.write().expect("store lock poisoned");
        match customers.get_mut(&customer.external_customer_id) {
            Some(existing) => {
                existing.email = customer.email;
                existing.name = customer.name;
                Ok(existing.id)
            }
            None => {
                let id = Uuid::new_v4();
                customers.insert(
                    customer.external_customer_id.clone(),
                    StoredCustomer {
                        id,
                        external_customer_id: customer.external_customer_id,
                        email: customer.email,
                        name: customer.name,
                    },
                );
                Ok(id)
            }
        }
    }

    async fn upsert_subscription(
        &self,
        subscription: SubscriptionUpsert,
    ) -> Result<(), StoreError> {
        let mut subscriptions = self.subscriptions.write().expect("store lock poisoned");
        subscriptions.insert(subscription.external_subscription_id.clone(), subscription);
        Ok(())
    }
}
