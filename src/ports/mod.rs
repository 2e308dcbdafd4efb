//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `EventLedger` - durable, deduplicating log of accepted deliveries
//! - `SubscriptionStore` - customer/subscription persistence for the
//!   subscription event handler

mod event_ledger;
mod subscription_store;

pub use event_ledger::{
    EventLedger, EventStatus, InsertOutcome, LedgerRecord, ProcessingOutcome, StoreError,
};
pub use subscription_store::{CustomerUpsert, SubscriptionStore, SubscriptionUpsert};
