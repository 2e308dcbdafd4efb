//! Billing Webhooks - Idempotent payment webhook ingestion.
//!
//! Ingests asynchronous event notifications from the payment provider and
//! applies them exactly once to a durable store: signature verification,
//! duplicate detection, durable event logging, dispatch to a type-specific
//! handler, and terminal status recording.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
