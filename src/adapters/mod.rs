//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - durable ledger and subscription store
//! - `memory` - in-memory ports for testing
//! - `http` - axum transport for the webhook endpoint

pub mod http;
pub mod memory;
pub mod postgres;
