//! Subscription domain module.
//!
//! The concrete domain event handler for `subscription.*` webhook events:
//! a typed payload view and the customer/subscription upsert logic.

mod handler;
mod payload;

pub use handler::SubscriptionEventHandler;
pub use payload::{CustomerInfo, SubscriptionPayload, SubscriptionStatus};
