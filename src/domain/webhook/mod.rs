//! Webhook ingestion domain.
//!
//! Everything between a raw provider delivery and its terminal ledger
//! status:
//!
//! - `signature` - HMAC verification and replay protection
//! - `inbound_event` - the verified wire envelope
//! - `dispatcher` - event-type routing to domain handlers
//! - `pipeline` - the verify → dedupe → log → dispatch → finalize sequence
//! - `errors` - the ingestion error taxonomy

mod dispatcher;
mod errors;
mod inbound_event;
mod pipeline;
mod signature;

pub use dispatcher::{DispatchOutcome, DomainEventHandler, EventDispatcher};
pub use errors::{HandlerError, WebhookError};
pub use inbound_event::InboundEvent;
pub use pipeline::{PipelineOutcome, WebhookPipeline};
pub use signature::{
    WebhookHeaders, WebhookVerifier, DEFAULT_MAX_CLOCK_SKEW_SECS, DEFAULT_TOLERANCE_SECS,
};
