//! Event dispatcher - routes verified events to domain handlers.
//!
//! Holds the mapping from an event's declared type to a registered
//! handler, optionally with a normalized status argument (several event
//! types can share a handler and differ only in the status they carry).
//!
//! Unknown event types are accepted and logged but not dispatched; new
//! provider event types must never break ingestion.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::errors::HandlerError;

/// Handler applying one event's business effect to domain state.
///
/// Implementations must be idempotent with respect to repeated identical
/// payloads: the pipeline deduplicates on delivery id, but a provider that
/// re-sends the same event under a fresh id will reach the handler again.
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    /// Applies the event. `status` is the normalized status the route was
    /// registered with, if any.
    async fn handle(
        &self,
        payload: &serde_json::Value,
        status: Option<&str>,
    ) -> Result<(), HandlerError>;
}

/// Result of a dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A registered handler ran to completion.
    Handled,
    /// No handler is registered for the event type; the event is logged
    /// but intentionally not acted upon.
    NoHandler,
}

struct Route {
    handler: Arc<dyn DomainEventHandler>,
    status: Option<String>,
}

/// Maps event types to handlers and invokes them.
#[derive(Default)]
pub struct EventDispatcher {
    routes: HashMap<String, Route>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for an event type.
    pub fn register(&mut self, event_type: &str, handler: Arc<dyn DomainEventHandler>) {
        self.routes.insert(
            event_type.to_string(),
            Route {
                handler,
                status: None,
            },
        );
    }

    /// Registers a handler invoked with a normalized status argument.
    pub fn register_with_status(
        &mut self,
        event_type: &str,
        handler: Arc<dyn DomainEventHandler>,
        status: &str,
    ) {
        self.routes.insert(
            event_type.to_string(),
            Route {
                handler,
                status: Some(status.to_string()),
            },
        );
    }

    /// Returns true if a handler is registered for the event type.
    pub fn has_handler(&self, event_type: &str) -> bool {
        self.routes.contains_key(event_type)
    }

    /// Dispatches an event to its handler, invoking it exactly once.
    ///
    /// An unregistered event type is a successful no-op.
    pub async fn dispatch(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<DispatchOutcome, HandlerError> {
        match self.routes.get(event_type) {
            Some(route) => {
                route
                    .handler
                    .handle(payload, route.status.as_deref())
                    .await?;
                Ok(DispatchOutcome::Handled)
            }
            None => {
                tracing::info!(event_type, "no handler registered, event logged only");
                Ok(DispatchOutcome::NoHandler)
            }
        }
    }
}
