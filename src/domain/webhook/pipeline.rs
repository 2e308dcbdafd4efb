//! Webhook pipeline - orchestrates exactly-once event ingestion.
//!
//! Composes verification, deduplication, durable logging, dispatch, and
//! terminal status recording into one request-handling sequence:
//!
//! 1. Verify the signature (nothing is written for unverified input)
//! 2. Parse the envelope (still nothing written for malformed input)
//! 3. Look up the delivery id; a prior row short-circuits as already
//!    handled, whatever its status
//! 4. Insert a `Pending` row; a uniqueness conflict here is the same
//!    short-circuit, just decided by the store instead of the read
//! 5. Dispatch to the domain handler
//! 6. Finalize the row as `Processed` or `Failed` from a single call site
//!
//! ## Race condition handling
//!
//! The dedupe read is advisory; the insert's uniqueness constraint is
//! authoritative. When two deliveries of the same id race, exactly one
//! insert lands and the other request answers "already processed" without
//! invoking the handler.
//!
//! ## Failure handling
//!
//! Once a `Pending` row exists, every exit path finalizes it, so operators
//! can always distinguish "never attempted" from "attempted and failed".
//! A handler failure is recorded into the row and still reported upward as
//! an error: the non-2xx response asks the provider to redeliver, and the
//! redelivery (same id) will then short-circuit at the dedup gate.

use std::sync::Arc;

use uuid::Uuid;

use crate::ports::{EventLedger, InsertOutcome, ProcessingOutcome};

use super::dispatcher::{DispatchOutcome, EventDispatcher};
use super::errors::WebhookError;
use super::inbound_event::InboundEvent;
use super::signature::{WebhookHeaders, WebhookVerifier};

/// Terminal result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The delivery was logged and dispatched; `event_id` is the ledger
    /// row's store-assigned id.
    Processed {
        event_id: Uuid,
        event_type: String,
    },
    /// A delivery with the same id was handled before (or is being handled
    /// concurrently); nothing was re-processed.
    AlreadyProcessed,
}

/// The webhook ingestion pipeline.
///
/// Stateless apart from its collaborators; safe for arbitrary parallel
/// invocation.
pub struct WebhookPipeline {
    verifier: WebhookVerifier,
    ledger: Arc<dyn EventLedger>,
    dispatcher: EventDispatcher,
}

impl WebhookPipeline {
    pub fn new(
        verifier: WebhookVerifier,
        ledger: Arc<dyn EventLedger>,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            verifier,
            ledger,
            dispatcher,
        }
    }

    /// Runs one delivery through the pipeline.
    ///
    /// `raw_body` must be the unparsed received bytes; parsing happens
    /// only after the signature over those bytes has been verified.
    pub async fn process(
        &self,
        raw_body: &[u8],
        headers: &WebhookHeaders,
    ) -> Result<PipelineOutcome, WebhookError> {
        self.verifier.verify(raw_body, headers)?;

        let event: InboundEvent = serde_json::from_slice(raw_body)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        let delivery_id = headers.delivery_id();

        // Advisory dedup read; absent id means dedup is impossible and
        // every delivery is processed.
        if let Some(id) = delivery_id {
            if self.ledger.find_by_delivery_id(id).await?.is_some() {
                tracing::info!(delivery_id = id, "duplicate delivery, skipping");
                return Ok(PipelineOutcome::AlreadyProcessed);
            }
        }

        // Authoritative write; losing the insert race is equivalent to
        // having found the row above.
        let record = match self
            .ledger
            .insert_pending(delivery_id, &event.event_type, &event.data)
            .await?
        {
            InsertOutcome::Inserted(record) => record,
            InsertOutcome::DuplicateDelivery => {
                tracing::info!(
                    delivery_id = delivery_id.unwrap_or(""),
                    "concurrent duplicate delivery, skipping"
                );
                return Ok(PipelineOutcome::AlreadyProcessed);
            }
        };

        tracing::info!(
            event_id = %record.id,
            event_type = %event.event_type,
            delivery_id = delivery_id.unwrap_or(""),
            "event logged, dispatching"
        );

        // The row is finalized from this single call site on every path.
        let dispatched = self.dispatcher.dispatch(&event.event_type, &event.data).await;
        let outcome = match &dispatched {
            Ok(_) => ProcessingOutcome::Processed,
            Err(e) => ProcessingOutcome::Failed(e.to_string()),
        };
        self.ledger.finalize(record.id, outcome).await?;

        match dispatched {
            Ok(DispatchOutcome::Handled) => {
                tracing::info!(event_id = %record.id, "event processed");
                Ok(PipelineOutcome::Processed {
                    event_id: record.id,
                    event_type: event.event_type,
                })
            }
            Ok(DispatchOutcome::NoHandler) => Ok(PipelineOutcome::Processed {
                event_id: record.id,
                event_type: event.event_type,
            }),
            Err(e) => {
                tracing::error!(
                    event_id = %record.id,
                    event_type = %event.event_type,
                    error = %e,
                    "event processing failed"
                );
                Err(WebhookError::Handler(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryEventLedger;
    use crate::domain::webhook::dispatcher::DomainEventHandler;
    use crate::domain::webhook::errors::HandlerError;
    use crate::ports::EventStatus;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TEST_SECRET: &str = "whsec_dGVzdC1zaWduaW5nLWtleS0wMTIzNDU2Nzg5";

    // ══════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ══════════════════════════════════════════════════════════════

    struct CountingHandler {
        call_count: AtomicU32,
        should_fail: bool,
    }

    impl CountingHandler {
        fn new() -> Self {
            Self {
                call_count: AtomicU32::new(0),
                should_fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                call_count: AtomicU32::new(0),
                should_fail: true,
            }
        }

        fn call_count(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DomainEventHandler for CountingHandler {
        async fn handle(
            &self,
            _payload: &serde_json::Value,
            _status: Option<&str>,
        ) -> Result<(), HandlerError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(HandlerError::MissingField("customer_id"))
            } else {
                Ok(())
            }
        }
    }

    fn sign(id: &str, timestamp: &str, payload: &[u8]) -> String {
        let key = STANDARD
            .decode(TEST_SECRET.strip_prefix("whsec_").unwrap())
            .unwrap();
        let mut mac = Hmac::<Sha256>::new_from_slice(&key).unwrap();
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes()))
    }

    fn signed_headers(id: &str, body: &[u8]) -> WebhookHeaders {
        let ts = chrono::Utc::now().timestamp().to_string();
        WebhookHeaders::new(
            Some(id.to_string()),
            Some(sign(id, &ts, body)),
            Some(ts),
        )
    }

    fn subscription_body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "type": "subscription.active",
            "data": {"subscription_id": "sub_1"}
        }))
        .unwrap()
    }

    fn pipeline_with(
        handler: Arc<CountingHandler>,
        ledger: Arc<InMemoryEventLedger>,
    ) -> WebhookPipeline {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_with_status("subscription.active", handler, "active");
        WebhookPipeline::new(WebhookVerifier::new(TEST_SECRET), ledger, dispatcher)
    }

    // ══════════════════════════════════════════════════════════════
    // Success Path Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn processes_new_delivery() {
        let handler = Arc::new(CountingHandler::new());
        let ledger = Arc::new(InMemoryEventLedger::new());
        let pipeline = pipeline_with(handler.clone(), ledger.clone());
        let body = subscription_body();

        let outcome = pipeline
            .process(&body, &signed_headers("del_1", &body))
            .await
            .unwrap();

        assert!(matches!(outcome, PipelineOutcome::Processed { .. }));
        assert_eq!(handler.call_count(), 1);

        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, EventStatus::Processed);
        assert_eq!(records[0].delivery_id.as_deref(), Some("del_1"));
        assert!(records[0].processed_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_delivery_short_circuits() {
        let handler = Arc::new(CountingHandler::new());
        let ledger = Arc::new(InMemoryEventLedger::new());
        let pipeline = pipeline_with(handler.clone(), ledger.clone());
        let body = subscription_body();

        pipeline
            .process(&body, &signed_headers("del_1", &body))
            .await
            .unwrap();
        let second = pipeline
            .process(&body, &signed_headers("del_1", &body))
            .await
            .unwrap();

        assert_eq!(second, PipelineOutcome::AlreadyProcessed);
        assert_eq!(handler.call_count(), 1);
        assert_eq!(ledger.records().len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_is_not_retried_on_redelivery() {
        // A redelivered id short-circuits even when the first attempt
        // failed; Failed rows are the operator surface, not a retry queue.
        let handler = Arc::new(CountingHandler::failing());
        let ledger = Arc::new(InMemoryEventLedger::new());
        let pipeline = pipeline_with(handler.clone(), ledger.clone());
        let body = subscription_body();

        let first = pipeline.process(&body, &signed_headers("del_1", &body)).await;
        assert!(first.is_err());

        let second = pipeline
            .process(&body, &signed_headers("del_1", &body))
            .await
            .unwrap();

        assert_eq!(second, PipelineOutcome::AlreadyProcessed);
        assert_eq!(handler.call_count(), 1);
    }

    #[tokio::test]
    async fn missing_delivery_id_disables_dedup() {
        let handler = Arc::new(CountingHandler::new());
        let ledger = Arc::new(InMemoryEventLedger::new());
        let pipeline = pipeline_with(handler.clone(), ledger.clone());
        let body = subscription_body();

        for _ in 0..3 {
            let ts = chrono::Utc::now().timestamp().to_string();
            let headers = WebhookHeaders::new(
                None,
                Some(sign("", &ts, &body)),
                Some(ts),
            );
            let outcome = pipeline.process(&body, &headers).await.unwrap();
            assert!(matches!(outcome, PipelineOutcome::Processed { .. }));
        }

        assert_eq!(handler.call_count(), 3);
        assert_eq!(ledger.records().len(), 3);
        assert!(ledger.records().iter().all(|r| r.delivery_id.is_none()));
    }

    #[tokio::test]
    async fn unknown_event_type_is_logged_as_processed() {
        let handler = Arc::new(CountingHandler::new());
        let ledger = Arc::new(InMemoryEventLedger::new());
        let pipeline = pipeline_with(handler.clone(), ledger.clone());
        let body = serde_json::to_vec(&serde_json::json!({
            "type": "license_key.created",
            "data": {}
        }))
        .unwrap();

        let outcome = pipeline
            .process(&body, &signed_headers("del_lk", &body))
            .await
            .unwrap();

        assert!(matches!(outcome, PipelineOutcome::Processed { .. }));
        assert_eq!(handler.call_count(), 0);
        assert_eq!(ledger.records()[0].status, EventStatus::Processed);
    }

    // ══════════════════════════════════════════════════════════════
    // Failure Path Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn handler_failure_finalizes_failed_and_reports_error() {
        let handler = Arc::new(CountingHandler::failing());
        let ledger = Arc::new(InMemoryEventLedger::new());
        let pipeline = pipeline_with(handler.clone(), ledger.clone());
        let body = subscription_body();

        let result = pipeline.process(&body, &signed_headers("del_1", &body)).await;

        assert!(matches!(result, Err(WebhookError::Handler(_))));
        let records = ledger.records();
        assert_eq!(records[0].status, EventStatus::Failed);
        let message = records[0].error_message.as_deref().unwrap();
        assert!(!message.is_empty());
        assert!(message.contains("customer_id"));
    }

    #[tokio::test]
    async fn bad_signature_writes_nothing() {
        let handler = Arc::new(CountingHandler::new());
        let ledger = Arc::new(InMemoryEventLedger::new());
        let pipeline = pipeline_with(handler.clone(), ledger.clone());
        let body = subscription_body();
        let mut headers = signed_headers("del_1", &body);
        headers.signature = Some("v1,AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string());

        let result = pipeline.process(&body, &headers).await;

        assert!(matches!(result, Err(WebhookError::BadSignature)));
        assert_eq!(ledger.records().len(), 0);
        assert_eq!(handler.call_count(), 0);
    }

    #[tokio::test]
    async fn malformed_body_writes_nothing() {
        let handler = Arc::new(CountingHandler::new());
        let ledger = Arc::new(InMemoryEventLedger::new());
        let pipeline = pipeline_with(handler.clone(), ledger.clone());
        let body = b"not json".to_vec();

        let result = pipeline.process(&body, &signed_headers("del_1", &body)).await;

        assert!(matches!(result, Err(WebhookError::MalformedPayload(_))));
        assert_eq!(ledger.records().len(), 0);
    }

    // ══════════════════════════════════════════════════════════════
    // Concurrency Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn concurrent_same_id_deliveries_process_once() {
        let handler = Arc::new(CountingHandler::new());
        let ledger = Arc::new(InMemoryEventLedger::new());
        let pipeline = Arc::new(pipeline_with(handler.clone(), ledger.clone()));
        let body = subscription_body();
        let headers = signed_headers("del_race", &body);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let pipeline = pipeline.clone();
            let body = body.clone();
            let headers = headers.clone();
            tasks.push(tokio::spawn(async move {
                pipeline.process(&body, &headers).await
            }));
        }

        let mut processed = 0;
        let mut short_circuited = 0;
        for task in tasks {
            match task.await.unwrap().unwrap() {
                PipelineOutcome::Processed { .. } => processed += 1,
                PipelineOutcome::AlreadyProcessed => short_circuited += 1,
            }
        }

        assert_eq!(processed, 1);
        assert_eq!(short_circuited, 7);
        assert_eq!(handler.call_count(), 1);
        assert_eq!(ledger.records().len(), 1);
    }
}
