//! EventLedger port - durable record of every accepted webhook delivery.
//!
//! The ledger is the idempotency backbone of the ingestion pipeline: each
//! delivery is inserted as `Pending` before dispatch and moved to exactly
//! one terminal status afterwards. Rows are never deleted by this service.
//!
//! ## Why the unique constraint lives in the store
//!
//! Two deliveries of the same id can arrive truly concurrently on different
//! workers. The `find_by_delivery_id` read only narrows the common case;
//! the insert's uniqueness constraint on `delivery_id` is what actually
//! prevents double-processing. Callers must treat `DuplicateDelivery` on
//! insert the same as a found prior record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Processing status of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// Accepted and logged, dispatch not yet completed.
    Pending,
    /// Dispatch completed successfully (or was a no-op for an unknown type).
    Processed,
    /// Dispatch failed; `error_message` holds the reason.
    Failed,
}

impl EventStatus {
    /// Stable string form used in the database and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Processed => "processed",
            EventStatus::Failed => "failed",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EventStatus::Pending),
            "processed" => Some(EventStatus::Processed),
            "failed" => Some(EventStatus::Failed),
            _ => None,
        }
    }

    /// Returns true for `Processed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventStatus::Pending)
    }
}

/// One accepted delivery and its processing outcome.
#[derive(Debug, Clone)]
pub struct LedgerRecord {
    /// Store-assigned identifier, distinct from the provider's delivery id.
    pub id: Uuid,

    /// Provider-assigned delivery id. `None` when the transport supplied no
    /// `webhook-id` header; such rows are exempt from deduplication.
    pub delivery_id: Option<String>,

    /// Declared event type (e.g. "subscription.active").
    pub event_type: String,

    /// Raw event payload as received, opaque to the pipeline.
    pub payload: serde_json::Value,

    /// Current processing status.
    pub status: EventStatus,

    /// Failure reason, set only when `status` is `Failed`.
    pub error_message: Option<String>,

    /// When the row was inserted.
    pub created_at: DateTime<Utc>,

    /// When the row reached a terminal status.
    pub processed_at: Option<DateTime<Utc>>,
}

/// Result of attempting to insert a pending row.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// The row was inserted; this request owns processing for the delivery.
    Inserted(LedgerRecord),
    /// A concurrent insert for the same delivery id already landed.
    DuplicateDelivery,
}

/// Terminal outcome recorded by `finalize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// The event's effect was applied (or intentionally skipped).
    Processed,
    /// The domain handler failed; carries a non-empty message.
    Failed(String),
}

/// Errors from the ledger's backing store.
///
/// Both variants are transient from the provider's point of view: the
/// response is a 500 and the provider's redelivery is the recovery path.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation did not complete within its bounded timeout.
    #[error("store timeout: {0}")]
    Timeout(String),

    /// The operation failed for any other reason.
    #[error("store query failed: {0}")]
    Query(String),
}

/// Port for the durable event ledger.
///
/// Implementations must enforce uniqueness of non-null delivery ids with a
/// store-level constraint, not application locking, and must be safe to
/// call from concurrent requests.
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Point lookup by delivery id, used for the idempotency gate.
    async fn find_by_delivery_id(
        &self,
        delivery_id: &str,
    ) -> Result<Option<LedgerRecord>, StoreError>;

    /// Insert a `Pending` row for a verified delivery.
    ///
    /// Returns `InsertOutcome::DuplicateDelivery` when the store's
    /// uniqueness constraint rejects the row (a concurrent delivery of the
    /// same id won the race). A `None` delivery id always inserts.
    async fn insert_pending(
        &self,
        delivery_id: Option<&str>,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<InsertOutcome, StoreError>;

    /// Record the terminal outcome for a row.
    ///
    /// Idempotent: finalizing an already-finalized row is a no-op and never
    /// overwrites a terminal status.
    async fn finalize(
        &self,
        record_id: Uuid,
        outcome: ProcessingOutcome,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_string_form() {
        for status in [EventStatus::Pending, EventStatus::Processed, EventStatus::Failed] {
            assert_eq!(EventStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_status_string_fails_to_parse() {
        assert_eq!(EventStatus::parse("retrying"), None);
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!EventStatus::Pending.is_terminal());
        assert!(EventStatus::Processed.is_terminal());
        assert!(EventStatus::Failed.is_terminal());
    }

    #[test]
    fn store_errors_display_their_detail() {
        let err = StoreError::Timeout("acquire timed out after 5s".to_string());
        assert_eq!(format!("{}", err), "store timeout: acquire timed out after 5s");

        let err = StoreError::Query("connection reset".to_string());
        assert_eq!(format!("{}", err), "store query failed: connection reset");
    }
}
