//! PostgreSQL implementation of the EventLedger port.
//!
//! The partial unique index on `delivery_id` is the authoritative
//! idempotency constraint; the insert uses `ON CONFLICT DO NOTHING` so a
//! lost race surfaces as `DuplicateDelivery` rather than an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::ports::{
    EventLedger, EventStatus, InsertOutcome, LedgerRecord, ProcessingOutcome, StoreError,
};

use super::map_sqlx_err;

/// PostgreSQL-backed event ledger.
pub struct PostgresEventLedger {
    pool: PgPool,
}

impl PostgresEventLedger {
    /// Creates a ledger over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a ledger record.
#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    id: Uuid,
    delivery_id: Option<String>,
    event_type: String,
    payload: serde_json::Value,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<WebhookEventRow> for LedgerRecord {
    type Error = StoreError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        let status = EventStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Query(format!("invalid status value: {}", row.status)))?;

        Ok(LedgerRecord {
            id: row.id,
            delivery_id: row.delivery_id,
            event_type: row.event_type,
            payload: row.payload,
            status,
            error_message: row.error_message,
            created_at: row.created_at,
            processed_at: row.processed_at,
        })
    }
}

const RETURNING_COLUMNS: &str =
    "id, delivery_id, event_type, payload, status, error_message, created_at, processed_at";

#[async_trait]
impl EventLedger for PostgresEventLedger {
    async fn find_by_delivery_id(
        &self,
        delivery_id: &str,
    ) -> Result<Option<LedgerRecord>, StoreError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(&format!(
            "SELECT {} FROM webhook_events WHERE delivery_id = $1",
            RETURNING_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        row.map(LedgerRecord::try_from).transpose()
    }

    async fn insert_pending(
        &self,
        delivery_id: Option<&str>,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<InsertOutcome, StoreError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO webhook_events (id, delivery_id, event_type, payload, status)
            VALUES ($1, $2, $3, $4, 'pending')
            ON CONFLICT (delivery_id) WHERE delivery_id IS NOT NULL DO NOTHING
            RETURNING {}
            "#,
            RETURNING_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(delivery_id)
        .bind(event_type)
        .bind(payload)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        match row {
            Some(row) => Ok(InsertOutcome::Inserted(row.try_into()?)),
            None => Ok(InsertOutcome::DuplicateDelivery),
        }
    }

    async fn finalize(
        &self,
        record_id: Uuid,
        outcome: ProcessingOutcome,
    ) -> Result<(), StoreError> {
        let (status, error_message) = match &outcome {
            ProcessingOutcome::Processed => (EventStatus::Processed, None),
            ProcessingOutcome::Failed(message) => (EventStatus::Failed, Some(message.as_str())),
        };

        // The status guard makes this idempotent: a terminal row is left
        // untouched.
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = $2, error_message = $3, processed_at = now()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(record_id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }
}
