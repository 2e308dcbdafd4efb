//! PostgreSQL adapters.
//!
//! Implement the `EventLedger` and `SubscriptionStore` ports using sqlx
//! with connection pooling. Schema lives in `migrations/`.

mod event_ledger;
mod subscription_store;

pub use event_ledger::PostgresEventLedger;
pub use subscription_store::PostgresSubscriptionStore;

use crate::ports::StoreError;

/// Maps sqlx errors onto the port error type.
///
/// Pool-acquire timeouts become `Timeout` so callers can see that the
/// bounded-timeout path fired; everything else is `Query`.
fn map_sqlx_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout(err.to_string()),
        other => StoreError::Query(other.to_string()),
    }
}
