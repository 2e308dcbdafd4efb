//! PostgreSQL implementation of the SubscriptionStore port.
//!
//! Both upserts key on the provider's external identifiers, so replays of
//! the same event converge on the same rows.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::ports::{CustomerUpsert, StoreError, SubscriptionStore, SubscriptionUpsert};

use super::map_sqlx_err;

/// PostgreSQL-backed customer/subscription store.
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    /// Creates a store over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn upsert_customer(&self, customer: CustomerUpsert) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO customers (id, external_customer_id, email, name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (external_customer_id)
            DO UPDATE SET
                email = EXCLUDED.email,
                name = EXCLUDED.name,
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&customer.external_customer_id)
        .bind(&customer.email)
        .bind(&customer.name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(id)
    }

    async fn upsert_subscription(
        &self,
        subscription: SubscriptionUpsert,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, customer_id, external_subscription_id, product_id, status,
                billing_interval, amount, currency, next_billing_date, cancelled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (external_subscription_id)
            DO UPDATE SET
                status = EXCLUDED.status,
                next_billing_date = EXCLUDED.next_billing_date,
                cancelled_at = EXCLUDED.cancelled_at,
                updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(subscription.customer_id)
        .bind(&subscription.external_subscription_id)
        .bind(&subscription.product_id)
        .bind(&subscription.status)
        .bind(&subscription.billing_interval)
        .bind(subscription.amount)
        .bind(&subscription.currency)
        .bind(subscription.next_billing_date)
        .bind(subscription.cancelled_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }
}
