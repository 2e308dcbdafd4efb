//! Service entry point: configuration, database pool, and HTTP server.

use std::sync::Arc;

use axum::http::{HeaderName, Method};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use billing_webhooks::adapters::http::webhook::{webhook_router, WebhookAppState};
use billing_webhooks::adapters::postgres::{PostgresEventLedger, PostgresSubscriptionStore};
use billing_webhooks::config::AppConfig;
use billing_webhooks::domain::subscription::SubscriptionEventHandler;
use billing_webhooks::domain::webhook::{EventDispatcher, WebhookPipeline, WebhookVerifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        tracing::info!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    let ledger = Arc::new(PostgresEventLedger::new(pool.clone()));
    let subscription_store = Arc::new(PostgresSubscriptionStore::new(pool));
    let subscription_handler = Arc::new(SubscriptionEventHandler::new(subscription_store));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register_with_status("subscription.active", subscription_handler.clone(), "active");
    dispatcher.register_with_status(
        "subscription.cancelled",
        subscription_handler.clone(),
        "cancelled",
    );
    // A renewal keeps the subscription active and only refreshes billing
    // metadata.
    dispatcher.register_with_status("subscription.renewed", subscription_handler, "active");

    let verifier = WebhookVerifier::new(config.webhook.signing_secret.clone()).with_tolerance(
        config.webhook.tolerance_secs,
        config.webhook.max_clock_skew_secs,
    );
    let pipeline = WebhookPipeline::new(verifier, ledger, dispatcher);
    let state = WebhookAppState::new(Arc::new(pipeline));

    // The provider's delivery infrastructure sends the webhook header
    // triple cross-origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("webhook-id"),
            HeaderName::from_static("webhook-signature"),
            HeaderName::from_static("webhook-timestamp"),
        ]);

    let app = axum::Router::new()
        .nest("/api", webhook_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors);

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, environment = ?config.server.environment, "starting webhook server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
