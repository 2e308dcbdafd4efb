//! Axum router configuration for the webhook endpoint.
//!
//! Webhook routes carry no user authentication; requests authenticate by
//! signature inside the pipeline.

use axum::{routing::post, Router};

use super::handlers::{receive_webhook, WebhookAppState};

/// Create the webhook router.
///
/// # Routes
/// - `POST /payments` - ingest a payment-provider webhook delivery
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/payments", post(receive_webhook))
}

/// Create the complete webhook module router, suitable for nesting under
/// `/api`.
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new().nest("/webhooks", webhook_routes())
}
