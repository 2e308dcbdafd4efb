//! HTTP adapter for the webhook endpoint.

mod dto;
mod handlers;
mod routes;

pub use dto::{ErrorResponse, WebhookAckResponse};
pub use handlers::{receive_webhook, WebhookApiError, WebhookAppState};
pub use routes::{webhook_router, webhook_routes};
