//! HTTP handlers for the webhook endpoint.
//!
//! Connects the axum route to the ingestion pipeline. The body is taken
//! as raw `Bytes` and stays unparsed until the pipeline has verified its
//! signature; extracting it as JSON here would break verification.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::domain::webhook::{PipelineOutcome, WebhookError, WebhookHeaders, WebhookPipeline};

use super::dto::{ErrorResponse, WebhookAckResponse};

/// Shared application state for the webhook routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub pipeline: Arc<WebhookPipeline>,
}

impl WebhookAppState {
    pub fn new(pipeline: Arc<WebhookPipeline>) -> Self {
        Self { pipeline }
    }
}

/// Extracts the provider's webhook header triple.
fn extract_webhook_headers(headers: &HeaderMap) -> WebhookHeaders {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    WebhookHeaders::new(
        get("webhook-id"),
        get("webhook-signature"),
        get("webhook-timestamp"),
    )
}

/// POST /api/webhooks/payments - ingest a provider webhook delivery.
pub async fn receive_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let webhook_headers = extract_webhook_headers(&headers);

    let outcome = state.pipeline.process(&body, &webhook_headers).await?;

    let response = match outcome {
        PipelineOutcome::Processed {
            event_id,
            event_type,
        } => WebhookAckResponse::processed(event_type, event_id),
        PipelineOutcome::AlreadyProcessed => WebhookAckResponse::already_processed(),
    };

    Ok((StatusCode::OK, Json(response)))
}

/// API error type that converts pipeline errors to HTTP responses.
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let body = ErrorResponse::new(self.0.kind(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryEventLedger, InMemorySubscriptionStore};
    use crate::domain::subscription::SubscriptionEventHandler;
    use crate::domain::webhook::{EventDispatcher, WebhookVerifier};
    use crate::ports::StoreError;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    const TEST_SECRET: &str = "whsec_dGVzdC1zaWduaW5nLWtleS0wMTIzNDU2Nzg5";

    // ══════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ══════════════════════════════════════════════════════════════

    fn test_state() -> WebhookAppState {
        let ledger = Arc::new(InMemoryEventLedger::new());
        let store = Arc::new(InMemorySubscriptionStore::new());
        let handler = Arc::new(SubscriptionEventHandler::new(store));

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_with_status("subscription.active", handler.clone(), "active");
        dispatcher.register_with_status("subscription.cancelled", handler.clone(), "cancelled");
        dispatcher.register_with_status("subscription.renewed", handler, "active");

        let pipeline = WebhookPipeline::new(WebhookVerifier::new(TEST_SECRET), ledger, dispatcher);
        WebhookAppState::new(Arc::new(pipeline))
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

    fn signed_request_headers(id: &str, body: &[u8]) -> HeaderMap {
        let ts = chrono::Utc::now().timestamp().to_string();
        let mut headers = HeaderMap::new();
        headers.insert("webhook-id", id.parse().unwrap());
        headers.insert("webhook-signature", sign(id, &ts, body).parse().unwrap());
        headers.insert("webhook-timestamp", ts.parse().unwrap());
        headers
    }

    fn subscription_body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "type": "subscription.active",
            "data": {
                "subscription_id": "sub_1",
                "customer": {"customer_id": "cus_1", "email": "a@b.com", "name": "A"}
            }
        }))
        .unwrap()
    }

    async fn call(
        state: &WebhookAppState,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> axum::response::Response {
        match receive_webhook(State(state.clone()), headers, Bytes::from(body)).await {
            Ok(response) => response.into_response(),
            Err(err) => err.into_response(),
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Handler Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn valid_delivery_returns_ok() {
        let state = test_state();
        let body = subscription_body();

        let response = call(&state, signed_request_headers("del_1", &body), body).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_delivery_returns_ok() {
        let state = test_state();
        let body = subscription_body();

        call(&state, signed_request_headers("del_1", &body), body.clone()).await;
        let response = call(&state, signed_request_headers("del_1", &body), body).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn tampered_body_returns_unauthorized() {
        let state = test_state();
        let body = subscription_body();
        let headers = signed_request_headers("del_1", &body);
        let tampered = subscription_body()
            .iter()
            .map(|b| if *b == b'1' { b'2' } else { *b })
            .collect::<Vec<u8>>();

        let response = call(&state, headers, tampered).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_signature_returns_unauthorized() {
        let state = test_state();
        let body = subscription_body();
        let mut headers = signed_request_headers("del_1", &body);
        headers.remove("webhook-signature");

        let response = call(&state, headers, body).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_json_returns_bad_request() {
        let state = test_state();
        let body = b"not json".to_vec();

        let response = call(&state, signed_request_headers("del_1", &body), body).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn handler_failure_returns_internal_error() {
        let state = test_state();
        // Valid envelope, but the subscription handler requires customer_id.
        let body = serde_json::to_vec(&serde_json::json!({
            "type": "subscription.active",
            "data": {"subscription_id": "sub_1"}
        }))
        .unwrap();

        let response = call(&state, signed_request_headers("del_1", &body), body).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // ══════════════════════════════════════════════════════════════
    // Error Mapping Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn api_error_maps_bad_signature_to_401() {
        let err = WebhookApiError(WebhookError::BadSignature);
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn api_error_maps_missing_secret_to_500() {
        let err = WebhookApiError(WebhookError::MissingSecret);
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn api_error_maps_malformed_payload_to_400() {
        let err = WebhookApiError(WebhookError::MalformedPayload("bad".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_error_maps_store_error_to_500() {
        let err = WebhookApiError(WebhookError::Store(StoreError::Timeout("t".to_string())));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
