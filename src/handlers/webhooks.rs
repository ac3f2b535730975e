use axum::extract::{Path, State};
use axum::response::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::services::PaymentService;

/// Provider webhooks are acknowledged with 200 no matter what: gateways
/// retry aggressively on non-2xx and a failed relay must not trigger a
/// retry storm. The body is parsed leniently for the same reason.
pub async fn provider_webhook(
    State(service): State<Arc<PaymentService>>,
    Path(provider): Path<String>,
    body: String,
) -> Json<Value> {
    let payload: Value = serde_json::from_str(&body).unwrap_or_else(|err| {
        warn!("webhook from {} is not valid JSON: {}", provider, err);
        Value::Null
    });

    service.handle_webhook(&provider, &payload).await;

    Json(json!({ "success": true }))
}
