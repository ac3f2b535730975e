use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::services::PaymentService;

#[derive(Deserialize)]
pub struct StatusQuery {
    id: Option<String>,
    transaction_id: Option<String>,
}

pub async fn get_status(
    State(service): State<Arc<PaymentService>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = query
        .id
        .or(query.transaction_id)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("id é obrigatório".to_string()))?;

    info!("polling status for transaction {}", id);
    let transaction = service.poll_status(&id).await?;

    let status = transaction
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("PENDING")
        .to_string();

    Ok(Json(json!({
        "success": true,
        "status": status,
        "transaction": transaction,
    })))
}
