use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

use crate::error::ApiError;
use crate::handlers::header_str;
use crate::models::payment::{PaymentRequest, PaymentResponse};
use crate::services::{PaymentService, RequestContext};

pub async fn create_payment(
    State(service): State<Arc<PaymentService>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let request: PaymentRequest = serde_json::from_value(payload).map_err(|e| {
        error!("invalid payment request: {}", e);
        ApiError::Validation(format!("Corpo da requisição inválido: {}", e))
    })?;

    let ctx = RequestContext {
        referer: header_str(&headers, "referer"),
        forwarded_for: header_str(&headers, "x-forwarded-for"),
        user_agent: header_str(&headers, "user-agent"),
    };

    let response = service.create_payment(request, ctx).await?;
    Ok(Json(response))
}
