use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::error::ApiError;
use crate::handlers::header_str;
use crate::services::PaymentService;

#[derive(Deserialize)]
pub struct ListQuery {
    limit: Option<i64>,
    token: Option<String>,
}

pub async fn list_comprovantes(
    State(service): State<Arc<PaymentService>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    if let Some(admin_token) = &service.config.admin_token {
        let provided = header_str(&headers, "x-admin-token")
            .or_else(|| query.token.clone())
            .unwrap_or_default();
        if &provided != admin_token {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "success": false, "message": "Unauthorized" })),
            )
                .into_response();
        }
    }

    if !service.leads.is_enabled() {
        return ApiError::Configuration("Database not configured".to_string())
            .into_response();
    }

    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    match service.leads.list_comprovantes(limit).await {
        Ok(rows) => Json(json!({ "success": true, "data": rows })).into_response(),
        Err(err) => {
            error!("comprovantes listing failed: {}", err);
            ApiError::Unexpected(err).into_response()
        }
    }
}
