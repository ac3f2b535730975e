use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use url::Url;

use crate::services::PaymentService;

#[derive(Deserialize)]
pub struct QrQuery {
    u: Option<String>,
}

/// Accepts only real http(s) URLs. Clients sometimes paste the EMV
/// copy-and-paste payload here instead of the image URL; those start with
/// "000201" and are rejected.
fn validate_target(raw: &str) -> Option<String> {
    let target = raw.trim().split_whitespace().next()?;
    let lower = target.to_lowercase();

    let no_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    if no_scheme.starts_with("000201") {
        return None;
    }
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return None;
    }
    Url::parse(target).ok()?;
    Some(target.to_string())
}

pub async fn proxy_qr(
    State(service): State<Arc<PaymentService>>,
    Query(query): Query<QrQuery>,
) -> Response {
    let Some(raw) = query.u else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Missing url" })))
            .into_response();
    };
    let Some(target) = validate_target(&raw) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid url" })))
            .into_response();
    };

    let response = service
        .http
        .get(&target)
        .header(header::USER_AGENT, "Mozilla/5.0")
        .header(header::ACCEPT, "image/*,*/*;q=0.8")
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        Err(err) => {
            error!("QR fetch failed: {}", err);
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Upstream error" })),
            )
                .into_response();
        }
    };

    if !response.status().is_success() {
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        return (status, Json(json!({ "error": "Failed to fetch QR" }))).into_response();
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/png")
        .to_string();

    match response.bytes().await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "public, max-age=300".to_string()),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => {
            error!("QR body read failed: {}", err);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Upstream error" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls_accepted() {
        assert_eq!(
            validate_target("https://cdn.example/qr.png").as_deref(),
            Some("https://cdn.example/qr.png")
        );
        // First whitespace-separated token wins
        assert_eq!(
            validate_target("https://cdn.example/qr.png ignored").as_deref(),
            Some("https://cdn.example/qr.png")
        );
    }

    #[test]
    fn test_emv_payload_rejected() {
        assert!(validate_target("00020126580014br.gov.bcb.pix").is_none());
        assert!(validate_target("https://00020126580014br.gov.bcb.pix").is_none());
    }

    #[test]
    fn test_non_http_rejected() {
        assert!(validate_target("ftp://example.com/qr.png").is_none());
        assert!(validate_target("not a url").is_none());
        assert!(validate_target("").is_none());
    }
}
