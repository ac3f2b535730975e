pub mod comprovantes;
pub mod payment_status;
pub mod payments;
pub mod qr_proxy;
pub mod webhooks;

use axum::http::HeaderMap;

pub(crate) fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
