//! Normalization of the loosely shaped data this service sits between:
//! client-supplied amounts on the way in, gateway transaction payloads on
//! the way out. Every gateway returns a different JSON shape; the extractor
//! hunts through known field names and produces one `PixTransaction`.

use serde_json::Value;

use crate::error::ApiError;
use crate::models::payment::PixTransaction;
use crate::utils::money::parse_reais_to_cents;

/// Minimum charge accepted by every supported gateway.
pub const MIN_AMOUNT_CENTS: i64 = 100;

/// Converts a raw `amount` value into integer cents.
///
/// Absent values fall back to the configured default amount string. Strings
/// with a decimal separator and fractional numbers are reais. Integers up
/// to 1000 are treated as reais as well; anything larger is assumed to be
/// cents already. The reais cutoff is a heuristic carried over from the
/// checkout clients, which send small whole-real amounts without a
/// separator.
pub fn normalize_amount_to_cents(
    value: Option<&Value>,
    default_amount: &str,
) -> Result<i64, ApiError> {
    let cents = raw_amount_to_cents(value, default_amount);
    if cents < MIN_AMOUNT_CENTS {
        return Err(ApiError::Validation(
            "Amount inválido (mínimo 100 centavos)".to_string(),
        ));
    }
    Ok(cents)
}

fn raw_amount_to_cents(value: Option<&Value>, default_amount: &str) -> i64 {
    match value {
        None | Some(Value::Null) => {
            parse_reais_to_cents(default_amount).unwrap_or(0)
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            parse_reais_to_cents(default_amount).unwrap_or(0)
        }
        Some(Value::String(s)) => {
            if s.contains(',') || s.contains('.') {
                parse_reais_to_cents(s).unwrap_or(0)
            } else {
                s.trim()
                    .parse::<i64>()
                    .map(integer_to_cents)
                    .unwrap_or(0)
            }
        }
        Some(Value::Number(n)) => {
            if let Some(int) = n.as_i64() {
                integer_to_cents(int)
            } else if let Some(float) = n.as_f64() {
                if float.is_finite() {
                    (float * 100.0).round() as i64
                } else {
                    0
                }
            } else {
                0
            }
        }
        Some(_) => 0,
    }
}

fn integer_to_cents(value: i64) -> i64 {
    if value < 0 {
        return 0;
    }
    // Heurística: valores pequenos (<= 1000) tratamos como reais
    if value <= 1000 {
        value * 100
    } else {
        value
    }
}

/// Field names tried, in order, when hunting for the upstream id.
const ID_FIELDS: &[&str] = &["id", "transaction_id", "transactionId", "txid", "objectId"];

/// Dotted paths tried, in order, for the PIX copy-and-paste code.
const PIX_CODE_FIELDS: &[&str] = &[
    "pix.qrcode",
    "pix.qrcode_text",
    "pix.copy_paste",
    "pixCode",
    "pix_code",
    "copyPaste",
    "copy_paste",
    "brcode",
    "emv",
    "qr_code_text",
    "pixCopiaECola",
];

/// Dotted paths tried, in order, for a QR image or URL.
const QR_FIELDS: &[&str] = &[
    "pix.qrcode_image",
    "pix.qr_code_base64",
    "qr_code_base64",
    "qrCodeImage",
    "qr_code_image",
    "qr_code_url",
    "qrCodeUrl",
    "qr_code",
];

/// Some gateways wrap the transaction in `data`, occasionally as a
/// one-element array.
pub fn unwrap_data(payload: &Value) -> &Value {
    match payload.get("data") {
        Some(Value::Array(items)) => items.first().unwrap_or(payload),
        Some(inner @ Value::Object(_)) => inner,
        _ => payload,
    }
}

fn lookup_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn first_string(payload: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| {
        match lookup_path(payload, path)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    })
}

fn looks_like_base64(value: &str) -> bool {
    value.len() > 100
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

/// Wraps a raw QR representation into something a browser can display.
/// Data-URIs and URLs pass through; bare base64 blobs get the PNG data-URI
/// prefix; raw EMV text stays bare for clients rendering their own QR.
/// EMV payloads start with "000201" and would otherwise satisfy the base64
/// alphabet check.
pub fn classify_qr(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("data:") {
        trimmed.to_string()
    } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if trimmed.starts_with("000201") {
        trimmed.to_string()
    } else if looks_like_base64(trimmed) {
        format!("data:image/png;base64,{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Normalizes an upstream transaction-creation response.
///
/// `fallback_amount_cents` is echoed back when the gateway does not repeat
/// the amount.
pub fn extract_transaction(
    payload: &Value,
    fallback_amount_cents: i64,
) -> Result<PixTransaction, ApiError> {
    let body = unwrap_data(payload);

    let transaction_id = first_string(body, ID_FIELDS);
    let pix_code = first_string(body, PIX_CODE_FIELDS);
    let qr_raw = first_string(body, QR_FIELDS).or_else(|| pix_code.clone());

    let (transaction_id, pix_code) = match (transaction_id, pix_code.or_else(|| qr_raw.clone())) {
        (Some(id), Some(code)) => (id, code),
        _ => {
            return Err(ApiError::gateway(
                "Gateway não retornou dados esperados",
            ))
        }
    };

    let status = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("pending")
        .to_lowercase();

    let amount_cents = body
        .get("amount")
        .and_then(Value::as_i64)
        .unwrap_or(fallback_amount_cents);

    let qr_code = qr_raw
        .as_deref()
        .map(classify_qr)
        .unwrap_or_else(|| pix_code.clone());

    Ok(PixTransaction {
        transaction_id,
        status,
        pix_code,
        qr_code,
        amount_cents,
    })
}

/// Loosely parsed provider webhook notification.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub transaction_id: Option<String>,
    pub status: String,
}

pub fn is_paid_status(status: &str) -> bool {
    matches!(status, "paid" | "approved" | "completed" | "confirmed")
}

/// Pulls id and status out of a webhook payload, unwrapping `data` the
/// same way transaction responses are unwrapped. Status is lowercased so
/// providers sending "PAID" and "paid" are treated alike.
pub fn extract_webhook_event(payload: &Value) -> WebhookEvent {
    let body = unwrap_data(payload);

    let status = body
        .get("status")
        .or_else(|| payload.get("status"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();

    let transaction_id = first_string(body, ID_FIELDS)
        .or_else(|| first_string(payload, &["objectId", "id"]));

    WebhookEvent {
        transaction_id,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DEFAULT: &str = "64.73";

    #[test]
    fn test_absent_amount_uses_default() {
        assert_eq!(normalize_amount_to_cents(None, DEFAULT).unwrap(), 6473);
        let null = json!(null);
        assert_eq!(
            normalize_amount_to_cents(Some(&null), DEFAULT).unwrap(),
            6473
        );
        let empty = json!("");
        assert_eq!(
            normalize_amount_to_cents(Some(&empty), DEFAULT).unwrap(),
            6473
        );
    }

    #[test]
    fn test_separator_strings_are_reais() {
        let comma = json!("19,90");
        assert_eq!(
            normalize_amount_to_cents(Some(&comma), DEFAULT).unwrap(),
            1990
        );
        let dot = json!("19.90");
        assert_eq!(
            normalize_amount_to_cents(Some(&dot), DEFAULT).unwrap(),
            1990
        );
    }

    #[test]
    fn test_fractional_numbers_are_reais() {
        let float = json!(12.5);
        assert_eq!(
            normalize_amount_to_cents(Some(&float), DEFAULT).unwrap(),
            1250
        );
    }

    #[test]
    fn test_small_integers_are_reais() {
        let small = json!(500);
        assert_eq!(
            normalize_amount_to_cents(Some(&small), DEFAULT).unwrap(),
            50_000
        );
        let edge = json!(1000);
        assert_eq!(
            normalize_amount_to_cents(Some(&edge), DEFAULT).unwrap(),
            100_000
        );
    }

    #[test]
    fn test_large_integers_are_cents() {
        let large = json!(6473);
        assert_eq!(
            normalize_amount_to_cents(Some(&large), DEFAULT).unwrap(),
            6473
        );
    }

    #[test]
    fn test_below_minimum_rejected() {
        let tiny = json!("0,50");
        assert!(matches!(
            normalize_amount_to_cents(Some(&tiny), DEFAULT),
            Err(ApiError::Validation(_))
        ));
        let zero = json!(0);
        assert!(normalize_amount_to_cents(Some(&zero), DEFAULT).is_err());
        let garbage = json!("abc");
        assert!(normalize_amount_to_cents(Some(&garbage), DEFAULT).is_err());
        let negative = json!(-10);
        assert!(normalize_amount_to_cents(Some(&negative), DEFAULT).is_err());
    }

    #[test]
    fn test_extracts_nested_pix_qrcode() {
        let payload = json!({
            "id": "tx_123",
            "status": "WAITING_PAYMENT",
            "amount": 6473,
            "pix": { "qrcode": "00020126t3st3mv" }
        });
        let tx = extract_transaction(&payload, 0).unwrap();
        assert_eq!(tx.transaction_id, "tx_123");
        assert_eq!(tx.pix_code, "00020126t3st3mv");
        assert_eq!(tx.status, "waiting_payment");
        assert_eq!(tx.amount_cents, 6473);
    }

    #[test]
    fn test_unwraps_data_array() {
        let payload = json!({
            "data": [{ "transaction_id": 9981, "brcode": "00020126abc" }]
        });
        let tx = extract_transaction(&payload, 500).unwrap();
        assert_eq!(tx.transaction_id, "9981");
        assert_eq!(tx.pix_code, "00020126abc");
        assert_eq!(tx.amount_cents, 500);
    }

    #[test]
    fn test_bare_base64_qr_gets_data_uri_prefix() {
        let blob = "iVBORw0KGgoAAAANSUhEUg".repeat(6); // > 100 chars, base64 alphabet
        let payload = json!({
            "id": "1",
            "pixCode": "00020126xyz",
            "qr_code_base64": blob
        });
        let tx = extract_transaction(&payload, 100).unwrap();
        assert_eq!(tx.qr_code, format!("data:image/png;base64,{}", blob));
        assert_eq!(tx.pix_code, "00020126xyz");
    }

    #[test]
    fn test_url_and_data_uri_pass_through() {
        assert_eq!(
            classify_qr("https://cdn.example/qr.png"),
            "https://cdn.example/qr.png"
        );
        assert_eq!(
            classify_qr("data:image/png;base64,AAAA"),
            "data:image/png;base64,AAAA"
        );
        // Raw EMV text stays bare even though it is long
        let emv = format!("000201{}", "5".repeat(120));
        assert_eq!(classify_qr(&emv), emv);
    }

    #[test]
    fn test_missing_id_and_code_is_gateway_error() {
        let payload = json!({ "message": "created" });
        assert!(matches!(
            extract_transaction(&payload, 100),
            Err(ApiError::Gateway { .. })
        ));
    }

    #[test]
    fn test_webhook_event_case_insensitive_status() {
        let payload = json!({ "data": { "id": "tx_9", "status": "PAID" } });
        let event = extract_webhook_event(&payload);
        assert_eq!(event.transaction_id.as_deref(), Some("tx_9"));
        assert_eq!(event.status, "paid");
        assert!(is_paid_status(&event.status));
    }

    #[test]
    fn test_webhook_event_data_array_and_object_id() {
        let payload = json!({
            "objectId": "obj_1",
            "data": [{ "status": "pending" }]
        });
        let event = extract_webhook_event(&payload);
        assert_eq!(event.transaction_id.as_deref(), Some("obj_1"));
        assert!(!is_paid_status(&event.status));
    }

    #[test]
    fn test_qr_only_response_still_accepted() {
        let payload = json!({
            "id": "55",
            "qr_code": "https://cdn.example/qr.png"
        });
        let tx = extract_transaction(&payload, 100).unwrap();
        assert_eq!(tx.qr_code, "https://cdn.example/qr.png");
    }
}
