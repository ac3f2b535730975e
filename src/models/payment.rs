use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Inbound payment creation body. Clients send either flat fields or a
/// nested `customer` object; both shapes are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentRequest {
    pub cpf: Option<Value>,
    pub nome: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Value>,
    pub amount: Option<Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub customer: Option<CustomerBody>,
    pub tracking: Option<Value>,
    pub utm: Option<Value>,
    pub src: Option<String>,
    pub shipping: Option<ShippingBody>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Value>,
    pub cellphone: Option<Value>,
    #[serde(rename = "taxId")]
    pub tax_id: Option<Value>,
    pub document: Option<DocumentBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentBody {
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub number: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingBody {
    pub address: Option<AddressBody>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBody {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub street_number: Option<String>,
    #[serde(default)]
    pub complement: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Cpf,
    Cnpj,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Cpf => "CPF",
            DocumentType::Cnpj => "CNPJ",
        }
    }
}

/// Customer data after merging flat and nested fields; phone and tax id
/// are digits only.
#[derive(Debug, Clone)]
pub struct NormalizedCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub tax_id: String,
    pub document_type: DocumentType,
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn value_as_string(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl PaymentRequest {
    /// Nested `customer` fields win, flat fields are the fallback.
    pub fn normalized_customer(&self) -> Result<NormalizedCustomer, ApiError> {
        let nested = self.customer.as_ref();

        let name = nested
            .and_then(|c| non_empty(&c.name))
            .or_else(|| non_empty(&self.nome));
        let email = nested
            .and_then(|c| non_empty(&c.email))
            .or_else(|| non_empty(&self.email));

        let (name, email) = match (name, email) {
            (Some(name), Some(email)) => (name, email),
            _ => {
                return Err(ApiError::Validation(
                    "Nome e Email são obrigatórios".to_string(),
                ))
            }
        };

        let phone = nested
            .and_then(|c| value_as_string(&c.phone).or_else(|| value_as_string(&c.cellphone)))
            .or_else(|| value_as_string(&self.phone))
            .unwrap_or_default();
        let tax_id = nested
            .and_then(|c| {
                c.document
                    .as_ref()
                    .and_then(|d| value_as_string(&d.number))
                    .or_else(|| value_as_string(&c.tax_id))
            })
            .or_else(|| value_as_string(&self.cpf))
            .unwrap_or_default();

        let phone = digits_only(&phone);
        let tax_id = digits_only(&tax_id);

        let document_type = match nested
            .and_then(|c| c.document.as_ref())
            .and_then(|d| d.doc_type.as_deref())
        {
            Some(t) if t.eq_ignore_ascii_case("cnpj") => DocumentType::Cnpj,
            Some(_) => DocumentType::Cpf,
            None if tax_id.len() > 11 => DocumentType::Cnpj,
            None => DocumentType::Cpf,
        };

        Ok(NormalizedCustomer {
            name,
            email,
            phone,
            tax_id,
            document_type,
        })
    }

    /// `tracking` can be an object, a bare string (treated as `src`) or
    /// absent, in which case top-level `utm`/`src` and the Referer header
    /// are used.
    pub fn normalized_tracking(&self, referer: Option<&str>) -> TrackingData {
        let top_level_utm = || match &self.utm {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let top_level_src =
            || non_empty(&self.src).or_else(|| referer.map(str::to_string));

        match &self.tracking {
            Some(Value::Object(obj)) => {
                let utm = match obj.get("utm") {
                    Some(Value::Object(map)) => map.clone(),
                    _ => Map::new(),
                };
                let src = obj
                    .get("src")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .or_else(top_level_src);
                TrackingData { utm, src }
            }
            Some(Value::String(s)) if !s.is_empty() => TrackingData {
                utm: Map::new(),
                src: Some(s.clone()),
            },
            _ => TrackingData {
                utm: top_level_utm(),
                src: top_level_src(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingData {
    pub utm: Map<String, Value>,
    pub src: Option<String>,
}

impl TrackingData {
    fn utm_str(&self, key: &str) -> Option<String> {
        self.utm
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Attribution parameters in the shape UTMify expects.
    pub fn parameters(&self) -> TrackingParameters {
        TrackingParameters {
            src: self.src.clone().or_else(|| self.utm_str("src")),
            sck: self.utm_str("sck"),
            utm_source: self
                .utm_str("utm_source")
                .or_else(|| self.utm_str("source")),
            utm_campaign: self.utm_str("utm_campaign"),
            utm_medium: self.utm_str("utm_medium"),
            utm_content: self.utm_str("utm_content"),
            utm_term: self.utm_str("utm_term"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingParameters {
    pub src: Option<String>,
    pub sck: Option<String>,
    pub utm_source: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_content: Option<String>,
    pub utm_term: Option<String>,
}

/// Everything the gateway adapters need to create a transaction.
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    pub customer: NormalizedCustomer,
    pub amount_cents: i64,
    pub title: String,
    pub description: String,
    pub shipping: Option<AddressBody>,
    pub client_ip: String,
}

/// Normalized upstream transaction, the single client-facing contract.
#[derive(Debug, Clone, Serialize)]
pub struct PixTransaction {
    pub transaction_id: String,
    pub status: String,
    pub pix_code: String,
    pub qr_code: String,
    pub amount_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub success: bool,
    pub transaction_id: String,
    pub pix_code: String,
    pub amount: i64,
    pub status: String,
    pub qr_code: String,
    pub pix_qr_code: String,
}

impl From<PixTransaction> for PaymentResponse {
    fn from(tx: PixTransaction) -> Self {
        PaymentResponse {
            success: true,
            transaction_id: tx.transaction_id,
            pix_code: tx.pix_code,
            amount: tx.amount_cents,
            status: tx.status,
            qr_code: tx.qr_code.clone(),
            pix_qr_code: tx.qr_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> PaymentRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_flat_fields_customer() {
        let req = request(json!({
            "nome": "Maria Silva",
            "email": "maria@example.com",
            "phone": "(11) 98888-7777",
            "cpf": "123.456.789-09"
        }));
        let customer = req.normalized_customer().unwrap();
        assert_eq!(customer.name, "Maria Silva");
        assert_eq!(customer.phone, "11988887777");
        assert_eq!(customer.tax_id, "12345678909");
        assert_eq!(customer.document_type, DocumentType::Cpf);
    }

    #[test]
    fn test_nested_customer_wins() {
        let req = request(json!({
            "nome": "Flat Name",
            "email": "flat@example.com",
            "customer": {
                "name": "Nested Name",
                "email": "nested@example.com",
                "cellphone": "11911112222",
                "document": { "number": "12.345.678/0001-95" }
            }
        }));
        let customer = req.normalized_customer().unwrap();
        assert_eq!(customer.name, "Nested Name");
        assert_eq!(customer.email, "nested@example.com");
        assert_eq!(customer.phone, "11911112222");
        assert_eq!(customer.tax_id, "12345678000195");
        assert_eq!(customer.document_type, DocumentType::Cnpj);
    }

    #[test]
    fn test_missing_name_or_email_rejected() {
        let req = request(json!({ "email": "only@example.com" }));
        assert!(matches!(
            req.normalized_customer(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_numeric_cpf_accepted() {
        let req = request(json!({
            "nome": "N", "email": "e@example.com", "cpf": 12345678909u64
        }));
        assert_eq!(req.normalized_customer().unwrap().tax_id, "12345678909");
    }

    #[test]
    fn test_explicit_document_type_wins_over_length() {
        let req = request(json!({
            "nome": "N", "email": "e@example.com",
            "customer": {
                "document": { "type": "CPF", "number": "123456789012345" }
            }
        }));
        let customer = req.normalized_customer().unwrap();
        assert_eq!(customer.document_type, DocumentType::Cpf);
    }

    #[test]
    fn test_tracking_object() {
        let req = request(json!({
            "tracking": {
                "utm": { "utm_source": "facebook", "utm_campaign": "verao" },
                "src": "landing-page"
            }
        }));
        let params = req.normalized_tracking(None).parameters();
        assert_eq!(params.src.as_deref(), Some("landing-page"));
        assert_eq!(params.utm_source.as_deref(), Some("facebook"));
        assert_eq!(params.utm_campaign.as_deref(), Some("verao"));
        assert!(params.utm_medium.is_none());
    }

    #[test]
    fn test_tracking_string_becomes_src() {
        let req = request(json!({ "tracking": "organic" }));
        let tracking = req.normalized_tracking(None);
        assert_eq!(tracking.src.as_deref(), Some("organic"));
        assert!(tracking.utm.is_empty());
    }

    #[test]
    fn test_tracking_falls_back_to_referer() {
        let req = request(json!({ "utm": { "source": "google" } }));
        let params = req
            .normalized_tracking(Some("https://site.example/checkout"))
            .parameters();
        assert_eq!(params.src.as_deref(), Some("https://site.example/checkout"));
        assert_eq!(params.utm_source.as_deref(), Some("google"));
    }
}
