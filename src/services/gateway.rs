//! Per-provider gateway adapters behind one interface.
//!
//! Every provider exposes the same two operations, create a PIX
//! transaction and poll its status, but differs in base URL, auth scheme
//! (HTTP Basic vs API key in the body) and response shape. The adapters
//! build the provider-specific request and funnel every response through
//! the shared extractor in [`crate::services::normalize`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::app::config::{Config, ProviderCredentials};
use crate::error::ApiError;
use crate::models::payment::{PaymentOrder, PixTransaction};
use crate::services::normalize::extract_transaction;

#[async_trait]
pub trait PixGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_transaction(&self, order: &PaymentOrder)
        -> Result<PixTransaction, ApiError>;

    /// Raw upstream status payload; the handler proxies it through.
    async fn get_status(&self, transaction_id: &str) -> Result<Value, ApiError>;
}

/// Builds the adapter selected by `PAYMENT_PROVIDER`.
pub fn gateway_from_config(config: &Config) -> Result<Arc<dyn PixGateway>, ApiError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| ApiError::Configuration(format!("HTTP client: {}", e)))?;

    match config.payment_provider.as_str() {
        "allowpay" => Ok(Arc::new(AllowPayGateway {
            client,
            creds: config.allowpay.clone(),
        })),
        "marchabb" => Ok(Arc::new(MarchabbGateway {
            client,
            creds: config.marchabb.clone(),
        })),
        "freepay" => Ok(Arc::new(FreePayGateway {
            client,
            creds: config.freepay.clone(),
        })),
        other => Err(ApiError::Configuration(format!(
            "Gateway desconhecido: {}",
            other
        ))),
    }
}

fn basic_auth(creds: &ProviderCredentials, provider: &str) -> Result<String, ApiError> {
    match (&creds.username, &creds.password) {
        (Some(user), Some(pass)) => {
            Ok(format!("Basic {}", BASE64.encode(format!("{}:{}", user, pass))))
        }
        _ => Err(ApiError::Configuration(format!(
            "Credenciais da {} não configuradas",
            provider
        ))),
    }
}

fn upstream_failure(status: reqwest::StatusCode, body: Value) -> ApiError {
    let message = body
        .get("error")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("Falha ao criar PIX")
        .to_string();
    error!("gateway returned {}: {}", status, message);
    ApiError::Gateway {
        message,
        details: body
            .get("details")
            .or_else(|| body.get("detalhes"))
            .cloned(),
    }
}

async fn read_json(response: reqwest::Response) -> (reqwest::StatusCode, Value) {
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or_else(|_| json!({}));
    (status, body)
}

pub struct AllowPayGateway {
    client: Client,
    creds: ProviderCredentials,
}

impl AllowPayGateway {
    fn payload(&self, order: &PaymentOrder, postback_url: &str) -> Result<Value, ApiError> {
        let shipping = order.shipping.as_ref().ok_or_else(|| {
            ApiError::Validation(
                "Endereço de envio obrigatório (shipping.address)".to_string(),
            )
        })?;

        let metadata = json!({
            "source": "pix-bridge",
            "cpf": order.customer.tax_id,
            "email": order.customer.email,
        });

        Ok(json!({
            "amount": order.amount_cents,
            "paymentMethod": "PIX",
            "items": [{
                "title": order.title,
                "unitPrice": order.amount_cents,
                "quantity": 1,
            }],
            "customer": {
                "name": order.customer.name,
                "email": order.customer.email,
                "phone": order.customer.phone,
                "document": {
                    "type": order.customer.document_type.as_str(),
                    "number": order.customer.tax_id,
                },
            },
            "shipping": { "address": shipping },
            "pix": { "expiresInDays": 1 },
            "postbackUrl": postback_url,
            "metadata": metadata.to_string(),
            "ip": order.client_ip,
            "description": order.description,
        }))
    }
}

#[async_trait]
impl PixGateway for AllowPayGateway {
    fn name(&self) -> &'static str {
        "allowpay"
    }

    async fn create_transaction(
        &self,
        order: &PaymentOrder,
    ) -> Result<PixTransaction, ApiError> {
        let auth = basic_auth(&self.creds, "AllowPay")?;
        let postback_url = self.creds.postback_url.clone().ok_or_else(|| {
            ApiError::Configuration("ALLOWPAY_POSTBACK_URL não configurada".to_string())
        })?;
        let payload = self.payload(order, &postback_url)?;

        info!("sending transaction to AllowPay");
        let response = self
            .client
            .post(format!("{}/transactions", self.creds.base_url))
            .header("Authorization", auth)
            .json(&payload)
            .send()
            .await?;

        let (status, body) = read_json(response).await;
        if !status.is_success() {
            return Err(upstream_failure(status, body));
        }
        extract_transaction(&body, order.amount_cents)
    }

    async fn get_status(&self, transaction_id: &str) -> Result<Value, ApiError> {
        let auth = basic_auth(&self.creds, "AllowPay")?;
        let response = self
            .client
            .get(format!(
                "{}/transactions/{}",
                self.creds.base_url, transaction_id
            ))
            .header("Authorization", auth)
            .send()
            .await?;

        let (status, body) = read_json(response).await;
        if !status.is_success() {
            return Err(upstream_failure(status, body));
        }
        Ok(body)
    }
}

pub struct MarchabbGateway {
    client: Client,
    creds: ProviderCredentials,
}

#[async_trait]
impl PixGateway for MarchabbGateway {
    fn name(&self) -> &'static str {
        "marchabb"
    }

    async fn create_transaction(
        &self,
        order: &PaymentOrder,
    ) -> Result<PixTransaction, ApiError> {
        let auth = basic_auth(&self.creds, "Marchabb")?;
        let payload = json!({
            "amount": order.amount_cents,
            "paymentMethod": "PIX",
            "items": [{
                "title": order.title,
                "unitPrice": order.amount_cents,
                "quantity": 1,
            }],
            "customer": {
                "name": order.customer.name,
                "email": order.customer.email,
                "phone": order.customer.phone,
                "document": {
                    "type": order.customer.document_type.as_str(),
                    "number": order.customer.tax_id,
                },
            },
            "postbackUrl": self.creds.postback_url,
            "ip": order.client_ip,
            "description": order.description,
        });

        info!("sending transaction to Marchabb");
        let response = self
            .client
            .post(format!("{}/transactions", self.creds.base_url))
            .header("Authorization", auth)
            .json(&payload)
            .send()
            .await?;

        let (status, body) = read_json(response).await;
        if !status.is_success() {
            return Err(upstream_failure(status, body));
        }
        extract_transaction(&body, order.amount_cents)
    }

    async fn get_status(&self, transaction_id: &str) -> Result<Value, ApiError> {
        let auth = basic_auth(&self.creds, "Marchabb")?;
        let response = self
            .client
            .get(format!(
                "{}/transactions/{}",
                self.creds.base_url, transaction_id
            ))
            .header("Authorization", auth)
            .send()
            .await?;

        let (status, body) = read_json(response).await;
        if !status.is_success() || body.get("id").is_none() {
            return Err(ApiError::Gateway {
                message: "Não foi possível consultar status".to_string(),
                details: Some(json!({ "status": status.as_u16(), "data": body })),
            });
        }
        Ok(body)
    }
}

/// FreePay authenticates with an API key inside the JSON body instead of
/// an Authorization header.
pub struct FreePayGateway {
    client: Client,
    creds: ProviderCredentials,
}

impl FreePayGateway {
    fn api_key(&self) -> Result<&str, ApiError> {
        self.creds.api_key.as_deref().ok_or_else(|| {
            ApiError::Configuration("FREEPAY_API_KEY não configurada".to_string())
        })
    }
}

#[async_trait]
impl PixGateway for FreePayGateway {
    fn name(&self) -> &'static str {
        "freepay"
    }

    async fn create_transaction(
        &self,
        order: &PaymentOrder,
    ) -> Result<PixTransaction, ApiError> {
        let payload = json!({
            "api_key": self.api_key()?,
            "amount": order.amount_cents,
            "payment_method": "pix",
            "customer_name": order.customer.name,
            "customer_email": order.customer.email,
            "customer_phone": order.customer.phone,
            "customer_document": order.customer.tax_id,
            "postback_url": self.creds.postback_url,
            "description": order.description,
        });

        info!("sending transaction to FreePay");
        let response = self
            .client
            .post(format!("{}/v1/pix/create", self.creds.base_url))
            .json(&payload)
            .send()
            .await?;

        let (status, body) = read_json(response).await;
        if !status.is_success() {
            return Err(upstream_failure(status, body));
        }
        extract_transaction(&body, order.amount_cents)
    }

    async fn get_status(&self, transaction_id: &str) -> Result<Value, ApiError> {
        let payload = json!({
            "api_key": self.api_key()?,
            "transaction_id": transaction_id,
        });
        let response = self
            .client
            .post(format!("{}/v1/pix/status", self.creds.base_url))
            .json(&payload)
            .send()
            .await?;

        let (status, body) = read_json(response).await;
        if !status.is_success() {
            return Err(upstream_failure(status, body));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::{DocumentType, NormalizedCustomer};

    fn order() -> PaymentOrder {
        PaymentOrder {
            customer: NormalizedCustomer {
                name: "Maria".to_string(),
                email: "maria@example.com".to_string(),
                phone: "11988887777".to_string(),
                tax_id: "12345678909".to_string(),
                document_type: DocumentType::Cpf,
            },
            amount_cents: 6473,
            title: "Taxa de Adesão".to_string(),
            description: "Taxa de Adesão".to_string(),
            shipping: None,
            client_ip: "1.2.3.4".to_string(),
        }
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let mut config = Config::from_env();
        config.payment_provider = "nope".to_string();
        assert!(matches!(
            gateway_from_config(&config).err(),
            Some(ApiError::Configuration(_))
        ));
    }

    #[test]
    fn test_basic_auth_encoding() {
        let creds = ProviderCredentials {
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..Default::default()
        };
        assert_eq!(
            basic_auth(&creds, "AllowPay").unwrap(),
            "Basic dXNlcjpwYXNz"
        );
    }

    #[test]
    fn test_missing_credentials_is_configuration_error() {
        let creds = ProviderCredentials::default();
        assert!(matches!(
            basic_auth(&creds, "AllowPay"),
            Err(ApiError::Configuration(_))
        ));
    }

    #[test]
    fn test_allowpay_requires_shipping() {
        let gateway = AllowPayGateway {
            client: Client::new(),
            creds: ProviderCredentials::default(),
        };
        assert!(matches!(
            gateway.payload(&order(), "https://cb.example"),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_allowpay_payload_shape() {
        let gateway = AllowPayGateway {
            client: Client::new(),
            creds: ProviderCredentials::default(),
        };
        let mut order = order();
        order.shipping = Some(crate::models::payment::AddressBody {
            street: Some("Rua A".to_string()),
            street_number: Some("10".to_string()),
            zip_code: Some("01000-000".to_string()),
            neighborhood: Some("Centro".to_string()),
            city: Some("São Paulo".to_string()),
            state: Some("SP".to_string()),
            country: Some("BR".to_string()),
            ..Default::default()
        });
        let payload = gateway.payload(&order, "https://cb.example").unwrap();
        assert_eq!(payload["amount"], 6473);
        assert_eq!(payload["paymentMethod"], "PIX");
        assert_eq!(payload["customer"]["document"]["type"], "CPF");
        assert_eq!(payload["items"][0]["unitPrice"], 6473);
        assert_eq!(payload["pix"]["expiresInDays"], 1);
        // metadata travels as a stringified JSON blob
        assert!(payload["metadata"].as_str().unwrap().contains("12345678909"));
    }
}
