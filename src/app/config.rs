use std::env;

use crate::models::payment::AddressBody;

#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub postback_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub payment_provider: String,
    pub fixed_amount: String,
    pub fixed_title: String,
    pub database_url: Option<String>,
    pub utmify_api_token: Option<String>,
    pub admin_token: Option<String>,
    pub allowpay: ProviderCredentials,
    pub marchabb: ProviderCredentials,
    pub freepay: ProviderCredentials,
    pub default_shipping: AddressBody,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            payment_provider: env::var("PAYMENT_PROVIDER")
                .unwrap_or_else(|_| "allowpay".to_string())
                .to_lowercase(),
            fixed_amount: env::var("FIXED_AMOUNT")
                .unwrap_or_else(|_| "64.73".to_string()),
            fixed_title: env::var("FIXED_TITLE")
                .unwrap_or_else(|_| "Taxa de Adesão".to_string()),
            database_url: optional("DATABASE_URL"),
            utmify_api_token: optional("UTMIFY_API_TOKEN"),
            admin_token: optional("ADMIN_TOKEN"),
            allowpay: ProviderCredentials {
                base_url: env::var("ALLOWPAY_BASE_URL").unwrap_or_else(|_| {
                    "https://api.allowpay.online/functions/v1".to_string()
                }),
                username: optional("ALLOWPAY_USERNAME")
                    .or_else(|| optional("ALLOWPAY_SECRET_KEY")),
                password: optional("ALLOWPAY_PASSWORD")
                    .or_else(|| optional("ALLOWPAY_COMPANY_ID")),
                api_key: None,
                postback_url: optional("ALLOWPAY_POSTBACK_URL"),
            },
            marchabb: ProviderCredentials {
                base_url: env::var("MARCHABB_BASE_URL")
                    .unwrap_or_else(|_| "https://api.marchabb.com/v1".to_string()),
                username: optional("MARCHABB_PUBLIC_KEY"),
                password: optional("MARCHABB_SECRET_KEY"),
                api_key: None,
                postback_url: optional("MARCHABB_POSTBACK_URL"),
            },
            freepay: ProviderCredentials {
                base_url: env::var("FREEPAY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.freepay.com.br".to_string()),
                username: None,
                password: None,
                api_key: optional("FREEPAY_API_KEY"),
                postback_url: optional("FREEPAY_POSTBACK_URL"),
            },
            default_shipping: default_shipping_from_env(),
        }
    }
}

/// `DEFAULT_SHIPPING_JSON` holds a `{ "address": { ... } }` blob; per-field
/// env vars fill whatever it leaves empty.
fn default_shipping_from_env() -> AddressBody {
    let from_json: AddressBody = optional("DEFAULT_SHIPPING_JSON")
        .and_then(|raw| {
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(value) => serde_json::from_value(
                    value.get("address").cloned().unwrap_or(value),
                )
                .ok(),
                Err(err) => {
                    tracing::error!("DEFAULT_SHIPPING_JSON inválido: {}", err);
                    None
                }
            }
        })
        .unwrap_or_default();

    AddressBody {
        street: from_json.street.or_else(|| optional("DEFAULT_STREET")),
        street_number: from_json
            .street_number
            .or_else(|| optional("DEFAULT_STREET_NUMBER")),
        complement: from_json
            .complement
            .or_else(|| optional("DEFAULT_COMPLEMENT")),
        zip_code: from_json.zip_code.or_else(|| optional("DEFAULT_ZIP_CODE")),
        neighborhood: from_json
            .neighborhood
            .or_else(|| optional("DEFAULT_NEIGHBORHOOD")),
        city: from_json.city.or_else(|| optional("DEFAULT_CITY")),
        state: from_json.state.or_else(|| optional("DEFAULT_STATE")),
        country: from_json
            .country
            .or_else(|| optional("DEFAULT_COUNTRY"))
            .or_else(|| Some("BR".to_string())),
    }
}
