//! UTMify order submission. Attribution is best-effort: a missing token
//! disables the client and transport or API failures are logged and
//! swallowed, never surfacing to the payment flow.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::models::payment::TrackingParameters;

pub const UTMIFY_API_URL: &str = "https://api.utmify.com.br/api-credentials/orders";

/// UTMify expects UTC timestamps as `YYYY-MM-DD HH:MM:SS`.
pub fn format_utc_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtmifyCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub document: Option<String>,
    pub country: String,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtmifyProduct {
    pub id: String,
    pub name: String,
    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    pub quantity: u32,
    pub price_in_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtmifyCommission {
    pub total_price_in_cents: i64,
    pub gateway_fee_in_cents: i64,
    pub user_commission_in_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtmifyOrder {
    pub order_id: String,
    pub platform: String,
    pub payment_method: String,
    pub status: String,
    pub created_at: String,
    pub approved_date: Option<String>,
    pub refunded_at: Option<String>,
    pub customer: UtmifyCustomer,
    pub products: Vec<UtmifyProduct>,
    pub tracking_parameters: TrackingParameters,
    pub commission: UtmifyCommission,
    pub is_test: bool,
}

impl UtmifyOrder {
    pub fn new(
        order_id: String,
        platform: String,
        status: String,
        customer: UtmifyCustomer,
        product: UtmifyProduct,
        tracking: TrackingParameters,
        total_price_in_cents: i64,
    ) -> Self {
        let now = Utc::now();
        let approved = (status == "paid").then(|| format_utc_date(now));
        UtmifyOrder {
            order_id,
            platform,
            payment_method: "pix".to_string(),
            status,
            created_at: format_utc_date(now),
            approved_date: approved,
            refunded_at: None,
            customer,
            products: vec![product],
            tracking_parameters: tracking,
            commission: UtmifyCommission {
                total_price_in_cents,
                gateway_fee_in_cents: 0,
                user_commission_in_cents: total_price_in_cents,
            },
            is_test: false,
        }
    }
}

#[derive(Clone, Default)]
pub struct UtmifyClient {
    client: Client,
    token: Option<String>,
    api_url: String,
}

impl UtmifyClient {
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            token,
            api_url: UTMIFY_API_URL.to_string(),
        }
    }

    /// Fire-and-forget order submission. No token means attribution is
    /// disabled.
    pub async fn send_order(&self, order: &UtmifyOrder) {
        let Some(token) = &self.token else { return };

        let result = self
            .client
            .post(&self.api_url)
            .header("x-api-token", token)
            .json(order)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!("utmify order {} sent ({})", order.order_id, order.status);
            }
            Ok(response) => {
                let status = response.status();
                let body = response
                    .json::<Value>()
                    .await
                    .unwrap_or_else(|_| Value::Null);
                error!("utmify rejected order: {} {}", status, body);
            }
            Err(err) => {
                error!("utmify request failed: {}", err);
            }
        }
    }
}
