use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::app::config::Config;
use crate::error::ApiError;
use crate::models::payment::{
    AddressBody, PaymentOrder, PaymentRequest, PaymentResponse, TrackingData,
};
use crate::services::gateway::PixGateway;
use crate::services::leads::{LeadStore, NewLead};
use crate::services::normalize::{
    extract_webhook_event, is_paid_status, normalize_amount_to_cents,
};
use crate::services::utmify::{UtmifyClient, UtmifyCustomer, UtmifyOrder, UtmifyProduct};

/// Extra request context the handlers pull out of headers.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub referer: Option<String>,
    pub forwarded_for: Option<String>,
    pub user_agent: Option<String>,
}

pub struct PaymentService {
    pub config: Config,
    gateway: Arc<dyn PixGateway>,
    pub leads: LeadStore,
    utmify: UtmifyClient,
    /// Plain client for the QR image proxy.
    pub http: reqwest::Client,
}

impl PaymentService {
    pub fn new(
        config: Config,
        gateway: Arc<dyn PixGateway>,
        leads: LeadStore,
        utmify: UtmifyClient,
    ) -> Self {
        Self {
            config,
            gateway,
            leads,
            utmify,
            http: reqwest::Client::new(),
        }
    }

    fn platform(&self) -> String {
        match self.gateway.name() {
            "allowpay" => "AllowPay".to_string(),
            "marchabb" => "Marchabb".to_string(),
            "freepay" => "FreePay".to_string(),
            other => other.to_string(),
        }
    }

    /// Merges the body address with the configured default, field by
    /// field. Returns `None` when a required field is still missing.
    fn resolve_shipping(&self, from_body: Option<&AddressBody>) -> Option<AddressBody> {
        let defaults = &self.config.default_shipping;
        let pick = |body: Option<&String>, fallback: &Option<String>| {
            body.filter(|s| !s.is_empty())
                .cloned()
                .or_else(|| fallback.clone().filter(|s| !s.is_empty()))
        };

        let address = AddressBody {
            street: pick(from_body.and_then(|a| a.street.as_ref()), &defaults.street),
            street_number: pick(
                from_body.and_then(|a| a.street_number.as_ref()),
                &defaults.street_number,
            ),
            complement: pick(
                from_body.and_then(|a| a.complement.as_ref()),
                &defaults.complement,
            ),
            zip_code: pick(
                from_body.and_then(|a| a.zip_code.as_ref()),
                &defaults.zip_code,
            ),
            neighborhood: pick(
                from_body.and_then(|a| a.neighborhood.as_ref()),
                &defaults.neighborhood,
            ),
            city: pick(from_body.and_then(|a| a.city.as_ref()), &defaults.city),
            state: pick(from_body.and_then(|a| a.state.as_ref()), &defaults.state),
            country: pick(
                from_body.and_then(|a| a.country.as_ref()),
                &defaults.country,
            ),
        };

        let required = [
            &address.street,
            &address.street_number,
            &address.zip_code,
            &address.neighborhood,
            &address.city,
            &address.state,
            &address.country,
        ];
        if required.iter().any(|field| field.is_none()) {
            return None;
        }
        Some(address)
    }

    pub async fn create_payment(
        &self,
        request: PaymentRequest,
        ctx: RequestContext,
    ) -> Result<PaymentResponse, ApiError> {
        let customer = request.normalized_customer()?;
        info!("payment request from {}", customer.email);

        let amount_cents =
            normalize_amount_to_cents(request.amount.as_ref(), &self.config.fixed_amount)?;

        let title = request
            .description
            .clone()
            .or_else(|| request.title.clone())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.config.fixed_title.clone());

        let tracking = request.normalized_tracking(ctx.referer.as_deref());

        let shipping =
            self.resolve_shipping(request.shipping.as_ref().and_then(|s| s.address.as_ref()));

        let client_ip = request
            .ip
            .clone()
            .or(ctx.forwarded_for.clone())
            .unwrap_or_default();
        let user_agent = request
            .user_agent
            .clone()
            .or(ctx.user_agent.clone())
            .unwrap_or_default();

        let order = PaymentOrder {
            customer: customer.clone(),
            amount_cents,
            title: title.clone(),
            description: request.description.clone().unwrap_or_else(|| title.clone()),
            shipping,
            client_ip: client_ip.clone(),
        };

        self.leads
            .save(NewLead {
                source: "payment_request".to_string(),
                cpf: customer.tax_id.clone(),
                nome: customer.name.clone(),
                email: customer.email.clone(),
                phone: customer.phone.clone(),
                amount_cents: Some(amount_cents),
                title: title.clone(),
                tracking: serde_json::to_string(&tracking).unwrap_or_default(),
                user_agent,
                ip: client_ip.clone(),
                ..Default::default()
            })
            .await;

        let tx = self.gateway.create_transaction(&order).await?;
        info!(
            "transaction {} created via {} ({})",
            tx.transaction_id,
            self.gateway.name(),
            tx.status
        );

        self.leads
            .save(NewLead {
                source: "payment_response".to_string(),
                cpf: customer.tax_id.clone(),
                nome: customer.name.clone(),
                email: customer.email.clone(),
                phone: customer.phone.clone(),
                amount_cents: Some(tx.amount_cents),
                title: title.clone(),
                transaction_id: tx.transaction_id.clone(),
                status: tx.status.clone(),
                ..Default::default()
            })
            .await;

        let utmify_order = UtmifyOrder::new(
            tx.transaction_id.clone(),
            self.platform(),
            "waiting_payment".to_string(),
            UtmifyCustomer {
                name: customer.name.clone(),
                email: customer.email.clone(),
                phone: (!customer.phone.is_empty()).then(|| customer.phone.clone()),
                document: (!customer.tax_id.is_empty()).then(|| customer.tax_id.clone()),
                country: "BR".to_string(),
                ip: (!client_ip.is_empty()).then(|| client_ip.clone()),
            },
            UtmifyProduct {
                id: "taxa_adesao".to_string(),
                name: title,
                plan_id: None,
                plan_name: None,
                quantity: 1,
                price_in_cents: amount_cents,
            },
            tracking.parameters(),
            amount_cents,
        );
        self.utmify.send_order(&utmify_order).await;

        Ok(PaymentResponse::from(tx))
    }

    pub async fn poll_status(&self, transaction_id: &str) -> Result<Value, ApiError> {
        self.gateway.get_status(transaction_id).await
    }

    /// Webhook relay. Errors here never reach the provider; the handler
    /// always answers 200. Repeated webhooks re-run the same update and
    /// analytics call.
    pub async fn handle_webhook(&self, provider: &str, payload: &Value) {
        let event = extract_webhook_event(payload);
        info!(
            "webhook from {}: id={:?} status={}",
            provider, event.transaction_id, event.status
        );

        if !is_paid_status(&event.status) {
            return;
        }
        let Some(transaction_id) = event.transaction_id else {
            warn!("paid webhook without transaction id, ignoring");
            return;
        };

        self.leads.mark_paid(&transaction_id).await;

        let Some(lead) = self.leads.find_by_transaction(&transaction_id).await else {
            warn!("no lead found for transaction {}", transaction_id);
            return;
        };

        let tracking = lead
            .tracking
            .as_deref()
            .and_then(|raw| serde_json::from_str::<TrackingData>(raw).ok())
            .unwrap_or_default();
        let amount_cents = lead.amount_cents.unwrap_or(0);

        let order = UtmifyOrder::new(
            transaction_id,
            self.platform(),
            "paid".to_string(),
            UtmifyCustomer {
                name: lead.nome.unwrap_or_default(),
                email: lead.email.unwrap_or_default(),
                phone: lead.phone.filter(|p| !p.is_empty()),
                document: lead.cpf.filter(|c| !c.is_empty()),
                country: "BR".to_string(),
                ip: None,
            },
            UtmifyProduct {
                id: "taxa_adesao".to_string(),
                name: lead.title.unwrap_or_else(|| self.config.fixed_title.clone()),
                plan_id: None,
                plan_name: None,
                quantity: 1,
                price_in_cents: amount_cents,
            },
            tracking.parameters(),
            amount_cents,
        );
        self.utmify.send_order(&order).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::gateway_from_config;
    use crate::services::leads::LeadStore;
    use crate::services::utmify::UtmifyClient;

    fn service_with(default_shipping: AddressBody) -> PaymentService {
        let mut config = Config::from_env();
        config.payment_provider = "allowpay".to_string();
        config.default_shipping = default_shipping;
        let gateway = gateway_from_config(&config).unwrap();
        PaymentService::new(
            config,
            gateway,
            LeadStore::default(),
            UtmifyClient::new(None),
        )
    }

    fn full_default_address() -> AddressBody {
        AddressBody {
            street: Some("Rua A".to_string()),
            street_number: Some("10".to_string()),
            complement: None,
            zip_code: Some("01000-000".to_string()),
            neighborhood: Some("Centro".to_string()),
            city: Some("São Paulo".to_string()),
            state: Some("SP".to_string()),
            country: Some("BR".to_string()),
        }
    }

    #[test]
    fn test_resolve_shipping_uses_defaults() {
        let service = service_with(full_default_address());
        let resolved = service.resolve_shipping(None).unwrap();
        assert_eq!(resolved.street.as_deref(), Some("Rua A"));
        assert_eq!(resolved.country.as_deref(), Some("BR"));
    }

    #[test]
    fn test_resolve_shipping_body_overrides_defaults() {
        let service = service_with(full_default_address());
        let body = AddressBody {
            street: Some("Av. B".to_string()),
            ..Default::default()
        };
        let resolved = service.resolve_shipping(Some(&body)).unwrap();
        assert_eq!(resolved.street.as_deref(), Some("Av. B"));
        assert_eq!(resolved.city.as_deref(), Some("São Paulo"));
    }

    #[test]
    fn test_resolve_shipping_missing_required_field() {
        let mut defaults = full_default_address();
        defaults.zip_code = None;
        let service = service_with(defaults);
        assert!(service.resolve_shipping(None).is_none());
    }
}
