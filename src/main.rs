mod app;
mod error;
mod handlers;
mod models;
mod services;
mod utils;

use app::config::Config;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use services::gateway::gateway_from_config;
use services::leads::LeadStore;
use services::utmify::UtmifyClient;
use services::PaymentService;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    info!(
        "Starting PIX bridge on port {} (provider: {})",
        config.server_port, config.payment_provider
    );

    let gateway = match gateway_from_config(&config) {
        Ok(gateway) => gateway,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };

    let leads = LeadStore::connect(config.database_url.as_deref()).await;
    leads.run_migrations().await;

    let utmify = UtmifyClient::new(config.utmify_api_token.clone());

    let service = Arc::new(PaymentService::new(
        config.clone(),
        gateway,
        leads,
        utmify,
    ));

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/payment", post(handlers::payments::create_payment))
        .route(
            "/api/payment/status",
            get(handlers::payment_status::get_status),
        )
        .route(
            "/api/webhook/:provider",
            post(handlers::webhooks::provider_webhook),
        )
        .route("/api/qr", get(handlers::qr_proxy::proxy_qr))
        .route(
            "/api/comprovantes",
            get(handlers::comprovantes::list_comprovantes),
        )
        .with_state(service);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await.expect("bind server port");
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await.expect("server error");
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}
