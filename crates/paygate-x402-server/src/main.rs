use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::http::header::{self, HeaderName};
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod routes;

use x402::network::{self, NetworkFamily};
use x402::{FacilitatorClient, HmacAuth};
use x402_server::config::GateConfig;
use x402_server::{PaymentGate, PROTECTED_ROUTE};

fn build_cors(origins: &[String]) -> Cors {
    let cors = if origins.is_empty() {
        Cors::default().allowed_origin_fn(|origin, _| {
            origin
                .to_str()
                .map(|o| o == "http://localhost" || o.starts_with("http://localhost:"))
                .unwrap_or(false)
        })
    } else {
        origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-payment"),
        ])
        .expose_headers(vec![HeaderName::from_static("x-payment-response")])
        .max_age(3600)
}

/// Solana fee payer advertised by the facilitator for a configured network.
async fn discover_fee_payer(facilitator: &FacilitatorClient, networks: &[String]) -> Option<String> {
    match facilitator.supported().await {
        Ok(supported) => supported
            .kinds
            .iter()
            .filter(|kind| networks.contains(&kind.network))
            .filter(|kind| {
                matches!(
                    network::lookup(&kind.network).map(|n| n.family),
                    Some(NetworkFamily::Svm)
                )
            })
            .find_map(|kind| kind.fee_payer().map(str::to_string)),
        Err(e) => {
            tracing::warn!(error = %e, "could not fetch supported kinds from facilitator");
            None
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GateConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let mut facilitator = FacilitatorClient::new(config.facilitator_url.clone());
    if let Some(secret) = &config.hmac_secret {
        facilitator = facilitator.with_auth(HmacAuth::new(secret.clone()));
    }

    let fee_payer = if config.needs_fee_payer() {
        discover_fee_payer(&facilitator, &config.networks).await
    } else {
        None
    };

    let payment_config = match config.payment_config(fee_payer) {
        Ok(payment_config) => Arc::new(payment_config),
        Err(e) => {
            tracing::error!(error = %e, "invalid payment configuration");
            std::process::exit(1);
        }
    };

    let port = config.port;
    let cors_origins = config.allowed_origins.clone();
    let metrics_access = web::Data::new(routes::MetricsAccess {
        token: config.metrics_token.clone(),
        public: config.public_metrics,
    });
    let facilitator = Arc::new(facilitator);
    let facilitator_data = web::Data::new(Arc::clone(&facilitator));

    tracing::info!("x402 server listening at http://localhost:{port}");
    tracing::info!("Facilitator: {}", config.facilitator_url);
    tracing::info!("Pay to: {}", config.pay_to);
    tracing::info!("Networks: {}", config.networks.join(", "));
    tracing::info!(
        "HMAC auth: {}",
        if config.hmac_secret.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    tracing::info!("Endpoints: GET /health, GET /metrics, GET {PROTECTED_ROUTE} (paid)");
    tracing::info!("Rate limit: {} req/min per IP", config.rate_limit_rpm);

    let governor_conf = match GovernorConfigBuilder::default()
        .requests_per_minute(config.rate_limit_rpm)
        .finish()
    {
        Some(conf) => conf,
        None => {
            tracing::error!(rpm = config.rate_limit_rpm, "invalid rate limit");
            std::process::exit(1);
        }
    };

    HttpServer::new(move || {
        App::new()
            .wrap(PaymentGate::shared(
                Arc::clone(&payment_config),
                Arc::clone(&facilitator),
            ))
            .wrap(build_cors(&cors_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(facilitator_data.clone())
            .app_data(metrics_access.clone())
            .service(routes::metrics_endpoint)
            .service(routes::health)
            .route("/protected", web::get().to(routes::protected))
            .route("/protected/{tail:.*}", web::get().to(routes::protected))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
