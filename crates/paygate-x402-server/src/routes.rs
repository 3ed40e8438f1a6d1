use actix_web::{get, web, HttpRequest, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use x402::auth::tokens_match;
use x402::FacilitatorClient;

/// Who may scrape `/metrics`.
#[derive(Debug, Clone)]
pub struct MetricsAccess {
    pub token: Option<String>,
    pub public: bool,
}

#[get("/metrics")]
pub async fn metrics_endpoint(req: HttpRequest, access: web::Data<MetricsAccess>) -> HttpResponse {
    match &access.token {
        Some(expected) => {
            let authorized = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|token| tokens_match(token.as_bytes(), expected.as_bytes()))
                .unwrap_or(false);

            if !authorized {
                return HttpResponse::Unauthorized().json(json!({
                    "error": "unauthorized",
                    "message": "Valid Bearer token required for /metrics"
                }));
            }
        }
        None => {
            // No token configured: metrics stay closed unless explicitly public.
            if !access.public {
                return HttpResponse::Forbidden().json(json!({
                    "error": "forbidden",
                    "message": "Set METRICS_TOKEN or X402_PUBLIC_METRICS=true to access /metrics"
                }));
            }
        }
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(x402_server::metrics::metrics_output())
}

#[get("/health")]
pub async fn health(facilitator: web::Data<Arc<FacilitatorClient>>) -> HttpResponse {
    match facilitator.supported().await {
        Ok(_) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "service": "x402-server",
        })),
        Err(e) => {
            tracing::error!(error = %e, "health check: facilitator unreachable");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "degraded",
                "service": "x402-server",
            }))
        }
    }
}

/// Paid content behind [`x402_server::PROTECTED_ROUTE`].
pub async fn protected(req: HttpRequest) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Access granted to protected content",
        "path": req.path(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
