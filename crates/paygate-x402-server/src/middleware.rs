use actix_web::HttpRequest;
use x402::{
    decode_payment, encode_settle_response, select_requirement, PaymentPayload,
    PaymentRequiredBody, PaymentRequirements, SchemeFacilitator, SettleResponse, X402Error,
    PAYMENT_HEADER, X402_VERSION,
};

use crate::config::PaymentConfig;
use crate::error::{Challenge, GateError, Rejection};
use crate::paywall::{render_paywall, PaywallContext};
use crate::resolver::ResolvedRoute;

/// Path as the actix router sees it: percent-encoded characters other than
/// `%`, `/` and `+` are already decoded, so `/%77eather` is `/weather`.
pub fn routing_path(req: &HttpRequest) -> &str {
    req.match_info().as_str()
}

/// Check if a request is for a payment-gated route.
pub fn check_payment_gate<'a>(
    req: &HttpRequest,
    config: &'a PaymentConfig,
) -> Option<&'a ResolvedRoute> {
    config.find_route(req.method().as_str(), routing_path(req))
}

/// `scheme://host/path` of the request, used as the requirement's resource.
///
/// The host comes from `Host` / `X-Forwarded-Host`, which the client controls.
/// Deployments that need a fixed resource set `RouteOptions::resource`.
pub fn request_resource(req: &HttpRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}{}", info.scheme(), info.host(), routing_path(req))
}

/// Browsers get the paywall page instead of the JSON challenge.
pub fn is_browser(req: &HttpRequest) -> bool {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    };
    header("accept").contains("text/html") && header("user-agent").contains("Mozilla")
}

/// Build the 402 Payment Required response body.
pub fn payment_required_body(
    accepts: Vec<PaymentRequirements>,
    error: String,
    payer: Option<String>,
) -> PaymentRequiredBody {
    PaymentRequiredBody {
        x402_version: X402_VERSION,
        accepts,
        error: Some(error),
        payer,
    }
}

/// Decode the X-PAYMENT header. `None` when the header is absent.
pub fn decode_payment_header(req: &HttpRequest) -> Option<Result<PaymentPayload, X402Error>> {
    let value = req.headers().get(PAYMENT_HEADER)?;
    Some(
        value
            .to_str()
            .map_err(|_| X402Error::InvalidPayment("X-PAYMENT header is not ASCII".to_string()))
            .and_then(decode_payment),
    )
}

/// Build the X-PAYMENT-RESPONSE header value.
pub fn payment_response_header(settlement: &SettleResponse) -> Result<String, X402Error> {
    encode_settle_response(settlement)
}

fn paywall_page(
    route: &ResolvedRoute,
    config: &PaymentConfig,
    accepts: &[PaymentRequirements],
    current_url: &str,
) -> String {
    if let Some(html) = &route.options.custom_paywall_html {
        return html.clone();
    }
    let ctx = PaywallContext::new(accepts, current_url, X402_VERSION, &config.custom_chains)
        .with_branding(&config.paywall)
        .with_text(
            route.options.title.as_deref(),
            route.options.message.as_deref(),
        );
    render_paywall(&ctx)
}

fn reject(
    route: &ResolvedRoute,
    accepts: &[PaymentRequirements],
    kind: Rejection,
    detail: Option<&str>,
    payer: Option<String>,
) -> GateError {
    let error = route.options.error_messages.message(kind, detail);
    GateError::rejected(
        kind,
        Challenge {
            body: payment_required_body(accepts.to_vec(), error, payer),
            paywall_html: None,
        },
    )
}

/// Run one gated request through challenge, decode, select, verify and
/// settle. Returns the settlement receipt when access may be granted.
///
/// Stateless: nothing here is shared between requests except the read-only
/// configuration. There is no retry; a failed step ends the request.
pub async fn require_payment<F: SchemeFacilitator>(
    req: &HttpRequest,
    route: &ResolvedRoute,
    config: &PaymentConfig,
    facilitator: &F,
) -> Result<SettleResponse, GateError> {
    let resource = request_resource(req);
    let accepts = route.requirements_for(&resource);

    let payload = match decode_payment_header(req) {
        None => {
            tracing::debug!(route = route.pattern.as_str(), "no payment attached, issuing challenge");
            let paywall_html =
                is_browser(req).then(|| paywall_page(route, config, &accepts, &resource));
            let error = route
                .options
                .error_messages
                .message(Rejection::PaymentRequired, None);
            return Err(GateError::rejected(
                Rejection::PaymentRequired,
                Challenge {
                    body: payment_required_body(accepts, error, None),
                    paywall_html,
                },
            ));
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "invalid payment header");
            return Err(reject(
                route,
                &accepts,
                Rejection::InvalidPayment,
                Some(&e.to_string()),
                None,
            ));
        }
        Some(Ok(payload)) => payload,
    };

    let payer = payload.payer();

    if payload.x402_version != X402_VERSION {
        tracing::warn!(
            version = payload.x402_version,
            expected = X402_VERSION,
            "payment signed for another protocol version"
        );
        let detail = format!(
            "Unsupported x402Version {}, expected {X402_VERSION}",
            payload.x402_version
        );
        return Err(reject(
            route,
            &accepts,
            Rejection::InvalidPayment,
            Some(&detail),
            payer,
        ));
    }

    let Some(selected) = select_requirement(&accepts, Some(&payload.network), payload.scheme)
    else {
        tracing::warn!(
            network = %payload.network,
            scheme = %payload.scheme,
            "no payment requirement matches the payload"
        );
        return Err(reject(
            route,
            &accepts,
            Rejection::NoMatchingRequirements,
            None,
            payer,
        ));
    };

    tracing::info!(
        payer = payer.as_deref().unwrap_or("unknown"),
        network = %selected.network,
        amount = %selected.max_amount_required,
        "payment attempt"
    );

    let verdict = match facilitator.verify(&payload, selected).await {
        Ok(verdict) => verdict,
        Err(e) if e.is_transport() => return Err(GateError::FacilitatorUnavailable(e.to_string())),
        Err(e) => {
            tracing::warn!(error = %e, "facilitator refused the verify request");
            return Err(reject(
                route,
                &accepts,
                Rejection::VerificationFailed,
                None,
                payer,
            ));
        }
    };

    if !verdict.is_valid {
        let reason = verdict.invalid_reason.as_deref().unwrap_or("invalid payment");
        let payer = verdict.payer.clone().or(payer);
        tracing::warn!(
            payer = payer.as_deref().unwrap_or("unknown"),
            reason,
            "payment verification failed"
        );
        return Err(reject(
            route,
            &accepts,
            Rejection::VerificationFailed,
            Some(reason),
            payer,
        ));
    }

    let settlement = match facilitator.settle(&payload, selected).await {
        Ok(settlement) => settlement,
        Err(e) if e.is_transport() => return Err(GateError::FacilitatorUnavailable(e.to_string())),
        Err(e) => {
            tracing::error!(
                error = %e,
                payer = payer.as_deref().unwrap_or("unknown"),
                "settlement failed after successful verification"
            );
            return Err(reject(
                route,
                &accepts,
                Rejection::SettlementFailed,
                None,
                payer,
            ));
        }
    };

    if !settlement.success {
        let reason = settlement.error_reason.as_deref().unwrap_or("unknown error");
        tracing::error!(
            payer = payer.as_deref().unwrap_or("unknown"),
            reason,
            "facilitator reported unsuccessful settlement"
        );
        return Err(reject(
            route,
            &accepts,
            Rejection::SettlementFailed,
            Some(reason),
            settlement.payer.clone().or(payer),
        ));
    }

    tracing::info!(
        payer = settlement.payer.as_deref().unwrap_or("unknown"),
        transaction = settlement.transaction.as_deref().unwrap_or(""),
        network = %settlement.network,
        "payment settled"
    );
    Ok(settlement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use base64::Engine;

    #[test]
    fn test_percent_encoded_path_still_gated() {
        let config = PaymentConfig::builder("0x209693Bc6afc0C5328bA36FaF03C514EF312287C")
            .route("GET /weather", "$0.01")
            .build()
            .unwrap();
        let req = TestRequest::get().uri("/%77eather").to_http_request();
        assert_eq!(routing_path(&req), "/weather");
        assert!(check_payment_gate(&req, &config).is_some());
    }

    #[test]
    fn test_decode_missing_header() {
        let req = TestRequest::get().uri("/protected").to_http_request();
        assert!(decode_payment_header(&req).is_none());
    }

    #[test]
    fn test_decode_invalid_base64() {
        let req = TestRequest::get()
            .insert_header((PAYMENT_HEADER, "not-valid-base64!!!"))
            .to_http_request();
        assert!(matches!(
            decode_payment_header(&req),
            Some(Err(X402Error::InvalidPayment(_)))
        ));
    }

    #[test]
    fn test_decode_invalid_json() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"this is not json");
        let req = TestRequest::get()
            .insert_header((PAYMENT_HEADER, encoded))
            .to_http_request();
        assert!(matches!(decode_payment_header(&req), Some(Err(_))));
    }

    #[test]
    fn test_browser_detection() {
        let browser = TestRequest::get()
            .insert_header(("Accept", "text/html,application/xhtml+xml"))
            .insert_header(("User-Agent", "Mozilla/5.0 (X11; Linux x86_64)"))
            .to_http_request();
        assert!(is_browser(&browser));

        let curl = TestRequest::get()
            .insert_header(("Accept", "*/*"))
            .insert_header(("User-Agent", "curl/8.0"))
            .to_http_request();
        assert!(!is_browser(&curl));
    }

    #[test]
    fn test_request_resource() {
        let req = TestRequest::get()
            .uri("/protected/item?x=1")
            .insert_header(("Host", "api.example.com"))
            .to_http_request();
        assert_eq!(request_resource(&req), "http://api.example.com/protected/item");
    }

    #[test]
    fn test_payment_required_body_carries_version() {
        let body = payment_required_body(vec![], "X-PAYMENT header is required".into(), None);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["x402Version"], 1);
        assert_eq!(json["error"], "X-PAYMENT header is required");
        assert!(json.get("payer").is_none());
    }
}
