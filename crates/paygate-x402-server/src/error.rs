use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use x402::PaymentRequiredBody;

/// Startup configuration errors. Any of these aborts the process.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("invalid route '{route}': {reason}")]
    InvalidRoute { route: String, reason: String },

    /// A network outside the built-in set without a complete custom token.
    #[error("network '{network}' has no built-in asset and the custom token is incomplete (missing: {})", .missing.join(", "))]
    UnsupportedNetwork {
        network: String,
        missing: Vec<&'static str>,
    },

    #[error("custom payment token is incomplete (missing: {})", .missing.join(", "))]
    IncompleteToken { missing: Vec<&'static str> },

    #[error("no Solana fee payer available for network '{0}'")]
    MissingFeePayer(String),
}

/// Why a payment was refused. Each kind has its own overridable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    PaymentRequired,
    InvalidPayment,
    NoMatchingRequirements,
    VerificationFailed,
    SettlementFailed,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::PaymentRequired => "payment_required",
            Rejection::InvalidPayment => "invalid_payment",
            Rejection::NoMatchingRequirements => "no_matching_requirements",
            Rejection::VerificationFailed => "verification_failed",
            Rejection::SettlementFailed => "settlement_failed",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 402 challenge: the JSON body, plus a paywall page for browsers.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub body: PaymentRequiredBody,
    pub paywall_html: Option<String>,
}

/// Terminal outcome of a gated request that did not reach the handler.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("payment rejected: {kind}")]
    Rejected {
        kind: Rejection,
        challenge: Box<Challenge>,
    },

    /// The facilitator could not be reached. Not the payer's fault.
    #[error("facilitator unavailable: {0}")]
    FacilitatorUnavailable(String),
}

impl GateError {
    pub fn rejected(kind: Rejection, challenge: Challenge) -> Self {
        GateError::Rejected {
            kind,
            challenge: Box::new(challenge),
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            GateError::Rejected { kind, .. } => Some(*kind),
            GateError::FacilitatorUnavailable(_) => None,
        }
    }
}

impl ResponseError for GateError {
    fn status_code(&self) -> StatusCode {
        match self {
            GateError::Rejected { .. } => StatusCode::PAYMENT_REQUIRED,
            GateError::FacilitatorUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            GateError::Rejected { challenge, .. } => match &challenge.paywall_html {
                Some(html) => HttpResponse::PaymentRequired()
                    .content_type("text/html; charset=utf-8")
                    .body(html.clone()),
                None => HttpResponse::PaymentRequired().json(&challenge.body),
            },
            GateError::FacilitatorUnavailable(reason) => {
                tracing::error!(reason = %reason, "facilitator unavailable");
                HttpResponse::BadGateway().json(serde_json::json!({
                    "error": "facilitator unavailable"
                }))
            }
        }
    }
}
