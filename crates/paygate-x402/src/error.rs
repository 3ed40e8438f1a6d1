use thiserror::Error;

/// Errors returned by x402 operations.
#[derive(Debug, Error)]
pub enum X402Error {
    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("invalid payment: {0}")]
    InvalidPayment(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("no payment requirement matches network {network:?} and scheme '{scheme}'")]
    NoMatchingRequirements {
        network: Option<String>,
        scheme: String,
    },

    #[error("invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("config error: {0}")]
    ConfigError(String),

    /// The facilitator answered, but not with 200.
    #[error("facilitator {endpoint} returned {status}: {body}")]
    FacilitatorRejected {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// The facilitator could not be reached at all.
    #[error("unable to connect to facilitator at {url}: {reason}")]
    FacilitatorUnreachable { url: String, reason: String },

    /// The resource server answered a paid request with another 402.
    #[error("payment rejected by resource server: {0}")]
    PaymentRejected(String),

    #[error("http error: {0}")]
    HttpError(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl X402Error {
    /// True when the failure is infrastructure ("facilitator is down"),
    /// false when a remote party answered and said no.
    pub fn is_transport(&self) -> bool {
        matches!(self, X402Error::FacilitatorUnreachable { .. })
    }
}
