//! Authentication for facilitator calls and shared secret comparison.
//!
//! The facilitator client asks an [`AuthHeaders`] hook for extra headers on
//! every call. [`HmacAuth`] signs request bodies with a shared secret; any
//! `Fn(FacilitatorEndpoint, &[u8]) -> Vec<(String, String)>` closure works too.
//!
//! [`verify_hmac`] is the facilitator-side counterpart of [`HmacAuth`], for
//! services that receive these signed calls.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the HMAC of the request body.
pub const FACILITATOR_AUTH_HEADER: &str = "X-Facilitator-Auth";

/// The facilitator call being authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilitatorEndpoint {
    Verify,
    Settle,
    Supported,
    List,
}

impl FacilitatorEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacilitatorEndpoint::Verify => "verify",
            FacilitatorEndpoint::Settle => "settle",
            FacilitatorEndpoint::Supported => "supported",
            FacilitatorEndpoint::List => "list",
        }
    }
}

/// Per-call authentication-header hook.
pub trait AuthHeaders: Send + Sync {
    /// Headers to add to a call. `body` is empty for GET calls.
    fn headers(&self, endpoint: FacilitatorEndpoint, body: &[u8]) -> Vec<(String, String)>;
}

impl<F> AuthHeaders for F
where
    F: Fn(FacilitatorEndpoint, &[u8]) -> Vec<(String, String)> + Send + Sync,
{
    fn headers(&self, endpoint: FacilitatorEndpoint, body: &[u8]) -> Vec<(String, String)> {
        self(endpoint, body)
    }
}

/// Signs every facilitator request body with HMAC-SHA256.
#[derive(Clone)]
pub struct HmacAuth {
    secret: Vec<u8>,
}

impl HmacAuth {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for HmacAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacAuth")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl AuthHeaders for HmacAuth {
    fn headers(&self, _endpoint: FacilitatorEndpoint, body: &[u8]) -> Vec<(String, String)> {
        vec![(
            FACILITATOR_AUTH_HEADER.to_string(),
            compute_hmac(&self.secret, body),
        )]
    }
}

/// HMAC-SHA256 over `body`, hex-encoded.
pub fn compute_hmac(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    alloy::hex::encode(mac.finalize().into_bytes())
}

/// Check a hex HMAC signature in constant time.
pub fn verify_hmac(secret: &[u8], body: &[u8], signature: &str) -> bool {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    // Malformed hex is compared against zeros so it takes the same path.
    let expected = alloy::hex::decode(signature).unwrap_or_else(|_| vec![0u8; 32]);
    mac.verify_slice(&expected).is_ok()
}

/// Compare two secrets without leaking their content or length through timing.
pub fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    Sha256::digest(presented)
        .ct_eq(&Sha256::digest(expected))
        .into()
}
