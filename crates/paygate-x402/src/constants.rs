/// Protocol version spoken by the gate and used for first-attempt signatures.
pub const X402_VERSION: u32 = 1;

/// Request header carrying the base64-encoded [`PaymentPayload`](crate::PaymentPayload).
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// Response header carrying the base64-encoded [`SettleResponse`](crate::SettleResponse).
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Facilitator used when none is configured.
pub const DEFAULT_FACILITATOR_URL: &str = "https://facilitator.infra402.com";

/// Base-unit amount substituted when a price cannot be normalized
/// (0.01 of a 6-decimal token).
pub const DEFAULT_AMOUNT: &str = "10000";

/// Decimals assumed when a requirement does not say (USDC).
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// Authorization validity window when a route does not configure one.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Upper bound on an encoded payment header.
pub const MAX_PAYMENT_HEADER_LEN: usize = 16 * 1024;

/// Largest token decimal count accepted by the amount normalizer.
pub const MAX_TOKEN_DECIMALS: u8 = 36;
