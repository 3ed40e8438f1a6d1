//! The two seams of the payer / resource server / facilitator model.
//!
//! - [`SchemeClient`]: payer side: turns a requirement into a signed payload
//! - [`SchemeFacilitator`]: server-side view of the facilitator: verifies and settles
//!
//! [`FacilitatorClient`](crate::FacilitatorClient) implements [`SchemeFacilitator`]
//! over HTTP; tests and in-process deployments can provide their own.

use crate::error::X402Error;
use crate::payment::{PaymentPayload, PaymentRequirements};
use crate::response::{SettleResponse, VerifyResponse};

/// Payer side of a scheme.
pub trait SchemeClient: Send + Sync {
    /// Sign a payload for `requirements` at protocol `x402_version`.
    ///
    /// Produces an authorization only; no transaction is sent.
    fn create_payment(
        &self,
        x402_version: u32,
        requirements: &PaymentRequirements,
    ) -> impl std::future::Future<Output = Result<PaymentPayload, X402Error>> + Send;
}

/// Verifies and settles payments.
///
/// `verify` returning `is_valid = false` is a normal negative answer, not an
/// error. `settle` must only be called after a positive `verify` for the same
/// payload; implementations are not required to re-validate.
pub trait SchemeFacilitator: Send + Sync {
    /// Verify a payment payload against the requirements.
    fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> impl std::future::Future<Output = Result<VerifyResponse, X402Error>> + Send;

    /// Settle a verified payment on-chain.
    fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> impl std::future::Future<Output = Result<SettleResponse, X402Error>> + Send;
}
