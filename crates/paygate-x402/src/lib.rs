//! x402 payment gate: HTTP 402 pay-per-request with EIP-3009 authorizations.
//!
//! A resource server answers unpaid requests with a 402 challenge listing
//! [`PaymentRequirements`]. The client signs an "exact" authorization for one
//! of them, sends it back in the `X-PAYMENT` header, and the server has a
//! remote facilitator verify and settle it before granting access.
//!
//! # Building blocks
//!
//! - [`amount`]: display-unit prices to exact base-unit integers
//! - [`selector`]: pick the requirement for an active (network, scheme)
//! - [`codec`]: header encoding of payloads and settlement receipts
//! - [`eip712`]: typed data for `transferWithAuthorization`
//! - [`facilitator_client`]: `/verify`, `/settle`, `/supported`, `/discovery/resources`
//! - [`network`]: built-in networks and their default assets
//!
//! # Quick example (server side)
//!
//! ```no_run
//! use x402::{decode_payment, FacilitatorClient, SchemeFacilitator};
//!
//! # async fn gate(header: &str, requirements: &x402::PaymentRequirements) -> Result<(), x402::X402Error> {
//! let facilitator = FacilitatorClient::new("https://facilitator.example.com");
//! let payload = decode_payment(header)?;
//! let verdict = facilitator.verify(&payload, requirements).await?;
//! if verdict.is_valid {
//!     let receipt = facilitator.settle(&payload, requirements).await?;
//!     println!("settled in {:?}", receipt.transaction);
//! }
//! # Ok(())
//! # }
//! ```

// Core types and traits
pub mod constants;
pub mod error;
pub mod network;
pub mod payment;
pub mod response;
pub mod scheme;

// Protocol logic
pub mod amount;
pub mod codec;
pub mod eip712;
pub mod selector;

// Facilitator access
pub mod auth;
pub mod facilitator_client;

use alloy::sol;

// EIP-3009 authorization signed by the payer.
// The sol! macro derives SolStruct which provides eip712_signing_hash().
sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

// Re-exports
pub use constants::*;
pub use error::X402Error;
pub use payment::*;
pub use response::*;
pub use scheme::*;

pub use amount::{normalize_amount, to_base_units, Money};
pub use auth::{AuthHeaders, FacilitatorEndpoint, HmacAuth};
pub use codec::{decode_payment, decode_settle_response, encode_payment, encode_settle_response};
pub use facilitator_client::FacilitatorClient;
pub use selector::{require_requirement, select_requirement};
