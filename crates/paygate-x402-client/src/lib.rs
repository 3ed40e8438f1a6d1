//! x402 Client SDK for making paid API requests.
//!
//! This crate handles the HTTP 402 payment flow automatically:
//! request -> 402 -> select -> sign -> retry.
//!
//! # Quick Example
//!
//! ```no_run
//! use alloy::signers::local::PrivateKeySigner;
//! use x402_client::{ExactEvmSchemeClient, PaymentContext, X402Client};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let signer: PrivateKeySigner = "0xYOUR_KEY".parse().unwrap();
//! let client = X402Client::new(
//!     ExactEvmSchemeClient::new(signer),
//!     PaymentContext::new("base-sepolia"),
//! );
//!
//! let (resp, settlement) = client
//!     .fetch("https://api.example.com/data", reqwest::Method::GET)
//!     .await
//!     .unwrap();
//!
//! if let Some(s) = settlement {
//!     println!("Paid via tx: {:?}", s.transaction);
//! }
//! # }
//! ```

mod context;
mod http_client;
mod scheme_client;

pub use context::PaymentContext;
pub use http_client::X402Client;
pub use scheme_client::ExactEvmSchemeClient;

// Re-export commonly needed types from core
pub use x402::{
    decode_payment, encode_payment, PaymentPayload, PaymentRequiredBody, PaymentRequirements,
    SchemeClient, SettleResponse, X402Error, X402_VERSION,
};
