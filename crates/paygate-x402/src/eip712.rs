//! EIP-712 typed data for EIP-3009 `transferWithAuthorization`.
//!
//! Provides functions for:
//! - Building the token's EIP-712 domain ([`transfer_domain`])
//! - Converting wire authorizations to the typed struct ([`typed_authorization`])
//! - Computing signing hashes ([`signing_hash`])
//! - Recovering signers with EIP-2 malleability protection ([`recover_signer`])
//! - Generating random nonces ([`random_nonce`]) and hex signatures ([`encode_signature_hex`])
//!
//! Payers use the domain, hash, nonce and encoding helpers. The gate never
//! checks signatures itself; [`typed_authorization`], [`recover_signer`] and
//! [`decode_signature_hex`] are facilitator-side utilities for services that
//! verify payloads locally.

use alloy::primitives::{Address, FixedBytes, Signature, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};

use crate::payment::{ExactEvmAuthorization, ExactEvmExtra};
use crate::{TransferWithAuthorization, X402Error};

/// Build the EIP-712 domain of a token contract.
pub fn transfer_domain(extra: &ExactEvmExtra, chain_id: u64, token: Address) -> Eip712Domain {
    Eip712Domain {
        name: Some(std::borrow::Cow::Owned(extra.name.clone())),
        version: Some(std::borrow::Cow::Owned(extra.version.clone())),
        chain_id: Some(U256::from(chain_id)),
        verifying_contract: Some(token),
        salt: None,
    }
}

fn parse_u256(field: &str, value: &str) -> Result<U256, X402Error> {
    U256::from_str_radix(value, 10)
        .map_err(|e| X402Error::InvalidPayment(format!("invalid {field} '{value}': {e}")))
}

/// Convert the string-typed wire authorization into the typed EIP-712 struct.
pub fn typed_authorization(
    auth: &ExactEvmAuthorization,
) -> Result<TransferWithAuthorization, X402Error> {
    Ok(TransferWithAuthorization {
        from: auth.from,
        to: auth.to,
        value: parse_u256("value", &auth.value)?,
        validAfter: parse_u256("validAfter", &auth.valid_after)?,
        validBefore: parse_u256("validBefore", &auth.valid_before)?,
        nonce: auth.nonce,
    })
}

/// Compute the EIP-712 signing hash.
pub fn signing_hash(auth: &TransferWithAuthorization, domain: &Eip712Domain) -> B256 {
    auth.eip712_signing_hash(domain)
}

/// secp256k1 curve order N / 2. Signatures with s > this are malleable (EIP-2).
const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xDFE92F46681B20A0,
    0x5D576E7357A4501D,
    0xFFFFFFFFFFFFFFFF,
    0x7FFFFFFFFFFFFFFF,
]);

/// Recover the address that signed `auth` under `domain`.
/// Rejects high-s signatures (EIP-2).
pub fn recover_signer(
    auth: &TransferWithAuthorization,
    domain: &Eip712Domain,
    signature_bytes: &[u8],
) -> Result<Address, X402Error> {
    if signature_bytes.len() != 65 {
        return Err(X402Error::SignatureError(format!(
            "signature must be 65 bytes, got {}",
            signature_bytes.len()
        )));
    }

    let sig = Signature::from_raw(signature_bytes)
        .map_err(|e| X402Error::SignatureError(format!("invalid signature: {e}")))?;

    if sig.s() > SECP256K1_N_DIV_2 {
        return Err(X402Error::SignatureError(
            "high-s signature rejected (EIP-2 malleability)".to_string(),
        ));
    }

    sig.recover_address_from_prehash(&signing_hash(auth, domain))
        .map_err(|e| X402Error::SignatureError(format!("recovery failed: {e}")))
}

/// Generate a random 32-byte nonce from the OS CSPRNG.
pub fn random_nonce() -> FixedBytes<32> {
    let mut bytes = [0u8; 32];
    rand::fill(&mut bytes);
    FixedBytes::from(bytes)
}

/// Encode a Signature to a hex string with 0x prefix (65 bytes -> 0x + 130 hex).
/// Uses Electrum notation: v = 27 or 28 in the last byte.
pub fn encode_signature_hex(sig: &Signature) -> String {
    format!("0x{}", alloy::hex::encode(sig.as_bytes()))
}

/// Decode a 0x-prefixed hex signature.
pub fn decode_signature_hex(sig: &str) -> Result<Vec<u8>, X402Error> {
    alloy::hex::decode(sig.strip_prefix("0x").unwrap_or(sig))
        .map_err(|e| X402Error::SignatureError(format!("invalid signature hex: {e}")))
}
