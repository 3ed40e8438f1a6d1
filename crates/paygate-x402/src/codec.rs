//! Header encoding for payment payloads and settlement receipts.
//!
//! Both travel as base64-encoded JSON. Amounts stay strings end to end, so
//! values beyond 2^53 survive the round trip.

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::constants::MAX_PAYMENT_HEADER_LEN;
use crate::{PaymentPayload, SettleResponse, X402Error};

fn encode<T: Serialize>(value: &T) -> Result<String, X402Error> {
    let json = serde_json::to_vec(value)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&json);
    if encoded.len() > MAX_PAYMENT_HEADER_LEN {
        return Err(X402Error::InvalidPayment(format!(
            "encoded header is {} bytes, limit is {MAX_PAYMENT_HEADER_LEN}",
            encoded.len()
        )));
    }
    Ok(encoded)
}

fn decode<T: DeserializeOwned>(encoded: &str) -> Result<T, X402Error> {
    let encoded = encoded.trim();
    if encoded.len() > MAX_PAYMENT_HEADER_LEN {
        return Err(X402Error::InvalidPayment(format!(
            "header is {} bytes, limit is {MAX_PAYMENT_HEADER_LEN}",
            encoded.len()
        )));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(encoded))
        .map_err(|e| X402Error::InvalidPayment(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| X402Error::InvalidPayment(format!("invalid JSON payload: {e}")))
}

/// Base64-encode a payment payload for the X-PAYMENT header.
pub fn encode_payment(payload: &PaymentPayload) -> Result<String, X402Error> {
    encode(payload)
}

/// Decode the X-PAYMENT header. Exact inverse of [`encode_payment`].
pub fn decode_payment(encoded: &str) -> Result<PaymentPayload, X402Error> {
    decode(encoded)
}

/// Base64-encode a settlement receipt for the X-PAYMENT-RESPONSE header.
pub fn encode_settle_response(settlement: &SettleResponse) -> Result<String, X402Error> {
    encode(settlement)
}

/// Decode the X-PAYMENT-RESPONSE header.
pub fn decode_settle_response(encoded: &str) -> Result<SettleResponse, X402Error> {
    decode(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExactEvmAuthorization, ExactEvmPayload, ExactPayload, ExactSvmPayload, Scheme};
    use alloy::primitives::{Address, B256};

    fn evm_payload(value: &str) -> PaymentPayload {
        PaymentPayload {
            x402_version: 1,
            scheme: Scheme::Exact,
            network: "base-sepolia".to_string(),
            payload: ExactPayload::Evm(ExactEvmPayload {
                signature: format!("0x{}", "ab".repeat(65)),
                authorization: ExactEvmAuthorization {
                    from: Address::repeat_byte(0x11),
                    to: Address::repeat_byte(0x22),
                    value: value.to_string(),
                    valid_after: "1700000000".to_string(),
                    valid_before: "1700000300".to_string(),
                    nonce: B256::repeat_byte(0x33),
                },
            }),
        }
    }

    #[test]
    fn test_roundtrip_is_lossless() {
        let payload = evm_payload("10000");
        let decoded = decode_payment(&encode_payment(&payload).unwrap()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_roundtrip_keeps_amounts_beyond_2_pow_53() {
        // 2^53 + 1 cannot be represented exactly as an f64
        let payload = evm_payload("9007199254740993");
        let decoded = decode_payment(&encode_payment(&payload).unwrap()).unwrap();
        match decoded.payload {
            ExactPayload::Evm(p) => assert_eq!(p.authorization.value, "9007199254740993"),
            ExactPayload::Svm(_) => panic!("decoded into the wrong variant"),
        }
    }

    #[test]
    fn test_svm_payload_roundtrip() {
        let payload = PaymentPayload {
            x402_version: 1,
            scheme: Scheme::Exact,
            network: "solana-devnet".to_string(),
            payload: ExactPayload::Svm(ExactSvmPayload {
                transaction: "AQID".to_string(),
            }),
        };
        let decoded = decode_payment(&encode_payment(&payload).unwrap()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_accepts_url_safe_alphabet() {
        let payload = evm_payload("10000");
        let json = serde_json::to_vec(&payload).unwrap();
        let encoded = base64::engine::general_purpose::URL_SAFE.encode(json);
        assert_eq!(decode_payment(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_decode_invalid_base64() {
        let err = decode_payment("not-valid-base64!!!").unwrap_err();
        assert!(err.to_string().contains("invalid base64"));
    }

    #[test]
    fn test_decode_invalid_json() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"this is not json");
        let err = decode_payment(&encoded).unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn test_decode_rejects_oversized_header() {
        let huge = "A".repeat(MAX_PAYMENT_HEADER_LEN + 4);
        assert!(matches!(
            decode_payment(&huge),
            Err(X402Error::InvalidPayment(_))
        ));
    }

    #[test]
    fn test_settle_response_roundtrip() {
        let receipt = SettleResponse {
            success: true,
            error_reason: None,
            payer: Some("0x1111111111111111111111111111111111111111".to_string()),
            transaction: Some("0xfeed".to_string()),
            network: "base".to_string(),
        };
        let decoded = decode_settle_response(&encode_settle_response(&receipt).unwrap()).unwrap();
        assert_eq!(decoded, receipt);
    }
}
