use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// Payment scheme identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Authorizes transfer of a precise amount.
    Exact,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Exact => "exact",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// EIP-712 domain metadata for an "exact" payment on an EVM network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmExtra {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

/// Metadata for an "exact" payment on Solana.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSvmExtra {
    pub fee_payer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

/// Scheme-specific requirement metadata.
///
/// The wire format carries no tag, so variants are told apart by shape:
/// `{name, version}` is EVM, `{feePayer}` is Solana. Anything else is kept
/// verbatim so a requirement round-trips untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequirementExtra {
    ExactEvm(ExactEvmExtra),
    ExactSvm(ExactSvmExtra),
    Other(serde_json::Value),
}

impl RequirementExtra {
    pub fn decimals(&self) -> Option<u8> {
        match self {
            RequirementExtra::ExactEvm(e) => e.decimals,
            RequirementExtra::ExactSvm(e) => e.decimals,
            RequirementExtra::Other(v) => v
                .get("decimals")
                .and_then(|d| d.as_u64())
                .and_then(|d| u8::try_from(d).ok()),
        }
    }
}

/// A single entry in the `accepts` array of a 402 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: Scheme,
    pub network: String,
    /// Exact amount in the token's base units, as a decimal integer string.
    pub max_amount_required: String,
    pub resource: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<RequirementExtra>,
}

impl PaymentRequirements {
    /// EIP-712 domain metadata, if this requirement targets an EVM token.
    pub fn evm_extra(&self) -> Option<&ExactEvmExtra> {
        match &self.extra {
            Some(RequirementExtra::ExactEvm(e)) => Some(e),
            _ => None,
        }
    }
}

/// EIP-3009 `transferWithAuthorization` arguments as they travel on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmAuthorization {
    pub from: Address,
    pub to: Address,
    /// Decimal string; never coerced through a float.
    pub value: String,
    pub valid_after: String,
    pub valid_before: String,
    pub nonce: B256,
}

/// Signed "exact" authorization for an EVM token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: String,
    pub authorization: ExactEvmAuthorization,
}

/// Partially-signed Solana transfer (base64 transaction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSvmPayload {
    pub transaction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExactPayload {
    Evm(ExactEvmPayload),
    Svm(ExactSvmPayload),
}

/// Wire-format payment payload (sent in the X-PAYMENT header, base64-encoded JSON).
///
/// Never mutated after signing: changing any authorization field invalidates
/// the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u32,
    pub scheme: Scheme,
    pub network: String,
    pub payload: ExactPayload,
}

impl PaymentPayload {
    /// Address of the signer, when the payload carries one.
    pub fn payer(&self) -> Option<String> {
        match &self.payload {
            ExactPayload::Evm(p) => Some(p.authorization.from.to_string()),
            ExactPayload::Svm(_) => None,
        }
    }
}

/// The 402 response body returned by the resource server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    pub x402_version: u32,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Body of `POST /verify` and `POST /settle` on the facilitator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest<'a> {
    pub x402_version: u32,
    pub payment_payload: &'a PaymentPayload,
    pub payment_requirements: &'a PaymentRequirements,
}

impl<'a> FacilitatorRequest<'a> {
    pub fn new(payload: &'a PaymentPayload, requirements: &'a PaymentRequirements) -> Self {
        Self {
            x402_version: payload.x402_version,
            payment_payload: payload,
            payment_requirements: requirements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_wire_names() {
        let json = serde_json::json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "maxAmountRequired": "10000",
            "resource": "https://api.example.com/protected",
            "description": "Access to protected content",
            "mimeType": "application/json",
            "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
            "maxTimeoutSeconds": 300,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "extra": { "name": "USDC", "version": "2" }
        });
        let req: PaymentRequirements = serde_json::from_value(json).unwrap();
        assert_eq!(req.scheme, Scheme::Exact);
        assert_eq!(req.max_amount_required, "10000");
        let extra = req.evm_extra().unwrap();
        assert_eq!(extra.name, "USDC");
        assert_eq!(extra.version, "2");
    }

    #[test]
    fn test_svm_extra_is_recognized() {
        let extra: RequirementExtra =
            serde_json::from_value(serde_json::json!({ "feePayer": "FeePayer111" })).unwrap();
        assert!(matches!(extra, RequirementExtra::ExactSvm(ref e) if e.fee_payer == "FeePayer111"));
    }

    #[test]
    fn test_unknown_extra_is_preserved() {
        let raw = serde_json::json!({ "decimals": 18, "foo": "bar" });
        let extra: RequirementExtra = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(extra.decimals(), Some(18));
        assert_eq!(serde_json::to_value(&extra).unwrap(), raw);
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let result = serde_json::from_value::<Scheme>(serde_json::json!("upto"));
        assert!(result.is_err());
    }

    #[test]
    fn test_facilitator_request_shape() {
        let payload = PaymentPayload {
            x402_version: 1,
            scheme: Scheme::Exact,
            network: "solana-devnet".to_string(),
            payload: ExactPayload::Svm(ExactSvmPayload {
                transaction: "AAAA".to_string(),
            }),
        };
        let requirements: PaymentRequirements = serde_json::from_value(serde_json::json!({
            "scheme": "exact",
            "network": "solana-devnet",
            "maxAmountRequired": "1",
            "resource": "https://x/y",
            "payTo": "Recipient111",
            "maxTimeoutSeconds": 60,
            "asset": "Mint111"
        }))
        .unwrap();
        let body = serde_json::to_value(FacilitatorRequest::new(&payload, &requirements)).unwrap();
        assert_eq!(body["x402Version"], 1);
        assert_eq!(body["paymentPayload"]["payload"]["transaction"], "AAAA");
        assert_eq!(body["paymentRequirements"]["payTo"], "Recipient111");
    }
}
