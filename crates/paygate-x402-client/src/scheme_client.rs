use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use alloy::signers::Signer;

use x402::{
    eip712::{encode_signature_hex, random_nonce, signing_hash, transfer_domain},
    network, ExactEvmAuthorization, ExactEvmPayload, ExactPayload, PaymentPayload,
    PaymentRequirements, Scheme, SchemeClient, TransferWithAuthorization, X402Error,
};

/// Client-side "exact" scheme for EVM tokens: signs an EIP-3009
/// `TransferWithAuthorization` for the requirement's amount.
///
/// Use this with [`X402Client`](crate::X402Client) to make paid API requests.
pub struct ExactEvmSchemeClient<S> {
    signer: S,
    custom_chains: HashMap<String, u64>,
}

impl<S: Signer + Send + Sync> ExactEvmSchemeClient<S> {
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            custom_chains: HashMap::new(),
        }
    }

    /// Chain id of a network outside the built-in table.
    pub fn with_custom_chain(mut self, network: impl Into<String>, chain_id: u64) -> Self {
        self.custom_chains.insert(network.into(), chain_id);
        self
    }

    /// Get the address of the signer.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    fn chain_id(&self, network: &str) -> Option<u64> {
        network::chain_id(network).or_else(|| self.custom_chains.get(network).copied())
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, X402Error> {
    value
        .parse()
        .map_err(|e| X402Error::ConfigError(format!("invalid {field} address '{value}': {e}")))
}

impl<S: Signer + Send + Sync> SchemeClient for ExactEvmSchemeClient<S> {
    async fn create_payment(
        &self,
        x402_version: u32,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, X402Error> {
        let extra = requirements.evm_extra().ok_or_else(|| {
            X402Error::UnsupportedScheme(format!(
                "requirement for '{}' carries no EIP-712 token domain",
                requirements.network
            ))
        })?;
        let chain_id = self.chain_id(&requirements.network).ok_or_else(|| {
            X402Error::ConfigError(format!(
                "no chain id known for network '{}'",
                requirements.network
            ))
        })?;
        let token = parse_address("asset", &requirements.asset)?;
        let pay_to = parse_address("payTo", &requirements.pay_to)?;
        let value = U256::from_str_radix(&requirements.max_amount_required, 10).map_err(|e| {
            X402Error::InvalidAmount {
                amount: requirements.max_amount_required.clone(),
                reason: e.to_string(),
            }
        })?;

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| X402Error::ConfigError(format!("system time error: {e}")))?
            .as_secs();
        let valid_after = now;
        let valid_before = now + requirements.max_timeout_seconds;
        let nonce = random_nonce();
        let from = self.signer.address();

        let auth = TransferWithAuthorization {
            from,
            to: pay_to,
            value,
            validAfter: U256::from(valid_after),
            validBefore: U256::from(valid_before),
            nonce,
        };
        let domain = transfer_domain(extra, chain_id, token);
        let sig = self
            .signer
            .sign_hash(&signing_hash(&auth, &domain))
            .await
            .map_err(|e| X402Error::SignatureError(format!("signing failed: {e}")))?;

        tracing::debug!(
            network = %requirements.network,
            amount = %value,
            payer = %from,
            "signed payment authorization"
        );

        Ok(PaymentPayload {
            x402_version,
            scheme: Scheme::Exact,
            network: requirements.network.clone(),
            payload: ExactPayload::Evm(ExactEvmPayload {
                signature: encode_signature_hex(&sig),
                authorization: ExactEvmAuthorization {
                    from,
                    to: pay_to,
                    value: value.to_string(),
                    valid_after: valid_after.to_string(),
                    valid_before: valid_before.to_string(),
                    nonce,
                },
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::local::PrivateKeySigner;
    use x402::eip712::{decode_signature_hex, recover_signer, typed_authorization};

    fn requirements(network: &str) -> PaymentRequirements {
        serde_json::from_value(serde_json::json!({
            "scheme": "exact",
            "network": network,
            "maxAmountRequired": "10000",
            "resource": "https://api.example.com/data",
            "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
            "maxTimeoutSeconds": 60,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "extra": { "name": "USDC", "version": "2" }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_payload_recovers_to_signer() {
        let signer = PrivateKeySigner::random();
        let client = ExactEvmSchemeClient::new(signer.clone());
        let req = requirements("base-sepolia");

        let payload = client.create_payment(1, &req).await.unwrap();
        assert_eq!(payload.x402_version, 1);
        assert_eq!(payload.network, "base-sepolia");

        let ExactPayload::Evm(evm) = &payload.payload else {
            panic!("expected an EVM payload");
        };
        assert_eq!(evm.authorization.from, signer.address());
        assert_eq!(evm.authorization.value, "10000");
        assert_eq!(evm.signature.len(), 132);

        let after: u64 = evm.authorization.valid_after.parse().unwrap();
        let before: u64 = evm.authorization.valid_before.parse().unwrap();
        assert_eq!(before - after, 60);

        let domain = transfer_domain(
            req.evm_extra().unwrap(),
            84532,
            req.asset.parse().unwrap(),
        );
        let auth = typed_authorization(&evm.authorization).unwrap();
        let sig = decode_signature_hex(&evm.signature).unwrap();
        assert_eq!(recover_signer(&auth, &domain, &sig).unwrap(), signer.address());
    }

    #[tokio::test]
    async fn test_version_is_taken_from_caller() {
        let client = ExactEvmSchemeClient::new(PrivateKeySigner::random());
        let payload = client
            .create_payment(2, &requirements("base-sepolia"))
            .await
            .unwrap();
        assert_eq!(payload.x402_version, 2);
    }

    #[tokio::test]
    async fn test_nonces_are_fresh() {
        let client = ExactEvmSchemeClient::new(PrivateKeySigner::random());
        let req = requirements("base-sepolia");
        let a = client.create_payment(1, &req).await.unwrap();
        let b = client.create_payment(1, &req).await.unwrap();
        match (a.payload, b.payload) {
            (ExactPayload::Evm(a), ExactPayload::Evm(b)) => {
                assert_ne!(a.authorization.nonce, b.authorization.nonce)
            }
            _ => panic!("expected EVM payloads"),
        }
    }

    #[tokio::test]
    async fn test_custom_network_needs_chain_id() {
        let req = requirements("my-chain");
        let client = ExactEvmSchemeClient::new(PrivateKeySigner::random());
        assert!(matches!(
            client.create_payment(1, &req).await,
            Err(X402Error::ConfigError(_))
        ));

        let client = client.with_custom_chain("my-chain", 777);
        assert!(client.create_payment(1, &req).await.is_ok());
    }

    #[tokio::test]
    async fn test_solana_requirement_is_refused() {
        let mut req = requirements("solana-devnet");
        req.extra = serde_json::from_value(serde_json::json!({ "feePayer": "FeePayer111" })).ok();
        let client = ExactEvmSchemeClient::new(PrivateKeySigner::random());
        assert!(matches!(
            client.create_payment(1, &req).await,
            Err(X402Error::UnsupportedScheme(_))
        ));
    }
}
