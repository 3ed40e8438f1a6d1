use std::collections::HashMap;

use url::Url;
use x402::amount::to_base_units;
use x402::network::{self, NetworkFamily};
use x402::DEFAULT_FACILITATOR_URL;

use crate::error::ConfigError;
use crate::paywall::PaywallConfig;
use crate::resolver::{
    Eip712Info, NetworkPrice, Price, ResolvedRoute, RouteConfig, RouteOptions,
    RoutesConfigBuilder, TokenAmount, TokenAsset, DEFAULT_NETWORK,
};

const DEFAULT_PORT: u16 = 4021;
const DEFAULT_PRICE: &str = "$0.01";
const DEFAULT_RATE_LIMIT_RPM: u64 = 60;
/// Route protected by the demo binary.
pub const PROTECTED_ROUTE: &str = "/protected/*";

/// Resolved routes and presentation settings. Built once, shared behind `Arc`.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Most specific pattern first.
    pub routes: Vec<ResolvedRoute>,
    pub paywall: PaywallConfig,
    pub custom_chains: HashMap<String, u64>,
}

impl PaymentConfig {
    pub fn builder(pay_to: impl Into<String>) -> RoutesConfigBuilder {
        RoutesConfigBuilder::new(pay_to)
    }

    /// The gated route for a request, if any.
    pub fn find_route(&self, method: &str, path: &str) -> Option<&ResolvedRoute> {
        self.routes.iter().find(|r| r.pattern.matches(method, path))
    }
}

/// An EIP-3009 token supplied through the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomToken {
    pub address: String,
    pub name: String,
    pub symbol: Option<String>,
    pub version: String,
    pub decimals: u8,
}

/// Environment-driven settings of the `x402-server` binary.
#[derive(Clone)]
pub struct GateConfig {
    pub facilitator_url: String,
    pub pay_to: String,
    pub networks: Vec<String>,
    /// Display-unit prices, one per network or a single shared one.
    pub prices: Vec<String>,
    pub custom_token: Option<CustomToken>,
    pub custom_chain_id: Option<u64>,
    /// HMAC shared secret for facilitator auth (None = unauthenticated)
    pub hmac_secret: Option<Vec<u8>>,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub rate_limit_rpm: u64,
    pub metrics_token: Option<String>,
    pub public_metrics: bool,
    pub paywall: PaywallConfig,
    /// Fixed `resource` for the protected route instead of the request URL.
    pub resource_url: Option<String>,
}

impl std::fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateConfig")
            .field("facilitator_url", &self.facilitator_url)
            .field("pay_to", &self.pay_to)
            .field("networks", &self.networks)
            .field("prices", &self.prices)
            .field("custom_token", &self.custom_token)
            .field("custom_chain_id", &self.custom_chain_id)
            .field(
                "hmac_secret",
                &self.hmac_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("port", &self.port)
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("public_metrics", &self.public_metrics)
            .field("paywall", &self.paywall)
            .field("resource_url", &self.resource_url)
            .finish()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_truthy(value: Option<String>) -> bool {
    value.map(|v| v == "true" || v == "1").unwrap_or(false)
}

impl GateConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `var`; empty values count as unset.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let pay_to = var("RESOURCE_WALLET_ADDRESS")
            .ok_or(ConfigError::MissingRequired("RESOURCE_WALLET_ADDRESS"))?;

        let facilitator_url =
            var("FACILITATOR_URL").unwrap_or_else(|| DEFAULT_FACILITATOR_URL.to_string());
        Url::parse(&facilitator_url)
            .map_err(|_| ConfigError::InvalidUrl(facilitator_url.clone()))?;

        let networks = var("NETWORKS")
            .map(|v| split_list(&v))
            .or_else(|| var("NETWORK").map(|n| vec![n.trim().to_string()]))
            .unwrap_or_else(|| vec![DEFAULT_NETWORK.to_string()]);

        let prices = var("AMOUNTS")
            .map(|v| split_list(&v))
            .or_else(|| var("PRICE").map(|p| vec![p]))
            .unwrap_or_else(|| vec![DEFAULT_PRICE.to_string()]);
        if prices.len() != 1 && prices.len() != networks.len() {
            return Err(ConfigError::InvalidPrice(format!(
                "{} prices configured for {} networks",
                prices.len(),
                networks.len()
            )));
        }

        let custom_token = Self::custom_token(&var)?;
        let custom_chain_id = match var("PAYMENT_CHAIN_ID") {
            Some(id) => Some(id.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: "PAYMENT_CHAIN_ID",
                value: id.clone(),
            })?),
            None => None,
        };

        let hmac_secret = var("FACILITATOR_SHARED_SECRET").map(|s| s.into_bytes());
        if hmac_secret.is_none() {
            tracing::warn!(
                "FACILITATOR_SHARED_SECRET not set, facilitator requests are unauthenticated"
            );
        }

        let port = var("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let rate_limit_rpm = var("RATE_LIMIT_RPM")
            .and_then(|r| r.parse().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT_RPM);

        let allowed_origins = var("ALLOWED_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let metrics_token = var("METRICS_TOKEN");
        let public_metrics = is_truthy(var("X402_PUBLIC_METRICS"));

        let paywall = PaywallConfig {
            app_name: var("PAYWALL_APP_NAME"),
            app_logo: var("PAYWALL_APP_LOGO"),
        };

        let resource_url = var("RESOURCE_URL");
        if let Some(url) = &resource_url {
            Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
        }

        Ok(Self {
            facilitator_url,
            pay_to,
            networks,
            prices,
            custom_token,
            custom_chain_id,
            hmac_secret,
            port,
            allowed_origins,
            rate_limit_rpm,
            metrics_token,
            public_metrics,
            paywall,
            resource_url,
        })
    }

    /// All of address, name, version and decimals, or none of them.
    fn custom_token(
        var: &impl Fn(&str) -> Option<String>,
    ) -> Result<Option<CustomToken>, ConfigError> {
        let address = var("PAYMENT_TOKEN_ADDRESS");
        let name = var("PAYMENT_TOKEN_NAME");
        let version = var("PAYMENT_TOKEN_VERSION");
        let decimals = var("PAYMENT_TOKEN_DECIMALS");

        if address.is_none() && name.is_none() && version.is_none() && decimals.is_none() {
            return Ok(None);
        }

        let mut missing = Vec::new();
        if address.is_none() {
            missing.push("PAYMENT_TOKEN_ADDRESS");
        }
        if name.is_none() {
            missing.push("PAYMENT_TOKEN_NAME");
        }
        if version.is_none() {
            missing.push("PAYMENT_TOKEN_VERSION");
        }
        if decimals.is_none() {
            missing.push("PAYMENT_TOKEN_DECIMALS");
        }
        let (Some(address), Some(name), Some(version), Some(decimals)) =
            (address, name, version, decimals)
        else {
            return Err(ConfigError::IncompleteToken { missing });
        };

        let decimals: u8 = decimals
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                var: "PAYMENT_TOKEN_DECIMALS",
                value: decimals.clone(),
            })?;

        Ok(Some(CustomToken {
            address,
            name,
            symbol: var("PAYMENT_TOKEN_SYMBOL"),
            version,
            decimals,
        }))
    }

    /// True when a configured network settles on Solana.
    pub fn needs_fee_payer(&self) -> bool {
        self.networks
            .iter()
            .any(|n| matches!(network::lookup(n).map(|i| i.family), Some(NetworkFamily::Svm)))
    }

    fn price_for(&self, index: usize) -> Result<Price, ConfigError> {
        let price = self
            .prices
            .get(index)
            .or_else(|| self.prices.first())
            .map(String::as_str)
            .unwrap_or(DEFAULT_PRICE);

        let Some(token) = &self.custom_token else {
            return Ok(Price::from(price));
        };
        let amount = to_base_units(price, token.decimals)
            .map_err(|e| ConfigError::InvalidPrice(e.to_string()))?;
        Ok(Price::Token(TokenAmount {
            amount,
            asset: TokenAsset {
                address: token.address.clone(),
                decimals: Some(token.decimals),
                eip712: Some(Eip712Info {
                    name: token.name.clone(),
                    version: token.version.clone(),
                }),
            },
        }))
    }

    /// Payment config protecting [`PROTECTED_ROUTE`] on every configured network.
    pub fn payment_config(
        &self,
        svm_fee_payer: Option<String>,
    ) -> Result<PaymentConfig, ConfigError> {
        let networks = self
            .networks
            .iter()
            .enumerate()
            .map(|(i, network)| {
                Ok(NetworkPrice {
                    network: network.clone(),
                    price: Some(self.price_for(i)?),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let route = RouteConfig {
            price: self.price_for(0)?,
            network: None,
            networks,
            config: RouteOptions {
                description: Some("Access to protected content".to_string()),
                mime_type: Some("application/json".to_string()),
                resource: self.resource_url.clone(),
                ..RouteOptions::default()
            },
        };

        let mut builder = RoutesConfigBuilder::new(self.pay_to.clone())
            .route(PROTECTED_ROUTE, route)
            .paywall(self.paywall.clone());
        if let Some(fee_payer) = svm_fee_payer {
            builder = builder.svm_fee_payer(fee_payer);
        }
        if let Some(chain_id) = self.custom_chain_id {
            for network in &self.networks {
                if network::lookup(network).is_none() {
                    builder = builder.custom_chain(network.clone(), chain_id);
                }
            }
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            GateConfig::from_lookup(lookup(&[("RESOURCE_WALLET_ADDRESS", PAY_TO)])).unwrap();
        assert_eq!(config.facilitator_url, DEFAULT_FACILITATOR_URL);
        assert_eq!(config.networks, vec!["base-sepolia"]);
        assert_eq!(config.prices, vec!["$0.01"]);
        assert_eq!(config.port, 4021);
        assert_eq!(config.rate_limit_rpm, 60);
        assert!(config.custom_token.is_none());
        assert!(!config.public_metrics);
        assert!(!config.needs_fee_payer());
    }

    #[test]
    fn test_pay_to_is_required() {
        let err = GateConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingRequired("RESOURCE_WALLET_ADDRESS")
        ));
    }

    #[test]
    fn test_invalid_facilitator_url() {
        let err = GateConfig::from_lookup(lookup(&[
            ("RESOURCE_WALLET_ADDRESS", PAY_TO),
            ("FACILITATOR_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn test_networks_and_amounts_align() {
        let config = GateConfig::from_lookup(lookup(&[
            ("RESOURCE_WALLET_ADDRESS", PAY_TO),
            ("NETWORKS", "base-sepolia, avalanche-fuji"),
            ("AMOUNTS", "$0.01,$0.05"),
        ]))
        .unwrap();
        let payment = config.payment_config(None).unwrap();
        let reqs = &payment.routes[0].requirements;
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].max_amount_required, "10000");
        assert_eq!(reqs[1].network, "avalanche-fuji");
        assert_eq!(reqs[1].max_amount_required, "50000");
        assert!(payment.find_route("GET", "/protected").is_some());
        assert!(payment.find_route("GET", "/protected/deep/path").is_some());
        assert!(payment.find_route("GET", "/health").is_none());
    }

    #[test]
    fn test_mismatched_amounts_rejected() {
        let err = GateConfig::from_lookup(lookup(&[
            ("RESOURCE_WALLET_ADDRESS", PAY_TO),
            ("NETWORKS", "base,polygon,sei"),
            ("AMOUNTS", "$0.01,$0.02"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPrice(_)));
    }

    #[test]
    fn test_custom_token_from_env() {
        let config = GateConfig::from_lookup(lookup(&[
            ("RESOURCE_WALLET_ADDRESS", PAY_TO),
            ("NETWORK", "my-chain"),
            ("PRICE", "0.5"),
            ("PAYMENT_TOKEN_ADDRESS", "0x1111111111111111111111111111111111111111"),
            ("PAYMENT_TOKEN_NAME", "My Token"),
            ("PAYMENT_TOKEN_VERSION", "1"),
            ("PAYMENT_TOKEN_DECIMALS", "18"),
            ("PAYMENT_CHAIN_ID", "31337"),
        ]))
        .unwrap();
        let payment = config.payment_config(None).unwrap();
        let req = &payment.routes[0].requirements[0];
        assert_eq!(req.network, "my-chain");
        assert_eq!(req.max_amount_required, "500000000000000000");
        assert_eq!(req.evm_extra().unwrap().name, "My Token");
        assert_eq!(payment.custom_chains.get("my-chain"), Some(&31337));
    }

    #[test]
    fn test_partial_custom_token_is_fatal() {
        let err = GateConfig::from_lookup(lookup(&[
            ("RESOURCE_WALLET_ADDRESS", PAY_TO),
            ("PAYMENT_TOKEN_ADDRESS", "0x1111111111111111111111111111111111111111"),
            ("PAYMENT_TOKEN_NAME", "My Token"),
        ]))
        .unwrap_err();
        match err {
            ConfigError::IncompleteToken { missing } => {
                assert_eq!(
                    missing,
                    vec!["PAYMENT_TOKEN_VERSION", "PAYMENT_TOKEN_DECIMALS"]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_network_without_token_is_fatal() {
        let config = GateConfig::from_lookup(lookup(&[
            ("RESOURCE_WALLET_ADDRESS", PAY_TO),
            ("NETWORK", "my-chain"),
        ]))
        .unwrap();
        assert!(matches!(
            config.payment_config(None),
            Err(ConfigError::UnsupportedNetwork { .. })
        ));
    }

    #[test]
    fn test_solana_network_needs_fee_payer() {
        let config = GateConfig::from_lookup(lookup(&[
            ("RESOURCE_WALLET_ADDRESS", PAY_TO),
            ("NETWORKS", "base-sepolia,solana-devnet"),
        ]))
        .unwrap();
        assert!(config.needs_fee_payer());
    }

    #[test]
    fn test_resource_url_pins_requirement_resource() {
        let config = GateConfig::from_lookup(lookup(&[
            ("RESOURCE_WALLET_ADDRESS", PAY_TO),
            ("RESOURCE_URL", "https://api.example.com/protected"),
        ]))
        .unwrap();
        let payment = config.payment_config(None).unwrap();
        let route = payment.find_route("GET", "/protected/item").unwrap();
        let reqs = route.requirements_for("http://attacker.example/protected/item");
        assert_eq!(reqs[0].resource, "https://api.example.com/protected");

        let err = GateConfig::from_lookup(lookup(&[
            ("RESOURCE_WALLET_ADDRESS", PAY_TO),
            ("RESOURCE_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = GateConfig::from_lookup(lookup(&[
            ("RESOURCE_WALLET_ADDRESS", PAY_TO),
            ("FACILITATOR_SHARED_SECRET", "super-secret"),
            ("METRICS_TOKEN", "metrics-secret"),
        ]))
        .unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(!dbg.contains("metrics-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
