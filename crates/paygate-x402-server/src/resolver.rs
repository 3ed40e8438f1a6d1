//! Route table to concrete payment requirements.
//!
//! A route table maps a pattern (`"/premium/*"`, `"POST /api/[id]"`) to a
//! price. [`RoutesConfigBuilder::build`] resolves every entry into the list of
//! [`PaymentRequirements`] the gate offers for it, failing at startup on any
//! network that has neither a built-in asset nor a complete custom token.

use std::collections::HashMap;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use x402::amount::normalize_amount;
use x402::network::{self, NetworkFamily};
use x402::{
    ExactEvmExtra, ExactSvmExtra, Money, PaymentRequirements, RequirementExtra, Scheme,
    DEFAULT_MAX_TIMEOUT_SECONDS,
};

use crate::config::PaymentConfig;
use crate::error::{ConfigError, Rejection};
use crate::paywall::PaywallConfig;

/// Network used when a route does not name one.
pub const DEFAULT_NETWORK: &str = "base-sepolia";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Info {
    pub name: String,
    pub version: String,
}

/// A token described in full by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAsset {
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eip712: Option<Eip712Info>,
}

impl TokenAsset {
    fn missing_fields(&self, family: NetworkFamily) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.address.trim().is_empty() {
            missing.push("address");
        }
        if let NetworkFamily::Evm { .. } = family {
            match &self.eip712 {
                None => missing.extend(["name", "version"]),
                Some(info) => {
                    if info.name.trim().is_empty() {
                        missing.push("name");
                    }
                    if info.version.trim().is_empty() {
                        missing.push("version");
                    }
                }
            }
        }
        if self.decimals.is_none() {
            missing.push("decimals");
        }
        missing
    }
}

/// An amount already in base units of a custom token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub amount: String,
    pub asset: TokenAsset,
}

/// Either a display-unit price in the network's default asset, or a
/// base-unit amount of a custom token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Token(TokenAmount),
    Money(Money),
}

impl From<&str> for Price {
    fn from(s: &str) -> Self {
        Price::Money(Money::from(s))
    }
}

impl From<TokenAmount> for Price {
    fn from(t: TokenAmount) -> Self {
        Price::Token(t)
    }
}

/// Overrides for the `error` string of each kind of 402.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessages {
    pub payment_required: Option<String>,
    pub invalid_payment: Option<String>,
    pub no_matching_requirements: Option<String>,
    pub verification_failed: Option<String>,
    pub settlement_failed: Option<String>,
}

impl ErrorMessages {
    /// The message for `kind`: the override if set, otherwise a default that
    /// includes `detail` where one is available.
    pub fn message(&self, kind: Rejection, detail: Option<&str>) -> String {
        let custom = match kind {
            Rejection::PaymentRequired => &self.payment_required,
            Rejection::InvalidPayment => &self.invalid_payment,
            Rejection::NoMatchingRequirements => &self.no_matching_requirements,
            Rejection::VerificationFailed => &self.verification_failed,
            Rejection::SettlementFailed => &self.settlement_failed,
        };
        if let Some(custom) = custom {
            return custom.clone();
        }
        match (kind, detail) {
            (Rejection::PaymentRequired, _) => "X-PAYMENT header is required".to_string(),
            (Rejection::InvalidPayment, Some(d)) => d.to_string(),
            (Rejection::InvalidPayment, None) => "Invalid or malformed payment header".to_string(),
            (Rejection::NoMatchingRequirements, _) => {
                "Unable to find matching payment requirements".to_string()
            }
            (Rejection::VerificationFailed, Some(d)) => d.to_string(),
            (Rejection::VerificationFailed, None) => "Payment verification failed".to_string(),
            (Rejection::SettlementFailed, Some(d)) => format!("Failed to settle payment: {d}"),
            (Rejection::SettlementFailed, None) => "Failed to settle payment".to_string(),
        }
    }
}

/// Descriptive and presentation settings of a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteOptions {
    pub description: Option<String>,
    pub mime_type: Option<String>,
    pub max_timeout_seconds: Option<u64>,
    pub output_schema: Option<serde_json::Value>,
    pub discoverable: Option<bool>,
    /// Fixed resource URL; otherwise the request URL is used.
    pub resource: Option<String>,
    pub custom_paywall_html: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub error_messages: ErrorMessages,
}

/// One price variant of a multi-network route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPrice {
    pub network: String,
    /// Falls back to the route's price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkPrice>,
    #[serde(default)]
    pub config: RouteOptions,
}

/// A route table value: a full config or just a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteEntry {
    Config(RouteConfig),
    Price(Price),
}

impl RouteEntry {
    fn into_config(self) -> RouteConfig {
        match self {
            RouteEntry::Config(config) => config,
            RouteEntry::Price(price) => RouteConfig {
                price,
                network: None,
                networks: Vec::new(),
                config: RouteOptions::default(),
            },
        }
    }
}

impl From<&str> for RouteEntry {
    fn from(price: &str) -> Self {
        RouteEntry::Price(Price::from(price))
    }
}

impl From<Price> for RouteEntry {
    fn from(price: Price) -> Self {
        RouteEntry::Price(price)
    }
}

impl From<TokenAmount> for RouteEntry {
    fn from(t: TokenAmount) -> Self {
        RouteEntry::Price(Price::Token(t))
    }
}

impl From<RouteConfig> for RouteEntry {
    fn from(config: RouteConfig) -> Self {
        RouteEntry::Config(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    Rest,
}

/// A parsed route key: optional HTTP verb plus a path pattern.
///
/// Segments are literals, `[name]` / `:name` (exactly one segment), or
/// `*` / `:name*` / `[...name]` (the rest of the path, possibly empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    key: String,
    method: Option<String>,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(key: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidRoute {
            route: key.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = key.trim();
        let (method, path) = match trimmed.split_once(char::is_whitespace) {
            Some((verb, path)) => (Some(verb), path.trim()),
            None => (None, trimmed),
        };
        if let Some(verb) = method {
            if !verb.bytes().all(|b| b.is_ascii_alphabetic()) {
                return Err(invalid("HTTP method must be alphabetic"));
            }
        }
        if !path.starts_with('/') {
            return Err(invalid("path must start with '/'"));
        }
        let path = path.split('?').next().unwrap_or(path);

        let raw: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw.len());
        for (i, seg) in raw.iter().enumerate() {
            let segment = if *seg == "*"
                || (seg.starts_with(':') && seg.ends_with('*'))
                || seg.starts_with("[...")
            {
                Segment::Rest
            } else if seg.starts_with(':') || (seg.starts_with('[') && seg.ends_with(']')) {
                Segment::Param
            } else {
                Segment::Literal((*seg).to_string())
            };
            if segment == Segment::Rest && i + 1 != raw.len() {
                return Err(invalid("wildcard must be the last segment"));
            }
            segments.push(segment);
        }

        Ok(Self {
            key: trimmed.to_string(),
            method: method.map(|m| m.to_ascii_uppercase()),
            segments,
        })
    }

    /// The key as written in the route table. Used as a metrics label.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn matches(&self, method: &str, path: &str) -> bool {
        if let Some(m) = &self.method {
            if !m.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        let path = path.split('?').next().unwrap_or(path);
        let mut parts = path.split('/').filter(|s| !s.is_empty());
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Param => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(lit) => {
                    if parts.next() != Some(lit.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }

    /// Ordering key; higher is more specific.
    fn specificity(&self) -> (usize, usize, bool, bool) {
        let fixed = self
            .segments
            .iter()
            .filter(|s| **s != Segment::Rest)
            .count();
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        let open_ended = self.segments.last() == Some(&Segment::Rest);
        (fixed, literals, !open_ended, self.method.is_some())
    }
}

/// A route with its requirements resolved.
///
/// `requirements` carry an empty `resource` unless the route fixes one;
/// the gate fills it from each request.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub pattern: RoutePattern,
    pub requirements: Vec<PaymentRequirements>,
    pub options: RouteOptions,
}

impl ResolvedRoute {
    /// Requirements for one request to `resource`. Built fresh each time.
    pub fn requirements_for(&self, resource: &str) -> Vec<PaymentRequirements> {
        let resource = self.options.resource.as_deref().unwrap_or(resource);
        self.requirements
            .iter()
            .map(|req| PaymentRequirements {
                resource: resource.to_string(),
                ..req.clone()
            })
            .collect()
    }
}

/// Builds an immutable [`PaymentConfig`] from a route table.
#[derive(Debug, Clone)]
pub struct RoutesConfigBuilder {
    pay_to: String,
    default_network: String,
    routes: Vec<(String, RouteEntry)>,
    svm_fee_payer: Option<String>,
    custom_chains: HashMap<String, u64>,
    paywall: PaywallConfig,
}

impl RoutesConfigBuilder {
    /// `pay_to` receives every payment.
    pub fn new(pay_to: impl Into<String>) -> Self {
        Self {
            pay_to: pay_to.into(),
            default_network: DEFAULT_NETWORK.to_string(),
            routes: Vec::new(),
            svm_fee_payer: None,
            custom_chains: HashMap::new(),
            paywall: PaywallConfig::default(),
        }
    }

    /// Network for routes that do not name one.
    pub fn default_network(mut self, network: impl Into<String>) -> Self {
        self.default_network = network.into();
        self
    }

    /// Register a route, e.g. `route("GET /weather", "$0.001")`.
    pub fn route(mut self, key: impl Into<String>, entry: impl Into<RouteEntry>) -> Self {
        self.routes.push((key.into(), entry.into()));
        self
    }

    /// Register every entry of a JSON route table object.
    pub fn routes_json(mut self, table: serde_json::Value) -> Result<Self, ConfigError> {
        let table: serde_json::Map<String, serde_json::Value> = serde_json::from_value(table)
            .map_err(|e| ConfigError::InvalidRoute {
                route: "<table>".to_string(),
                reason: e.to_string(),
            })?;
        for (key, value) in table {
            let entry: RouteEntry =
                serde_json::from_value(value).map_err(|e| ConfigError::InvalidRoute {
                    route: key.clone(),
                    reason: e.to_string(),
                })?;
            self.routes.push((key, entry));
        }
        Ok(self)
    }

    /// Fee payer advertised to Solana clients, usually from the facilitator's `/supported`.
    pub fn svm_fee_payer(mut self, fee_payer: impl Into<String>) -> Self {
        self.svm_fee_payer = Some(fee_payer.into());
        self
    }

    /// Chain id of a custom EVM network, shown to paywall scripts.
    pub fn custom_chain(mut self, network: impl Into<String>, chain_id: u64) -> Self {
        self.custom_chains.insert(network.into(), chain_id);
        self
    }

    pub fn paywall(mut self, paywall: PaywallConfig) -> Self {
        self.paywall = paywall;
        self
    }

    pub fn build(self) -> Result<PaymentConfig, ConfigError> {
        if self.pay_to.trim().is_empty() {
            return Err(ConfigError::MissingRequired("RESOURCE_WALLET_ADDRESS"));
        }

        let mut routes = Vec::with_capacity(self.routes.len());
        for (key, entry) in &self.routes {
            let pattern = RoutePattern::parse(key)?;
            let config = entry.clone().into_config();

            let targets: Vec<(&str, &Price)> = if config.networks.is_empty() {
                vec![(
                    config.network.as_deref().unwrap_or(self.default_network.as_str()),
                    &config.price,
                )]
            } else {
                config
                    .networks
                    .iter()
                    .map(|np| (np.network.as_str(), np.price.as_ref().unwrap_or(&config.price)))
                    .collect()
            };

            let mut requirements = Vec::with_capacity(targets.len());
            for (network_id, price) in targets {
                requirements.push(self.requirement(&pattern, &config.config, network_id, price)?);
            }

            tracing::debug!(
                route = %key,
                networks = ?requirements.iter().map(|r| r.network.as_str()).collect::<Vec<_>>(),
                "resolved payment route"
            );
            routes.push(ResolvedRoute {
                pattern,
                requirements,
                options: config.config,
            });
        }

        if routes.is_empty() {
            tracing::warn!("no payment routes configured, every request passes through");
        }
        // Stable sort: among equally specific patterns the first registered wins.
        routes.sort_by(|a, b| b.pattern.specificity().cmp(&a.pattern.specificity()));

        Ok(PaymentConfig {
            routes,
            paywall: self.paywall,
            custom_chains: self.custom_chains,
        })
    }

    fn requirement(
        &self,
        pattern: &RoutePattern,
        options: &RouteOptions,
        network_id: &str,
        price: &Price,
    ) -> Result<PaymentRequirements, ConfigError> {
        let info = network::lookup(network_id);
        let family = info
            .map(|n| n.family)
            .unwrap_or(NetworkFamily::Evm { chain_id: 0 });
        let built_in = network::default_asset(network_id);

        let (amount, asset, decimals, eip712) = match (price, built_in) {
            (Price::Money(money), Some(token)) => (
                money_amount(money, token.decimals)?,
                token.address.to_string(),
                token.decimals,
                Some(Eip712Info {
                    name: token.name.to_string(),
                    version: token.version.unwrap_or_default().to_string(),
                }),
            ),
            (Price::Money(_), None) => {
                return Err(ConfigError::UnsupportedNetwork {
                    network: network_id.to_string(),
                    missing: TokenAsset::default().missing_fields(family),
                })
            }
            (Price::Token(token), _) => {
                let missing = token.asset.missing_fields(family);
                if !missing.is_empty() {
                    return Err(if built_in.is_some() {
                        ConfigError::IncompleteToken { missing }
                    } else {
                        ConfigError::UnsupportedNetwork {
                            network: network_id.to_string(),
                            missing,
                        }
                    });
                }
                (
                    token_amount(&token.amount)?,
                    token.asset.address.clone(),
                    token.asset.decimals.unwrap_or_default(),
                    token.asset.eip712.clone(),
                )
            }
        };

        let extra = match family {
            NetworkFamily::Evm { .. } => {
                if self.pay_to.parse::<Address>().is_err() {
                    return Err(ConfigError::InvalidAddress(self.pay_to.clone()));
                }
                let eip712 = eip712.unwrap_or_else(|| Eip712Info {
                    name: String::new(),
                    version: String::new(),
                });
                RequirementExtra::ExactEvm(ExactEvmExtra {
                    name: eip712.name,
                    version: eip712.version,
                    decimals: Some(decimals),
                })
            }
            NetworkFamily::Svm => {
                let fee_payer = self
                    .svm_fee_payer
                    .clone()
                    .ok_or_else(|| ConfigError::MissingFeePayer(network_id.to_string()))?;
                RequirementExtra::ExactSvm(ExactSvmExtra {
                    fee_payer,
                    decimals: Some(decimals),
                })
            }
        };

        let output_schema = serde_json::json!({
            "input": {
                "type": "http",
                "method": pattern.method().unwrap_or("GET"),
                "discoverable": options.discoverable.unwrap_or(true),
            },
            "output": options.output_schema,
        });

        Ok(PaymentRequirements {
            scheme: Scheme::Exact,
            network: network_id.to_string(),
            max_amount_required: amount,
            resource: options.resource.clone().unwrap_or_default(),
            description: options.description.clone().unwrap_or_default(),
            mime_type: options.mime_type.clone().unwrap_or_default(),
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: options
                .max_timeout_seconds
                .unwrap_or(DEFAULT_MAX_TIMEOUT_SECONDS),
            asset,
            output_schema: Some(output_schema),
            extra: Some(extra),
        })
    }
}

/// Display-unit price to base units. A price that comes out as zero would
/// make the route free, so it is refused.
fn money_amount(money: &Money, decimals: u8) -> Result<String, ConfigError> {
    let amount = normalize_amount(&money.as_decimal(), decimals);
    if amount == "0" {
        return Err(ConfigError::InvalidPrice(format!(
            "'{}' is zero in base units",
            money.as_decimal()
        )));
    }
    Ok(amount)
}

fn token_amount(amount: &str) -> Result<String, ConfigError> {
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::InvalidPrice(format!(
            "token amount '{amount}' must be a base-unit integer"
        )));
    }
    let trimmed = amount.trim_start_matches('0');
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidPrice("token amount is zero".to_string()));
    }
    Ok(trimmed.to_string())
}
