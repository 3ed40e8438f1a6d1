//! Browser paywall page returned with a 402 challenge.
//!
//! Wallet connection and signing happen in page script loaded by the host
//! application; this module only renders the page and hands the script its
//! context as a JSON data island (`#x402-context`).

use std::collections::HashMap;

use serde::Serialize;
use x402::amount::from_base_units;
use x402::network;
use x402::{PaymentRequirements, DEFAULT_TOKEN_DECIMALS};

/// Branding shown on every paywall page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaywallConfig {
    pub app_name: Option<String>,
    pub app_logo: Option<String>,
}

/// One entry of the network selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaywallNetwork {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    pub testnet: bool,
}

impl PaywallNetwork {
    pub fn resolve(id: &str, custom_chains: &HashMap<String, u64>) -> Self {
        let info = network::lookup(id);
        Self {
            id: id.to_string(),
            display_name: network::display_name(id).to_string(),
            chain_id: network::chain_id(id).or_else(|| custom_chains.get(id).copied()),
            testnet: info.map(|n| n.testnet).unwrap_or(false),
        }
    }
}

/// Everything the page script needs to build a payment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaywallContext<'a> {
    /// Price of the first requirement in display units.
    pub amount: Option<String>,
    pub payment_requirements: &'a [PaymentRequirements],
    pub current_url: &'a str,
    pub x402_version: u32,
    pub testnet: bool,
    pub app_name: Option<&'a str>,
    pub app_logo: Option<&'a str>,
    pub title: Option<&'a str>,
    pub message: Option<&'a str>,
    pub networks: Vec<PaywallNetwork>,
}

impl<'a> PaywallContext<'a> {
    pub fn new(
        requirements: &'a [PaymentRequirements],
        current_url: &'a str,
        x402_version: u32,
        custom_chains: &HashMap<String, u64>,
    ) -> Self {
        let mut networks: Vec<PaywallNetwork> = Vec::new();
        for req in requirements {
            if !networks.iter().any(|n| n.id == req.network) {
                networks.push(PaywallNetwork::resolve(&req.network, custom_chains));
            }
        }
        let amount = requirements.first().and_then(|req| {
            let decimals = req
                .extra
                .as_ref()
                .and_then(|e| e.decimals())
                .unwrap_or(DEFAULT_TOKEN_DECIMALS);
            from_base_units(&req.max_amount_required, decimals)
        });
        Self {
            amount,
            payment_requirements: requirements,
            current_url,
            x402_version,
            testnet: !networks.is_empty() && networks.iter().all(|n| n.testnet),
            app_name: None,
            app_logo: None,
            title: None,
            message: None,
            networks,
        }
    }

    pub fn with_branding(mut self, config: &'a PaywallConfig) -> Self {
        self.app_name = config.app_name.as_deref();
        self.app_logo = config.app_logo.as_deref();
        self
    }

    pub fn with_text(mut self, title: Option<&'a str>, message: Option<&'a str>) -> Self {
        self.title = title;
        self.message = message;
        self
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// JSON that cannot close the surrounding `<script>` element.
fn script_safe_json(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Render the paywall page for one challenge.
pub fn render_paywall(ctx: &PaywallContext<'_>) -> String {
    let title = escape_html(ctx.title.or(ctx.app_name).unwrap_or("Payment Required"));
    let message = escape_html(
        ctx.message
            .unwrap_or("This resource requires a payment before it can be accessed."),
    );
    let amount = ctx
        .amount
        .as_deref()
        .map(|a| format!(r#"<p class="amount">Amount: ${}</p>"#, escape_html(a)))
        .unwrap_or_default();
    let logo = ctx
        .app_logo
        .map(|src| format!(r#"<img class="logo" src="{}" alt="">"#, escape_html(src)))
        .unwrap_or_default();
    let options: String = ctx
        .networks
        .iter()
        .map(|n| {
            format!(
                r#"<option value="{}">{}{}</option>"#,
                escape_html(&n.id),
                escape_html(&n.display_name),
                if n.testnet { " (testnet)" } else { "" }
            )
        })
        .collect();
    let context = match serde_json::to_string(ctx) {
        Ok(json) => script_safe_json(&json),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize paywall context");
            "{}".to_string()
        }
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; background: #f5f6f8; margin: 0; }}
main {{ max-width: 28rem; margin: 10vh auto; background: #fff; border-radius: 12px; padding: 2rem; box-shadow: 0 2px 12px rgba(0,0,0,.08); }}
.logo {{ height: 40px; }}
.amount {{ font-size: 1.25rem; font-weight: 600; }}
select, button {{ width: 100%; padding: .6rem; margin-top: .75rem; font-size: 1rem; }}
</style>
</head>
<body>
<main>
{logo}
<h1>{title}</h1>
<p>{message}</p>
{amount}
<label for="x402-network">Network</label>
<select id="x402-network">{options}</select>
<button id="x402-pay" type="button" disabled>Connect wallet to pay</button>
<noscript>JavaScript is required to complete the payment.</noscript>
</main>
<script type="application/json" id="x402-context">{context}</script>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement(network: &str, amount: &str) -> PaymentRequirements {
        serde_json::from_value(serde_json::json!({
            "scheme": "exact",
            "network": network,
            "maxAmountRequired": amount,
            "resource": "http://localhost/protected",
            "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
            "maxTimeoutSeconds": 300,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "extra": { "name": "USDC", "version": "2", "decimals": 6 }
        }))
        .unwrap()
    }

    #[test]
    fn test_context_amount_and_networks() {
        let reqs = vec![
            requirement("base-sepolia", "10000"),
            requirement("avalanche-fuji", "20000"),
            requirement("base-sepolia", "10000"),
        ];
        let ctx = PaywallContext::new(&reqs, "http://localhost/protected", 1, &HashMap::new());
        assert_eq!(ctx.amount.as_deref(), Some("0.01"));
        assert_eq!(ctx.networks.len(), 2);
        assert_eq!(ctx.networks[0].display_name, "Base Sepolia");
        assert_eq!(ctx.networks[0].chain_id, Some(84532));
        assert!(ctx.testnet);
    }

    #[test]
    fn test_custom_chain_id_in_network_list() {
        let reqs = vec![requirement("my-chain", "5")];
        let chains = HashMap::from([("my-chain".to_string(), 777u64)]);
        let ctx = PaywallContext::new(&reqs, "http://localhost/", 1, &chains);
        assert_eq!(ctx.networks[0].display_name, "my-chain");
        assert_eq!(ctx.networks[0].chain_id, Some(777));
        assert!(!ctx.testnet);
    }

    #[test]
    fn test_render_escapes_text_and_embeds_context() {
        let reqs = vec![requirement("base-sepolia", "10000")];
        let branding = PaywallConfig {
            app_name: Some("Demo".to_string()),
            app_logo: Some("/logo.png".to_string()),
        };
        let ctx = PaywallContext::new(&reqs, "http://localhost/protected", 1, &HashMap::new())
            .with_branding(&branding)
            .with_text(Some("<Premium & co>"), Some("</script><script>alert(1)"));
        let html = render_paywall(&ctx);

        assert!(html.contains("<title>&lt;Premium &amp; co&gt;</title>"));
        assert!(html.contains("Amount: $0.01"));
        assert!(html.contains(r#"<option value="base-sepolia">Base Sepolia (testnet)</option>"#));
        assert!(html.contains(r#"src="/logo.png""#));
        assert!(html.contains(r#"<script type="application/json" id="x402-context">"#));
        // The only closing script tag is the data island's own.
        assert_eq!(html.matches("</script>").count(), 1);
        assert!(html.contains("\\u003c/script\\u003e"));
    }

    #[test]
    fn test_context_json_is_camel_case() {
        let reqs = vec![requirement("base", "1500000")];
        let ctx = PaywallContext::new(&reqs, "https://api.example.com/x", 1, &HashMap::new());
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["amount"], "1.5");
        assert_eq!(json["x402Version"], 1);
        assert_eq!(json["currentUrl"], "https://api.example.com/x");
        assert_eq!(json["paymentRequirements"][0]["network"], "base");
        assert_eq!(json["testnet"], false);
    }
}
