//! HTTP client for a remote facilitator.
//!
//! Used by the resource server's payment gate. Every call distinguishes
//! "the facilitator said no" ([`X402Error::FacilitatorRejected`], or a
//! negative verdict in a 200 body) from "the facilitator is down"
//! ([`X402Error::FacilitatorUnreachable`]).

use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::auth::{AuthHeaders, FacilitatorEndpoint};
use crate::payment::{FacilitatorRequest, PaymentPayload, PaymentRequirements};
use crate::response::{
    ListDiscoveryResourcesRequest, ListDiscoveryResourcesResponse, SettleResponse,
    SupportedResponse, VerifyResponse,
};
use crate::{SchemeFacilitator, X402Error, DEFAULT_FACILITATOR_URL};

/// Raw outcome of one facilitator call.
struct Exchange {
    status: reqwest::StatusCode,
    headers: HeaderMap,
    body: String,
}

/// Client for a facilitator's HTTP API.
///
/// Cheap to clone; share one per process.
#[derive(Clone)]
pub struct FacilitatorClient {
    base_url: String,
    http: reqwest::Client,
    auth: Option<Arc<dyn AuthHeaders>>,
}

impl std::fmt::Debug for FacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.as_ref().map(|_| "[hook]"))
            .finish()
    }
}

impl Default for FacilitatorClient {
    fn default() -> Self {
        Self::new(DEFAULT_FACILITATOR_URL)
    }
}

impl FacilitatorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            auth: None,
        }
    }

    /// Use a preconfigured reqwest client (timeouts, proxies, TLS).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Install a per-call authentication-header hook.
    pub fn with_auth(mut self, auth: impl AuthHeaders + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn auth_headers(&self, endpoint: FacilitatorEndpoint, body: &[u8]) -> Vec<(String, String)> {
        self.auth
            .as_ref()
            .map(|a| a.headers(endpoint, body))
            .unwrap_or_default()
    }

    fn unreachable(url: &str, e: reqwest::Error) -> X402Error {
        X402Error::FacilitatorUnreachable {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }

    async fn exchange(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Exchange, X402Error> {
        let resp = request
            .send()
            .await
            .map_err(|e| Self::unreachable(url, e))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text().await.map_err(|e| Self::unreachable(url, e))?;
        Ok(Exchange {
            status,
            headers,
            body,
        })
    }

    async fn post(
        &self,
        endpoint: FacilitatorEndpoint,
        path: &str,
        body: &[u8],
        auth: &[(String, String)],
    ) -> Result<Exchange, X402Error> {
        let url = self.url(path);
        let mut request = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body.to_vec());
        for (name, value) in auth {
            request = request.header(name.as_str(), value.as_str());
        }
        tracing::debug!(endpoint = endpoint.as_str(), %url, "calling facilitator");
        self.exchange(request, &url).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: FacilitatorEndpoint,
        path: &str,
        query: Option<&ListDiscoveryResourcesRequest>,
    ) -> Result<T, X402Error> {
        let url = self.url(path);
        let mut request = self.http.get(&url);
        if let Some(query) = query {
            request = request.query(query);
        }
        for (name, value) in self.auth_headers(endpoint, b"") {
            request = request.header(name, value);
        }
        let exchange = self.exchange(request, &url).await?;
        if exchange.status != reqwest::StatusCode::OK {
            return Err(X402Error::FacilitatorRejected {
                endpoint: endpoint.as_str(),
                status: exchange.status.as_u16(),
                body: exchange.body,
            });
        }
        Ok(serde_json::from_str(&exchange.body)?)
    }

    /// `POST /verify`. A 200 with `isValid = false` is returned as `Ok`.
    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, X402Error> {
        let body = serde_json::to_vec(&FacilitatorRequest::new(payload, requirements))?;
        let auth = self.auth_headers(FacilitatorEndpoint::Verify, &body);
        let exchange = self
            .post(FacilitatorEndpoint::Verify, "/verify", &body, &auth)
            .await?;

        if exchange.status != reqwest::StatusCode::OK {
            tracing::warn!(
                status = %exchange.status,
                body = %exchange.body,
                "facilitator verify returned non-200"
            );
            return Err(X402Error::FacilitatorRejected {
                endpoint: "verify",
                status: exchange.status.as_u16(),
                body: exchange.body,
            });
        }
        Ok(serde_json::from_str(&exchange.body)?)
    }

    /// `POST /settle`. Call only after a positive [`verify`](Self::verify).
    ///
    /// A non-200 answer is logged with the full request and response before
    /// the error is returned.
    pub async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, X402Error> {
        let body = serde_json::to_vec(&FacilitatorRequest::new(payload, requirements))?;
        let auth = self.auth_headers(FacilitatorEndpoint::Settle, &body);
        let requested_at = chrono::Utc::now();
        let exchange = self
            .post(FacilitatorEndpoint::Settle, "/settle", &body, &auth)
            .await?;

        if exchange.status != reqwest::StatusCode::OK {
            let request_headers: Vec<String> = std::iter::once(
                "content-type: application/json".to_string(),
            )
            .chain(auth.iter().map(|(name, _)| format!("{name}: [REDACTED]")))
            .collect();
            let response_headers: Vec<String> = exchange
                .headers
                .iter()
                .map(|(name, value)| {
                    format!("{name}: {}", value.to_str().unwrap_or("<binary>"))
                })
                .collect();
            tracing::error!(
                timestamp = %requested_at.to_rfc3339(),
                url = %self.url("/settle"),
                method = "POST",
                request_headers = ?request_headers,
                request_body = %String::from_utf8_lossy(&body),
                status = %exchange.status,
                response_headers = ?response_headers,
                response_body = %exchange.body,
                "facilitator settle call failed"
            );
            return Err(X402Error::FacilitatorRejected {
                endpoint: "settle",
                status: exchange.status.as_u16(),
                body: exchange.body,
            });
        }
        Ok(serde_json::from_str(&exchange.body)?)
    }

    /// `GET /supported`: payment kinds the facilitator can handle.
    pub async fn supported(&self) -> Result<SupportedResponse, X402Error> {
        self.get(FacilitatorEndpoint::Supported, "/supported", None)
            .await
    }

    /// `GET /discovery/resources`: one page of discoverable paid resources.
    pub async fn list(
        &self,
        query: &ListDiscoveryResourcesRequest,
    ) -> Result<ListDiscoveryResourcesResponse, X402Error> {
        self.get(FacilitatorEndpoint::List, "/discovery/resources", Some(query))
            .await
    }
}

impl SchemeFacilitator for FacilitatorClient {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, X402Error> {
        FacilitatorClient::verify(self, payload, requirements).await
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, X402Error> {
        FacilitatorClient::settle(self, payload, requirements).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = FacilitatorClient::new("https://facilitator.example.com/");
        assert_eq!(client.base_url(), "https://facilitator.example.com");
        assert_eq!(client.url("/verify"), "https://facilitator.example.com/verify");
    }

    #[test]
    fn test_default_points_at_public_facilitator() {
        assert_eq!(FacilitatorClient::default().base_url(), DEFAULT_FACILITATOR_URL);
    }

    #[test]
    fn test_debug_hides_hook() {
        let client = FacilitatorClient::new("http://f").with_auth(crate::HmacAuth::new("k"));
        let dbg = format!("{client:?}");
        assert!(dbg.contains("[hook]"));
    }
}
