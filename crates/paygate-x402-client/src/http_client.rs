use reqwest::{Method, StatusCode};
use x402::amount::ensure_valid_amount;
use x402::{
    decode_settle_response, encode_payment, PaymentRequiredBody, SchemeClient, SettleResponse,
    X402Error, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER, X402_VERSION,
};

use crate::context::PaymentContext;

/// HTTP client that automatically pays 402 challenges.
///
/// Wraps `reqwest::Client`. On a 402 response it selects the requirement for
/// the context's active network, signs it through the provided
/// [`SchemeClient`] at [`X402_VERSION`], and retries with an `X-PAYMENT`
/// header. If the paid attempt is refused with a challenge naming another
/// protocol version, the payment is re-signed at that version and sent once
/// more; there is never a third attempt.
pub struct X402Client<S: SchemeClient> {
    http: reqwest::Client,
    scheme: S,
    context: PaymentContext,
}

impl<S: SchemeClient> X402Client<S> {
    pub fn new(scheme: S, context: PaymentContext) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_http_client(scheme, context, http)
    }

    /// Create a client with a custom reqwest::Client.
    pub fn with_http_client(scheme: S, context: PaymentContext, http: reqwest::Client) -> Self {
        Self {
            http,
            scheme,
            context,
        }
    }

    pub fn context(&self) -> &PaymentContext {
        &self.context
    }

    /// Switch the active network, e.g. after the wallet changed chains.
    pub fn set_active_network(&mut self, network: Option<String>) {
        self.context.active_network = network;
    }

    /// Make a request, automatically handling 402 payment responses.
    /// Returns the final response and the settlement receipt, if any.
    pub async fn fetch(
        &self,
        url: &str,
        method: Method,
    ) -> Result<(reqwest::Response, Option<SettleResponse>), X402Error> {
        self.fetch_with_body(url, method, None).await
    }

    /// Make a request with an optional body, automatically handling 402 payment responses.
    pub async fn fetch_with_body(
        &self,
        url: &str,
        method: Method,
        body: Option<Vec<u8>>,
    ) -> Result<(reqwest::Response, Option<SettleResponse>), X402Error> {
        let resp = self.send(&method, url, body.as_deref(), None).await?;
        if resp.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok((resp, None));
        }

        let challenge = read_challenge(resp).await?;
        let requirements = ensure_valid_amount(self.context.select(&challenge.accepts)?, None);
        self.context.check_budget(&requirements)?;

        let mut version = X402_VERSION;
        let mut retried = false;
        loop {
            let payload = self.scheme.create_payment(version, &requirements).await?;
            let encoded = encode_payment(&payload)?;

            let resp = self
                .send(&method, url, body.as_deref(), Some(&encoded))
                .await?;
            if resp.status() != StatusCode::PAYMENT_REQUIRED {
                let settlement = settlement_receipt(&resp);
                return Ok((resp, settlement));
            }

            let refusal = read_challenge(resp).await?;
            if refusal.x402_version != version && !retried {
                tracing::info!(
                    signed = version,
                    server = refusal.x402_version,
                    "server expects another x402 version, re-signing"
                );
                version = refusal.x402_version;
                retried = true;
                continue;
            }

            return Err(X402Error::PaymentRejected(
                refusal
                    .error
                    .unwrap_or_else(|| "payment required".to_string()),
            ));
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        body: Option<&[u8]>,
        payment: Option<&str>,
    ) -> Result<reqwest::Response, X402Error> {
        let mut req = self.http.request(method.clone(), url);
        if let Some(payment) = payment {
            req = req
                .header(PAYMENT_HEADER, payment)
                .header("Access-Control-Expose-Headers", PAYMENT_RESPONSE_HEADER);
        }
        if let Some(body) = body {
            req = req.body(body.to_vec());
        }
        req.send()
            .await
            .map_err(|e| X402Error::HttpError(format!("request to {url} failed: {e}")))
    }
}

async fn read_challenge(resp: reqwest::Response) -> Result<PaymentRequiredBody, X402Error> {
    resp.json()
        .await
        .map_err(|e| X402Error::HttpError(format!("failed to parse 402 body: {e}")))
}

fn settlement_receipt(resp: &reqwest::Response) -> Option<SettleResponse> {
    let header = resp.headers().get(PAYMENT_RESPONSE_HEADER)?.to_str().ok()?;
    match decode_settle_response(header) {
        Ok(settlement) => Some(settlement),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring undecodable settlement receipt");
            None
        }
    }
}
