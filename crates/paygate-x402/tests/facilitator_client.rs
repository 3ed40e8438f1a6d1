//! Facilitator client against a mocked facilitator.

use alloy::primitives::{Address, B256};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use x402::auth::{verify_hmac, FACILITATOR_AUTH_HEADER};
use x402::{
    ExactEvmAuthorization, ExactEvmPayload, ExactPayload, FacilitatorClient, HmacAuth,
    ListDiscoveryResourcesRequest, PaymentPayload, PaymentRequirements, Scheme, X402Error,
};

fn requirements() -> PaymentRequirements {
    serde_json::from_value(json!({
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
    }))
    .unwrap()
}

fn payload() -> PaymentPayload {
    PaymentPayload {
        x402_version: 1,
        scheme: Scheme::Exact,
        network: "base-sepolia".to_string(),
        payload: ExactPayload::Evm(ExactEvmPayload {
            signature: format!("0x{}", "cd".repeat(65)),
            authorization: ExactEvmAuthorization {
                from: Address::repeat_byte(0x11),
                to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".parse().unwrap(),
                value: "10000".to_string(),
                valid_after: "1700000000".to_string(),
                valid_before: "1700000300".to_string(),
                nonce: B256::repeat_byte(0x01),
            },
        }),
    }
}

#[tokio::test]
async fn verify_posts_version_payload_and_requirements() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .and(body_partial_json(json!({
            "x402Version": 1,
            "paymentPayload": { "network": "base-sepolia", "scheme": "exact" },
            "paymentRequirements": { "maxAmountRequired": "10000" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isValid": true,
            "payer": "0x1111111111111111111111111111111111111111"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = FacilitatorClient::new(server.uri());
    let verdict = client.verify(&payload(), &requirements()).await.unwrap();
    assert!(verdict.is_valid);
    assert_eq!(
        verdict.payer.as_deref(),
        Some("0x1111111111111111111111111111111111111111")
    );
}

#[tokio::test]
async fn verify_negative_verdict_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isValid": false,
            "invalidReason": "invalid_exact_evm_payload_authorization_value"
        })))
        .mount(&server)
        .await;

    let verdict = FacilitatorClient::new(server.uri())
        .verify(&payload(), &requirements())
        .await
        .unwrap();
    assert!(!verdict.is_valid);
    assert_eq!(
        verdict.invalid_reason.as_deref(),
        Some("invalid_exact_evm_payload_authorization_value")
    );
}

#[tokio::test]
async fn verify_non_200_is_a_rejection_not_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request shape"))
        .mount(&server)
        .await;

    let err = FacilitatorClient::new(server.uri())
        .verify(&payload(), &requirements())
        .await
        .unwrap_err();
    assert!(!err.is_transport());
    match err {
        X402Error::FacilitatorRejected {
            endpoint,
            status,
            body,
        } => {
            assert_eq!(endpoint, "verify");
            assert_eq!(status, 400);
            assert_eq!(body, "bad request shape");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn settle_returns_receipt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "transaction": "0xabc123",
            "network": "base-sepolia",
            "payer": "0x1111111111111111111111111111111111111111"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = FacilitatorClient::new(server.uri())
        .settle(&payload(), &requirements())
        .await
        .unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.transaction.as_deref(), Some("0xabc123"));
    assert_eq!(receipt.network, "base-sepolia");
}

#[tokio::test]
async fn settle_non_200_raises() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "nonce already used" })),
        )
        .mount(&server)
        .await;

    let err = FacilitatorClient::new(server.uri())
        .settle(&payload(), &requirements())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        X402Error::FacilitatorRejected {
            endpoint: "settle",
            status: 500,
            ..
        }
    ));
}

#[tokio::test]
async fn unreachable_facilitator_is_a_transport_error() {
    // Nothing listens on port 1.
    let client = FacilitatorClient::new("http://127.0.0.1:1");
    let err = client.verify(&payload(), &requirements()).await.unwrap_err();
    assert!(err.is_transport(), "expected transport error, got {err}");

    let err = client.supported().await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn supported_lists_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/supported"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kinds": [
                { "x402Version": 1, "scheme": "exact", "network": "base-sepolia" },
                { "x402Version": 1, "scheme": "exact", "network": "solana-devnet",
                  "extra": { "feePayer": "FeePayer1111111111111111111111111111111111" } }
            ]
        })))
        .mount(&server)
        .await;

    let supported = FacilitatorClient::new(server.uri()).supported().await.unwrap();
    assert_eq!(supported.kinds.len(), 2);
    assert_eq!(supported.kinds[0].network, "base-sepolia");
    assert_eq!(
        supported.kinds[1].fee_payer(),
        Some("FeePayer1111111111111111111111111111111111")
    );
}

#[tokio::test]
async fn list_sends_filter_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/discovery/resources"))
        .and(query_param("type", "http"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "x402Version": 1,
            "items": [{
                "resource": "https://api.example.com/protected",
                "type": "http",
                "x402Version": 1,
                "accepts": [serde_json::to_value(requirements()).unwrap()],
                "lastUpdated": 1700000000
            }],
            "pagination": { "limit": 5, "offset": 0, "total": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = FacilitatorClient::new(server.uri())
        .list(&ListDiscoveryResourcesRequest {
            resource_type: Some("http".to_string()),
            limit: Some(5),
            offset: None,
        })
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].accepts[0], requirements());
    assert_eq!(page.pagination.total, 1);
}

#[tokio::test]
async fn auth_hook_signs_each_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isValid": true })))
        .mount(&server)
        .await;

    FacilitatorClient::new(server.uri())
        .with_auth(HmacAuth::new("shared-secret"))
        .verify(&payload(), &requirements())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let signature = requests[0]
        .headers
        .get(FACILITATOR_AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .expect("auth header missing");
    assert!(verify_hmac(b"shared-secret", &requests[0].body, signature));
}
