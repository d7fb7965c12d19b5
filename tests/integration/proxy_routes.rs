//! Pass-through and gateway-forward integration tests
//!
//! `/proxy/{*target}` forces https, so only its error surface is reachable
//! against a plaintext mock; `/portkey-ai/gateway` takes a full URL and is
//! exercised end-to-end.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::GatewayHarness;

#[tokio::test]
async fn test_gateway_forward_hits_named_url() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/anything/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "echoed": true })))
        .mount(&harness.openai)
        .await;

    let response = harness
        .server
        .post("/portkey-ai/gateway")
        .add_query_param("url", format!("{}/anything/chat", harness.openai.uri()))
        .json(&json!({ "payload": 1 }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["echoed"], true);
}

#[tokio::test]
async fn test_gateway_forward_overlays_bracketed_headers() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/target"))
        .and(header("x-custom-auth", "overlay-value"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&harness.openai)
        .await;

    let response = harness
        .server
        .post("/portkey-ai/gateway")
        .add_query_param("url", format!("{}/target", harness.openai.uri()))
        .add_query_param("options[headers][x-custom-auth]", "overlay-value")
        .json(&json!({}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_gateway_forward_requires_url() {
    let harness = GatewayHarness::new().await;

    let response = harness
        .server
        .post("/portkey-ai/gateway")
        .json(&json!({}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_gateway_forward_propagates_upstream_status() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .mount(&harness.openai)
        .await;

    let response = harness
        .server
        .get("/portkey-ai/gateway")
        .add_query_param("url", format!("{}/missing", harness.openai.uri()))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "gone");
}

#[tokio::test]
async fn test_gateway_forward_keeps_client_headers() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("GET"))
        .and(path("/auth"))
        .and(header("authorization", "Bearer client-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&harness.openai)
        .await;

    let response = harness
        .server
        .get("/portkey-ai/gateway")
        .add_query_param("url", format!("{}/auth", harness.openai.uri()))
        .add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Bearer client-token"),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_proxy_unreachable_target_is_bad_gateway() {
    let harness = GatewayHarness::new().await;

    // 127.0.0.1:1 speaks no TLS and accepts no connections; the forced-https
    // forward fails at the client and is normalized.
    let response = harness
        .server
        .post("/proxy/127.0.0.1:1/v1/chat")
        .json(&json!({}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["code"], "UPSTREAM_ERROR");
}
