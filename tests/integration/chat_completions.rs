//! Chat endpoint integration tests
//!
//! Drives `/v1/chat/completions` and `/api/chat` against a mocked OpenAI
//! upstream, covering the non-streaming document shape, SSE translation,
//! stream truncation on upstream failure, and credential precedence.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{constants, test_data, GatewayHarness};

#[tokio::test]
async fn test_non_streaming_chat_returns_completion_document() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header(
            "authorization",
            format!("Bearer {}", constants::TEST_OPENAI_API_KEY).as_str(),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(test_data::openai_chat_completion("Hello there!")),
        )
        .mount(&harness.openai)
        .await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .json(&test_data::valid_chat_request())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "Hello there!");
}

#[tokio::test]
async fn test_api_chat_path_routes_like_shorthand() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(test_data::openai_chat_completion("hi")),
        )
        .mount(&harness.openai)
        .await;

    let response = harness
        .server
        .post("/api/chat")
        .json(&test_data::valid_chat_request())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["choices"][0]["message"]["content"], "hi");
}

#[tokio::test]
async fn test_streaming_chat_preserves_order_and_terminates() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(test_data::openai_sse_stream())
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&harness.openai)
        .await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .json(&test_data::streaming_chat_request())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let body = response.text();
    let events: Vec<&str> = body
        .split("\n\n")
        .filter(|e| !e.is_empty())
        .collect();

    // Two content chunks in upstream order, then the terminal marker.
    assert_eq!(events.len(), 3);
    let first: Value =
        serde_json::from_str(events[0].strip_prefix("data: ").unwrap()).unwrap();
    let second: Value =
        serde_json::from_str(events[1].strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(first["object"], "chat.completion.chunk");
    assert_eq!(first["choices"][0]["delta"]["content"], "Hel");
    assert_eq!(second["choices"][0]["delta"]["content"], "lo");
    assert_eq!(first["id"], second["id"]);
    assert_eq!(events[2], "data: [DONE]");
}

#[tokio::test]
async fn test_stream_failure_truncates_without_done() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(test_data::openai_sse_stream_truncated())
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&harness.openai)
        .await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .json(&test_data::streaming_chat_request())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("\"content\":\"Hel\""));
    assert!(!body.contains("[DONE]"));
}

#[tokio::test]
async fn test_request_key_overrides_configured_default() {
    let harness = GatewayHarness::new().await;

    // Only a request carrying the per-request key gets a completion.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer per-request-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(test_data::openai_chat_completion("ok")),
        )
        .expect(1)
        .mount(&harness.openai)
        .await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(
            HeaderName::from_static("x-gateway-api-key"),
            HeaderValue::from_static("per-request-key"),
        )
        .json(&test_data::valid_chat_request())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
}
