//! Routing and provider dispatch integration tests
//!
//! Exercises model-name inference, explicit provider overrides, and the
//! per-provider request/response adaptation through mocked upstreams.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{constants, test_data, GatewayHarness};

#[tokio::test]
async fn test_gemini_model_routes_to_google() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", constants::TEST_GOOGLE_API_KEY))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(test_data::gemini_response("Bonjour!")),
        )
        .mount(&harness.google)
        .await;

    let response = harness
        .server
        .post("/api/chat")
        .json(&json!({
            "model": "gemini-1.5-flash",
            "messages": [{ "role": "user", "content": "Say hello in French" }]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    // Google's text answer is re-shaped into the OpenAI completion document.
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], "Bonjour!");
}

#[tokio::test]
async fn test_system_message_travels_as_instruction_to_google() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(test_data::gemini_response("ok")),
        )
        .mount(&harness.google)
        .await;

    let response = harness
        .server
        .post("/api/chat")
        .json(&json!({
            "model": "gemini-1.5-flash",
            "messages": [
                { "role": "system", "content": "be terse" },
                { "role": "user", "content": "hi" }
            ]
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let requests = harness
        .google
        .received_requests()
        .await
        .expect("request recording enabled");
    let upstream_body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        upstream_body["system_instruction"]["parts"][0]["text"],
        "be terse"
    );
    assert_eq!(upstream_body["contents"][0]["role"], "user");
}

#[tokio::test]
async fn test_cf_model_prefix_routes_to_workers_ai() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/ai/run/@cf/meta/llama-3-8b-instruct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data::workers_ai_result(
            json!({ "response": "Llama says hi" }),
        )))
        .mount(&harness.cloudflare)
        .await;

    let response = harness
        .server
        .post("/api/chat")
        .json(&json!({
            "model": "@cf/meta/llama-3-8b-instruct",
            "messages": [{ "role": "user", "content": "hi" }]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["choices"][0]["message"]["content"], "Llama says hi");
}

#[tokio::test]
async fn test_embeddings_provider_override_to_workers_ai() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/ai/run/@cf/baai/bge-base-en-v1.5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data::workers_ai_result(
            json!({ "data": [[0.1, 0.2], [0.3, 0.4]] }),
        )))
        .mount(&harness.cloudflare)
        .await;

    let response = harness
        .server
        .post("/api/embeddings")
        .add_query_param("provider", "workers-ai")
        .json(&json!({
            "model": "@cf/baai/bge-base-en-v1.5",
            "input": ["first", "second"]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["object"], "list");
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][1]["index"], 1);
    assert_eq!(body["data"][0]["embedding"][1], 0.2);
}

#[tokio::test]
async fn test_slashed_model_infers_huggingface_for_embeddings() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path(
            "/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2",
        ))
        .and(header(
            "authorization",
            format!("Bearer {}", constants::TEST_HF_TOKEN).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[0.5, 0.25, 0.125]])))
        .mount(&harness.huggingface)
        .await;

    let response = harness
        .server
        .post("/api/embeddings")
        .json(&json!({
            "model": "sentence-transformers/all-MiniLM-L6-v2",
            "input": "embed me"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"][0]["embedding"].as_array().unwrap().len(), 3);
    assert_eq!(body["model"], "sentence-transformers/all-MiniLM-L6-v2");
}

#[tokio::test]
async fn test_openai_shaped_body_executes_on_overridden_provider() {
    let harness = GatewayHarness::new().await;

    // The model name implies OpenAI, so its adapter shapes the params; the
    // override sends execution to Workers AI instead.
    Mock::given(method("POST"))
        .and(path("/ai/run/gpt-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data::workers_ai_result(
            json!({ "response": "routed elsewhere" }),
        )))
        .expect(1)
        .mount(&harness.cloudflare)
        .await;

    let response = harness
        .server
        .post("/api/chat")
        .add_query_param("provider", "workers-ai")
        .json(&json!({
            "model": "gpt-4",
            "messages": [{ "role": "user", "content": "hi" }]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], "routed elsewhere");

    // OpenAI only prepared the params; no call went to it.
    let openai_requests = harness
        .openai
        .received_requests()
        .await
        .expect("request recording enabled");
    assert!(openai_requests.is_empty());
}

#[tokio::test]
async fn test_provider_header_wins_over_query_param() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/ai/run/gpt-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data::workers_ai_result(
            json!({ "response": "via header" }),
        )))
        .expect(1)
        .mount(&harness.cloudflare)
        .await;

    let response = harness
        .server
        .post("/api/chat")
        .add_query_param("provider", "google")
        .add_header(
            axum::http::HeaderName::from_static("x-gateway-provider"),
            axum::http::HeaderValue::from_static("workers-ai"),
        )
        .json(&json!({
            "model": "gpt-4",
            "messages": [{ "role": "user", "content": "hi" }]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["choices"][0]["message"]["content"], "via header");

    let google_requests = harness
        .google
        .received_requests()
        .await
        .expect("request recording enabled");
    assert!(google_requests.is_empty());
}

#[tokio::test]
async fn test_slashed_chat_model_dispatches_to_openai() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(test_data::openai_chat_completion("hi there")),
        )
        .expect(1)
        .mount(&harness.openai)
        .await;

    let response = harness
        .server
        .post("/api/chat")
        .json(&json!({
            "model": "mistralai/Mixtral-8x7B",
            "messages": [{ "role": "user", "content": "hi" }]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["choices"][0]["message"]["content"], "hi there");
}

#[tokio::test]
async fn test_workers_ai_transcription() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/ai/run/@cf/openai/whisper"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data::workers_ai_result(
            json!({ "text": "hello world" }),
        )))
        .mount(&harness.cloudflare)
        .await;

    let response = harness
        .server
        .post("/api/audio_transcriptions")
        .json(&json!({
            "model": "@cf/openai/whisper",
            "audio": "c29tZSBhdWRpbw=="
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["text"], "hello world");
}

#[tokio::test]
async fn test_query_model_used_when_body_lacks_one() {
    let harness = GatewayHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(test_data::openai_chat_completion("ok")),
        )
        .mount(&harness.openai)
        .await;

    let response = harness
        .server
        .post("/api/chat")
        .add_query_param("model", "gpt-4o-mini")
        .json(&json!({
            "messages": [{ "role": "user", "content": "hi" }]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
}
