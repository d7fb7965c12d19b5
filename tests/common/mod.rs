//! Common test utilities for Switchboard
//!
//! Shared harness and fixtures used across the integration tests: one
//! wiremock server per upstream provider, a config pointing at them, and an
//! axum-test server running the full gateway router.

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use wiremock::MockServer;

use switchboard::{routes, AppState, Config};

/// Test configuration constants
pub mod constants {
    pub const TEST_OPENAI_API_KEY: &str = "test-openai-key";
    pub const TEST_GOOGLE_API_KEY: &str = "test-google-key";
    pub const TEST_CF_TOKEN: &str = "test-cf-token";
    pub const TEST_HF_TOKEN: &str = "test-hf-token";
}

/// Full gateway harness: every provider upstream mocked.
pub struct GatewayHarness {
    pub server: TestServer,
    pub openai: MockServer,
    pub google: MockServer,
    pub cloudflare: MockServer,
    pub huggingface: MockServer,
}

impl GatewayHarness {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Build the harness, letting the caller tweak the config after the mock
    /// URLs are wired in.
    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let openai = MockServer::start().await;
        let google = MockServer::start().await;
        let cloudflare = MockServer::start().await;
        let huggingface = MockServer::start().await;

        let mut config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            openai_api_key: Some(constants::TEST_OPENAI_API_KEY.to_string()),
            openai_base_url: openai.uri(),
            google_api_key: Some(constants::TEST_GOOGLE_API_KEY.to_string()),
            google_base_url: google.uri(),
            cloudflare_api_token: Some(constants::TEST_CF_TOKEN.to_string()),
            cloudflare_account_id: None,
            cloudflare_base_url: Some(format!("{}/ai/run", cloudflare.uri())),
            huggingface_api_token: Some(constants::TEST_HF_TOKEN.to_string()),
            huggingface_base_url: huggingface.uri(),
            routes_file: None,
        };
        adjust(&mut config);

        let state = Arc::new(AppState::new(config).expect("Failed to build app state"));
        let app = routes::create_router(state);
        let server = TestServer::new(app).expect("Failed to create test server");

        Self {
            server,
            openai,
            google,
            cloudflare,
            huggingface,
        }
    }
}

/// Sample request/response data for tests
pub mod test_data {
    use serde_json::json;

    /// Valid chat completion request
    pub fn valid_chat_request() -> serde_json::Value {
        json!({
            "model": "gpt-4o",
            "messages": [
                { "role": "user", "content": "Hello, how are you?" }
            ]
        })
    }

    /// Chat completion request with streaming
    pub fn streaming_chat_request() -> serde_json::Value {
        json!({
            "model": "gpt-4o",
            "messages": [
                { "role": "user", "content": "Hello!" }
            ],
            "stream": true
        })
    }

    /// Canned non-streaming OpenAI chat completion body
    pub fn openai_chat_completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-test123",
            "object": "chat.completion",
            "created": 1706745600,
            "model": "gpt-4o",
            "choices": [
                {
                    "index": 0,
                    "message": { "role": "assistant", "content": content },
                    "finish_reason": "stop"
                }
            ],
            "usage": { "prompt_tokens": 10, "completion_tokens": 8, "total_tokens": 18 }
        })
    }

    /// Canned OpenAI SSE stream that completes normally
    pub fn openai_sse_stream() -> String {
        concat!(
            "data: {\"id\":\"chatcmpl-test123\",\"object\":\"chat.completion.chunk\",\"created\":1706745600,\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n",
            "data: {\"id\":\"chatcmpl-test123\",\"object\":\"chat.completion.chunk\",\"created\":1706745600,\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {\"id\":\"chatcmpl-test123\",\"object\":\"chat.completion.chunk\",\"created\":1706745600,\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
            "data: [DONE]\n\n"
        )
        .to_string()
    }

    /// Canned OpenAI SSE stream that breaks mid-flight
    pub fn openai_sse_stream_truncated() -> String {
        concat!(
            "data: {\"id\":\"chatcmpl-test123\",\"object\":\"chat.completion.chunk\",\"created\":1706745600,\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {not valid json\n\n"
        )
        .to_string()
    }

    /// Canned Gemini generateContent body
    pub fn gemini_response(text: &str) -> serde_json::Value {
        json!({
            "candidates": [
                {
                    "content": { "parts": [{ "text": text }], "role": "model" },
                    "finishReason": "STOP",
                    "index": 0
                }
            ]
        })
    }

    /// Canned Workers AI envelope
    pub fn workers_ai_result(result: serde_json::Value) -> serde_json::Value {
        json!({ "result": result, "success": true, "errors": [], "messages": [] })
    }
}
