//! Upstream backend abstraction
//!
//! Defines the seam between provider adapters and the network: a backend
//! exposes `invoke` (one JSON document), `stream` (raw byte stream of the
//! upstream response body) and `fetch` (media download for request
//! preparation). Adapters own wire-shape mapping; the backend owns transport.
//!
//! # Security
//!
//! Implementations MUST:
//! - Send only the headers the adapter built; client headers never leak upstream
//! - Log raw upstream error bodies server-side, never return them verbatim

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde_json::Value;
use std::pin::Pin;
use tracing::{debug, error, warn};

use crate::error::{GatewayError, GatewayResult};

/// Raw byte stream of an upstream response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// A fully adapter-built upstream call: target URL, outbound headers, JSON body.
#[derive(Debug)]
pub struct UpstreamRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Value,
}

impl UpstreamRequest {
    pub fn new(url: String, headers: HeaderMap, body: Value) -> Self {
        Self { url, headers, body }
    }
}

/// Opaque backend capability behind the adapters.
///
/// Implementations are shared across all concurrent requests and hold no
/// per-request state.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a call and materialize the full JSON response.
    async fn invoke(&self, request: UpstreamRequest) -> GatewayResult<Value>;

    /// Execute a call and return the response body as a lazy byte stream.
    ///
    /// The stream is cancellable: dropping it releases the upstream
    /// connection without draining it.
    async fn stream(&self, request: UpstreamRequest) -> GatewayResult<ByteStream>;

    /// Download a referenced resource (e.g. a remote image). Returns the
    /// content type and raw bytes.
    async fn fetch(&self, url: &str) -> GatewayResult<(String, Bytes)>;
}

/// reqwest-based backend used in production.
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(&self, request: UpstreamRequest) -> GatewayResult<reqwest::Response> {
        debug!(url = %request.url, "sending upstream request");

        let response = self
            .client
            .post(&request.url)
            .headers(request.headers)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| {
                error!(url = %request.url, error = %e, "upstream request failed");
                GatewayError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %request.url, status = %status, body = %body, "upstream returned error");
            return Err(GatewayError::Upstream {
                message: upstream_message(&body, status.as_u16()),
                status: Some(status.as_u16()),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn invoke(&self, request: UpstreamRequest) -> GatewayResult<Value> {
        let response = self.send(request).await?;
        let value = response.json::<Value>().await?;
        Ok(value)
    }

    async fn stream(&self, request: UpstreamRequest) -> GatewayResult<ByteStream> {
        let response = self.send(request).await?;
        Ok(Box::pin(response.bytes_stream()))
    }

    async fn fetch(&self, url: &str) -> GatewayResult<(String, Bytes)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::Preparation(format!("failed to fetch '{}': {}", url, e)))?;

        if !response.status().is_success() {
            return Err(GatewayError::Preparation(format!(
                "failed to fetch '{}': status {}",
                url,
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Preparation(format!("failed to read '{}': {}", url, e)))?;

        Ok((content_type, bytes))
    }
}

/// Best-effort extraction of a human-readable message from an upstream error
/// body. The raw body is logged by the caller, never forwarded.
fn upstream_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for path in [&["error", "message"][..], &["message"][..]] {
            let mut cursor = &value;
            let mut found = true;
            for key in path {
                match cursor.get(key) {
                    Some(next) => cursor = next,
                    None => {
                        found = false;
                        break;
                    }
                }
            }
            if found {
                if let Some(msg) = cursor.as_str() {
                    return msg.to_string();
                }
            }
        }
    }
    format!("upstream returned status {}", status)
}
