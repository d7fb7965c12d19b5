//! Per-request context extraction
//!
//! Parses gateway control headers and query parameters into a normalized
//! [`RequestContext`]. Extraction never fails: missing or malformed fields
//! are simply omitted.

use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use once_cell::sync::Lazy;
use regex::Regex;

/// Provider-specific API key header, highest key precedence.
pub const HEADER_API_KEY: &str = "x-gateway-api-key";
/// Execution-provider override.
pub const HEADER_PROVIDER: &str = "x-gateway-provider";
/// Upstream base URL override.
pub const HEADER_BASE_URL: &str = "x-gateway-base-url";
/// Cache control; any value enables caching.
pub const HEADER_CACHE: &str = "x-gateway-cache";
/// Retry policy: a bare attempt count or a JSON object with `attempts`.
pub const HEADER_RETRY: &str = "x-gateway-retry";
/// Companion to the retry header: comma-separated status codes to retry on.
pub const HEADER_RETRY_STATUS_CODES: &str = "x-gateway-retry-status-codes";
/// Opaque trace id, passed through to logs and upstream calls.
pub const HEADER_TRACE_ID: &str = "x-gateway-trace-id";
/// Auth passthrough for nested gateways.
pub const HEADER_AUTH_KEY: &str = "x-auth-key";
/// Auth passthrough for nested gateways.
pub const HEADER_AUTH_EMAIL: &str = "x-auth-email";

static BEARER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Bearer\s+(\S+)$").expect("bearer regex is valid"));

/// Retry policy carried through to the backend-call layer.
///
/// Parsed and forwarded only; no retry loop runs in the dispatch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub on_status_codes: Option<Vec<u16>>,
}

/// Normalized per-request context, assembled before schema validation.
///
/// Lives for one request only; adapters read it, nothing writes it back.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub api_key: Option<String>,
    pub provider: Option<String>,
    pub base_url: Option<String>,
    pub cache: bool,
    pub retry: Option<RetryPolicy>,
    pub trace_id: Option<String>,
    pub auth_key: Option<String>,
    pub auth_email: Option<String>,
    /// `options` query object: passthrough defaults, lowest merge precedence.
    pub options: Option<serde_json::Value>,
}

impl RequestContext {
    /// Build a context from raw headers and the decoded query string.
    pub fn from_parts(headers: &HeaderMap, query: &HashMap<String, String>) -> Self {
        Self {
            api_key: extract_api_key(headers, query),
            provider: header_str(headers, HEADER_PROVIDER)
                .or_else(|| query.get("provider").cloned()),
            base_url: header_str(headers, HEADER_BASE_URL),
            cache: headers.contains_key(HEADER_CACHE),
            retry: extract_retry(headers),
            trace_id: header_str(headers, HEADER_TRACE_ID),
            auth_key: header_str(headers, HEADER_AUTH_KEY),
            auth_email: header_str(headers, HEADER_AUTH_EMAIL),
            options: query
                .get("options")
                .and_then(|raw| serde_json::from_str(raw).ok())
                .filter(serde_json::Value::is_object),
        }
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// API key precedence: provider key header > `Authorization: Bearer` > `key`
/// query parameter. A malformed Authorization value contributes nothing.
fn extract_api_key(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    if let Some(key) = header_str(headers, HEADER_API_KEY) {
        return Some(key);
    }

    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(caps) = BEARER_RE.captures(auth) {
            return Some(caps[1].to_string());
        }
    }

    query.get("key").cloned()
}

/// Parse the retry header pair.
///
/// A bare number sets `attempts` with no status filter. A JSON object needs a
/// numeric `attempts` field; `on_status_codes` is attached only when attempts
/// parsed and the companion header holds a clean comma-separated integer list.
fn extract_retry(headers: &HeaderMap) -> Option<RetryPolicy> {
    let raw = header_str(headers, HEADER_RETRY)?;

    if let Ok(attempts) = raw.trim().parse::<u32>() {
        return Some(RetryPolicy {
            attempts,
            on_status_codes: None,
        });
    }

    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let attempts = value.get("attempts")?.as_u64()? as u32;

    Some(RetryPolicy {
        attempts,
        on_status_codes: extract_status_codes(headers),
    })
}

fn extract_status_codes(headers: &HeaderMap) -> Option<Vec<u16>> {
    let raw = header_str(headers, HEADER_RETRY_STATUS_CODES)?;
    let codes: Result<Vec<u16>, _> = raw.split(',').map(|s| s.trim().parse::<u16>()).collect();
    codes.ok().filter(|c| !c.is_empty())
}
