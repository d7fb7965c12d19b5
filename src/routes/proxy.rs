//! Pass-through proxy handlers
//!
//! `/proxy/{*target}` forwards a request verbatim to the host+path named in
//! the URL, and `/portkey-ai/gateway` forwards to the target named by the
//! `url` query parameter with header overlays from the bracket-notation
//! `options[headers][...]` keys. Both stream the upstream body back without
//! buffering.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Path, Query, RawQuery, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method},
    response::Response,
};
use tracing::info;

use crate::{
    adapters::Provider,
    error::{normalize_error, GatewayError, GatewayResult},
    routes::metrics::record_proxy_request,
    AppState,
};

/// Headers that never cross the proxy boundary, in either direction.
const HOP_BY_HOP: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Handle `/proxy/{*target}` requests
///
/// The remainder of the path names the upstream host and path; the scheme is
/// always forced to https. The `route` query parameter is gateway-internal
/// and is dropped before forwarding.
pub async fn passthrough(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
    RawQuery(raw_query): RawQuery,
    method: Method,
    headers: HeaderMap,
    request: axum::extract::Request,
) -> Response {
    let start_time = Instant::now();

    let target = target.trim_start_matches('/');
    let query = strip_route_param(raw_query.as_deref());
    let url = match query {
        Some(q) => format!("https://{}?{}", target, q),
        None => format!("https://{}", target),
    };

    let result = forward(&state, method.clone(), &url, &headers, request.into_body()).await;
    finish_proxy(result, &method, &url, start_time)
}

/// Handle `/portkey-ai/gateway` requests
///
/// The target comes from the `url` query parameter; any
/// `options[headers][name]` keys overlay the forwarded headers.
pub async fn gateway_forward(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    method: Method,
    headers: HeaderMap,
    request: axum::extract::Request,
) -> Response {
    let start_time = Instant::now();

    let Some(url) = query.get("url").filter(|u| !u.is_empty()) else {
        let err = GatewayError::Validation("'url' query parameter is required".to_string());
        return normalize_error(&err, Some(Provider::OpenAi));
    };
    let url = url.clone();

    let mut headers = headers;
    for (name, value) in header_overlays(&query) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            headers.insert(name, value);
        }
    }

    let result = forward(&state, method.clone(), &url, &headers, request.into_body()).await;
    finish_proxy(result, &method, &url, start_time)
}

fn finish_proxy(
    result: GatewayResult<Response>,
    method: &Method,
    url: &str,
    start_time: Instant,
) -> Response {
    let duration = start_time.elapsed().as_secs_f64();
    match result {
        Ok(response) => {
            let status_label = if response.status().is_success() {
                "success"
            } else {
                "error"
            };
            record_proxy_request(status_label, duration);
            info!(
                method = %method,
                url = %url,
                status = %response.status(),
                duration_ms = %format!("{:.2}", duration * 1000.0),
                "pass-through request completed"
            );
            response
        }
        Err(err) => {
            record_proxy_request("error", duration);
            normalize_error(&err, Some(Provider::OpenAi))
        }
    }
}

/// Forward a request verbatim, streaming both bodies.
pub(crate) async fn forward(
    state: &AppState,
    method: Method,
    url: &str,
    headers: &HeaderMap,
    body: Body,
) -> GatewayResult<Response> {
    let mut outbound = reqwest::header::HeaderMap::new();
    for (name, value) in headers {
        if !is_hop_by_hop(name) {
            outbound.insert(name.clone(), value.clone());
        }
    }

    let upstream = state
        .http_client
        .request(method, url)
        .headers(outbound)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await?;

    let status = upstream.status();
    let mut builder = Response::builder().status(status);
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name) {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| GatewayError::Internal(anyhow::anyhow!("failed to build response: {}", e)))
}

/// Drop the gateway-internal `route` parameter, keeping everything else in
/// its original order. Returns None when nothing remains.
fn strip_route_param(raw_query: Option<&str>) -> Option<String> {
    let raw = raw_query?;
    let kept: Vec<&str> = raw
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or(pair);
            key != "route"
        })
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join("&"))
    }
}

/// Extract `options[headers][name]` overlays from the flat decoded query map.
fn header_overlays(query: &HashMap<String, String>) -> Vec<(String, String)> {
    const PREFIX: &str = "options[headers][";
    query
        .iter()
        .filter_map(|(key, value)| {
            let inner = key.strip_prefix(PREFIX)?.strip_suffix(']')?;
            if inner.is_empty() || inner.contains('[') {
                return None;
            }
            Some((inner.to_string(), value.clone()))
        })
        .collect()
}
