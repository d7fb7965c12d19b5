//! Virtual route integration tests
//!
//! Routes declared in the JSON routes file mount beside the static surface,
//! behind the gateway-level bearer-token guard.

use std::io::Write;
use std::path::PathBuf;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::GatewayHarness;

/// Write a routes file into the temp dir and return its path.
fn write_routes_file(tag: &str, contents: &Value) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "switchboard-routes-{}-{}.json",
        tag,
        std::process::id()
    ));
    let mut file = std::fs::File::create(&path).expect("temp routes file");
    file.write_all(contents.to_string().as_bytes())
        .expect("write routes file");
    path
}

async fn harness_with_routes(tag: &str, target: &MockServer) -> GatewayHarness {
    let routes = json!({
        "tokens": ["vr-token"],
        "routers": [
            {
                "path": "/custom/chat",
                "methods": ["POST"],
                "headers": { "x-injected": "from-config" },
                "target": format!("{}/virtual/chat", target.uri())
            },
            { "path": "/custom/dead", "methods": ["GET"] }
        ]
    });
    let file = write_routes_file(tag, &routes);
    GatewayHarness::with_config(move |config| {
        config.routes_file = Some(file.to_string_lossy().into_owned());
    })
    .await
}

#[tokio::test]
async fn test_virtual_route_forwards_with_header_overlay() {
    let target = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/virtual/chat"))
        .and(header("x-injected", "from-config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "virtual": true })))
        .expect(1)
        .mount(&target)
        .await;

    let harness = harness_with_routes("forward", &target).await;

    let response = harness
        .server
        .post("/custom/chat")
        .add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Bearer vr-token"),
        )
        .json(&json!({ "q": 1 }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["virtual"], true);
}

#[tokio::test]
async fn test_virtual_route_rejects_unknown_token() {
    let target = MockServer::start().await;
    let harness = harness_with_routes("token", &target).await;

    let response = harness
        .server
        .post("/custom/chat")
        .add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Bearer wrong-token"),
        )
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    // Missing token entirely is also rejected.
    let response = harness.server.post("/custom/chat").json(&json!({})).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_virtual_route_without_target_is_not_found() {
    let target = MockServer::start().await;
    let harness = harness_with_routes("dead", &target).await;

    let response = harness
        .server
        .get("/custom/dead")
        .add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Bearer vr-token"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_virtual_route_enforces_method_list() {
    let target = MockServer::start().await;
    let harness = harness_with_routes("method", &target).await;

    let response = harness
        .server
        .get("/custom/chat")
        .add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Bearer vr-token"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_duplicate_route_paths_keep_first_and_still_serve() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "which": "first" })))
        .expect(1)
        .mount(&target)
        .await;

    let routes = json!({
        "routers": [
            { "path": "/dup", "methods": ["GET"], "target": format!("{}/first", target.uri()) },
            { "path": "/dup", "methods": ["POST"], "target": format!("{}/second", target.uri()) }
        ]
    });
    let file = write_routes_file("dup", &routes);
    let harness = GatewayHarness::with_config(move |config| {
        config.routes_file = Some(file.to_string_lossy().into_owned());
    })
    .await;

    // Startup survived the collision and the first declaration won.
    let response = harness.server.get("/dup").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["which"], "first");

    // The dropped duplicate's method list is gone with it.
    let response = harness.server.post("/dup").json(&json!({})).await;
    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_invalid_routes_file_degrades_to_static_routes() {
    let file = std::env::temp_dir().join(format!(
        "switchboard-routes-broken-{}.json",
        std::process::id()
    ));
    std::fs::write(&file, "{broken").expect("write routes file");

    let harness = GatewayHarness::with_config(move |config| {
        config.routes_file = Some(file.to_string_lossy().into_owned());
    })
    .await;

    // Static surface still up.
    let response = harness.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    // The configured path was never mounted.
    let response = harness.server.post("/custom/chat").json(&json!({})).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
