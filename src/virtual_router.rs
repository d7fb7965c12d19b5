//! Configured virtual routes
//!
//! A JSON file named by `SWITCHBOARD_ROUTES_FILE` can declare extra routes
//! mounted at startup: each carries an allowed method list, default headers
//! to overlay, and an optional forward target. A gateway-level bearer-token
//! list guards all of them. A missing or malformed file degrades to the
//! static routes only; it never aborts startup.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{OriginalUri, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{routes::proxy::forward, AppState};

/// One configured route.
#[derive(Debug, Clone, Deserialize)]
pub struct VirtualRoute {
    pub path: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub target: Option<String>,
}

/// The parsed routes file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VirtualRoutes {
    #[serde(default)]
    pub tokens: Vec<String>,
    #[serde(default)]
    pub routers: Vec<VirtualRoute>,
}

impl VirtualRoutes {
    /// Load the routes file, if configured. Any failure logs a warning and
    /// yields an empty route set.
    pub fn load(path: Option<&str>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path, error = %e, "routes file unreadable, skipping virtual routes");
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&contents) {
            Ok(mut routes) => {
                // Duplicate paths cannot both be mounted; first one wins.
                let mut seen = HashSet::new();
                routes.routers.retain(|route| {
                    if !route.path.starts_with('/') {
                        warn!(path = %route.path, "virtual route path must start with '/', dropped");
                        return false;
                    }
                    if !seen.insert(route.path.clone()) {
                        warn!(path = %route.path, "duplicate virtual route path, dropped");
                        return false;
                    }
                    true
                });
                info!(
                    routes = routes.routers.len(),
                    tokens = routes.tokens.len(),
                    "virtual routes loaded"
                );
                routes
            }
            Err(e) => {
                warn!(path = %path, error = %e, "routes file invalid, skipping virtual routes");
                Self::default()
            }
        }
    }

    fn token_set(&self) -> HashSet<&str> {
        self.tokens.iter().map(String::as_str).collect()
    }

    fn find(&self, path: &str) -> Option<&VirtualRoute> {
        self.routers.iter().find(|route| route.path == path)
    }
}

/// Mount every configured route onto one router. Paths are literal; all
/// methods are routed here and the per-route method list is enforced in the
/// handler.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let mut router = Router::new();
    for route in &state.virtual_routes.routers {
        router = router.route(&route.path, any(handle_virtual));
    }
    router
}

async fn handle_virtual(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    method: Method,
    headers: HeaderMap,
    request: axum::extract::Request,
) -> Response {
    let routes = &state.virtual_routes;

    // Token guard applies to every virtual route when any token is set.
    let tokens = routes.token_set();
    if !tokens.is_empty() {
        let presented = bearer_token(&headers);
        if presented.map_or(true, |t| !tokens.contains(t)) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "invalid or missing gateway token" })),
            )
                .into_response();
        }
    }

    let Some(route) = routes.find(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if !route.methods.is_empty()
        && !route
            .methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method.as_str()))
    {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let Some(target) = &route.target else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // Overlay the configured default headers; configured values win.
    let mut outbound = headers;
    for (name, value) in &route.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            outbound.insert(name, value);
        }
    }

    match forward(&state, method, target, &outbound, request.into_body()).await {
        Ok(response) => response,
        Err(e) => {
            warn!(target = %target, error = %e, "virtual route forward failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "message": "virtual route target unreachable" })),
            )
                .into_response()
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}
