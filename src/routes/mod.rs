//! HTTP routes for Switchboard
//!
//! This module defines all HTTP endpoints exposed by the gateway.

pub mod dispatch;
pub mod health;
pub mod metrics;
pub mod proxy;

use std::sync::Arc;

use axum::{
    routing::{any, get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{virtual_router, AppState};

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let gateway_routes = Router::new()
        .route("/api/:task", post(dispatch::dispatch_task))
        .route("/v1/chat/completions", post(dispatch::chat_completions))
        .route("/v1/embeddings", post(dispatch::embeddings))
        .route("/proxy/*target", any(proxy::passthrough))
        .route("/portkey-ai/gateway", any(proxy::gateway_forward));

    // Public routes (health checks, metrics) - no auth required
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .route("/metrics", get(metrics::prometheus_metrics));

    Router::new()
        .merge(public_routes)
        .merge(gateway_routes)
        .merge(virtual_router::router(state.clone()))
        // Global middleware (applied to all routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
