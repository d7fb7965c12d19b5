//! Health check endpoints
//!
//! Provides endpoints for monitoring and container orchestration:
//! - `/health` - Full health check with routing-table status
//! - `/health/ready` - Readiness probe
//! - `/health/live` - Liveness probe

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

/// Health status enum
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Routing-table check result
#[derive(Debug, Serialize)]
pub struct RoutingCheck {
    pub status: HealthStatus,
    pub registered_routes: usize,
}

/// Dependency checks collection
#[derive(Debug, Serialize)]
pub struct DependencyChecks {
    pub routing: RoutingCheck,
}

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub checks: DependencyChecks,
}

/// Simple health response for liveness/readiness
#[derive(Debug, Serialize)]
pub struct SimpleHealthResponse {
    pub status: HealthStatus,
}

/// The routing table is built once at startup; an empty table means the
/// gateway cannot place a single request and should not receive traffic.
fn check_routing(state: &AppState) -> RoutingCheck {
    let registered = state.router_table.len();
    RoutingCheck {
        status: if registered == 0 {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        },
        registered_routes: registered,
    }
}

/// Full health check endpoint
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let routing = check_routing(&state);
    let overall_status = routing.status.clone();

    let response = HealthResponse {
        status: overall_status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks: DependencyChecks { routing },
    };

    let status_code = match overall_status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

/// Readiness probe endpoint
///
/// Returns 200 OK if the application is ready to receive traffic.
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SimpleHealthResponse>) {
    let routing = check_routing(&state);

    if routing.status == HealthStatus::Unhealthy {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SimpleHealthResponse {
                status: HealthStatus::Unhealthy,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(SimpleHealthResponse {
            status: HealthStatus::Healthy,
        }),
    )
}

/// Liveness probe endpoint
///
/// Returns 200 OK if the application is alive.
pub async fn liveness_check() -> (StatusCode, Json<SimpleHealthResponse>) {
    (
        StatusCode::OK,
        Json(SimpleHealthResponse {
            status: HealthStatus::Healthy,
        }),
    )
}
