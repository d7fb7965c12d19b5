//! Switchboard - an OpenAI-compatible LLM API gateway
//!
//! This library provides the core functionality for the Switchboard gateway:
//! one OpenAI-compatible wire protocol in front of heterogeneous model
//! providers, with per-request provider selection, request/response
//! adaptation, streaming translation and error normalization.

pub mod adapters;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod multimodal;
pub mod params;
pub mod routes;
pub mod streaming;
pub mod virtual_router;
pub mod wire;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

pub use crate::adapters::{Provider, RouterTable, TaskType};
pub use crate::backend::{Backend, HttpBackend};
pub use crate::config::Config;
pub use crate::context::RequestContext;
pub use crate::error::{ErrorEnvelope, GatewayError, GatewayResult};
pub use crate::virtual_router::VirtualRoutes;

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub start_time: Instant,
    /// Dispatch table, built once at startup and read-only afterwards
    pub router_table: RouterTable,
    /// Extra routes loaded from the configured routes file
    pub virtual_routes: VirtualRoutes,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config) -> Result<Self> {
        // HTTP client with connection pooling, shared by the backend and the
        // pass-through proxy
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .timeout(std::time::Duration::from_secs(300))
            .build()?;

        let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(http_client.clone()));
        let router_table = RouterTable::build(backend, &config);
        let virtual_routes = VirtualRoutes::load(config.routes_file.as_deref());

        Ok(Self {
            config,
            http_client,
            start_time: Instant::now(),
            router_table,
            virtual_routes,
        })
    }

    /// Create application state against an arbitrary backend, for tests that
    /// route adapter traffic through fakes or wiremock servers.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing(config: Config, backend: Arc<dyn Backend>) -> Self {
        let http_client = reqwest::Client::new();
        let router_table = RouterTable::build(backend, &config);
        let virtual_routes = VirtualRoutes::load(config.routes_file.as_deref());

        Self {
            config,
            http_client,
            start_time: Instant::now(),
            router_table,
            virtual_routes,
        }
    }
}
