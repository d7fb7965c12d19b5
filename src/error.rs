//! Error types for Switchboard
//!
//! Defines the gateway error taxonomy and the exception normalizer that
//! converts any failure into the uniform `{code, message, param, type}`
//! envelope clients see.

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::adapters::Provider;

/// Application-level errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("No route registered for task '{task}' and provider '{provider}'")]
    UnknownRoute { task: String, provider: String },

    #[error("No API key available for provider '{0}'")]
    MissingCredential(String),

    #[error("Upstream provider error: {message}")]
    Upstream {
        message: String,
        status: Option<u16>,
    },

    #[error("Referenced resource unavailable: {0}")]
    Preparation(String),

    #[error("Output adaptation failed: {0}")]
    Adaptation(String),

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        tool_output: Option<String>,
        llm_output: Option<String>,
        observation: Option<String>,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// HTTP status for this error per the gateway taxonomy.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnknownRoute { .. } => StatusCode::NOT_FOUND,
            GatewayError::MissingCredential(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Preparation(_) => StatusCode::FAILED_DEPENDENCY,
            GatewayError::Adaptation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Execution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Http(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Json(_) => StatusCode::BAD_REQUEST,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "VALIDATION_ERROR",
            GatewayError::UnknownRoute { .. } => "UNKNOWN_ROUTE",
            GatewayError::MissingCredential(_) => "MISSING_CREDENTIAL",
            GatewayError::Upstream { .. } => "UPSTREAM_ERROR",
            GatewayError::Preparation(_) => "PREPARATION_FAILED",
            GatewayError::Adaptation(_) => "ADAPTATION_ERROR",
            GatewayError::Execution { .. } => "EXECUTION_ERROR",
            GatewayError::Http(_) => "UPSTREAM_ERROR",
            GatewayError::Json(_) => "INVALID_JSON",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error signals a gateway bug rather than a client fault.
    pub fn is_server_fault(&self) -> bool {
        self.status().is_server_error()
    }
}

/// Uniform error envelope returned to clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub param: Option<String>,
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
}

/// Envelope discriminator: which side of the execution produced the failure.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Llm,
    Tool,
    Generic,
}

/// Envelope renderer registered per provider.
pub type EnvelopeRenderer = fn(&GatewayError) -> ErrorEnvelope;

/// Process-wide renderer table, built once before traffic is accepted.
///
/// Every known provider currently uses the shared renderer; the table exists
/// so a provider can install its own rendering without touching call sites.
static RENDERERS: Lazy<HashMap<Provider, EnvelopeRenderer>> = Lazy::new(|| {
    let mut table: HashMap<Provider, EnvelopeRenderer> = HashMap::new();
    table.insert(Provider::OpenAi, render_envelope);
    table.insert(Provider::Google, render_envelope);
    table.insert(Provider::CloudflareWorkersAi, render_envelope);
    table.insert(Provider::HuggingfaceInference, render_envelope);
    table
});

/// Classify an error and build its envelope.
///
/// Execution failures carrying tool output render as `type: "tool"` with the
/// tool output as `param`; those carrying LLM output render as `type: "llm"`
/// with a JSON `param` holding output and observation. Everything else is
/// `type: "generic"` with a null `param`.
pub fn render_envelope(err: &GatewayError) -> ErrorEnvelope {
    if let GatewayError::Execution {
        message,
        tool_output,
        llm_output,
        observation,
    } = err
    {
        if let Some(tool) = tool_output {
            return ErrorEnvelope {
                code: err.code().to_string(),
                message: message.clone(),
                param: Some(tool.clone()),
                kind: EnvelopeKind::Tool,
            };
        }
        if let Some(llm) = llm_output {
            let param = serde_json::json!({
                "llmOutput": llm,
                "observation": observation,
            });
            return ErrorEnvelope {
                code: err.code().to_string(),
                message: message.clone(),
                param: Some(param.to_string()),
                kind: EnvelopeKind::Llm,
            };
        }
    }

    ErrorEnvelope {
        code: err.code().to_string(),
        message: err.to_string(),
        param: None,
        kind: EnvelopeKind::Generic,
    }
}

/// Normalize any gateway failure into an HTTP response.
///
/// The rendering provider is the one the failing request declared; when that
/// provider has no registered renderer the fallback is a bare 500 carrying the
/// original message. Neither path can itself fail.
pub fn normalize_error(err: &GatewayError, provider: Option<Provider>) -> Response {
    if err.is_server_fault() {
        error!(code = err.code(), error = %err, "request failed");
    }

    match provider.and_then(|p| RENDERERS.get(&p)) {
        Some(renderer) => {
            let envelope = renderer(err);
            (err.status(), Json(envelope)).into_response()
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

/// Result type alias for convenience
pub type GatewayResult<T> = Result<T, GatewayError>;
