//! Provider adapters and the dispatch table
//!
//! One stateless adapter per (task, provider) pair, registered explicitly in
//! the [`RouterTable`] at startup. Adapters implement the three-step contract:
//! `prepare_params` (wire-shape parsing into canonical params), `execute`
//! (the backend call), `deliver` (normalization to the OpenAI-compatible
//! response shape).

pub mod cloudflare;
pub mod google;
pub mod huggingface;
pub mod openai;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::backend::Backend;
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::params::ModelParams;
use crate::streaming::{single_chunk, sse_response, ChunkStream};
use crate::wire::ChatCompletion;

/// Task surface, one per OpenAI-compatible wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Chat,
    Embeddings,
    AudioTranscriptions,
    ImagesGenerations,
    ImagesEdits,
}

impl TaskType {
    /// Parse the `{taskType}` path segment.
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "chat" => Some(TaskType::Chat),
            "embeddings" => Some(TaskType::Embeddings),
            "audio_transcriptions" => Some(TaskType::AudioTranscriptions),
            "images_generations" => Some(TaskType::ImagesGenerations),
            "images_edits" => Some(TaskType::ImagesEdits),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Chat => "chat",
            TaskType::Embeddings => "embeddings",
            TaskType::AudioTranscriptions => "audio_transcriptions",
            TaskType::ImagesGenerations => "images_generations",
            TaskType::ImagesEdits => "images_edits",
        }
    }
}

/// Backend model vendor identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    Google,
    CloudflareWorkersAi,
    HuggingfaceInference,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Google => "google",
            Provider::CloudflareWorkersAi => "workers-ai",
            Provider::HuggingfaceInference => "huggingface",
        }
    }
}

impl FromStr for Provider {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Provider::OpenAi),
            "google" => Ok(Provider::Google),
            "workers-ai" | "cloudflare" => Ok(Provider::CloudflareWorkersAi),
            "huggingface" | "huggingface-inference" => Ok(Provider::HuggingfaceInference),
            other => Err(GatewayError::Validation(format!(
                "unknown provider '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infer the provider a model name belongs to, for requests without an
/// explicit provider override. OpenAI is the catch-all: its names carry no
/// vendor prefix. Slashed repo names (`org/model`) mean HuggingFace, but only
/// for embeddings, the one task it serves.
pub fn infer_provider(task: TaskType, model: &str) -> Provider {
    if model.starts_with("@cf/") || model.starts_with("@hf/") {
        Provider::CloudflareWorkersAi
    } else if model.starts_with("gemini")
        || model.starts_with("embedding-gecko")
        || model == "text-embedding-004"
    {
        Provider::Google
    } else if task == TaskType::Embeddings && model.contains('/') {
        Provider::HuggingfaceInference
    } else {
        Provider::OpenAi
    }
}

/// Adapter-internal result prior to OpenAI-shape normalization.
pub enum RawOutput {
    /// Raw generated text.
    Text(String),
    /// A structured document, already in (or convertible to) wire shape.
    Message(Value),
    /// Lazy chunk sequence, terminated once by upstream completion.
    Stream(ChunkStream),
}

impl fmt::Debug for RawOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawOutput::Text(t) => f.debug_tuple("Text").field(t).finish(),
            RawOutput::Message(m) => f.debug_tuple("Message").field(m).finish(),
            RawOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// One (task, provider) capability.
///
/// Implementations are stateless singletons shared across concurrent
/// requests; they hold only immutable configuration and the backend handle.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn task(&self) -> TaskType;
    fn provider(&self) -> Provider;

    /// Merge context and validated body into canonical params, normalizing
    /// provider-specific field aliases and inlining referenced resources.
    async fn prepare_params(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> GatewayResult<ModelParams>;

    /// Perform the backend call. `params.stream` selects between a lazy chunk
    /// sequence and one materialized value.
    async fn execute(&self, ctx: &RequestContext, params: &ModelParams) -> GatewayResult<RawOutput>;

    /// Normalize the raw output into exactly one response: a JSON document or
    /// an SSE stream terminated by `[DONE]`.
    ///
    /// A materialized result under a streaming request is coerced into a
    /// single-chunk stream; a stream result always streams regardless of the
    /// requested flag.
    async fn deliver(
        &self,
        _ctx: &RequestContext,
        params: &ModelParams,
        output: RawOutput,
    ) -> GatewayResult<Response> {
        let model = params.require_model()?;
        match output {
            RawOutput::Stream(chunks) => Ok(sse_response(model, chunks)),
            RawOutput::Text(text) if params.stream => Ok(sse_response(model, single_chunk(text))),
            RawOutput::Text(text) => {
                Ok(Json(ChatCompletion::from_text(model, text)).into_response())
            }
            RawOutput::Message(value) if params.stream => {
                let content = value["choices"][0]["message"]["content"]
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| value.to_string());
                Ok(sse_response(model, single_chunk(content)))
            }
            RawOutput::Message(value) => Ok(Json(value).into_response()),
        }
    }
}

impl fmt::Debug for dyn ProviderAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("task", &self.task())
            .field("provider", &self.provider())
            .finish()
    }
}

/// Deliver for tasks that never stream: the output must already be a
/// structured document. Anything else is a gateway bug, not a client error.
pub(crate) fn deliver_document(task: TaskType, output: RawOutput) -> GatewayResult<Response> {
    match output {
        RawOutput::Message(value) => Ok(Json(value).into_response()),
        other => Err(GatewayError::Adaptation(format!(
            "unexpected {:?} output for task '{}'",
            other,
            task.as_str()
        ))),
    }
}

/// Minimal outbound header set: bearer credential plus JSON content type.
/// Client headers are never forwarded upstream.
pub(crate) fn bearer_headers(api_key: &str) -> GatewayResult<reqwest::header::HeaderMap> {
    use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| GatewayError::Validation("API key contains invalid characters".into()))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Credential precedence: explicit request key > configured default.
/// Never call upstream unauthenticated.
pub(crate) fn resolve_credential(
    params: &ModelParams,
    configured: Option<&str>,
    provider: Provider,
) -> GatewayResult<String> {
    params
        .api_key
        .clone()
        .or_else(|| configured.map(str::to_string))
        .ok_or_else(|| GatewayError::MissingCredential(provider.as_str().to_string()))
}

/// Process-wide dispatch table: `(task, provider) -> adapter`.
///
/// Built once from the fixed registration list below; read-only afterwards.
/// Absent pairs (e.g. image generation via Google) simply do not exist.
pub struct RouterTable {
    table: HashMap<(TaskType, Provider), Arc<dyn ProviderAdapter>>,
}

impl RouterTable {
    /// Build the full registration list against one shared backend.
    pub fn build(backend: Arc<dyn Backend>, config: &Config) -> Self {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(openai::OpenAiChat::new(backend.clone(), config)),
            Arc::new(openai::OpenAiEmbedding::new(backend.clone(), config)),
            Arc::new(openai::OpenAiTranscription::new(backend.clone(), config)),
            Arc::new(openai::OpenAiImageGeneration::new(backend.clone(), config)),
            Arc::new(google::GoogleChat::new(backend.clone(), config)),
            Arc::new(google::GoogleEmbedding::new(backend.clone(), config)),
            Arc::new(cloudflare::CloudflareChat::new(backend.clone(), config)),
            Arc::new(cloudflare::CloudflareEmbedding::new(backend.clone(), config)),
            Arc::new(cloudflare::CloudflareTranscription::new(
                backend.clone(),
                config,
            )),
            Arc::new(cloudflare::CloudflareImageEdit::new(backend.clone(), config)),
            Arc::new(huggingface::HfEmbedding::new(backend, config)),
        ];

        let mut table = HashMap::new();
        for adapter in adapters {
            table.insert((adapter.task(), adapter.provider()), adapter);
        }
        Self { table }
    }

    /// Look up the adapter for a pair; an unregistered pair is a client
    /// error, not a server fault.
    pub fn resolve(
        &self,
        task: TaskType,
        provider: Provider,
    ) -> GatewayResult<Arc<dyn ProviderAdapter>> {
        self.table
            .get(&(task, provider))
            .cloned()
            .ok_or_else(|| GatewayError::UnknownRoute {
                task: task.as_str().to_string(),
                provider: provider.as_str().to_string(),
            })
    }

    /// Registered pairs, for the health report.
    pub fn registered(&self) -> impl Iterator<Item = (TaskType, Provider)> + '_ {
        self.table.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
