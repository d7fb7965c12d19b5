//! Google Generative AI adapters
//!
//! Gemini speaks its own wire dialect: `contents`/`parts` instead of
//! messages, `generationConfig` instead of top-level sampling fields, and a
//! `system_instruction` slot instead of a system role. These adapters fold
//! that dialect behind the canonical contract and translate back to OpenAI
//! shapes on the way out.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::backend::{Backend, UpstreamRequest};
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::multimodal::inline_remote_images;
use crate::params::{ModelInput, ModelParams};
use crate::streaming::delta_stream;
use crate::wire::EmbeddingList;

use super::{deliver_document, resolve_credential, Provider, ProviderAdapter, RawOutput, TaskType};

/// Field aliases accepted on Google-shaped bodies, folded to canonical names.
const GOOGLE_ALIASES: &[(&str, &str)] = &[
    ("max_output_tokens", "max_tokens"),
    ("maxOutputTokens", "max_tokens"),
    ("stop_sequences", "stop"),
    ("stopSequences", "stop"),
    ("candidate_count", "n"),
    ("candidateCount", "n"),
    ("topK", "top_k"),
    ("topP", "top_p"),
];

struct GoogleCommon {
    backend: Arc<dyn Backend>,
    api_key: Option<String>,
    base_url: String,
}

impl GoogleCommon {
    fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            backend,
            api_key: config.google_api_key.clone(),
            base_url: config.google_base_url.clone(),
        }
    }

    /// `{base}/models/{model}:{method}`; the credential travels in the
    /// `x-goog-api-key` header, never in the URL.
    fn url(&self, params: &ModelParams, model: &str, method: &str) -> String {
        let base = params.base_url.as_deref().unwrap_or(&self.base_url);
        format!("{}/models/{}:{}", base.trim_end_matches('/'), model, method)
    }

    fn headers(&self, params: &ModelParams) -> GatewayResult<HeaderMap> {
        let api_key = resolve_credential(params, self.api_key.as_deref(), Provider::Google)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&api_key).map_err(|_| {
                GatewayError::Validation("API key contains invalid characters".into())
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

/// Chat completions via Gemini.
pub struct GoogleChat {
    common: GoogleCommon,
}

impl GoogleChat {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            common: GoogleCommon::new(backend, config),
        }
    }

    fn request_body(params: &ModelParams, messages: &[Value]) -> GatewayResult<Value> {
        let (system_instruction, contents) = to_gemini_contents(messages)?;

        let mut generation_config = json!({});
        if let Some(v) = params.temperature {
            generation_config["temperature"] = json!(v);
        }
        if let Some(v) = params.max_tokens {
            generation_config["maxOutputTokens"] = json!(v);
        }
        if let Some(v) = params.top_k {
            generation_config["topK"] = json!(v);
        }
        if let Some(v) = params.top_p {
            generation_config["topP"] = json!(v);
        }
        if let Some(v) = params.n {
            generation_config["candidateCount"] = json!(v);
        }
        if let Some(stop) = &params.stop {
            generation_config["stopSequences"] = json!(stop);
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(system) = system_instruction {
            body["system_instruction"] = system;
        }
        Ok(body)
    }
}

#[async_trait]
impl ProviderAdapter for GoogleChat {
    fn task(&self) -> TaskType {
        TaskType::Chat
    }

    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn prepare_params(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> GatewayResult<ModelParams> {
        let mut params = ModelParams::layered(ctx.options.as_ref(), ctx, &body, GOOGLE_ALIASES)?;
        params.require_model()?;

        let messages = params
            .input
            .messages_mut()
            .ok_or_else(|| GatewayError::Validation("'messages' is required".into()))?;
        inline_remote_images(self.common.backend.as_ref(), messages).await?;

        Ok(params)
    }

    async fn execute(
        &self,
        _ctx: &RequestContext,
        params: &ModelParams,
    ) -> GatewayResult<RawOutput> {
        let model = params.require_model()?;
        let messages = match &params.input {
            ModelInput::Messages(messages) => messages.as_slice(),
            _ => return Err(GatewayError::Validation("'messages' is required".into())),
        };
        let body = Self::request_body(params, messages)?;
        let headers = self.common.headers(params)?;

        if params.stream {
            let url = format!(
                "{}?alt=sse",
                self.common.url(params, model, "streamGenerateContent")
            );
            let bytes = self
                .common
                .backend
                .stream(UpstreamRequest::new(url, headers, body))
                .await?;
            Ok(RawOutput::Stream(delta_stream(bytes, extract_gemini_delta)))
        } else {
            let url = self.common.url(params, model, "generateContent");
            let value = self
                .common
                .backend
                .invoke(UpstreamRequest::new(url, headers, body))
                .await?;
            let text = candidate_text(&value).ok_or_else(|| GatewayError::Upstream {
                message: "response contained no text candidate".to_string(),
                status: None,
            })?;
            Ok(RawOutput::Text(text))
        }
    }
}

/// Embeddings via Gemini.
pub struct GoogleEmbedding {
    common: GoogleCommon,
}

impl GoogleEmbedding {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            common: GoogleCommon::new(backend, config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GoogleEmbedding {
    fn task(&self) -> TaskType {
        TaskType::Embeddings
    }

    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn prepare_params(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> GatewayResult<ModelParams> {
        let params = ModelParams::layered(ctx.options.as_ref(), ctx, &body, GOOGLE_ALIASES)?;
        params.require_model()?;
        if params.input.texts().is_empty() {
            return Err(GatewayError::Validation("'input' is required".into()));
        }
        Ok(params)
    }

    async fn execute(
        &self,
        _ctx: &RequestContext,
        params: &ModelParams,
    ) -> GatewayResult<RawOutput> {
        let model = params.require_model()?;
        let texts = params.input.texts();
        let headers = self.common.headers(params)?;

        let vectors = if texts.len() == 1 {
            let url = self.common.url(params, model, "embedContent");
            let body = json!({
                "model": format!("models/{}", model),
                "content": { "parts": [{ "text": texts[0] }] },
            });
            let value = self
                .common
                .backend
                .invoke(UpstreamRequest::new(url, headers, body))
                .await?;
            vec![embedding_values(&value["embedding"])?]
        } else {
            let url = self.common.url(params, model, "batchEmbedContents");
            let requests: Vec<Value> = texts
                .iter()
                .map(|text| {
                    json!({
                        "model": format!("models/{}", model),
                        "content": { "parts": [{ "text": text }] },
                    })
                })
                .collect();
            let value = self
                .common
                .backend
                .invoke(UpstreamRequest::new(url, headers, json!({ "requests": requests })))
                .await?;
            let embeddings = value["embeddings"].as_array().cloned().unwrap_or_default();
            embeddings
                .iter()
                .map(embedding_values)
                .collect::<GatewayResult<Vec<_>>>()?
        };

        let list = EmbeddingList::from_vectors(model, vectors);
        Ok(RawOutput::Message(serde_json::to_value(list)?))
    }

    async fn deliver(
        &self,
        _ctx: &RequestContext,
        _params: &ModelParams,
        output: RawOutput,
    ) -> GatewayResult<axum::response::Response> {
        deliver_document(self.task(), output)
    }
}

/// Convert OpenAI-shaped messages into Gemini `contents`, hoisting system
/// messages into the instruction slot and mapping assistant to `model`.
fn to_gemini_contents(messages: &[Value]) -> GatewayResult<(Option<Value>, Vec<Value>)> {
    let mut system_parts: Vec<Value> = Vec::new();
    let mut contents: Vec<Value> = Vec::new();

    for message in messages {
        let role = message["role"].as_str().unwrap_or("user");
        let parts = to_gemini_parts(&message["content"])?;

        match role {
            "system" => system_parts.extend(parts),
            "assistant" => contents.push(json!({ "role": "model", "parts": parts })),
            _ => contents.push(json!({ "role": "user", "parts": parts })),
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(json!({ "parts": system_parts }))
    };
    Ok((system, contents))
}

fn to_gemini_parts(content: &Value) -> GatewayResult<Vec<Value>> {
    match content {
        Value::String(text) => Ok(vec![json!({ "text": text })]),
        Value::Array(parts) => parts.iter().map(to_gemini_part).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(GatewayError::Validation(format!(
            "unsupported message content: {}",
            other
        ))),
    }
}

fn to_gemini_part(part: &Value) -> GatewayResult<Value> {
    match part["type"].as_str() {
        Some("text") => Ok(json!({ "text": part["text"] })),
        Some("image_url") => {
            let url = part["image_url"]["url"].as_str().unwrap_or_default();
            let (mime_type, data) = split_data_url(url).ok_or_else(|| {
                GatewayError::Validation(
                    "image parts must be inlined as data URLs before dispatch".into(),
                )
            })?;
            Ok(json!({ "inline_data": { "mime_type": mime_type, "data": data } }))
        }
        _ => Err(GatewayError::Validation(format!(
            "unsupported message part: {}",
            part
        ))),
    }
}

/// Split `data:<mime>;base64,<payload>` into its halves.
fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    Some((mime, payload))
}

/// Joined text of the first candidate's parts.
fn candidate_text(value: &Value) -> Option<String> {
    let parts = value["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn extract_gemini_delta(payload: &Value) -> Option<String> {
    candidate_text(payload)
}

fn embedding_values(embedding: &Value) -> GatewayResult<Vec<f64>> {
    embedding["values"]
        .as_array()
        .map(|values| values.iter().filter_map(|v| v.as_f64()).collect())
        .ok_or_else(|| GatewayError::Upstream {
            message: "embedding response missing values".to_string(),
            status: None,
        })
}
