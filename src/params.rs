//! Canonical model invocation parameters
//!
//! One provider-agnostic parameter type built by layered override: the
//! `options` query object first (lowest precedence), then request-context
//! fields, then the validated body (highest). Provider-specific field aliases
//! are folded into canonical names during the body overlay.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};

/// Request input: chat message list or raw text.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub enum ModelInput {
    Messages(Vec<Value>),
    Text(String),
    #[default]
    None,
}

impl ModelInput {
    pub fn is_none(&self) -> bool {
        matches!(self, ModelInput::None)
    }

    /// Mutable message list, if this input holds one.
    pub fn messages_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            ModelInput::Messages(messages) => Some(messages),
            _ => None,
        }
    }

    /// The input as a JSON value, for providers that take it verbatim.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            ModelInput::Messages(list) => Some(Value::Array(list.clone())),
            ModelInput::Text(text) => Some(Value::String(text.clone())),
            ModelInput::None => None,
        }
    }

    /// Flatten to plain text items: raw text yields one entry, a string
    /// list yields each entry.
    pub fn texts(&self) -> Vec<String> {
        match self {
            ModelInput::Text(text) => vec![text.clone()],
            ModelInput::Messages(list) => list
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            ModelInput::None => Vec::new(),
        }
    }
}

/// Canonical, provider-agnostic invocation request.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ModelParams {
    pub user: Option<String>,
    pub model: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub cache: bool,
    pub max_retries: Option<u32>,
    pub retry_status_codes: Option<Vec<u16>>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    pub top_k: Option<u32>,
    pub top_p: Option<f64>,
    pub n: Option<u32>,
    pub stream: bool,
    pub stop: Option<Vec<String>>,
    pub input: ModelInput,
    /// Base64 media payload for audio/image tasks.
    pub media: Option<String>,
}

impl ModelParams {
    /// Layered construction: `options` (lowest) < context < body (highest).
    ///
    /// `aliases` maps provider field names to canonical ones and is applied to
    /// both the options and body objects before the overlay.
    pub fn layered(
        options: Option<&Value>,
        ctx: &RequestContext,
        body: &Value,
        aliases: &[(&str, &str)],
    ) -> GatewayResult<Self> {
        let mut params = ModelParams::default();

        if let Some(Value::Object(obj)) = options {
            params.apply_object(obj, aliases);
        }

        params.apply_context(ctx);

        let body_obj = body
            .as_object()
            .ok_or_else(|| GatewayError::Validation("request body must be a JSON object".into()))?;
        params.apply_object(body_obj, aliases);

        Ok(params)
    }

    /// The merged model name; its absence is a client error, not a fallback.
    pub fn require_model(&self) -> GatewayResult<&str> {
        self.model
            .as_deref()
            .filter(|m| !m.is_empty())
            .ok_or_else(|| GatewayError::Validation("'model' is required".into()))
    }

    fn apply_context(&mut self, ctx: &RequestContext) {
        if ctx.api_key.is_some() {
            self.api_key = ctx.api_key.clone();
        }
        if ctx.base_url.is_some() {
            self.base_url = ctx.base_url.clone();
        }
        if ctx.cache {
            self.cache = true;
        }
        if let Some(retry) = &ctx.retry {
            self.max_retries = Some(retry.attempts);
            self.retry_status_codes = retry.on_status_codes.clone();
        }
    }

    /// Overlay a JSON object onto the params. Unknown fields are ignored;
    /// known fields with the wrong type are ignored too (schema validation
    /// happens upstream of this merge).
    fn apply_object(&mut self, obj: &Map<String, Value>, aliases: &[(&str, &str)]) {
        for (name, value) in obj {
            let canonical = aliases
                .iter()
                .find(|(from, _)| from == name)
                .map(|(_, to)| *to)
                .unwrap_or(name.as_str());

            match canonical {
                "model" => assign_str(&mut self.model, value),
                "user" => assign_str(&mut self.user, value),
                "api_key" => assign_str(&mut self.api_key, value),
                "base_url" => assign_str(&mut self.base_url, value),
                "temperature" => assign_f64(&mut self.temperature, value),
                "top_p" => assign_f64(&mut self.top_p, value),
                "max_tokens" => {
                    if let Some(v) = value.as_u64() {
                        self.max_tokens = Some(v);
                    }
                }
                "top_k" => assign_u32(&mut self.top_k, value),
                "n" => assign_u32(&mut self.n, value),
                "stream" => {
                    if let Some(v) = value.as_bool() {
                        self.stream = v;
                    }
                }
                "cache" => {
                    if let Some(v) = value.as_bool() {
                        self.cache = v;
                    }
                }
                "stop" => self.stop = parse_stop(value),
                "messages" => {
                    if let Some(list) = value.as_array() {
                        self.input = ModelInput::Messages(list.clone());
                    }
                }
                "input" | "prompt" => self.input = parse_input(value),
                "file" | "audio" | "image" => assign_str(&mut self.media, value),
                _ => {}
            }
        }
    }
}

fn assign_str(slot: &mut Option<String>, value: &Value) {
    if let Some(v) = value.as_str() {
        *slot = Some(v.to_string());
    }
}

fn assign_f64(slot: &mut Option<f64>, value: &Value) {
    if let Some(v) = value.as_f64() {
        *slot = Some(v);
    }
}

fn assign_u32(slot: &mut Option<u32>, value: &Value) {
    if let Some(v) = value.as_u64() {
        *slot = Some(v as u32);
    }
}

/// `stop` accepts a single string or a string list.
fn parse_stop(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(list) => Some(
            list.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
        ),
        _ => None,
    }
}

/// `input` accepts raw text, a list of strings (embeddings batch), or a
/// message list.
fn parse_input(value: &Value) -> ModelInput {
    match value {
        Value::String(s) => ModelInput::Text(s.clone()),
        Value::Array(list) if list.iter().all(|v| v.is_string()) => {
            ModelInput::Messages(list.clone())
        }
        Value::Array(list) => ModelInput::Messages(list.clone()),
        _ => ModelInput::None,
    }
}
