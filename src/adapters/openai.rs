//! OpenAI adapters
//!
//! The client-facing wire contract is already OpenAI-shaped, so these
//! adapters mostly pass fields through: no alias normalization, responses
//! forwarded as structured documents.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::{Backend, UpstreamRequest};
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::multimodal::inline_remote_images;
use crate::params::{ModelInput, ModelParams};
use crate::streaming::delta_stream;

use super::{
    bearer_headers, deliver_document, resolve_credential, Provider, ProviderAdapter, RawOutput,
    TaskType,
};

/// Shared plumbing for the OpenAI task adapters.
struct OpenAiCommon {
    backend: Arc<dyn Backend>,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiCommon {
    fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            backend,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
        }
    }

    fn url(&self, params: &ModelParams, path: &str) -> String {
        let base = params.base_url.as_deref().unwrap_or(&self.base_url);
        format!("{}/{}", base.trim_end_matches('/'), path)
    }

    async fn invoke(
        &self,
        params: &ModelParams,
        path: &str,
        body: Value,
    ) -> GatewayResult<Value> {
        let api_key = resolve_credential(params, self.api_key.as_deref(), Provider::OpenAi)?;
        let request = UpstreamRequest::new(self.url(params, path), bearer_headers(&api_key)?, body);
        self.backend.invoke(request).await
    }
}

fn extract_chat_delta(payload: &Value) -> Option<String> {
    payload["choices"][0]["delta"]["content"]
        .as_str()
        .map(|s| s.to_string())
}

/// Chat completions via OpenAI.
pub struct OpenAiChat {
    common: OpenAiCommon,
}

impl OpenAiChat {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            common: OpenAiCommon::new(backend, config),
        }
    }

    fn chat_body(params: &ModelParams, messages: &[Value]) -> Value {
        let mut body = json!({
            "model": params.model,
            "messages": messages,
            "stream": params.stream,
        });
        set_optional(&mut body, "temperature", params.temperature.map(Value::from));
        set_optional(&mut body, "max_tokens", params.max_tokens.map(Value::from));
        set_optional(&mut body, "top_p", params.top_p.map(Value::from));
        set_optional(&mut body, "n", params.n.map(Value::from));
        set_optional(&mut body, "user", params.user.clone().map(Value::from));
        set_optional(
            &mut body,
            "stop",
            params.stop.clone().map(|s| json!(s)),
        );
        body
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiChat {
    fn task(&self) -> TaskType {
        TaskType::Chat
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn prepare_params(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> GatewayResult<ModelParams> {
        let mut params = ModelParams::layered(ctx.options.as_ref(), ctx, &body, &[])?;
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
        let messages = match &params.input {
            ModelInput::Messages(messages) => messages.as_slice(),
            _ => return Err(GatewayError::Validation("'messages' is required".into())),
        };
        let body = Self::chat_body(params, messages);

        if params.stream {
            let api_key =
                resolve_credential(params, self.common.api_key.as_deref(), Provider::OpenAi)?;
            let request = UpstreamRequest::new(
                self.common.url(params, "chat/completions"),
                bearer_headers(&api_key)?,
                body,
            );
            let bytes = self.common.backend.stream(request).await?;
            Ok(RawOutput::Stream(delta_stream(bytes, extract_chat_delta)))
        } else {
            let value = self.common.invoke(params, "chat/completions", body).await?;
            Ok(RawOutput::Message(value))
        }
    }
}

/// Embeddings via OpenAI.
pub struct OpenAiEmbedding {
    common: OpenAiCommon,
}

impl OpenAiEmbedding {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            common: OpenAiCommon::new(backend, config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiEmbedding {
    fn task(&self) -> TaskType {
        TaskType::Embeddings
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn prepare_params(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> GatewayResult<ModelParams> {
        let params = ModelParams::layered(ctx.options.as_ref(), ctx, &body, &[])?;
        params.require_model()?;
        if params.input.is_none() {
            return Err(GatewayError::Validation("'input' is required".into()));
        }
        Ok(params)
    }

    async fn execute(
        &self,
        _ctx: &RequestContext,
        params: &ModelParams,
    ) -> GatewayResult<RawOutput> {
        let input = params
            .input
            .to_value()
            .ok_or_else(|| GatewayError::Validation("'input' is required".into()))?;

        let mut body = json!({ "model": params.model, "input": input });
        set_optional(&mut body, "user", params.user.clone().map(Value::from));

        let value = self.common.invoke(params, "embeddings", body).await?;
        Ok(RawOutput::Message(value))
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

/// Audio transcriptions via OpenAI. Audio arrives as a base64 `file` field
/// and is forwarded through the JSON backend seam.
pub struct OpenAiTranscription {
    common: OpenAiCommon,
}

impl OpenAiTranscription {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            common: OpenAiCommon::new(backend, config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiTranscription {
    fn task(&self) -> TaskType {
        TaskType::AudioTranscriptions
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn prepare_params(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> GatewayResult<ModelParams> {
        let params = ModelParams::layered(ctx.options.as_ref(), ctx, &body, &[])?;
        params.require_model()?;
        if params.media.is_none() {
            return Err(GatewayError::Validation("'file' is required".into()));
        }
        Ok(params)
    }

    async fn execute(
        &self,
        _ctx: &RequestContext,
        params: &ModelParams,
    ) -> GatewayResult<RawOutput> {
        let body = json!({
            "model": params.model,
            "file": params.media,
        });
        let value = self
            .common
            .invoke(params, "audio/transcriptions", body)
            .await?;
        Ok(RawOutput::Message(value))
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

/// Image generation via OpenAI.
pub struct OpenAiImageGeneration {
    common: OpenAiCommon,
}

impl OpenAiImageGeneration {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            common: OpenAiCommon::new(backend, config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiImageGeneration {
    fn task(&self) -> TaskType {
        TaskType::ImagesGenerations
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn prepare_params(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> GatewayResult<ModelParams> {
        let params = ModelParams::layered(ctx.options.as_ref(), ctx, &body, &[])?;
        params.require_model()?;
        if !matches!(params.input, ModelInput::Text(_)) {
            return Err(GatewayError::Validation("'prompt' is required".into()));
        }
        Ok(params)
    }

    async fn execute(
        &self,
        _ctx: &RequestContext,
        params: &ModelParams,
    ) -> GatewayResult<RawOutput> {
        let prompt = match &params.input {
            ModelInput::Text(prompt) => prompt,
            _ => return Err(GatewayError::Validation("'prompt' is required".into())),
        };
        let mut body = json!({ "model": params.model, "prompt": prompt });
        set_optional(&mut body, "n", params.n.map(Value::from));
        set_optional(&mut body, "user", params.user.clone().map(Value::from));

        let value = self.common.invoke(params, "images/generations", body).await?;
        Ok(RawOutput::Message(value))
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

fn set_optional(body: &mut Value, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        body[key] = value;
    }
}
