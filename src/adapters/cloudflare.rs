//! Cloudflare Workers AI adapters
//!
//! Workers AI exposes every model behind one run endpoint,
//! `accounts/{account}/ai/run/{model}`, and wraps results in a
//! `{ "result": ..., "success": true }` envelope. Binary inputs travel as
//! base64 strings inside the JSON body, so the adapters here never ship raw
//! bytes upstream.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::backend::{Backend, UpstreamRequest};
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::params::{ModelInput, ModelParams};
use crate::streaming::delta_stream;
use crate::wire::EmbeddingList;

use super::{
    bearer_headers, deliver_document, resolve_credential, Provider, ProviderAdapter, RawOutput,
    TaskType,
};

const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

struct CloudflareCommon {
    backend: Arc<dyn Backend>,
    api_token: Option<String>,
    account_id: Option<String>,
    base_url: Option<String>,
}

impl CloudflareCommon {
    fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            backend,
            api_token: config.cloudflare_api_token.clone(),
            account_id: config.cloudflare_account_id.clone(),
            base_url: config.cloudflare_base_url.clone(),
        }
    }

    /// Run URL for a model. A per-request base URL wins, then the configured
    /// override, then the URL built from the account id. With none of the
    /// three the request cannot be placed at all.
    fn url(&self, params: &ModelParams, model: &str) -> GatewayResult<String> {
        let base = params
            .base_url
            .clone()
            .or_else(|| self.base_url.clone())
            .or_else(|| {
                self.account_id.as_ref().map(|account| {
                    format!("{}/accounts/{}/ai/run", CLOUDFLARE_API_BASE, account)
                })
            })
            .ok_or_else(|| {
                GatewayError::MissingCredential(Provider::CloudflareWorkersAi.as_str().to_string())
            })?;
        Ok(format!("{}/{}", base.trim_end_matches('/'), model))
    }

    async fn run(&self, params: &ModelParams, body: Value) -> GatewayResult<Value> {
        let model = params.require_model()?;
        let url = self.url(params, model)?;
        let token = resolve_credential(
            params,
            self.api_token.as_deref(),
            Provider::CloudflareWorkersAi,
        )?;
        let value = self
            .backend
            .invoke(UpstreamRequest::new(url, bearer_headers(&token)?, body))
            .await?;
        unwrap_result(value)
    }
}

/// Unwrap the Workers AI `{ result, success }` envelope.
fn unwrap_result(mut value: Value) -> GatewayResult<Value> {
    if value["success"] == json!(false) {
        let message = value["errors"][0]["message"]
            .as_str()
            .unwrap_or("Workers AI request failed")
            .to_string();
        return Err(GatewayError::Upstream {
            message,
            status: None,
        });
    }
    match value.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(GatewayError::Upstream {
            message: "response missing 'result'".to_string(),
            status: None,
        }),
    }
}

/// Chat completions via Workers AI text generation models.
pub struct CloudflareChat {
    common: CloudflareCommon,
}

impl CloudflareChat {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            common: CloudflareCommon::new(backend, config),
        }
    }

    fn request_body(params: &ModelParams, messages: &[Value]) -> Value {
        let mut body = json!({ "messages": messages });
        if params.stream {
            body["stream"] = json!(true);
        }
        if let Some(v) = params.temperature {
            body["temperature"] = json!(v);
        }
        if let Some(v) = params.max_tokens {
            body["max_tokens"] = json!(v);
        }
        if let Some(v) = params.top_k {
            body["top_k"] = json!(v);
        }
        if let Some(v) = params.top_p {
            body["top_p"] = json!(v);
        }
        body
    }
}

#[async_trait]
impl ProviderAdapter for CloudflareChat {
    fn task(&self) -> TaskType {
        TaskType::Chat
    }

    fn provider(&self) -> Provider {
        Provider::CloudflareWorkersAi
    }

    async fn prepare_params(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> GatewayResult<ModelParams> {
        let params = ModelParams::layered(ctx.options.as_ref(), ctx, &body, &[])?;
        params.require_model()?;
        if !matches!(params.input, ModelInput::Messages(_)) {
            return Err(GatewayError::Validation("'messages' is required".into()));
        }
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
        let body = Self::request_body(params, messages);

        if params.stream {
            let url = self.common.url(params, model)?;
            let token = resolve_credential(
                params,
                self.common.api_token.as_deref(),
                Provider::CloudflareWorkersAi,
            )?;
            let bytes = self
                .common
                .backend
                .stream(UpstreamRequest::new(url, bearer_headers(&token)?, body))
                .await?;
            Ok(RawOutput::Stream(delta_stream(bytes, extract_cf_delta)))
        } else {
            let result = self.common.run(params, body).await?;
            let text = result["response"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| GatewayError::Upstream {
                    message: "result contained no 'response' text".to_string(),
                    status: None,
                })?;
            Ok(RawOutput::Text(text))
        }
    }
}

fn extract_cf_delta(payload: &Value) -> Option<String> {
    payload["response"].as_str().map(str::to_string)
}

/// Embeddings via Workers AI feature-extraction models.
pub struct CloudflareEmbedding {
    common: CloudflareCommon,
}

impl CloudflareEmbedding {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            common: CloudflareCommon::new(backend, config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for CloudflareEmbedding {
    fn task(&self) -> TaskType {
        TaskType::Embeddings
    }

    fn provider(&self) -> Provider {
        Provider::CloudflareWorkersAi
    }

    async fn prepare_params(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> GatewayResult<ModelParams> {
        let params = ModelParams::layered(ctx.options.as_ref(), ctx, &body, &[])?;
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
        let result = self
            .common
            .run(params, json!({ "text": texts }))
            .await?;

        let vectors: Vec<Vec<f64>> = result["data"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|v| v.iter().filter_map(|x| x.as_f64()).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .ok_or_else(|| GatewayError::Upstream {
                message: "result contained no embedding 'data'".to_string(),
                status: None,
            })?;

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

/// Audio transcription via Workers AI speech-to-text models.
pub struct CloudflareTranscription {
    common: CloudflareCommon,
}

impl CloudflareTranscription {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            common: CloudflareCommon::new(backend, config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for CloudflareTranscription {
    fn task(&self) -> TaskType {
        TaskType::AudioTranscriptions
    }

    fn provider(&self) -> Provider {
        Provider::CloudflareWorkersAi
    }

    async fn prepare_params(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> GatewayResult<ModelParams> {
        let params = ModelParams::layered(ctx.options.as_ref(), ctx, &body, &[])?;
        params.require_model()?;
        if params.media.is_none() {
            return Err(GatewayError::Validation(
                "'audio' is required as base64-encoded content".into(),
            ));
        }
        Ok(params)
    }

    async fn execute(
        &self,
        _ctx: &RequestContext,
        params: &ModelParams,
    ) -> GatewayResult<RawOutput> {
        let audio = params
            .media
            .as_deref()
            .ok_or_else(|| GatewayError::Validation("'audio' is required".into()))?;
        let result = self
            .common
            .run(params, json!({ "audio": audio }))
            .await?;

        let text = result["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Upstream {
                message: "result contained no transcription 'text'".to_string(),
                status: None,
            })?;
        Ok(RawOutput::Message(json!({ "text": text })))
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

/// Image editing via Workers AI image-to-image models. The edited image comes
/// back as base64 in the result, re-wrapped here in the OpenAI images shape.
pub struct CloudflareImageEdit {
    common: CloudflareCommon,
}

impl CloudflareImageEdit {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            common: CloudflareCommon::new(backend, config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for CloudflareImageEdit {
    fn task(&self) -> TaskType {
        TaskType::ImagesEdits
    }

    fn provider(&self) -> Provider {
        Provider::CloudflareWorkersAi
    }

    async fn prepare_params(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> GatewayResult<ModelParams> {
        let params = ModelParams::layered(ctx.options.as_ref(), ctx, &body, &[])?;
        params.require_model()?;
        if !matches!(params.input, ModelInput::Text(_)) {
            return Err(GatewayError::Validation(
                "'prompt' is required as a string".into(),
            ));
        }
        if params.media.is_none() {
            return Err(GatewayError::Validation(
                "'image' is required as base64-encoded content".into(),
            ));
        }
        Ok(params)
    }

    async fn execute(
        &self,
        _ctx: &RequestContext,
        params: &ModelParams,
    ) -> GatewayResult<RawOutput> {
        let prompt = match &params.input {
            ModelInput::Text(prompt) => prompt.as_str(),
            _ => return Err(GatewayError::Validation("'prompt' is required".into())),
        };
        let image = params
            .media
            .as_deref()
            .ok_or_else(|| GatewayError::Validation("'image' is required".into()))?;

        let result = self
            .common
            .run(params, json!({ "prompt": prompt, "image_b64": image }))
            .await?;

        let edited = result["image"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Upstream {
                message: "result contained no 'image' payload".to_string(),
                status: None,
            })?;
        Ok(RawOutput::Message(json!({
            "created": Utc::now().timestamp(),
            "data": [{ "b64_json": edited }],
        })))
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
