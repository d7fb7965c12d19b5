//! HuggingFace Inference API adapter
//!
//! Only the feature-extraction pipeline is routed here. The API returns a
//! bare array of vectors (or one vector for a single input), which is
//! normalized into the OpenAI embedding list shape.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::{Backend, UpstreamRequest};
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::params::ModelParams;
use crate::wire::EmbeddingList;

use super::{
    bearer_headers, deliver_document, resolve_credential, Provider, ProviderAdapter, RawOutput,
    TaskType,
};

/// Embeddings via the feature-extraction pipeline.
pub struct HfEmbedding {
    backend: Arc<dyn Backend>,
    api_token: Option<String>,
    base_url: String,
}

impl HfEmbedding {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            backend,
            api_token: config.huggingface_api_token.clone(),
            base_url: config.huggingface_base_url.clone(),
        }
    }

    fn url(&self, params: &ModelParams, model: &str) -> String {
        let base = params.base_url.as_deref().unwrap_or(&self.base_url);
        format!(
            "{}/pipeline/feature-extraction/{}",
            base.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl ProviderAdapter for HfEmbedding {
    fn task(&self) -> TaskType {
        TaskType::Embeddings
    }

    fn provider(&self) -> Provider {
        Provider::HuggingfaceInference
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
        let token = resolve_credential(
            params,
            self.api_token.as_deref(),
            Provider::HuggingfaceInference,
        )?;

        // wait_for_model holds the request while a cold model spins up
        // instead of returning 503.
        let body = json!({
            "inputs": texts,
            "options": { "wait_for_model": true },
        });
        let value = self
            .backend
            .invoke(UpstreamRequest::new(
                self.url(params, model),
                bearer_headers(&token)?,
                body,
            ))
            .await?;

        let vectors = parse_vectors(&value).ok_or_else(|| GatewayError::Upstream {
            message: "response was not a vector array".to_string(),
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

/// Accept either `[[f64...], ...]` or a single flat `[f64...]`.
fn parse_vectors(value: &Value) -> Option<Vec<Vec<f64>>> {
    let rows = value.as_array()?;
    if rows.is_empty() {
        return Some(Vec::new());
    }
    if rows[0].is_array() {
        rows.iter()
            .map(|row| {
                row.as_array()
                    .map(|v| v.iter().filter_map(|x| x.as_f64()).collect())
            })
            .collect()
    } else {
        let flat: Vec<f64> = rows.iter().filter_map(|x| x.as_f64()).collect();
        Some(vec![flat])
    }
}
