//! Gateway dispatch endpoints
//!
//! `/api/{task}` plus the OpenAI-shorthand routes. Each request runs the
//! three-step adapter contract against the routing table, with errors
//! normalized into the gateway envelope.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
};
use serde_json::Value;
use tracing::info;

use crate::{
    adapters::{infer_provider, Provider, TaskType},
    context::RequestContext,
    error::{normalize_error, GatewayError, GatewayResult},
    routes::metrics::record_request,
    AppState,
};

/// Handle `POST /api/{task}` requests
///
/// The task comes from the path, the provider from the query/header override
/// or from model-name inference.
pub async fn dispatch_task(
    State(state): State<Arc<AppState>>,
    Path(task): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(task) = TaskType::from_path(&task) else {
        let err = GatewayError::UnknownRoute {
            task,
            provider: "any".to_string(),
        };
        return normalize_error(&err, Some(Provider::OpenAi));
    };
    run_dispatch(state, task, None, query, headers, body).await
}

/// Handle `POST /v1/chat/completions` (OpenAI-only shorthand)
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_dispatch(
        state,
        TaskType::Chat,
        Some(Provider::OpenAi),
        query,
        headers,
        body,
    )
    .await
}

/// Handle `POST /v1/embeddings` (OpenAI-only shorthand)
pub async fn embeddings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_dispatch(
        state,
        TaskType::Embeddings,
        Some(Provider::OpenAi),
        query,
        headers,
        body,
    )
    .await
}

/// Run the full dispatch pipeline, folding any failure into the provider's
/// error envelope. The envelope is rendered with the provider the request
/// named (or the inferred one), so the normalizer always has a concrete hint.
async fn run_dispatch(
    state: Arc<AppState>,
    task: TaskType,
    forced_provider: Option<Provider>,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start_time = Instant::now();
    let ctx = RequestContext::from_parts(&headers, &query);

    let body = match parse_body(&body, &query) {
        Ok(body) => body,
        Err(err) => {
            return normalize_error(&err, forced_provider.or(Some(Provider::OpenAi)));
        }
    };

    let model = body["model"].as_str().unwrap_or_default().to_string();
    let inferred = infer_provider(task, &model);

    // Provider override from the context, which already ranks the
    // `x-gateway-provider` header above the `provider` query param.
    let exec_provider = match forced_provider {
        Some(provider) => provider,
        None => {
            match ctx.provider.as_deref() {
                Some(name) => match Provider::from_str(name) {
                    Ok(provider) => provider,
                    Err(_) => {
                        let err = GatewayError::UnknownRoute {
                            task: task.as_str().to_string(),
                            provider: name.to_string(),
                        };
                        return normalize_error(&err, Some(inferred));
                    }
                },
                None => inferred,
            }
        }
    };

    let prepare_provider = forced_provider.unwrap_or(inferred);

    match execute_pipeline(&state, task, prepare_provider, exec_provider, &ctx, body).await {
        Ok(response) => {
            let duration = start_time.elapsed().as_secs_f64();
            record_request("success", task.as_str(), exec_provider.as_str(), duration);
            info!(
                task = task.as_str(),
                provider = exec_provider.as_str(),
                model = %model,
                trace_id = ctx.trace_id.as_deref().unwrap_or(""),
                duration_ms = %format!("{:.2}", duration * 1000.0),
                "request dispatched"
            );
            response
        }
        Err(err) => {
            let duration = start_time.elapsed().as_secs_f64();
            record_request("error", task.as_str(), exec_provider.as_str(), duration);
            info!(
                task = task.as_str(),
                provider = exec_provider.as_str(),
                model = %model,
                trace_id = ctx.trace_id.as_deref().unwrap_or(""),
                code = err.code(),
                "request failed"
            );
            normalize_error(&err, Some(exec_provider))
        }
    }
}

/// The three phases. Parameter preparation runs on the adapter the model name
/// implies; execution and delivery run on the adapter the request named.
async fn execute_pipeline(
    state: &AppState,
    task: TaskType,
    prepare_provider: Provider,
    exec_provider: Provider,
    ctx: &RequestContext,
    body: Value,
) -> GatewayResult<Response> {
    let preparer = state.router_table.resolve(task, prepare_provider)?;
    let executor = if exec_provider == prepare_provider {
        preparer.clone()
    } else {
        state.router_table.resolve(task, exec_provider)?
    };

    let params = preparer.prepare_params(ctx, body).await?;
    let output = executor.execute(ctx, &params).await?;
    executor.deliver(ctx, &params, output).await
}

/// Parse the request body, folding the query `model` in when the body lacks
/// one. An empty body is an empty object, not an error.
fn parse_body(bytes: &Bytes, query: &HashMap<String, String>) -> GatewayResult<Value> {
    let mut body: Value = if bytes.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(bytes)
            .map_err(|e| GatewayError::Validation(format!("invalid JSON body: {}", e)))?
    };

    if !body.is_object() {
        return Err(GatewayError::Validation(
            "request body must be a JSON object".to_string(),
        ));
    }

    if body.get("model").is_none() {
        if let Some(model) = query.get("model") {
            body["model"] = Value::String(model.clone());
        }
    }
    Ok(body)
}
