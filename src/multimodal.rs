//! Multimodal message preparation
//!
//! Not every backend can dereference a remote image URL, so chat adapters
//! rewrite `image_url` message parts pointing at HTTP(S) resources into
//! inline data URLs before dispatch. Parts already carrying data URLs are
//! left untouched.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

use crate::backend::Backend;
use crate::error::{GatewayError, GatewayResult};

/// Rewrite remote image references in a message list in place.
///
/// Fails with a preparation error when a referenced resource cannot be
/// fetched; silently dropping a part the caller asked for is never correct.
pub async fn inline_remote_images(
    backend: &dyn Backend,
    messages: &mut [Value],
) -> GatewayResult<()> {
    for message in messages.iter_mut() {
        let Some(parts) = message
            .get_mut("content")
            .and_then(|content| content.as_array_mut())
        else {
            continue;
        };

        for part in parts.iter_mut() {
            if part.get("type").and_then(|t| t.as_str()) != Some("image_url") {
                continue;
            }
            let Some(url) = part
                .get("image_url")
                .and_then(|i| i.get("url"))
                .and_then(|u| u.as_str())
            else {
                continue;
            };
            if !is_remote(url) {
                continue;
            }

            let data_url = fetch_as_data_url(backend, url).await?;
            part["image_url"]["url"] = Value::String(data_url);
        }
    }
    Ok(())
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

async fn fetch_as_data_url(backend: &dyn Backend, url: &str) -> GatewayResult<String> {
    let (content_type, bytes) = backend.fetch(url).await?;
    if bytes.is_empty() {
        return Err(GatewayError::Preparation(format!(
            "fetched '{}' but it was empty",
            url
        )));
    }
    Ok(format!(
        "data:{};base64,{}",
        content_type,
        BASE64.encode(&bytes)
    ))
}
