//! Configuration management for Switchboard
//!
//! Configuration is loaded from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Default OpenAI credential; requests may override per-call
    pub openai_api_key: Option<String>,
    /// OpenAI API base URL
    pub openai_base_url: String,

    /// Default Google Generative AI credential
    pub google_api_key: Option<String>,
    /// Google Generative AI base URL
    pub google_base_url: String,

    /// Default Cloudflare Workers AI token
    pub cloudflare_api_token: Option<String>,
    /// Cloudflare account the Workers AI run URL is built from
    pub cloudflare_account_id: Option<String>,
    /// Full Workers AI run URL override (takes precedence over the account id)
    pub cloudflare_base_url: Option<String>,

    /// Default HuggingFace Inference token
    pub huggingface_api_token: Option<String>,
    /// HuggingFace Inference base URL
    pub huggingface_base_url: String,

    /// Path to the virtual-router definition file, if any
    pub routes_file: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SWITCHBOARD_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SWITCHBOARD_PORT")
                .unwrap_or_else(|_| "8787".to_string())
                .parse()
                .context("Invalid SWITCHBOARD_PORT")?,

            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),

            google_api_key: env::var("GOOGLE_API_KEY").ok(),
            google_base_url: env::var("GOOGLE_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),

            cloudflare_api_token: env::var("CLOUDFLARE_API_TOKEN").ok(),
            cloudflare_account_id: env::var("CLOUDFLARE_ACCOUNT_ID").ok(),
            cloudflare_base_url: env::var("CLOUDFLARE_BASE_URL").ok(),

            huggingface_api_token: env::var("HF_API_TOKEN").ok(),
            huggingface_base_url: env::var("HF_BASE_URL")
                .unwrap_or_else(|_| "https://api-inference.huggingface.co".to_string()),

            routes_file: env::var("SWITCHBOARD_ROUTES_FILE").ok(),
        })
    }

    /// Fixed config for unit tests, independent of the process environment.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            openai_api_key: Some("test-openai-key".to_string()),
            openai_base_url: "https://api.openai.test/v1".to_string(),
            google_api_key: Some("test-google-key".to_string()),
            google_base_url: "https://google.test/v1beta".to_string(),
            cloudflare_api_token: Some("test-cf-token".to_string()),
            cloudflare_account_id: Some("test-account".to_string()),
            cloudflare_base_url: None,
            huggingface_api_token: Some("test-hf-token".to_string()),
            huggingface_base_url: "https://hf.test".to_string(),
            routes_file: None,
        }
    }
}
