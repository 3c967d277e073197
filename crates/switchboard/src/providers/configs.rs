use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_HOST: &str = "https://api.openai.com";

pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    /// Additional attempts after the first, for retryable failures only.
    pub max_retries: u32,
}

impl OpenAiProviderConfig {
    pub fn new<H: Into<String>, K: Into<String>>(host: H, api_key: K) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            temperature: None,
            max_tokens: None,
            max_retries: 2,
        }
    }

    /// Read the key from OPENAI_API_KEY and the host from OPENAI_HOST when
    /// set.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY must be set to talk to the completion service")?;
        let host = env::var("OPENAI_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Ok(Self::new(host, api_key))
    }
}
