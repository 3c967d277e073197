use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, ProviderError, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    get_usage, messages_to_openai_spec, openai_response_to_message, tools_to_openai_spec,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiProviderConfig::from_env()?)
    }

    /// One POST with the retryable/fatal split applied to the outcome.
    async fn try_post(&self, payload: &Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|e| ProviderError::UnexpectedResponse(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ProviderError::Auth(response.status().to_string()))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
            status if status.as_u16() >= 500 => Err(ProviderError::Server(status.as_u16())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::InvalidRequest(format!("{}: {}", status, body)))
            }
        }
    }

    /// Bounded retries with linear backoff; fatal errors return immediately.
    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let mut attempt: u32 = 0;
        loop {
            match self.try_post(&payload).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        model: &str,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let messages_spec = messages_to_openai_spec(messages);
        let tools_spec = if !tools.is_empty() {
            tools_to_openai_spec(tools)?
        } else {
            vec![]
        };

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_spec);

        let mut payload = json!({
            "model": model,
            "messages": messages_array
        });

        if !tools_spec.is_empty() {
            payload
                .as_object_mut()
                .unwrap()
                .insert("tools".to_string(), json!(tools_spec));
        }
        if let Some(temp) = self.config.temperature {
            payload
                .as_object_mut()
                .unwrap()
                .insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            payload
                .as_object_mut()
                .unwrap()
                .insert("max_tokens".to_string(), json!(tokens));
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(ProviderError::InvalidRequest(format!(
                "completion service reported: {}",
                error
            )));
        }

        let message = openai_response_to_message(response.clone())?;
        let usage = get_usage(&response)?;

        Ok((message, usage))
    }
}
