use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Completion-service failures, split into retryable transport conditions
/// and fatal request/credential problems.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limited by the completion service")]
    RateLimited,

    #[error("completion service error: status {0}")]
    Server(u16),

    #[error("completion request timed out")]
    Timeout,

    #[error("network failure: {0}")]
    Network(String),

    #[error("malformed completion response: {0}")]
    UnexpectedResponse(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited
                | ProviderError::Server(_)
                | ProviderError::Timeout
                | ProviderError::Network(_)
        )
    }
}

/// Base trait for chat completion providers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message for the given model, system prompt, history,
    /// and offered tools.
    async fn complete(
        &self,
        model: &str,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError>;
}
