use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, ProviderError, Usage};

/// A scripted provider for tests: returns the pre-configured responses in
/// order and records what each completion was asked for.
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockProvider {
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// How many completions have been issued so far.
    pub fn completions(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The (model, system prompt) pair of each completion, in order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        model: &str,
        system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), system.to_string()));

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Keep the loop terminating when the script runs dry
            Ok((Message::assistant().with_text(""), Usage::default()))
        } else {
            Ok((responses.remove(0), Usage::default()))
        }
    }
}
