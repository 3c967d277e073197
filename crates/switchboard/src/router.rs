use std::sync::Arc;

use crate::models::message::Message;
use crate::providers::base::{Provider, ProviderError};

/// The ordered, non-empty agent sequence a user message should traverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    agents: Vec<String>,
}

impl RoutingDecision {
    /// Callers must supply at least one agent id; the table's default keeps
    /// this true for every classification outcome.
    pub fn new(agents: Vec<String>) -> Self {
        debug_assert!(!agents.is_empty());
        RoutingDecision { agents }
    }

    pub fn single<S: Into<String>>(agent: S) -> Self {
        RoutingDecision {
            agents: vec![agent.into()],
        }
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }
}

/// Maps a classifier's raw reply to an agent sequence. Matching is exact on
/// the trimmed, lowercased reply; everything else falls through to the
/// default sequence.
pub struct RouteTable {
    routes: Vec<(String, Vec<String>)>,
    default: Vec<String>,
}

impl RouteTable {
    pub fn new(default: Vec<String>) -> Self {
        RouteTable {
            routes: Vec::new(),
            default,
        }
    }

    pub fn with_route<S: Into<String>>(mut self, token: S, agents: Vec<String>) -> Self {
        self.routes.push((token.into().to_lowercase(), agents));
        self
    }

    pub fn resolve(&self, classification: &str) -> RoutingDecision {
        let token = classification.trim().to_lowercase();
        for (candidate, agents) in &self.routes {
            if *candidate == token {
                return RoutingDecision::new(agents.clone());
            }
        }
        RoutingDecision::new(self.default.clone())
    }
}

/// Classifies a user message into a routing decision with one completion
/// against a fixed instruction.
pub struct Router {
    provider: Arc<dyn Provider>,
    model: String,
    instructions: String,
    table: RouteTable,
}

impl Router {
    pub fn new<M, I>(provider: Arc<dyn Provider>, model: M, instructions: I, table: RouteTable) -> Self
    where
        M: Into<String>,
        I: Into<String>,
    {
        Router {
            provider,
            model: model.into(),
            instructions: instructions.into(),
            table,
        }
    }

    pub async fn route(&self, user_message: &str) -> Result<RoutingDecision, ProviderError> {
        let messages = [Message::user().with_text(user_message)];
        let (response, _usage) = self
            .provider
            .complete(&self.model, &self.instructions, &messages, &[])
            .await?;
        Ok(self.table.resolve(&response.text()))
    }
}
