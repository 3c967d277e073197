use std::sync::Arc;

use anyhow::Result;

use crate::agent::AgentRegistry;
use crate::engine::{TurnEngine, TurnOutcome, TurnResult};
use crate::models::message::Message;
use crate::providers::base::Provider;
use crate::router::{Router, RoutingDecision};

/// Holds later agents in a routed sequence back until one of the named
/// agent's turns produces a confirming message.
pub struct SequenceGate {
    agent: String,
    predicate: Box<dyn Fn(&Message) -> bool + Send + Sync>,
}

impl SequenceGate {
    pub fn new<S, F>(agent: S, predicate: F) -> Self
    where
        S: Into<String>,
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        SequenceGate {
            agent: agent.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn applies_to(&self, agent_id: &str) -> bool {
        self.agent == agent_id
    }

    pub fn satisfied_by(&self, message: &Message) -> bool {
        (self.predicate)(message)
    }
}

pub struct DriverConfig {
    /// Classify every user message anew. Off means the conversation stays
    /// with the last active agent.
    pub reroute_each_message: bool,
    /// How many times a gated agent may run per user message before the rest
    /// of the sequence is abandoned.
    pub max_gate_rounds: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            reroute_each_message: true,
            max_gate_rounds: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversationStatus {
    Active,
    Escalated(String),
}

/// Everything one user message produced, plus whether the conversation can
/// continue.
#[derive(Debug)]
pub struct ConversationOutcome {
    pub messages: Vec<Message>,
    pub status: ConversationStatus,
}

/// Owns the long-lived history. Per user message: route, then run the turn
/// engine once per agent in the decision's order, extending history after
/// each turn.
pub struct ConversationDriver {
    registry: AgentRegistry,
    provider: Arc<dyn Provider>,
    router: Router,
    config: DriverConfig,
    gate: Option<SequenceGate>,
    history: Vec<Message>,
    active: String,
}

impl ConversationDriver {
    pub fn new<S: Into<String>>(
        registry: AgentRegistry,
        provider: Arc<dyn Provider>,
        router: Router,
        initial_agent: S,
    ) -> Self {
        ConversationDriver {
            registry,
            provider,
            router,
            config: DriverConfig::default(),
            gate: None,
            history: Vec::new(),
            active: initial_agent.into(),
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_gate(mut self, gate: SequenceGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn active_agent(&self) -> &str {
        &self.active
    }

    pub async fn handle(&mut self, user_text: &str) -> Result<ConversationOutcome> {
        let turn_start = self.history.len();
        self.history.push(Message::user().with_text(user_text));

        let decision = if self.config.reroute_each_message {
            self.router.route(user_text).await?
        } else {
            RoutingDecision::single(self.active.clone())
        };

        let engine = TurnEngine::new(&self.registry, self.provider.clone());
        let mut status = ConversationStatus::Active;
        // Open unless the gated agent is part of this sequence
        let mut gate_open = match &self.gate {
            Some(gate) => !decision.agents().iter().any(|id| gate.applies_to(id)),
            None => true,
        };

        'sequence: for agent_id in decision.agents() {
            let gated = self
                .gate
                .as_ref()
                .is_some_and(|gate| gate.applies_to(agent_id));
            if !gated && !gate_open {
                // The confirming step never happened; hold the rest back
                break;
            }

            let mut rounds = 0;
            loop {
                let TurnResult {
                    agent,
                    messages,
                    outcome,
                } = engine.run_turn(agent_id, &self.history).await?;

                if let Some(gate) = &self.gate {
                    if !gate_open && messages.iter().any(|m| gate.satisfied_by(m)) {
                        gate_open = true;
                    }
                }

                self.history.extend(messages);
                self.active = agent;

                if let TurnOutcome::Escalated(summary) = outcome {
                    status = ConversationStatus::Escalated(summary);
                    break 'sequence;
                }

                rounds += 1;
                if !gated || gate_open {
                    break;
                }
                if rounds >= self.config.max_gate_rounds {
                    break 'sequence;
                }
            }
        }

        Ok(ConversationOutcome {
            messages: self.history[turn_start..].to_vec(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentTool, ToolOutcome};
    use crate::models::message::{MessageContent, Role};
    use crate::models::tool::ToolCall;
    use crate::providers::mock::MockProvider;
    use crate::router::RouteTable;
    use crate::schema::{ParamKind, ParamSpec, ToolSpec};
    use serde_json::json;

    fn refund_tool() -> AgentTool {
        AgentTool::new(
            ToolSpec::new("execute_refund", "Processes a refund for an item.")
                .with_param(ParamSpec::required("item_id", ParamKind::String)),
            |_args| Ok(ToolOutcome::Value(json!("Refund processed successfully."))),
        )
    }

    fn escalate_tool() -> AgentTool {
        AgentTool::new(
            ToolSpec::new("escalate_to_human", "Escalates a case")
                .with_param(ParamSpec::required("summary", ParamKind::String)),
            |args| {
                Ok(ToolOutcome::Escalate(
                    args.get("summary")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                ))
            },
        )
    }

    fn look_up_tool() -> AgentTool {
        AgentTool::new(
            ToolSpec::new("look_up_item", "Searches for an item based on a query.")
                .with_param(ParamSpec::required("search_query", ParamKind::String)),
            |_args| Ok(ToolOutcome::Value(json!("item_132612938"))),
        )
    }

    fn registry() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry.register(
            "issues_and_repairs",
            Agent::new("Issues and Repairs Agent", "gpt-4o-mini", "Fix things.")
                .with_tool(look_up_tool())
                .with_tool(refund_tool())
                .with_tool(escalate_tool()),
        );
        registry.register("sales", Agent::new("Sales Agent", "gpt-4o-mini", "Sell things."));
        registry.register("triage", Agent::new("Triage Agent", "gpt-4o-mini", "Route things."));
        registry
    }

    fn table() -> RouteTable {
        RouteTable::new(vec!["sales".to_string()])
            .with_route(
                "issues_then_sales",
                vec!["issues_and_repairs".to_string(), "sales".to_string()],
            )
            .with_route("issues", vec!["issues_and_repairs".to_string()])
    }

    fn driver(provider: Arc<MockProvider>) -> ConversationDriver {
        let router = Router::new(provider.clone(), "gpt-4o-mini", "Classify.", table());
        ConversationDriver::new(registry(), provider, router, "triage")
    }

    fn refund_gate() -> SequenceGate {
        SequenceGate::new("issues_and_repairs", |message| {
            message.content.iter().any(|content| match content {
                MessageContent::ToolResponse(response) => response
                    .tool_result
                    .as_deref()
                    .is_ok_and(|text| text.to_lowercase().contains("refund processed successfully")),
                _ => false,
            })
        })
    }

    #[tokio::test]
    async fn test_sequence_runs_each_agent_on_shared_history() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("issues_then_sales"),
            Message::assistant().with_text("Your refund is sorted."),
            Message::assistant().with_text("Now, about that mixer."),
        ]));
        let mut driver = driver(provider.clone());

        let outcome = driver
            .handle("My blender is broken and I want to buy a new mixer")
            .await
            .unwrap();

        assert_eq!(outcome.status, ConversationStatus::Active);
        // user message + one reply per routed agent
        assert_eq!(outcome.messages.len(), 3);
        assert_eq!(outcome.messages[0].role, Role::User);
        assert_eq!(
            outcome.messages[1].name.as_deref(),
            Some("Issues and Repairs Agent")
        );
        assert_eq!(outcome.messages[2].name.as_deref(), Some("Sales Agent"));
        assert_eq!(driver.history().len(), 3);
        assert_eq!(driver.active_agent(), "sales");
    }

    #[tokio::test]
    async fn test_refund_request_stays_on_one_desk() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("issues"),
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new("look_up_item", json!({"search_query": "toaster"}))),
            ),
            Message::assistant().with_tool_request(
                "2",
                Ok(ToolCall::new(
                    "execute_refund",
                    json!({"item_id": "item_132612938", "reason": "broken"}),
                )),
            ),
            Message::assistant().with_text("Your refund is on its way."),
        ]));
        let mut driver = driver(provider.clone());

        let outcome = driver
            .handle("I want a refund for a broken toaster")
            .await
            .unwrap();

        assert_eq!(outcome.status, ConversationStatus::Active);
        // user, lookup request/result, refund request/result, closing reply
        assert_eq!(outcome.messages.len(), 6);
        assert_eq!(
            outcome.messages[2].content[0].as_tool_response().unwrap().id,
            "1"
        );
        assert_eq!(
            outcome.messages[4].content[0].as_tool_response().unwrap().id,
            "2"
        );
        assert!(outcome.messages.iter().all(|m| m.role != Role::System));
        assert_eq!(driver.active_agent(), "issues_and_repairs");
    }

    #[tokio::test]
    async fn test_unrecognized_classification_falls_back_to_sales() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("no idea"),
            Message::assistant().with_text("Happy to help you buy something."),
        ]));
        let mut driver = driver(provider.clone());

        let outcome = driver.handle("I want a refund... or maybe not").await.unwrap();

        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages[1].name.as_deref(), Some("Sales Agent"));
    }

    #[tokio::test]
    async fn test_history_grows_append_only_across_user_turns() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("sales"),
            Message::assistant().with_text("First reply."),
            Message::assistant().with_text("sales"),
            Message::assistant().with_text("Second reply."),
        ]));
        let mut driver = driver(provider);

        driver.handle("First question").await.unwrap();
        let snapshot = driver.history().to_vec();
        driver.handle("Second question").await.unwrap();

        assert_eq!(&driver.history()[..snapshot.len()], snapshot.as_slice());
        assert_eq!(driver.history().len(), snapshot.len() + 2);
    }

    #[tokio::test]
    async fn test_gate_reruns_agent_until_confirmed() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("issues_then_sales"),
            // round 1: no refund yet
            Message::assistant().with_text("Could you share the item id?"),
            // round 2: refund flows through a tool call
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new("execute_refund", json!({"item_id": "item_132612938"}))),
            ),
            Message::assistant().with_text("Refund done."),
            Message::assistant().with_text("On to the mixer."),
        ]));
        let mut driver = driver(provider.clone()).with_gate(refund_gate());

        let outcome = driver
            .handle("Broken blender, and I want a mixer")
            .await
            .unwrap();

        // classification + 3 issues completions + 1 sales completion
        assert_eq!(provider.completions(), 5);
        let last = outcome.messages.last().unwrap();
        assert_eq!(last.name.as_deref(), Some("Sales Agent"));
    }

    #[tokio::test]
    async fn test_gate_exhaustion_skips_rest_of_sequence() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("issues_then_sales"),
            Message::assistant().with_text("Still looking into it."),
            Message::assistant().with_text("Still looking into it."),
        ]));
        let config = DriverConfig {
            max_gate_rounds: 2,
            ..Default::default()
        };
        let mut driver = driver(provider.clone()).with_config(config).with_gate(refund_gate());

        let outcome = driver.handle("Broken blender, and a mixer").await.unwrap();

        // classification + two gated rounds, sales never runs
        assert_eq!(provider.completions(), 3);
        assert!(outcome
            .messages
            .iter()
            .all(|m| m.name.as_deref() != Some("Sales Agent")));
    }

    #[tokio::test]
    async fn test_sticky_agent_skips_classification() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("Triage here, how can I help?")
        ]));
        let config = DriverConfig {
            reroute_each_message: false,
            ..Default::default()
        };
        let mut driver = driver(provider.clone()).with_config(config);

        let outcome = driver.handle("Hello?").await.unwrap();

        assert_eq!(provider.completions(), 1);
        assert_eq!(provider.requests()[0].1, "Route things.");
        assert_eq!(outcome.messages[1].name.as_deref(), Some("Triage Agent"));
        assert_eq!(driver.active_agent(), "triage");
    }

    #[tokio::test]
    async fn test_escalation_stops_the_sequence() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("issues_then_sales"),
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new(
                    "escalate_to_human",
                    json!({"summary": "Out of scope"}),
                )),
            ),
            Message::assistant().with_text("Sales should never see this."),
        ]));
        let mut driver = driver(provider.clone());

        let outcome = driver.handle("Something impossible").await.unwrap();

        assert_eq!(
            outcome.status,
            ConversationStatus::Escalated("Out of scope".to_string())
        );
        // classification + the escalating completion only
        assert_eq!(provider.completions(), 2);
        assert!(outcome
            .messages
            .iter()
            .all(|m| m.name.as_deref() != Some("Sales Agent")));
    }
}
