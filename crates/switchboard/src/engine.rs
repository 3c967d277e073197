use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::agent::{Agent, AgentRegistry, ToolOutcome};
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::providers::base::Provider;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The active agent produced a plain reply with nothing pending.
    Completed,
    /// A tool asked for a human; the conversation must stop.
    Escalated(String),
}

/// The agent holding the conversation at the end of a turn, plus every
/// message the turn appended.
#[derive(Debug)]
pub struct TurnResult {
    pub agent: String,
    pub messages: Vec<Message>,
    pub outcome: TurnOutcome,
}

/// Drives one agent through completions and tool dispatches until it yields
/// a plain reply, following handoffs across agents as it goes.
pub struct TurnEngine<'a> {
    registry: &'a AgentRegistry,
    provider: Arc<dyn Provider>,
}

impl<'a> TurnEngine<'a> {
    pub fn new(registry: &'a AgentRegistry, provider: Arc<dyn Provider>) -> Self {
        TurnEngine { registry, provider }
    }

    /// Run a full turn for `agent_id` on top of `history`. The caller's
    /// history is never touched; only the newly created messages come back.
    pub async fn run_turn(&self, agent_id: &str, history: &[Message]) -> Result<TurnResult> {
        let mut current_id = agent_id.to_string();
        let mut current = self.lookup(&current_id)?;
        let mut messages = history.to_vec();
        let turn_start = messages.len();
        let mut pending: VecDeque<String> = VecDeque::new();
        let mut escalation: Option<String> = None;

        loop {
            // Rebuilt every iteration: a handoff changes the tool set
            let descriptors = current.descriptors();
            let (response, _usage) = self
                .provider
                .complete(
                    current.model(),
                    current.instructions(),
                    &messages,
                    &descriptors,
                )
                .await?;
            let response = response.with_name(current.name());
            messages.push(response.clone());

            let requests: Vec<ToolRequest> = response
                .content
                .iter()
                .filter_map(MessageContent::as_tool_request)
                .cloned()
                .collect();

            if requests.is_empty() {
                match pending.pop_front() {
                    Some(next) => {
                        current = self.lookup(&next)?;
                        current_id = next;
                        messages.push(Message::system().with_text(format!(
                            "Transferred to {}. Continue assisting the user.",
                            current.name()
                        )));
                        continue;
                    }
                    None => break,
                }
            }

            for request in &requests {
                match self.dispatch_tool_call(current, request) {
                    Ok(ToolOutcome::Transfer(targets)) => {
                        if targets.is_empty() {
                            return Err(AgentError::Internal(format!(
                                "transfer requested by {} carried no targets",
                                current.name()
                            ))
                            .into());
                        }
                        pending.extend(targets);
                        // Non-empty: just extended with at least one target
                        let next = pending.pop_front().unwrap();
                        messages.push(Message::user().with_tool_response(
                            request.id.clone(),
                            Ok(format!("Transferred to {}. Adopt persona immediately.", next)),
                        ));
                        current = self.lookup(&next)?;
                        current_id = next;
                    }
                    Ok(ToolOutcome::Escalate(summary)) => {
                        messages.push(Message::user().with_tool_response(
                            request.id.clone(),
                            Ok("Escalated to a human representative.".to_string()),
                        ));
                        escalation = Some(summary);
                    }
                    Ok(ToolOutcome::Value(value)) => {
                        messages.push(
                            Message::user()
                                .with_tool_response(request.id.clone(), Ok(render_value(value))),
                        );
                    }
                    // The model is only ever offered tools that exist, so a
                    // miss is a broken contract, not something to recover
                    Err(err @ AgentError::ToolNotFound(_)) => return Err(err.into()),
                    Err(err) => {
                        messages.push(
                            Message::user().with_tool_response(request.id.clone(), Err(err)),
                        );
                    }
                }
            }

            if escalation.is_some() {
                break;
            }
        }

        let outcome = match escalation {
            Some(summary) => TurnOutcome::Escalated(summary),
            None => TurnOutcome::Completed,
        };

        Ok(TurnResult {
            agent: current_id,
            messages: messages.split_off(turn_start),
            outcome,
        })
    }

    fn lookup(&self, id: &str) -> Result<&'a Agent, AgentError> {
        self.registry
            .get(id)
            .ok_or_else(|| AgentError::AgentNotFound(id.to_string()))
    }

    /// Resolve and invoke one requested tool call, exactly once. A payload
    /// that failed to parse upstream comes back as its recoverable error.
    fn dispatch_tool_call(&self, agent: &Agent, request: &ToolRequest) -> AgentResult<ToolOutcome> {
        let call = request.tool_call.clone()?;
        let tool = agent
            .tool(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;
        tool.call(call.arguments)
    }
}

fn render_value(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
