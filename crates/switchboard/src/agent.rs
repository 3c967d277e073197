use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::errors::AgentResult;
use crate::models::tool::Tool;
use crate::schema::ToolSpec;

/// What a tool invocation produced. Transfers and escalations are tagged
/// variants consumed by the engine; they never reach the model as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// A plain result, fed back to the model verbatim.
    Value(Value),
    /// Hand the conversation to the named agents, in order.
    Transfer(Vec<String>),
    /// End the conversation and surface the summary to a human.
    Escalate(String),
}

type ToolFn = Box<dyn Fn(Value) -> AgentResult<ToolOutcome> + Send + Sync>;

/// A registered tool: its declared spec plus the handler invoked with the
/// parsed argument object.
pub struct AgentTool {
    spec: ToolSpec,
    handler: ToolFn,
}

impl AgentTool {
    pub fn new<F>(spec: ToolSpec, handler: F) -> Self
    where
        F: Fn(Value) -> AgentResult<ToolOutcome> + Send + Sync + 'static,
    {
        AgentTool {
            spec,
            handler: Box::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    pub fn descriptor(&self) -> Tool {
        self.spec.descriptor()
    }

    pub fn call(&self, arguments: Value) -> AgentResult<ToolOutcome> {
        (self.handler)(arguments)
    }
}

impl fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentTool")
            .field("spec", &self.spec)
            .finish()
    }
}

/// A named persona: instructions, a model id, and the tools it may call.
/// Immutable after construction.
#[derive(Debug)]
pub struct Agent {
    name: String,
    model: String,
    instructions: String,
    tools: Vec<AgentTool>,
}

impl Agent {
    pub fn new<N, M, I>(name: N, model: M, instructions: I) -> Self
    where
        N: Into<String>,
        M: Into<String>,
        I: Into<String>,
    {
        Agent {
            name: name.into(),
            model: model.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: AgentTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> &[AgentTool] {
        &self.tools
    }

    pub fn tool(&self, name: &str) -> Option<&AgentTool> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Descriptors for every tool, rebuilt on demand.
    pub fn descriptors(&self) -> Vec<Tool> {
        self.tools.iter().map(AgentTool::descriptor).collect()
    }
}

/// The set of agents a conversation can traverse, keyed by stable id.
/// Constructed once and passed by reference to the router, engine, and
/// driver.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: Into<String>>(&mut self, id: S, agent: Agent) {
        self.agents.insert(id.into(), agent);
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParamKind, ParamSpec};
    use serde_json::json;

    fn echo() -> AgentTool {
        AgentTool::new(
            ToolSpec::new("echo", "Echoes back the input")
                .with_param(ParamSpec::required("message", ParamKind::String)),
            |args| {
                Ok(ToolOutcome::Value(json!(args
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or(""))))
            },
        )
    }

    #[test]
    fn test_tool_lookup_by_name() {
        let agent = Agent::new("Echo Agent", "gpt-4o-mini", "Echo things.").with_tool(echo());
        assert!(agent.tool("echo").is_some());
        assert!(agent.tool("missing").is_none());
    }

    #[test]
    fn test_descriptors_match_registration_order() {
        let agent = Agent::new("Agent", "gpt-4o-mini", "")
            .with_tool(echo())
            .with_tool(AgentTool::new(ToolSpec::new("noop", ""), |_| {
                Ok(ToolOutcome::Value(json!(null)))
            }));

        let names: Vec<String> = agent.descriptors().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["echo", "noop"]);
    }

    #[test]
    fn test_tool_call_runs_handler() {
        let tool = echo();
        let outcome = tool.call(json!({"message": "hi"})).unwrap();
        assert_eq!(outcome, ToolOutcome::Value(json!("hi")));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = AgentRegistry::new();
        registry.register("sales", Agent::new("Sales Agent", "gpt-4o-mini", "Sell."));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("sales").unwrap().name(), "Sales Agent");
        assert!(registry.get("triage").is_none());
    }
}
