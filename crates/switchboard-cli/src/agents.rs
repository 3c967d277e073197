//! The ACME Inc. service desk: three personas, their business tools, and the
//! routing table that picks which of them answer a message.

use console::style;
use indoc::indoc;
use serde_json::{json, Value};

use switchboard::agent::{Agent, AgentRegistry, AgentTool, ToolOutcome};
use switchboard::conversation::SequenceGate;
use switchboard::errors::{AgentError, AgentResult};
use switchboard::models::message::MessageContent;
use switchboard::router::RouteTable;
use switchboard::schema::{ParamKind, ParamSpec, ToolSpec};

pub const TRIAGE: &str = "triage";
pub const SALES: &str = "sales";
pub const ISSUES_AND_REPAIRS: &str = "issues_and_repairs";

pub const ROUTING_INSTRUCTIONS: &str = indoc! {"
    Analyze the user query and determine routing:
    - If the user has a product issue AND wants to buy a new product, return 'issues_then_sales'.
    - If only a product issue is mentioned, return 'issues'.
    - If it's just a purchase request, return 'sales'.
"};

pub fn route_table() -> RouteTable {
    RouteTable::new(vec![SALES.to_string()])
        .with_route(
            "issues_then_sales",
            vec![ISSUES_AND_REPAIRS.to_string(), SALES.to_string()],
        )
        .with_route("issues", vec![ISSUES_AND_REPAIRS.to_string()])
}

pub fn registry(model: &str) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    registry.register(TRIAGE, triage_agent(model));
    registry.register(SALES, sales_agent(model));
    registry.register(ISSUES_AND_REPAIRS, issues_and_repairs_agent(model));
    registry
}

/// Sales may only run after a refund has been confirmed by a prior step.
pub fn refund_gate() -> SequenceGate {
    SequenceGate::new(ISSUES_AND_REPAIRS, |message| {
        message.content.iter().any(|content| match content {
            MessageContent::Text(text) => {
                text.to_lowercase().contains("refund processed successfully")
            }
            MessageContent::ToolResponse(response) => response
                .tool_result
                .as_deref()
                .is_ok_and(|text| text.to_lowercase().contains("refund processed successfully")),
            _ => false,
        })
    })
}

fn triage_agent(model: &str) -> Agent {
    Agent::new(
        "Triage Agent",
        model,
        "You are a customer service bot for ACME Inc. \
         Introduce yourself. Always be very brief. \
         Gather information to direct the customer to the right department. \
         But make your questions subtle and natural.",
    )
    .with_tool(transfer_to_sales_agent())
    .with_tool(transfer_to_issues_and_repairs())
    .with_tool(escalate_to_human())
}

fn sales_agent(model: &str) -> Agent {
    Agent::new(
        "Sales Agent",
        model,
        "You are a sales agent for ACME Inc. \
         Your job is to help customers buy products. \
         If they mention a product defect, route them to Issues & Repairs first.",
    )
    .with_tool(execute_order())
}

fn issues_and_repairs_agent(model: &str) -> Agent {
    Agent::new(
        "Issues and Repairs Agent",
        model,
        "You are a customer support agent for ACME Inc. \
         Handle product issues and process refunds if needed. \
         Do not transfer the customer until the refund process is completed.",
    )
    .with_tool(execute_refund())
    .with_tool(look_up_item())
}

fn transfer_to_sales_agent() -> AgentTool {
    AgentTool::new(
        ToolSpec::new("transfer_to_sales_agent", "Transfers the customer to the sales department."),
        |_args| Ok(ToolOutcome::Transfer(vec![SALES.to_string()])),
    )
}

fn transfer_to_issues_and_repairs() -> AgentTool {
    AgentTool::new(
        ToolSpec::new(
            "transfer_to_issues_and_repairs",
            "Transfers the customer to issues and repairs.",
        ),
        |_args| Ok(ToolOutcome::Transfer(vec![ISSUES_AND_REPAIRS.to_string()])),
    )
}

fn escalate_to_human() -> AgentTool {
    AgentTool::new(
        ToolSpec::new("escalate_to_human", "Escalates a case to a human representative.")
            .with_param(ParamSpec::required("summary", ParamKind::String)),
        |args| {
            let summary = require_str(&args, "summary")?;
            Ok(ToolOutcome::Escalate(summary))
        },
    )
}

fn execute_order() -> AgentTool {
    AgentTool::new(
        ToolSpec::new("execute_order", "Processes a product order.")
            .with_param(ParamSpec::required("product", ParamKind::String))
            .with_param(ParamSpec::required("price", ParamKind::Integer)),
        |args| {
            let product = require_str(&args, "product")?;
            let price = require_i64(&args, "price")?;
            println!("\n\n{}", style("=== Order Summary ===").bold());
            println!("Product: {}", product);
            println!("Price: ${}", price);
            println!("{}\n", style("=================").bold());
            Ok(ToolOutcome::Value(json!("Order placed successfully.")))
        },
    )
}

fn execute_refund() -> AgentTool {
    AgentTool::new(
        ToolSpec::new("execute_refund", "Processes a refund for an item.")
            .with_param(ParamSpec::required("item_id", ParamKind::String))
            .with_param(ParamSpec::optional(
                "reason",
                ParamKind::String,
                json!("not provided"),
            )),
        |args| {
            let item_id = require_str(&args, "item_id")?;
            let reason = optional_str(&args, "reason", "not provided");
            println!("\n\n{}", style("=== Refund Summary ===").bold());
            println!("Item ID: {}", item_id);
            println!("Reason: {}", reason);
            println!("{}\n", style("=================").bold());
            Ok(ToolOutcome::Value(json!("Refund processed successfully.")))
        },
    )
}

fn look_up_item() -> AgentTool {
    AgentTool::new(
        ToolSpec::new("look_up_item", "Searches for an item based on a query.")
            .with_param(ParamSpec::required("search_query", ParamKind::String)),
        |args| {
            let _query = require_str(&args, "search_query")?;
            let item_id = "item_132612938";
            println!("Found item: {}", item_id);
            Ok(ToolOutcome::Value(json!(item_id)))
        },
    )
}

fn require_str(args: &Value, key: &str) -> AgentResult<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AgentError::InvalidParameters(format!("missing string parameter '{key}'")))
}

fn require_i64(args: &Value, key: &str) -> AgentResult<i64> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| AgentError::InvalidParameters(format!("missing integer parameter '{key}'")))
}

fn optional_str(args: &Value, key: &str, default: &str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard::models::message::Message;

    #[test]
    fn test_route_table_issue_then_purchase() {
        let decision = route_table().resolve("issues_then_sales");
        assert_eq!(decision.agents(), [ISSUES_AND_REPAIRS, SALES]);
    }

    #[test]
    fn test_route_table_issue_only() {
        let decision = route_table().resolve("issues");
        assert_eq!(decision.agents(), [ISSUES_AND_REPAIRS]);
    }

    #[test]
    fn test_route_table_everything_else_is_sales() {
        for reply in ["sales", "refund maybe", "???", ""] {
            assert_eq!(route_table().resolve(reply).agents(), [SALES]);
        }
    }

    #[test]
    fn test_registry_has_all_three_desks() {
        let registry = registry("gpt-4o-mini");
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(TRIAGE).unwrap().name(), "Triage Agent");
        assert_eq!(registry.get(SALES).unwrap().name(), "Sales Agent");
        assert_eq!(
            registry.get(ISSUES_AND_REPAIRS).unwrap().name(),
            "Issues and Repairs Agent"
        );
    }

    #[test]
    fn test_transfer_tools_name_their_targets() {
        let outcome = transfer_to_sales_agent().call(json!({})).unwrap();
        assert_eq!(outcome, ToolOutcome::Transfer(vec![SALES.to_string()]));

        let outcome = transfer_to_issues_and_repairs().call(json!({})).unwrap();
        assert_eq!(
            outcome,
            ToolOutcome::Transfer(vec![ISSUES_AND_REPAIRS.to_string()])
        );
    }

    #[test]
    fn test_escalation_carries_the_summary() {
        let outcome = escalate_to_human()
            .call(json!({"summary": "Needs a manager"}))
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Escalate("Needs a manager".to_string()));
    }

    #[test]
    fn test_order_requires_integer_price() {
        let err = execute_order()
            .call(json!({"product": "mixer", "price": "a lot"}))
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(_)));
    }

    #[test]
    fn test_order_confirms_on_valid_arguments() {
        let outcome = execute_order()
            .call(json!({"product": "mixer", "price": 49}))
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Value(json!("Order placed successfully.")));
    }

    #[test]
    fn test_refund_reason_defaults_when_absent() {
        let spec_schema = execute_refund().spec().input_schema();
        assert_eq!(spec_schema["required"], json!(["item_id"]));
        assert_eq!(
            spec_schema["properties"]["reason"]["default"],
            "not provided"
        );

        let outcome = execute_refund()
            .call(json!({"item_id": "item_132612938"}))
            .unwrap();
        assert_eq!(
            outcome,
            ToolOutcome::Value(json!("Refund processed successfully."))
        );
    }

    #[test]
    fn test_look_up_item_returns_the_item_id() {
        let outcome = look_up_item()
            .call(json!({"search_query": "broken toaster"}))
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Value(json!("item_132612938")));
    }

    #[test]
    fn test_refund_gate_matches_tool_confirmation() {
        let gate = refund_gate();
        assert!(gate.applies_to(ISSUES_AND_REPAIRS));
        assert!(!gate.applies_to(SALES));

        let confirming = Message::user()
            .with_tool_response("1", Ok("Refund processed successfully.".to_string()));
        let unrelated = Message::assistant().with_text("Looking into it.");

        assert!(gate.satisfied_by(&confirming));
        assert!(!gate.satisfied_by(&unrelated));
    }
}
