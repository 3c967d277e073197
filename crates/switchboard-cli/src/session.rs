use anyhow::Result;
use bat::PrettyPrinter;
use cliclack::{input, spinner};
use console::style;

use switchboard::conversation::{ConversationDriver, ConversationStatus};
use switchboard::models::message::{Message, MessageContent, Role};

/// The console loop: read a line, hand it to the driver, render what came
/// back. "exit" ends the session; so does an escalation.
pub struct Session {
    driver: ConversationDriver,
}

impl Session {
    pub fn new(driver: ConversationDriver) -> Self {
        Session { driver }
    }

    pub async fn start(&mut self) -> Result<()> {
        println!(
            "ACME Inc. customer service {}",
            style("- type \"exit\" to end the session").dim()
        );
        println!();

        loop {
            let text: String = input("User:").placeholder("").interact()?;
            if text.trim().eq_ignore_ascii_case("exit") {
                break;
            }

            let spin = spinner();
            spin.start("awaiting reply");
            let outcome = self.driver.handle(&text).await;
            spin.stop("");

            match outcome {
                Ok(outcome) => {
                    render_messages(&outcome.messages);
                    if let ConversationStatus::Escalated(summary) = outcome.status {
                        render_escalation(&summary);
                        break;
                    }
                }
                Err(e) => {
                    // The conversation survives; history is still intact
                    eprintln!("{} {:#}", style("error:").red().bold(), e);
                }
            }
            println!();
        }
        Ok(())
    }
}

fn render_messages(messages: &[Message]) {
    for message in messages {
        let speaker = message.name.as_deref().unwrap_or("assistant");
        for content in &message.content {
            match content {
                MessageContent::Text(text) if text.is_empty() => {}
                MessageContent::Text(text) => match message.role {
                    Role::Assistant => {
                        println!("{}:", style(speaker).bold());
                        render_markdown(text);
                    }
                    Role::System => {
                        println!("{}", style(text).dim().italic());
                    }
                    Role::User => {}
                },
                MessageContent::ToolRequest(request) => match &request.tool_call {
                    Ok(call) => println!(
                        "{}: {}({})",
                        style(speaker).bold(),
                        style(&call.name).cyan(),
                        call.arguments
                    ),
                    Err(e) => println!("{}", style(format!("tool request error: {e}")).red()),
                },
                MessageContent::ToolResponse(response) => {
                    if let Err(e) = &response.tool_result {
                        println!("{}", style(format!("tool error: {e}")).red().dim());
                    }
                }
            }
        }
    }
}

fn render_markdown(content: &str) {
    let printed = PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .language("markdown")
        .print();
    if printed.is_err() {
        println!("{}", content);
    }
}

fn render_escalation(summary: &str) {
    println!("{}", style("Escalating to human agent...").yellow().bold());
    println!("\n=== Escalation Report ===");
    println!("Summary: {}", summary);
    println!("=========================\n");
}
