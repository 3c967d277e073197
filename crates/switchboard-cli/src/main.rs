mod agents;
mod session;

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use switchboard::conversation::{ConversationDriver, DriverConfig};
use switchboard::providers::base::Provider;
use switchboard::providers::configs::{OpenAiProviderConfig, DEFAULT_HOST};
use switchboard::providers::openai::OpenAiProvider;
use switchboard::router::Router;

use crate::session::Session;

#[derive(Parser)]
#[command(author, version, about = "ACME Inc. multi-agent customer service desk", long_about = None)]
struct Cli {
    /// OpenAI API key (can also be set via OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Completion service host
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Model used by the agents and the router
    #[arg(short, long, default_value = "gpt-4o-mini")]
    model: String,

    /// Stay with the active agent instead of classifying every message
    #[arg(long)]
    sticky_agent: bool,

    /// Hold the sales step back until a refund has been confirmed
    #[arg(long)]
    require_resolution: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let api_key = cli
        .api_key
        .clone()
        .or_else(|| env::var("OPENAI_API_KEY").ok())
        .context("API key must be provided via --api-key or OPENAI_API_KEY environment variable")?;

    let provider: Arc<dyn Provider> = Arc::new(OpenAiProvider::new(OpenAiProviderConfig::new(
        cli.host.clone(),
        api_key,
    ))?);

    let registry = agents::registry(&cli.model);
    let router = Router::new(
        provider.clone(),
        cli.model.clone(),
        agents::ROUTING_INSTRUCTIONS,
        agents::route_table(),
    );

    let mut driver = ConversationDriver::new(registry, provider, router, agents::TRIAGE)
        .with_config(DriverConfig {
            reroute_each_message: !cli.sticky_agent,
            ..Default::default()
        });
    if cli.require_resolution {
        driver = driver.with_gate(agents::refund_gate());
    }

    Session::new(driver).start().await
}
