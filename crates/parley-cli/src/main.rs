use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use parley_application::{ChannelConsumer, Conversation, Handoff};
use parley_core::config::ParleyConfig;
use parley_interaction::HttpBackend;

mod render;
mod repl;

use repl::{Ending, Repl};

#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Parley - run a multi-persona assessment conversation", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/parley/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Backend base URL, e.g. http://127.0.0.1:8000/api
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Delay between revealed persona messages
    #[arg(long, value_name = "MS")]
    reveal_delay_ms: Option<u64>,

    /// Also write the final analysis to this file as JSON
    #[arg(long, value_name = "PATH")]
    results_out: Option<PathBuf>,

    /// Log level for parley crates (overrides RUST_LOG)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn load_config(&self) -> Result<ParleyConfig> {
        let mut config = ParleyConfig::load(self.config.as_deref())?;
        if let Some(url) = &self.base_url {
            config.backend.base_url = url.clone();
        }
        if let Some(delay) = self.reveal_delay_ms {
            config.conversation.reveal_delay_ms = delay;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let config = cli.load_config()?;
    tracing::debug!(?config, "configuration loaded");

    let backend = HttpBackend::new(&config.backend)?;
    let (consumer, mut results) = ChannelConsumer::new(1);
    let conversation = Arc::new(Conversation::new(
        Arc::new(backend),
        Arc::new(consumer),
        &config.conversation,
    ));

    println!("{}", "=== Parley ===".bright_magenta().bold());
    println!("{}", "Connecting to the assessment...".bright_black());

    let mut repl = Repl::new(Arc::clone(&conversation));
    repl.start().await?;

    println!("{}", "Type your replies, or 'quit' to leave.".bright_black());
    println!();

    match repl.run().await? {
        Ending::Completed => {
            let handoff = results
                .recv()
                .await
                .context("conversation ended without an analysis")?;
            show_results(&handoff, cli.results_out.as_deref())?;
        }
        Ending::Abandoned => {}
    }

    Ok(())
}

fn init_logging(level: Option<&str>) {
    const DEFAULT_DIRECTIVE: &str = "parley=info";
    let filter = match level {
        Some(level) => EnvFilter::try_new(format!("parley={level}"))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn show_results(handoff: &Handoff, out: Option<&Path>) -> Result<()> {
    let pretty = format_results(handoff)?;
    println!("{}", format!("Session {}", handoff.session_id).bright_black());
    println!("{pretty}");

    if let Some(path) = out {
        std::fs::write(path, format!("{pretty}\n"))
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        println!("{}", format!("Results written to {}", path.display()).green());
    }
    Ok(())
}

fn format_results(handoff: &Handoff) -> Result<String> {
    Ok(serde_json::to_string_pretty(handoff.result.as_value())?)
}
