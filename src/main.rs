//! proxy-synth
//!
//! Generates a reverse-proxy configuration from orchestrator services and
//! reloads the proxy whenever the service topology changes.
//!
//! # Architecture Overview
//!
//! ```text
//!   Orchestrator events ──▶ ChangeListener ──┐
//!   Template edits ───────▶ TemplateWatcher ─┼──▶ EventBus ──▶ SynthesisEngine::generate
//!   Retry timer ─────────────────────────────┘                      │
//!                                                                   ▼
//!                        snapshot → definitions → probes → render → write → reload
//! ```

use clap::Parser;
use std::path::PathBuf;

use proxy_synth::config::load_config;
use proxy_synth::lifecycle::{self, signals, Collaborators};
use proxy_synth::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "proxy-synth")]
#[command(about = "Keeps a reverse-proxy configuration in sync with orchestrator services", long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "proxy-synth.toml")]
    config: PathBuf,

    /// Only include services from this stack (repeatable). Replaces the configured list.
    #[arg(short, long = "stack")]
    stacks: Vec<String>,

    /// Override the output file path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,

    /// Generate once and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if !cli.stacks.is_empty() {
        config.discovery.stacks = cli.stacks;
    }
    if let Some(output) = cli.output {
        config.output.path = output;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        servers = ?config.servers.enabled,
        stacks = ?config.discovery.stacks,
        "proxy-synth starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let collaborators = Collaborators::connect(&config).await?;

    if cli.once {
        let report = lifecycle::run_once(&config, collaborators).await?;
        tracing::info!(
            locations = report.locations,
            skipped = report.skipped,
            "Single pass finished"
        );
        return Ok(());
    }

    lifecycle::run(&config, collaborators, signals::interrupt()).await?;
    Ok(())
}
