//! compute-worker: polls an orchestrator for arithmetic tasks.
//!
//! Runs `computing_power` loops against `GET /internal/task`. Each loop sleeps
//! the task's `operation_time_ms`, evaluates it and posts the result to
//! `POST /internal/task`. Flags override the `agent` config section.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use abacus_compute::worker::{Agent, HttpTaskSource};
use abacus_core::config::{load_dotenv, Config};

// ── CLI ─────────────────────────────────────────────────────────────

/// Arithmetic compute worker.
#[derive(Parser, Debug)]
#[command(name = "compute-worker", version, about)]
struct Cli {
    /// Base URL of the orchestrator.
    #[arg(long, env = "ORCHESTRATOR_URL")]
    orchestrator_url: Option<String>,

    /// Number of concurrent worker loops.
    #[arg(long, env = "COMPUTING_POWER")]
    computing_power: Option<usize>,

    /// Delay between polls when no task is available, in milliseconds.
    #[arg(long, env = "POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut agent_config = Config::from_env().agent;
    if let Some(url) = cli.orchestrator_url {
        agent_config.orchestrator_url = url;
    }
    if let Some(power) = cli.computing_power {
        agent_config.computing_power = power;
    }
    if let Some(interval) = cli.poll_interval_ms {
        agent_config.poll_interval_ms = interval;
    }

    let source = Arc::new(HttpTaskSource::new(&agent_config.orchestrator_url));
    info!(endpoint = %source.endpoint(), "compute-worker starting");

    let agent = Arc::new(Agent::new(source, agent_config));
    let runner = tokio::spawn(Arc::clone(&agent).run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, finishing in-flight tasks");
    agent.shutdown();
    runner.await?;

    info!("compute-worker exited cleanly");
    Ok(())
}
