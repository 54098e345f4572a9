//! abacus-server: orchestrator for distributed expression evaluation.

use clap::Parser;
use tracing::info;

use abacus_core::config::{load_dotenv, Config};
use abacus_server::{build_router, db, AppState};

/// Expression orchestrator: accepts expressions and dispatches their tasks to workers.
#[derive(Parser, Debug)]
#[command(name = "abacus-server", version, about)]
struct Cli {
    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the database URL.
    #[arg(long)]
    database_url: Option<String>,

    /// Start without replaying unfinished expressions.
    #[arg(long)]
    skip_recovery: bool,
}

async fn serve(config: Config, skip_recovery: bool) -> anyhow::Result<()> {
    config.log_summary();

    let pool = db::init_pool(&config.database).await?;
    let state = AppState::new(pool, &config);

    if skip_recovery {
        info!("Recovery skipped");
    } else {
        let report = state.scheduler.recover().await?;
        info!(
            "Recovered {} unfinished expressions ({} rejected)",
            report.replayed, report.rejected
        );
    }

    let app = build_router(state, &config.server.cors_origin);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    serve(config, cli.skip_recovery).await
}
