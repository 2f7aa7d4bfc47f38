use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rnc_core::RunOutcome;
use rnc_sync::{PgCatalog, SyncConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rnc-cli")]
#[command(about = "DGII taxpayer registry ingestion and API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download the registry archive and reconcile it once.
    Sync,
    /// Apply database migrations.
    Migrate,
    /// Serve the HTTP API (and the daily job when enabled).
    Serve,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let outcome = rnc_sync::run_sync_once_from_env().await?;
            println!("{}", summary_line(&outcome));
            if !outcome.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Migrate => {
            let config = SyncConfig::from_env();
            let catalog = PgCatalog::connect(&config.database_url)
                .await
                .context("connecting to DATABASE_URL")?;
            catalog.migrate().await.context("applying migrations")?;
            info!("migrations applied");
        }
        Commands::Serve => {
            rnc_web::serve_from_env().await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn summary_line(outcome: &RunOutcome) -> String {
    format!(
        "sync {}: run_id={} processed={} created={} updated={} message={:?}",
        outcome.status,
        outcome.run_id,
        outcome.counters.records_processed,
        outcome.counters.records_created,
        outcome.counters.records_updated,
        outcome.message
    )
}
