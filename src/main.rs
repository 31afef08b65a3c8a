//! Fortuna CLI entry point.

use anyhow::Context;
use clap::Parser;
use std::time::Duration;

use fortuna::adapters::sqlite::{SqliteStore, StoreSettings};
use fortuna::cli::{commands, Cli, Commands};
use fortuna::domain::errors::DrawError;
use fortuna::services::{telemetry, ConfigLoader};

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err:#}");
            match err.downcast_ref::<DrawError>() {
                Some(draw_err) => draw_err.exit_code(),
                None => 2,
            }
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let _log_guard =
        telemetry::init_tracing(&config.logging).context("failed to initialize tracing")?;

    let store = SqliteStore::open(&StoreSettings {
        path: config.database.path.clone(),
        max_connections: config.database.max_connections,
        busy_timeout: Duration::from_secs(config.database.busy_timeout_secs),
    })
    .await
    .context("failed to open database")?;

    let app = commands::AppContext { pool: store.pool(), config, json: cli.json };

    let result = match cli.command {
        Commands::Campaign(cmd) => commands::campaign::handle(cmd, &app).await,
        Commands::Pricing(cmd) => commands::pricing::handle(cmd, &app).await,
        Commands::Prize(cmd) => commands::prize::handle(cmd, &app).await,
        Commands::Quota(cmd) => commands::quota::handle(cmd, &app).await,
        Commands::Intent(cmd) => commands::intent::handle(cmd, &app).await,
        Commands::Draw(cmd) => commands::draw::handle(cmd, &app).await,
        Commands::Metrics(cmd) => commands::metrics::handle(cmd, &app).await,
        Commands::Outbox(cmd) => commands::outbox::handle(cmd, &app).await,
    };

    result.map_err(anyhow::Error::from)
}
