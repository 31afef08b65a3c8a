//! Issue outbox commands.

use clap::Subcommand;
use comfy_table::Table;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::http::{HttpAssetClient, HttpAssetClientConfig};
use crate::adapters::sqlite::SqliteOutboxRepository;
use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::OutboxStatus;
use crate::domain::ports::{OutboxRepository, SystemClock};
use crate::services::IssueOutboxWorker;

use super::{emit, AppContext};

#[derive(Subcommand)]
pub enum OutboxCommands {
    /// List entries, optionally by status.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// One drain pass against the asset service.
    Drain {
        /// Asset service base URL.
        #[arg(long)]
        asset_url: String,
    },
    /// Drain continuously.
    Run {
        #[arg(long)]
        asset_url: String,
        #[arg(long, default_value_t = 30)]
        poll_secs: u64,
    },
}

fn worker(app: &AppContext, asset_url: String) -> DrawResult<IssueOutboxWorker> {
    let assets = HttpAssetClient::new(HttpAssetClientConfig {
        base_url: asset_url,
        timeout: Duration::from_secs(2),
    })?;
    Ok(IssueOutboxWorker::new(
        Arc::new(SqliteOutboxRepository::new(app.pool.clone())),
        Arc::new(assets),
        Arc::new(SystemClock),
        app.config.outbox.clone(),
    ))
}

pub async fn handle(command: OutboxCommands, app: &AppContext) -> DrawResult<()> {
    match command {
        OutboxCommands::List { status, limit } => {
            let status = match status {
                Some(raw) => Some(OutboxStatus::from_str(&raw).ok_or_else(|| {
                    DrawError::ConfigViolation(format!("bad outbox status {raw}"))
                })?),
                None => None,
            };
            let repo = SqliteOutboxRepository::new(app.pool.clone());
            let entries = repo.list(status, limit).await?;
            let mut table = Table::new();
            table.set_header(["id", "draw", "status", "attempts", "next_attempt", "error"]);
            for e in &entries {
                table.add_row([
                    e.id.to_string(),
                    e.draw_id.to_string(),
                    e.status.as_str().to_string(),
                    e.attempts.to_string(),
                    e.next_attempt_at.to_rfc3339(),
                    e.last_error.clone().unwrap_or_default(),
                ]);
            }
            emit(app.json, &entries, table);
            Ok(())
        }
        OutboxCommands::Drain { asset_url } => {
            let report = worker(app, asset_url)?.drain_once().await?;
            println!(
                "delivered {} rescheduled {} dead {}",
                report.delivered, report.rescheduled, report.dead
            );
            Ok(())
        }
        OutboxCommands::Run { asset_url, poll_secs } => {
            worker(app, asset_url)?.run(Duration::from_secs(poll_secs)).await
        }
    }
}
