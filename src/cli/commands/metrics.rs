//! Metrics commands.
//!
//! The CLI reads the long-term store; live hot-tier buckets belong to
//! the serving process.

use clap::Subcommand;
use comfy_table::Table;
use uuid::Uuid;

use crate::adapters::sqlite::SqliteMetricsStore;
use crate::domain::errors::DrawResult;
use crate::domain::models::HourlyMetric;

use super::{emit, AppContext};

#[derive(Subcommand)]
pub enum MetricsCommands {
    /// Show one persisted campaign-hour bucket.
    Show {
        #[arg(long)]
        campaign: Uuid,
        /// Bucket key YYYYMMDDHH (UTC).
        #[arg(long)]
        bucket: String,
    },
    /// List the most recent persisted buckets of a campaign.
    History {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long, default_value_t = 24)]
        limit: u32,
    },
}

fn metric_row(table: &mut Table, m: &HourlyMetric) {
    table.add_row([
        m.bucket.clone(),
        m.total_draws.to_string(),
        m.tier_counts.get("high").copied().unwrap_or(0).to_string(),
        m.tier_counts.get("fallback").copied().unwrap_or(0).to_string(),
        m.budget_consumed.to_string(),
        m.unique_users.to_string(),
    ]);
}

pub async fn handle(command: MetricsCommands, app: &AppContext) -> DrawResult<()> {
    let store = SqliteMetricsStore::new(app.pool.clone());
    match command {
        MetricsCommands::Show { campaign, bucket } => {
            let metric = store.get(campaign, &bucket).await?;
            let mut table = Table::new();
            table.set_header(["bucket", "draws", "high", "fallback", "budget", "uniques"]);
            if let Some(m) = &metric {
                metric_row(&mut table, m);
            }
            emit(app.json, &metric, table);
            Ok(())
        }
        MetricsCommands::History { campaign, limit } => {
            let metrics = store.list_for_campaign(campaign, limit).await?;
            let mut table = Table::new();
            table.set_header(["bucket", "draws", "high", "fallback", "budget", "uniques"]);
            for m in &metrics {
                metric_row(&mut table, m);
            }
            emit(app.json, &metrics, table);
            Ok(())
        }
    }
}
