//! Pricing commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use comfy_table::Table;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::sqlite::SqlitePricingRepository;
use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::PricingMap;
use crate::domain::ports::SystemClock;
use crate::services::PricingService;

use super::{emit, AppContext};

#[derive(Subcommand)]
pub enum PricingCommands {
    /// Draft a new version from a pricing-map JSON document.
    Create {
        #[arg(long)]
        campaign: Uuid,
        /// Inline JSON, e.g. '{"single_cost":100,"multi_10_cost":900}'.
        #[arg(long)]
        config: String,
        #[arg(long, default_value = "cli")]
        author: String,
    },
    /// Activate a version (archives the previous active atomically).
    Activate {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        version: i64,
    },
    /// Schedule a draft for future activation.
    Schedule {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        version: i64,
        #[arg(long)]
        effective_at: DateTime<Utc>,
    },
    /// Create-from-target and activate, with audit metadata.
    Rollback {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        version: i64,
        #[arg(long, default_value = "cli")]
        author: String,
    },
    /// List all versions of a campaign.
    List {
        #[arg(long)]
        campaign: Uuid,
    },
    /// Promote scheduled versions whose effective time has passed.
    PromoteDue,
}

fn service(app: &AppContext) -> PricingService {
    PricingService::new(
        Arc::new(SqlitePricingRepository::new(app.pool.clone())),
        Arc::new(SystemClock),
    )
}

pub async fn handle(command: PricingCommands, app: &AppContext) -> DrawResult<()> {
    let service = service(app);
    match command {
        PricingCommands::Create { campaign, config, author } => {
            let map: PricingMap = serde_json::from_str(&config)
                .map_err(|e| DrawError::ConfigViolation(format!("bad pricing json: {e}")))?;
            let created = service.create_version(campaign, map, &author).await?;
            println!("version {}", created.version);
            Ok(())
        }
        PricingCommands::Activate { campaign, version } => {
            let active = service.activate_version(campaign, version).await?;
            println!("active version {}", active.version);
            Ok(())
        }
        PricingCommands::Schedule { campaign, version, effective_at } => {
            let scheduled = service.schedule_activation(campaign, version, effective_at).await?;
            println!("version {} scheduled for {effective_at}", scheduled.version);
            Ok(())
        }
        PricingCommands::Rollback { campaign, version, author } => {
            let active = service.rollback_to_version(campaign, version, &author).await?;
            println!("rolled back to v{version} as new active v{}", active.version);
            Ok(())
        }
        PricingCommands::List { campaign } => {
            let versions = service.list_versions(campaign).await?;
            let mut table = Table::new();
            table.set_header(["version", "status", "single_cost", "effective_at", "author"]);
            for v in &versions {
                table.add_row([
                    v.version.to_string(),
                    v.status.as_str().to_string(),
                    v.pricing.single_cost.to_string(),
                    v.effective_at.map_or_else(String::new, |t| t.to_rfc3339()),
                    v.created_by.clone(),
                ]);
            }
            emit(app.json, &versions, table);
            Ok(())
        }
        PricingCommands::PromoteDue => {
            let promoted = service.promote_due().await?;
            println!("{promoted} scheduled version(s) promoted");
            Ok(())
        }
    }
}
