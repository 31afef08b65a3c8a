//! Prize commands.

use chrono::Utc;
use clap::Subcommand;
use comfy_table::Table;
use uuid::Uuid;

use crate::adapters::sqlite::SqlitePrizeRepository;
use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{Prize, PrizeStatus, PrizeTier};
use crate::domain::ports::PrizeRepository;

use super::{emit, AppContext};

#[derive(Subcommand)]
pub enum PrizeCommands {
    /// Create or update a prize.
    Upsert {
        /// Existing prize id; omitted = create.
        #[arg(long)]
        id: Option<Uuid>,
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        tier: String,
        #[arg(long, default_value_t = 1)]
        weight: u32,
        #[arg(long, default_value_t = 0)]
        value: i64,
        /// Omit for infinite stock.
        #[arg(long)]
        stock: Option<i64>,
        #[arg(long)]
        daily_cap: Option<u32>,
        #[arg(long, default_value = "active")]
        status: String,
    },
    /// List a campaign's prizes.
    List {
        #[arg(long)]
        campaign: Uuid,
    },
}

pub async fn handle(command: PrizeCommands, app: &AppContext) -> DrawResult<()> {
    let repo = SqlitePrizeRepository::new(app.pool.clone());
    match command {
        PrizeCommands::Upsert {
            id,
            campaign,
            name,
            tier,
            weight,
            value,
            stock,
            daily_cap,
            status,
        } => {
            let tier = PrizeTier::from_str(&tier)
                .ok_or_else(|| DrawError::ConfigViolation(format!("bad tier {tier}")))?;
            let status = PrizeStatus::from_str(&status)
                .ok_or_else(|| DrawError::ConfigViolation(format!("bad status {status}")))?;
            let now = Utc::now();
            let created_at = match id {
                Some(id) => repo.get(id).await?.map_or(now, |p| p.created_at),
                None => now,
            };
            let prize = Prize {
                id: id.unwrap_or_else(Uuid::new_v4),
                campaign_id: campaign,
                name,
                tier,
                win_weight: weight,
                value_points: value,
                stock_quantity: stock,
                daily_cap,
                status,
                created_at,
                updated_at: now,
            };
            repo.upsert(&prize).await?;
            println!("{}", prize.id);
            Ok(())
        }
        PrizeCommands::List { campaign } => {
            let prizes = repo.list_by_campaign(campaign).await?;
            let mut table = Table::new();
            table.set_header(["id", "name", "tier", "weight", "value", "stock", "cap", "status"]);
            for p in &prizes {
                table.add_row([
                    p.id.to_string(),
                    p.name.clone(),
                    p.tier.as_str().to_string(),
                    p.win_weight.to_string(),
                    p.value_points.to_string(),
                    p.stock_quantity.map_or_else(|| "inf".to_string(), |s| s.to_string()),
                    p.daily_cap.map_or_else(String::new, |c| c.to_string()),
                    p.status.as_str().to_string(),
                ]);
            }
            emit(app.json, &prizes, table);
            Ok(())
        }
    }
}
