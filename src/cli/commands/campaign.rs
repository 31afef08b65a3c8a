//! Campaign commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use comfy_table::Table;
use uuid::Uuid;

use crate::adapters::sqlite::SqliteCampaignRepository;
use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{BudgetMode, Campaign, CampaignStatus, GuaranteeConfig};
use crate::domain::ports::CampaignRepository;

use super::{emit, AppContext};

#[derive(Subcommand)]
pub enum CampaignCommands {
    /// Create a campaign (draft status).
    Create {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "unlimited")]
        budget_mode: String,
        #[arg(long, default_value_t = 0)]
        total_budget: i64,
        #[arg(long)]
        starts_at: Option<DateTime<Utc>>,
        #[arg(long)]
        ends_at: Option<DateTime<Utc>>,
    },
    /// List campaigns, optionally by status.
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Change a campaign's status.
    SetStatus {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        status: String,
    },
    /// Set total and remaining budget together.
    UpdateBudget {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        total: i64,
        #[arg(long)]
        remaining: i64,
    },
    /// Configure the campaign guarantee.
    SetGuarantee {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        enabled: bool,
        #[arg(long, default_value_t = 0)]
        threshold: u32,
        #[arg(long)]
        prize_id: Option<Uuid>,
    },
}

pub async fn handle(command: CampaignCommands, app: &AppContext) -> DrawResult<()> {
    let repo = SqliteCampaignRepository::new(app.pool.clone());
    match command {
        CampaignCommands::Create { code, name, budget_mode, total_budget, starts_at, ends_at } => {
            let mode = BudgetMode::from_str(&budget_mode)
                .ok_or_else(|| DrawError::ConfigViolation(format!("bad budget mode {budget_mode}")))?;
            let now = Utc::now();
            let campaign = Campaign {
                id: Uuid::new_v4(),
                code,
                name,
                status: CampaignStatus::Draft,
                budget_mode: mode,
                total_budget,
                remaining_budget: total_budget,
                guarantee: GuaranteeConfig::default(),
                starts_at,
                ends_at,
                created_at: now,
                updated_at: now,
            };
            repo.upsert(&campaign).await?;
            println!("{}", campaign.id);
            Ok(())
        }
        CampaignCommands::List { status } => {
            let status = match status {
                Some(raw) => Some(CampaignStatus::from_str(&raw).ok_or_else(|| {
                    DrawError::ConfigViolation(format!("bad campaign status {raw}"))
                })?),
                None => None,
            };
            let campaigns = repo.list(status).await?;
            let mut table = Table::new();
            table.set_header(["id", "code", "status", "mode", "remaining/total"]);
            for c in &campaigns {
                table.add_row([
                    c.id.to_string(),
                    c.code.clone(),
                    c.status.as_str().to_string(),
                    c.budget_mode.as_str().to_string(),
                    format!("{}/{}", c.remaining_budget, c.total_budget),
                ]);
            }
            emit(app.json, &campaigns, table);
            Ok(())
        }
        CampaignCommands::SetStatus { id, status } => {
            let status = CampaignStatus::from_str(&status)
                .ok_or_else(|| DrawError::ConfigViolation(format!("bad campaign status {status}")))?;
            let mut campaign =
                repo.get(id).await?.ok_or(DrawError::CampaignNotFound(id))?;
            campaign.status = status;
            campaign.updated_at = Utc::now();
            repo.upsert(&campaign).await?;
            println!("campaign {id} -> {}", status.as_str());
            Ok(())
        }
        CampaignCommands::UpdateBudget { id, total, remaining } => {
            repo.update_budget(id, total, remaining).await?;
            println!("campaign {id} budget {remaining}/{total}");
            Ok(())
        }
        CampaignCommands::SetGuarantee { id, enabled, threshold, prize_id } => {
            let mut campaign =
                repo.get(id).await?.ok_or(DrawError::CampaignNotFound(id))?;
            campaign.guarantee = GuaranteeConfig {
                enabled,
                threshold_draws: threshold,
                guarantee_prize_id: prize_id,
            };
            campaign.updated_at = Utc::now();
            repo.upsert(&campaign).await?;
            println!("campaign {id} guarantee updated");
            Ok(())
        }
    }
}
