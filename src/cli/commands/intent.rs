//! Admin intent commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use uuid::Uuid;

use crate::adapters::sqlite::SqliteAdminIntentRepository;
use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{AdminIntent, PrizeTier};
use crate::domain::ports::AdminIntentRepository;

use super::AppContext;

#[derive(Subcommand)]
pub enum IntentCommands {
    /// Force the next draw of a (campaign, user) pair.
    Create {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        user: String,
        /// high | mid | low | fallback
        #[arg(long)]
        tier: Option<String>,
        #[arg(long)]
        prize_id: Option<Uuid>,
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
        #[arg(long, default_value = "cli")]
        author: String,
    },
}

pub async fn handle(command: IntentCommands, app: &AppContext) -> DrawResult<()> {
    let repo = SqliteAdminIntentRepository::new(app.pool.clone());
    match command {
        IntentCommands::Create { campaign, user, tier, prize_id, expires_at, author } => {
            let forced_tier = match tier {
                Some(raw) => Some(
                    PrizeTier::from_str(&raw)
                        .ok_or_else(|| DrawError::ConfigViolation(format!("bad tier {raw}")))?,
                ),
                None => None,
            };
            let intent = AdminIntent {
                id: Uuid::new_v4(),
                campaign_id: campaign,
                user_id: user,
                forced_tier,
                forced_prize_id: prize_id,
                expires_at,
                consumed: false,
                created_by: author,
                created_at: Utc::now(),
            };
            repo.create(&intent).await?;
            println!("{}", intent.id);
            Ok(())
        }
    }
}
