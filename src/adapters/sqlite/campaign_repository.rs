//! SQLite implementation of the CampaignRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{BudgetMode, Campaign, CampaignStatus, GuaranteeConfig};
use crate::domain::ports::CampaignRepository;

#[derive(Clone)]
pub struct SqliteCampaignRepository {
    pool: SqlitePool,
}

impl SqliteCampaignRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CampaignRow {
    id: String,
    code: String,
    name: String,
    status: String,
    budget_mode: String,
    total_budget: i64,
    remaining_budget: i64,
    guarantee_enabled: i64,
    guarantee_threshold: i64,
    guarantee_prize_id: Option<String>,
    starts_at: Option<String>,
    ends_at: Option<String>,
    created_at: String,
    updated_at: String,
}

pub(crate) fn parse_utc(raw: &str) -> DrawResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DrawError::Internal(format!("bad timestamp {raw}: {e}")))
}

pub(crate) fn parse_opt_utc(raw: Option<&str>) -> DrawResult<Option<DateTime<Utc>>> {
    raw.map(parse_utc).transpose()
}

pub(crate) fn parse_uuid(raw: &str) -> DrawResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| DrawError::Internal(format!("bad uuid {raw}: {e}")))
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = DrawError;

    fn try_from(row: CampaignRow) -> DrawResult<Self> {
        Ok(Campaign {
            id: parse_uuid(&row.id)?,
            code: row.code,
            name: row.name,
            status: CampaignStatus::from_str(&row.status)
                .ok_or_else(|| DrawError::Internal(format!("bad campaign status {}", row.status)))?,
            budget_mode: BudgetMode::from_str(&row.budget_mode).ok_or_else(|| {
                DrawError::Internal(format!("bad budget mode {}", row.budget_mode))
            })?,
            total_budget: row.total_budget,
            remaining_budget: row.remaining_budget,
            guarantee: GuaranteeConfig {
                enabled: row.guarantee_enabled != 0,
                threshold_draws: u32::try_from(row.guarantee_threshold).unwrap_or(0),
                guarantee_prize_id: row
                    .guarantee_prize_id
                    .as_deref()
                    .map(parse_uuid)
                    .transpose()?,
            },
            starts_at: parse_opt_utc(row.starts_at.as_deref())?,
            ends_at: parse_opt_utc(row.ends_at.as_deref())?,
            created_at: parse_utc(&row.created_at)?,
            updated_at: parse_utc(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl CampaignRepository for SqliteCampaignRepository {
    async fn get(&self, id: Uuid) -> DrawResult<Option<Campaign>> {
        let row: Option<CampaignRow> = sqlx::query_as("SELECT * FROM campaigns WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Campaign::try_from).transpose()
    }

    async fn list(&self, status: Option<CampaignStatus>) -> DrawResult<Vec<Campaign>> {
        let rows: Vec<CampaignRow> = match status {
            Some(s) => {
                sqlx::query_as("SELECT * FROM campaigns WHERE status = ? ORDER BY created_at")
                    .bind(s.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM campaigns ORDER BY created_at")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(Campaign::try_from).collect()
    }

    async fn upsert(&self, campaign: &Campaign) -> DrawResult<()> {
        if campaign.budget_mode == BudgetMode::BudgetPool
            && (campaign.remaining_budget < 0 || campaign.remaining_budget > campaign.total_budget)
        {
            return Err(DrawError::ConfigViolation(format!(
                "remaining budget {} out of range [0, {}]",
                campaign.remaining_budget, campaign.total_budget
            )));
        }
        sqlx::query(
            r#"INSERT INTO campaigns (id, code, name, status, budget_mode, total_budget,
               remaining_budget, guarantee_enabled, guarantee_threshold, guarantee_prize_id,
               starts_at, ends_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 code = excluded.code,
                 name = excluded.name,
                 status = excluded.status,
                 budget_mode = excluded.budget_mode,
                 total_budget = excluded.total_budget,
                 remaining_budget = excluded.remaining_budget,
                 guarantee_enabled = excluded.guarantee_enabled,
                 guarantee_threshold = excluded.guarantee_threshold,
                 guarantee_prize_id = excluded.guarantee_prize_id,
                 starts_at = excluded.starts_at,
                 ends_at = excluded.ends_at,
                 updated_at = excluded.updated_at"#,
        )
        .bind(campaign.id.to_string())
        .bind(&campaign.code)
        .bind(&campaign.name)
        .bind(campaign.status.as_str())
        .bind(campaign.budget_mode.as_str())
        .bind(campaign.total_budget)
        .bind(campaign.remaining_budget)
        .bind(i64::from(campaign.guarantee.enabled))
        .bind(i64::from(campaign.guarantee.threshold_draws))
        .bind(campaign.guarantee.guarantee_prize_id.map(|id| id.to_string()))
        .bind(campaign.starts_at.map(|t| t.to_rfc3339()))
        .bind(campaign.ends_at.map(|t| t.to_rfc3339()))
        .bind(campaign.created_at.to_rfc3339())
        .bind(campaign.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_budget(&self, id: Uuid, total: i64, remaining: i64) -> DrawResult<()> {
        if remaining < 0 || remaining > total {
            return Err(DrawError::ConfigViolation(format!(
                "remaining budget {remaining} out of range [0, {total}]"
            )));
        }
        let result = sqlx::query(
            "UPDATE campaigns SET total_budget = ?, remaining_budget = ?, updated_at = ? WHERE id = ?",
        )
        .bind(total)
        .bind(remaining)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DrawError::CampaignNotFound(id));
        }
        Ok(())
    }
}
