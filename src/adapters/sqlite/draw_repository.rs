//! SQLite read-side for draws and decisions.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{
    BudgetTier, DrawDecision, DrawRecord, DrawType, PipelineType, PressureTier, PrizeTier,
};
use crate::domain::ports::DrawRepository;

use super::campaign_repository::{parse_utc, parse_uuid};
use super::shanghai_day_utc_range;

#[derive(Clone)]
pub struct SqliteDrawRepository {
    pool: SqlitePool,
}

impl SqliteDrawRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DrawRow {
    pub id: String,
    pub campaign_id: String,
    pub user_id: String,
    pub draw_type: String,
    pub cost_points: i64,
    pub reward_tier: String,
    pub prize_id: Option<String>,
    pub prize_value_points: i64,
    pub idempotency_key: String,
    pub created_at: String,
}

impl TryFrom<DrawRow> for DrawRecord {
    type Error = DrawError;

    fn try_from(row: DrawRow) -> DrawResult<Self> {
        Ok(DrawRecord {
            id: parse_uuid(&row.id)?,
            campaign_id: parse_uuid(&row.campaign_id)?,
            user_id: row.user_id,
            draw_type: DrawType::from_str(&row.draw_type)
                .ok_or_else(|| DrawError::Internal(format!("bad draw type {}", row.draw_type)))?,
            cost_points: row.cost_points,
            reward_tier: PrizeTier::from_str(&row.reward_tier)
                .ok_or_else(|| DrawError::Internal(format!("bad tier {}", row.reward_tier)))?,
            prize_id: row.prize_id.as_deref().map(parse_uuid).transpose()?,
            prize_value_points: row.prize_value_points,
            idempotency_key: row.idempotency_key,
            created_at: parse_utc(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DecisionRow {
    id: String,
    draw_id: String,
    campaign_id: String,
    user_id: String,
    budget_tier: String,
    pressure_tier: String,
    effective_budget: i64,
    pipeline_type: String,
    corrections: String,
    selected_tier: String,
    weights: String,
    created_at: String,
}

impl TryFrom<DecisionRow> for DrawDecision {
    type Error = DrawError;

    fn try_from(row: DecisionRow) -> DrawResult<Self> {
        Ok(DrawDecision {
            id: parse_uuid(&row.id)?,
            draw_id: parse_uuid(&row.draw_id)?,
            campaign_id: parse_uuid(&row.campaign_id)?,
            user_id: row.user_id,
            budget_tier: BudgetTier::from_str(&row.budget_tier)
                .ok_or_else(|| DrawError::Internal(format!("bad budget tier {}", row.budget_tier)))?,
            pressure_tier: PressureTier::from_str(&row.pressure_tier).ok_or_else(|| {
                DrawError::Internal(format!("bad pressure tier {}", row.pressure_tier))
            })?,
            effective_budget: row.effective_budget,
            pipeline_type: PipelineType::from_str(&row.pipeline_type).ok_or_else(|| {
                DrawError::Internal(format!("bad pipeline type {}", row.pipeline_type))
            })?,
            corrections: serde_json::from_str(&row.corrections)?,
            selected_tier: PrizeTier::from_str(&row.selected_tier)
                .ok_or_else(|| DrawError::Internal(format!("bad tier {}", row.selected_tier)))?,
            weights: serde_json::from_str(&row.weights)?,
            created_at: parse_utc(&row.created_at)?,
        })
    }
}

#[async_trait]
impl DrawRepository for SqliteDrawRepository {
    async fn count_user_draws_on_day(
        &self,
        campaign_id: Uuid,
        user_id: &str,
        day: NaiveDate,
    ) -> DrawResult<u32> {
        let (start, end) = shanghai_day_utc_range(day);
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM draws
               WHERE campaign_id = ? AND user_id = ? AND created_at >= ? AND created_at < ?"#,
        )
        .bind(campaign_id.to_string())
        .bind(user_id)
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn count_prize_awards_on_day(&self, prize_id: Uuid, day: NaiveDate) -> DrawResult<u32> {
        let (start, end) = shanghai_day_utc_range(day);
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM draws WHERE prize_id = ? AND created_at >= ? AND created_at < ?",
        )
        .bind(prize_id.to_string())
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn records_for_key(&self, idempotency_key: &str) -> DrawResult<Vec<DrawRecord>> {
        let rows: Vec<DrawRow> =
            sqlx::query_as("SELECT * FROM draws WHERE idempotency_key = ? ORDER BY created_at, id")
                .bind(idempotency_key)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(DrawRecord::try_from).collect()
    }

    async fn decision_for_draw(&self, draw_id: Uuid) -> DrawResult<Option<DrawDecision>> {
        let row: Option<DecisionRow> =
            sqlx::query_as("SELECT * FROM draw_decisions WHERE draw_id = ?")
                .bind(draw_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(DrawDecision::try_from).transpose()
    }
}
