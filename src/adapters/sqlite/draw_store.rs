//! SQLite draw unit of work.
//!
//! One transaction per executed draw request. The conditional updates
//! (`stock > 0`, `remaining_budget >= amount`) are the authoritative
//! guards; read-side caches may be stale, these cannot be.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{
    Campaign, DrawDecision, DrawRecord, IssueOutboxEntry, UserExperienceState, UserGlobalState,
};
use crate::domain::ports::{DrawStore, DrawUnitOfWork};

use super::shanghai_day_utc_range;

#[derive(Clone)]
pub struct SqliteDrawStore {
    pool: SqlitePool,
}

impl SqliteDrawStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DrawStore for SqliteDrawStore {
    async fn begin(&self) -> DrawResult<Box<dyn DrawUnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteDrawUnitOfWork { tx }))
    }
}

pub struct SqliteDrawUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl DrawUnitOfWork for SqliteDrawUnitOfWork {
    async fn campaign(&mut self, id: Uuid) -> DrawResult<Campaign> {
        let row: Option<super::campaign_repository::CampaignRow> =
            sqlx::query_as("SELECT * FROM campaigns WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut *self.tx)
                .await?;
        row.ok_or(DrawError::CampaignNotFound(id)).and_then(Campaign::try_from)
    }

    async fn consume_budget(&mut self, campaign_id: Uuid, amount: i64) -> DrawResult<bool> {
        if amount <= 0 {
            return Ok(true);
        }
        let result = sqlx::query(
            r#"UPDATE campaigns
               SET remaining_budget = remaining_budget - ?
               WHERE id = ? AND budget_mode = 'budget_pool' AND remaining_budget >= ?"#,
        )
        .bind(amount)
        .bind(campaign_id.to_string())
        .bind(amount)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        // Unlimited campaigns have nothing to consume.
        let (unlimited,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM campaigns WHERE id = ? AND budget_mode = 'unlimited'",
        )
        .bind(campaign_id.to_string())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(unlimited > 0)
    }

    async fn refund_budget(&mut self, campaign_id: Uuid, amount: i64) -> DrawResult<()> {
        if amount <= 0 {
            return Ok(());
        }
        sqlx::query(
            r#"UPDATE campaigns
               SET remaining_budget = MIN(total_budget, remaining_budget + ?)
               WHERE id = ? AND budget_mode = 'budget_pool'"#,
        )
        .bind(amount)
        .bind(campaign_id.to_string())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn decrement_stock(&mut self, prize_id: Uuid) -> DrawResult<bool> {
        let result = sqlx::query(
            r#"UPDATE prizes
               SET stock_quantity = stock_quantity - 1
               WHERE id = ? AND stock_quantity IS NOT NULL AND stock_quantity > 0"#,
        )
        .bind(prize_id.to_string())
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        let (infinite,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM prizes WHERE id = ? AND stock_quantity IS NULL")
                .bind(prize_id.to_string())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(infinite > 0)
    }

    async fn count_user_draws_on_day(
        &mut self,
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
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_draw(&mut self, record: &DrawRecord) -> DrawResult<()> {
        sqlx::query(
            r#"INSERT INTO draws (id, campaign_id, user_id, draw_type, cost_points,
               reward_tier, prize_id, prize_value_points, idempotency_key, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(record.campaign_id.to_string())
        .bind(&record.user_id)
        .bind(record.draw_type.as_str())
        .bind(record.cost_points)
        .bind(record.reward_tier.as_str())
        .bind(record.prize_id.map(|id| id.to_string()))
        .bind(record.prize_value_points)
        .bind(&record.idempotency_key)
        .bind(record.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_decision(&mut self, decision: &DrawDecision) -> DrawResult<()> {
        sqlx::query(
            r#"INSERT INTO draw_decisions (id, draw_id, campaign_id, user_id, budget_tier,
               pressure_tier, effective_budget, pipeline_type, corrections, selected_tier,
               weights, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(decision.id.to_string())
        .bind(decision.draw_id.to_string())
        .bind(decision.campaign_id.to_string())
        .bind(&decision.user_id)
        .bind(decision.budget_tier.as_str())
        .bind(decision.pressure_tier.as_str())
        .bind(decision.effective_budget)
        .bind(decision.pipeline_type.as_str())
        .bind(serde_json::to_string(&decision.corrections)?)
        .bind(decision.selected_tier.as_str())
        .bind(serde_json::to_string(&decision.weights)?)
        .bind(decision.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn upsert_experience(&mut self, state: &UserExperienceState) -> DrawResult<()> {
        sqlx::query(
            r#"INSERT INTO user_experience_states (user_id, campaign_id, empty_streak,
               recent_high_count, anti_high_cooldown, total_draws, total_empties,
               pity_trigger_count, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(user_id, campaign_id) DO UPDATE SET
                 empty_streak = excluded.empty_streak,
                 recent_high_count = excluded.recent_high_count,
                 anti_high_cooldown = excluded.anti_high_cooldown,
                 total_draws = excluded.total_draws,
                 total_empties = excluded.total_empties,
                 pity_trigger_count = excluded.pity_trigger_count,
                 updated_at = excluded.updated_at"#,
        )
        .bind(&state.user_id)
        .bind(state.campaign_id.to_string())
        .bind(i64::from(state.empty_streak))
        .bind(i64::from(state.recent_high_count))
        .bind(i64::from(state.anti_high_cooldown))
        .bind(i64::try_from(state.total_draws).unwrap_or(i64::MAX))
        .bind(i64::try_from(state.total_empties).unwrap_or(i64::MAX))
        .bind(i64::from(state.pity_trigger_count))
        .bind(state.updated_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn upsert_global(&mut self, state: &UserGlobalState) -> DrawResult<()> {
        sqlx::query(
            r#"INSERT INTO user_global_states (user_id, historical_empty_rate_ppm,
               luck_debt_multiplier_ppm, total_draws, total_high_wins, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET
                 historical_empty_rate_ppm = excluded.historical_empty_rate_ppm,
                 luck_debt_multiplier_ppm = excluded.luck_debt_multiplier_ppm,
                 total_draws = excluded.total_draws,
                 total_high_wins = excluded.total_high_wins,
                 updated_at = excluded.updated_at"#,
        )
        .bind(&state.user_id)
        .bind(i64::from(state.historical_empty_rate_ppm))
        .bind(i64::from(state.luck_debt_multiplier_ppm))
        .bind(i64::try_from(state.total_draws).unwrap_or(i64::MAX))
        .bind(i64::try_from(state.total_high_wins).unwrap_or(i64::MAX))
        .bind(state.updated_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn consume_admin_intent(&mut self, intent_id: Uuid) -> DrawResult<()> {
        sqlx::query("UPDATE admin_intents SET consumed = 1 WHERE id = ?")
            .bind(intent_id.to_string())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn enqueue_issue(&mut self, entry: &IssueOutboxEntry) -> DrawResult<()> {
        sqlx::query(
            r#"INSERT INTO issue_outbox (id, draw_id, user_id, prize_id, item_ref,
               idempotency_key, attempts, next_attempt_at, status, last_error, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.draw_id.to_string())
        .bind(&entry.user_id)
        .bind(entry.prize_id.to_string())
        .bind(&entry.item_ref)
        .bind(&entry.idempotency_key)
        .bind(i64::from(entry.attempts))
        .bind(entry.next_attempt_at.to_rfc3339())
        .bind(entry.status.as_str())
        .bind(&entry.last_error)
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DrawResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DrawResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
