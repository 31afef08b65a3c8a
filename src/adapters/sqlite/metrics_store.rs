//! Long-term hourly metrics store.
//!
//! The rollup job copies hot-tier buckets here before their TTL lapses;
//! operator tooling reads history from this table.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::HourlyMetric;

use super::campaign_repository::parse_uuid;

#[derive(Clone)]
pub struct SqliteMetricsStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct MetricRow {
    campaign_id: String,
    bucket: String,
    total_draws: i64,
    tier_counts: String,
    budget_tier_counts: String,
    correction_counts: String,
    budget_consumed: i64,
    prize_value: i64,
    unique_users: i64,
}

impl TryFrom<MetricRow> for HourlyMetric {
    type Error = DrawError;

    fn try_from(row: MetricRow) -> DrawResult<Self> {
        Ok(HourlyMetric {
            campaign_id: parse_uuid(&row.campaign_id)?,
            bucket: row.bucket,
            total_draws: u64::try_from(row.total_draws.max(0)).unwrap_or(0),
            tier_counts: serde_json::from_str(&row.tier_counts)?,
            budget_tier_counts: serde_json::from_str(&row.budget_tier_counts)?,
            correction_counts: serde_json::from_str(&row.correction_counts)?,
            budget_consumed: row.budget_consumed,
            prize_value: row.prize_value,
            unique_users: u64::try_from(row.unique_users.max(0)).unwrap_or(0),
        })
    }
}

impl SqliteMetricsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the persisted bucket with the hot-tier snapshot.
    pub async fn persist(&self, metric: &HourlyMetric) -> DrawResult<()> {
        sqlx::query(
            r#"INSERT INTO hourly_metrics (campaign_id, bucket, total_draws, tier_counts,
               budget_tier_counts, correction_counts, budget_consumed, prize_value, unique_users)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(campaign_id, bucket) DO UPDATE SET
                 total_draws = excluded.total_draws,
                 tier_counts = excluded.tier_counts,
                 budget_tier_counts = excluded.budget_tier_counts,
                 correction_counts = excluded.correction_counts,
                 budget_consumed = excluded.budget_consumed,
                 prize_value = excluded.prize_value,
                 unique_users = excluded.unique_users"#,
        )
        .bind(metric.campaign_id.to_string())
        .bind(&metric.bucket)
        .bind(i64::try_from(metric.total_draws).unwrap_or(i64::MAX))
        .bind(serde_json::to_string(&metric.tier_counts)?)
        .bind(serde_json::to_string(&metric.budget_tier_counts)?)
        .bind(serde_json::to_string(&metric.correction_counts)?)
        .bind(metric.budget_consumed)
        .bind(metric.prize_value)
        .bind(i64::try_from(metric.unique_users).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, campaign_id: Uuid, bucket: &str) -> DrawResult<Option<HourlyMetric>> {
        let row: Option<MetricRow> =
            sqlx::query_as("SELECT * FROM hourly_metrics WHERE campaign_id = ? AND bucket = ?")
                .bind(campaign_id.to_string())
                .bind(bucket)
                .fetch_optional(&self.pool)
                .await?;
        row.map(HourlyMetric::try_from).transpose()
    }

    pub async fn list_for_campaign(
        &self,
        campaign_id: Uuid,
        limit: u32,
    ) -> DrawResult<Vec<HourlyMetric>> {
        let rows: Vec<MetricRow> = sqlx::query_as(
            "SELECT * FROM hourly_metrics WHERE campaign_id = ? ORDER BY bucket DESC LIMIT ?",
        )
        .bind(campaign_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(HourlyMetric::try_from).collect()
    }
}
