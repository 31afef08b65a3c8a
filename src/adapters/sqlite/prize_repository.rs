//! SQLite implementation of the PrizeRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{Prize, PrizeStatus, PrizeTier};
use crate::domain::ports::PrizeRepository;

use super::campaign_repository::{parse_utc, parse_uuid};

#[derive(Clone)]
pub struct SqlitePrizeRepository {
    pool: SqlitePool,
}

impl SqlitePrizeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PrizeRow {
    id: String,
    campaign_id: String,
    name: String,
    tier: String,
    win_weight: i64,
    value_points: i64,
    stock_quantity: Option<i64>,
    daily_cap: Option<i64>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PrizeRow> for Prize {
    type Error = DrawError;

    fn try_from(row: PrizeRow) -> DrawResult<Self> {
        Ok(Prize {
            id: parse_uuid(&row.id)?,
            campaign_id: parse_uuid(&row.campaign_id)?,
            name: row.name,
            tier: PrizeTier::from_str(&row.tier)
                .ok_or_else(|| DrawError::Internal(format!("bad prize tier {}", row.tier)))?,
            win_weight: u32::try_from(row.win_weight.max(0)).unwrap_or(u32::MAX),
            value_points: row.value_points,
            stock_quantity: row.stock_quantity,
            daily_cap: row.daily_cap.map(|c| u32::try_from(c.max(0)).unwrap_or(u32::MAX)),
            status: PrizeStatus::from_str(&row.status)
                .ok_or_else(|| DrawError::Internal(format!("bad prize status {}", row.status)))?,
            created_at: parse_utc(&row.created_at)?,
            updated_at: parse_utc(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl PrizeRepository for SqlitePrizeRepository {
    async fn get(&self, id: Uuid) -> DrawResult<Option<Prize>> {
        let row: Option<PrizeRow> = sqlx::query_as("SELECT * FROM prizes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Prize::try_from).transpose()
    }

    async fn list_by_campaign(&self, campaign_id: Uuid) -> DrawResult<Vec<Prize>> {
        let rows: Vec<PrizeRow> =
            sqlx::query_as("SELECT * FROM prizes WHERE campaign_id = ? ORDER BY id")
                .bind(campaign_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Prize::try_from).collect()
    }

    async fn upsert(&self, prize: &Prize) -> DrawResult<()> {
        // An active campaign must not lose its last active fallback prize.
        let losing_fallback = prize.tier != PrizeTier::Fallback || prize.status != PrizeStatus::Active;
        if losing_fallback {
            let (campaign_active,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM campaigns WHERE id = ? AND status = 'active'",
            )
            .bind(prize.campaign_id.to_string())
            .fetch_one(&self.pool)
            .await?;
            if campaign_active > 0 {
                let (other_fallbacks,): (i64,) = sqlx::query_as(
                    r#"SELECT COUNT(*) FROM prizes
                       WHERE campaign_id = ? AND tier = 'fallback' AND status = 'active' AND id != ?"#,
                )
                .bind(prize.campaign_id.to_string())
                .bind(prize.id.to_string())
                .fetch_one(&self.pool)
                .await?;
                let (was_fallback,): (i64,) = sqlx::query_as(
                    r#"SELECT COUNT(*) FROM prizes
                       WHERE id = ? AND tier = 'fallback' AND status = 'active'"#,
                )
                .bind(prize.id.to_string())
                .fetch_one(&self.pool)
                .await?;
                if was_fallback > 0 && other_fallbacks == 0 {
                    return Err(DrawError::ConfigViolation(
                        "cannot remove the last active fallback prize of an active campaign"
                            .to_string(),
                    ));
                }
            }
        }

        sqlx::query(
            r#"INSERT INTO prizes (id, campaign_id, name, tier, win_weight, value_points,
               stock_quantity, daily_cap, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 tier = excluded.tier,
                 win_weight = excluded.win_weight,
                 value_points = excluded.value_points,
                 stock_quantity = excluded.stock_quantity,
                 daily_cap = excluded.daily_cap,
                 status = excluded.status,
                 updated_at = excluded.updated_at"#,
        )
        .bind(prize.id.to_string())
        .bind(prize.campaign_id.to_string())
        .bind(&prize.name)
        .bind(prize.tier.as_str())
        .bind(i64::from(prize.win_weight))
        .bind(prize.value_points)
        .bind(prize.stock_quantity)
        .bind(prize.daily_cap.map(i64::from))
        .bind(prize.status.as_str())
        .bind(prize.created_at.to_rfc3339())
        .bind(prize.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_active_fallback(&self, campaign_id: Uuid) -> DrawResult<u32> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM prizes WHERE campaign_id = ? AND tier = 'fallback' AND status = 'active'",
        )
        .bind(campaign_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(u32::try_from(count).unwrap_or(0))
    }
}
