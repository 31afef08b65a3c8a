//! SQLite implementation of the AdminIntentRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{AdminIntent, PrizeTier};
use crate::domain::ports::AdminIntentRepository;

use super::campaign_repository::{parse_opt_utc, parse_utc, parse_uuid};

#[derive(Clone)]
pub struct SqliteAdminIntentRepository {
    pool: SqlitePool,
}

impl SqliteAdminIntentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct IntentRow {
    id: String,
    campaign_id: String,
    user_id: String,
    forced_tier: Option<String>,
    forced_prize_id: Option<String>,
    expires_at: Option<String>,
    consumed: i64,
    created_by: String,
    created_at: String,
}

impl TryFrom<IntentRow> for AdminIntent {
    type Error = DrawError;

    fn try_from(row: IntentRow) -> DrawResult<Self> {
        Ok(AdminIntent {
            id: parse_uuid(&row.id)?,
            campaign_id: parse_uuid(&row.campaign_id)?,
            user_id: row.user_id,
            forced_tier: row.forced_tier.as_deref().and_then(PrizeTier::from_str),
            forced_prize_id: row.forced_prize_id.as_deref().map(parse_uuid).transpose()?,
            expires_at: parse_opt_utc(row.expires_at.as_deref())?,
            consumed: row.consumed != 0,
            created_by: row.created_by,
            created_at: parse_utc(&row.created_at)?,
        })
    }
}

#[async_trait]
impl AdminIntentRepository for SqliteAdminIntentRepository {
    async fn find_usable(
        &self,
        campaign_id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DrawResult<Option<AdminIntent>> {
        let row: Option<IntentRow> = sqlx::query_as(
            r#"SELECT * FROM admin_intents
               WHERE campaign_id = ? AND user_id = ? AND consumed = 0
                 AND (expires_at IS NULL OR expires_at > ?)
               ORDER BY created_at LIMIT 1"#,
        )
        .bind(campaign_id.to_string())
        .bind(user_id)
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        row.map(AdminIntent::try_from).transpose()
    }

    async fn create(&self, intent: &AdminIntent) -> DrawResult<()> {
        if intent.forced_tier.is_none() && intent.forced_prize_id.is_none() {
            return Err(DrawError::ConfigViolation(
                "admin intent must force a tier or a prize".to_string(),
            ));
        }
        sqlx::query(
            r#"INSERT INTO admin_intents
               (id, campaign_id, user_id, forced_tier, forced_prize_id, expires_at, consumed, created_by, created_at)
               VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)"#,
        )
        .bind(intent.id.to_string())
        .bind(intent.campaign_id.to_string())
        .bind(&intent.user_id)
        .bind(intent.forced_tier.map(|t| t.as_str()))
        .bind(intent.forced_prize_id.map(|id| id.to_string()))
        .bind(intent.expires_at.map(|t| t.to_rfc3339()))
        .bind(&intent.created_by)
        .bind(intent.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
