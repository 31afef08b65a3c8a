//! SQLite read-side for experience state.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{UserExperienceState, UserGlobalState};
use crate::domain::ports::ExperienceRepository;

use super::campaign_repository::{parse_utc, parse_uuid};

#[derive(Clone)]
pub struct SqliteExperienceRepository {
    pool: SqlitePool,
}

impl SqliteExperienceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ExperienceRow {
    pub user_id: String,
    pub campaign_id: String,
    pub empty_streak: i64,
    pub recent_high_count: i64,
    pub anti_high_cooldown: i64,
    pub total_draws: i64,
    pub total_empties: i64,
    pub pity_trigger_count: i64,
    pub updated_at: String,
}

impl TryFrom<ExperienceRow> for UserExperienceState {
    type Error = DrawError;

    fn try_from(row: ExperienceRow) -> DrawResult<Self> {
        Ok(UserExperienceState {
            user_id: row.user_id,
            campaign_id: parse_uuid(&row.campaign_id)?,
            empty_streak: u32::try_from(row.empty_streak.max(0)).unwrap_or(0),
            recent_high_count: u32::try_from(row.recent_high_count.max(0)).unwrap_or(0),
            anti_high_cooldown: u32::try_from(row.anti_high_cooldown.max(0)).unwrap_or(0),
            total_draws: u64::try_from(row.total_draws.max(0)).unwrap_or(0),
            total_empties: u64::try_from(row.total_empties.max(0)).unwrap_or(0),
            pity_trigger_count: u32::try_from(row.pity_trigger_count.max(0)).unwrap_or(0),
            updated_at: parse_utc(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct GlobalRow {
    pub user_id: String,
    pub historical_empty_rate_ppm: i64,
    pub luck_debt_multiplier_ppm: i64,
    pub total_draws: i64,
    pub total_high_wins: i64,
    pub updated_at: String,
}

impl TryFrom<GlobalRow> for UserGlobalState {
    type Error = DrawError;

    fn try_from(row: GlobalRow) -> DrawResult<Self> {
        Ok(UserGlobalState {
            user_id: row.user_id,
            historical_empty_rate_ppm: u32::try_from(row.historical_empty_rate_ppm.max(0))
                .unwrap_or(0),
            luck_debt_multiplier_ppm: u32::try_from(row.luck_debt_multiplier_ppm.max(1_000_000))
                .unwrap_or(1_000_000),
            total_draws: u64::try_from(row.total_draws.max(0)).unwrap_or(0),
            total_high_wins: u64::try_from(row.total_high_wins.max(0)).unwrap_or(0),
            updated_at: parse_utc(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl ExperienceRepository for SqliteExperienceRepository {
    async fn get_experience(
        &self,
        user_id: &str,
        campaign_id: Uuid,
    ) -> DrawResult<Option<UserExperienceState>> {
        let row: Option<ExperienceRow> = sqlx::query_as(
            "SELECT * FROM user_experience_states WHERE user_id = ? AND campaign_id = ?",
        )
        .bind(user_id)
        .bind(campaign_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserExperienceState::try_from).transpose()
    }

    async fn get_global(&self, user_id: &str) -> DrawResult<Option<UserGlobalState>> {
        let row: Option<GlobalRow> =
            sqlx::query_as("SELECT * FROM user_global_states WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(UserGlobalState::try_from).transpose()
    }
}
