//! Draw record repository port (read side).

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::{DrawDecision, DrawRecord};

#[async_trait]
pub trait DrawRepository: Send + Sync {
    /// Draws a user committed on a campaign during one Shanghai day.
    async fn count_user_draws_on_day(
        &self,
        campaign_id: Uuid,
        user_id: &str,
        day: NaiveDate,
    ) -> DrawResult<u32>;

    /// Times a prize was awarded during one Shanghai day (per-day cap
    /// gate).
    async fn count_prize_awards_on_day(&self, prize_id: Uuid, day: NaiveDate) -> DrawResult<u32>;

    /// All records committed under one idempotency key (a ten-draw has
    /// ten), ordered by creation.
    async fn records_for_key(&self, idempotency_key: &str) -> DrawResult<Vec<DrawRecord>>;

    async fn decision_for_draw(&self, draw_id: Uuid) -> DrawResult<Option<DrawDecision>>;
}
