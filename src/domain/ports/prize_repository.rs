//! Prize repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::Prize;

#[async_trait]
pub trait PrizeRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> DrawResult<Option<Prize>>;

    /// All prizes of a campaign, active or not, ordered by id for
    /// deterministic iteration.
    async fn list_by_campaign(&self, campaign_id: Uuid) -> DrawResult<Vec<Prize>>;

    /// Insert or replace. Refuses (`ConfigViolation`) to disable or
    /// retier the last active fallback prize of an active campaign.
    async fn upsert(&self, prize: &Prize) -> DrawResult<()>;

    /// Count of active fallback prizes, used by config validation.
    async fn count_active_fallback(&self, campaign_id: Uuid) -> DrawResult<u32>;
}
