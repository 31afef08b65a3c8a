//! Campaign repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::{Campaign, CampaignStatus};

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> DrawResult<Option<Campaign>>;

    async fn list(&self, status: Option<CampaignStatus>) -> DrawResult<Vec<Campaign>>;

    /// Insert or fully replace a campaign row.
    async fn upsert(&self, campaign: &Campaign) -> DrawResult<()>;

    /// Admin budget adjustment: set total and remaining together.
    /// Fails with `ConfigViolation` if remaining would exceed total or
    /// go negative.
    async fn update_budget(&self, id: Uuid, total: i64, remaining: i64) -> DrawResult<()>;
}
