//! Admin intent repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::AdminIntent;

#[async_trait]
pub trait AdminIntentRepository: Send + Sync {
    /// Oldest usable (unconsumed, unexpired) intent for the pair.
    async fn find_usable(
        &self,
        campaign_id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DrawResult<Option<AdminIntent>>;

    async fn create(&self, intent: &AdminIntent) -> DrawResult<()>;
}
