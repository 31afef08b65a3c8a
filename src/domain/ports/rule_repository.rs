//! Tier-rule and quota-rule repository ports.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::{QuotaRule, TierRule};

#[async_trait]
pub trait TierRuleRepository: Send + Sync {
    /// All rules of a campaign; segment filtering happens in the
    /// domain (`tier_rule::base_weights`).
    async fn list_for_campaign(&self, campaign_id: Uuid) -> DrawResult<Vec<TierRule>>;

    async fn upsert(&self, rule: &TierRule) -> DrawResult<()>;
}

#[async_trait]
pub trait QuotaRuleRepository: Send + Sync {
    /// Every rule that could match a draw on this campaign (global,
    /// campaign-scoped, and the user's own rules). Role-scoped rules
    /// are included wholesale; matching happens in the domain.
    async fn list_candidates(&self, campaign_id: Uuid, user_id: &str)
        -> DrawResult<Vec<QuotaRule>>;

    async fn upsert(&self, rule: &QuotaRule) -> DrawResult<()>;

    async fn list_all(&self) -> DrawResult<Vec<QuotaRule>>;
}
