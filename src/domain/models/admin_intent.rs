//! Operator-forced outcomes.
//!
//! An admin intent pins the next draw of a (campaign, user) pair to a
//! tier or a specific prize. It rides the normal correction path with
//! the highest priority, so the forced outcome is fully auditable
//! through the same decision trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prize::PrizeTier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminIntent {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub user_id: String,
    /// Tier to force; ignored when a specific prize is set.
    pub forced_tier: Option<PrizeTier>,
    pub forced_prize_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Set in the same transaction as the draw that honored it.
    pub consumed: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl AdminIntent {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && self.expires_at.map_or(true, |t| now < t)
    }
}
