//! Per-user experiential state.
//!
//! `UserExperienceState` is scoped per (user, campaign) and drives the
//! streak-based corrections. `UserGlobalState` spans campaigns and
//! carries the slow luck-debt signal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::weights::PPM;

/// Streak counters for one user on one campaign. All counters are
/// non-negative by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserExperienceState {
    pub user_id: String,
    pub campaign_id: Uuid,
    /// Consecutive fallback-tier outcomes.
    pub empty_streak: u32,
    /// Consecutive high-tier outcomes; reset by any non-high tier.
    pub recent_high_count: u32,
    /// Rounds remaining with the high-tier weight dampened.
    pub anti_high_cooldown: u32,
    pub total_draws: u64,
    pub total_empties: u64,
    pub pity_trigger_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl UserExperienceState {
    /// Zeroed state for a user's first draw on a campaign.
    pub fn fresh(user_id: impl Into<String>, campaign_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            campaign_id,
            empty_streak: 0,
            recent_high_count: 0,
            anti_high_cooldown: 0,
            total_draws: 0,
            total_empties: 0,
            pity_trigger_count: 0,
            updated_at: now,
        }
    }
}

/// Cross-campaign state for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGlobalState {
    pub user_id: String,
    /// EMA of empty outcomes, in ppm (1_000_000 = always empty).
    pub historical_empty_rate_ppm: u32,
    /// High-tier weight multiplier, >= 1_000_000 ppm.
    pub luck_debt_multiplier_ppm: u32,
    pub total_draws: u64,
    pub total_high_wins: u64,
    pub updated_at: DateTime<Utc>,
}

impl UserGlobalState {
    pub fn fresh(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            historical_empty_rate_ppm: 0,
            luck_debt_multiplier_ppm: PPM as u32,
            total_draws: 0,
            total_high_wins: 0,
            updated_at: now,
        }
    }
}
