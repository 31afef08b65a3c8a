//! Committed draw records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prize::PrizeTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawType {
    Single,
    Multi10,
}

impl DrawType {
    /// How many sub-draws this request resolves to.
    pub const fn count(&self) -> u32 {
        match self {
            Self::Single => 1,
            Self::Multi10 => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multi10 => "multi10",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "single" => Some(Self::Single),
            "multi10" | "multi" => Some(Self::Multi10),
            _ => None,
        }
    }
}

/// One committed draw. `prize_id` is None for analytical empties
/// (fallback-exhaustion outcomes); the tier is still recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawRecord {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub user_id: String,
    pub draw_type: DrawType,
    /// Points charged for the request this record belongs to. For a
    /// ten-draw the full cost is carried by the first record, the rest
    /// carry zero, so per-campaign cost sums stay exact.
    pub cost_points: i64,
    pub reward_tier: PrizeTier,
    pub prize_id: Option<Uuid>,
    pub prize_value_points: i64,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}
