//! Prize domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse quality class of a prize. `Fallback` is the non-empty
/// consolation tier; every active campaign must keep at least one active
/// fallback prize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrizeTier {
    High,
    Mid,
    Low,
    Fallback,
}

impl PrizeTier {
    /// Canonical order, best first. Also the demotion order.
    pub const ALL: [Self; 4] = [Self::High, Self::Mid, Self::Low, Self::Fallback];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Mid => "mid",
            Self::Low => "low",
            Self::Fallback => "fallback",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "mid" => Some(Self::Mid),
            "low" => Some(Self::Low),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }

    /// Next tier down when a tier has no eligible prize left.
    pub fn demoted(&self) -> Option<Self> {
        match self {
            Self::High => Some(Self::Mid),
            Self::Mid => Some(Self::Low),
            Self::Low => Some(Self::Fallback),
            Self::Fallback => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrizeStatus {
    Active,
    Disabled,
}

impl PrizeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// A prize configured on a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prize {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub name: String,
    pub tier: PrizeTier,
    /// Relative selection weight within the tier. Zero means "never
    /// sampled" but still a valid configuration.
    pub win_weight: u32,
    /// Economic value in value-points; deducted from a budget-pool
    /// campaign's remaining budget on award.
    pub value_points: i64,
    /// None = infinite stock.
    pub stock_quantity: Option<i64>,
    /// Max awards per Asia/Shanghai calendar day. None = uncapped.
    pub daily_cap: Option<u32>,
    pub status: PrizeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prize {
    /// Stock gate only; daily caps and budget need external context.
    pub fn has_stock(&self) -> bool {
        self.stock_quantity.map_or(true, |s| s > 0)
    }

    pub fn is_active(&self) -> bool {
        self.status == PrizeStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotion_chain_bottoms_out_at_fallback() {
        let mut tier = PrizeTier::High;
        let mut hops = 0;
        while let Some(next) = tier.demoted() {
            tier = next;
            hops += 1;
        }
        assert_eq!(tier, PrizeTier::Fallback);
        assert_eq!(hops, 3);
    }

    #[test]
    fn tier_round_trips_through_str() {
        for tier in PrizeTier::ALL {
            assert_eq!(PrizeTier::from_str(tier.as_str()), Some(tier));
        }
    }
}
