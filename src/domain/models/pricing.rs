//! Versioned pricing configuration.
//!
//! Each campaign carries a monotonic sequence of pricing versions; at
//! most one is active at a time. Activation archives the previous
//! active version atomically, rollback creates a fresh version copied
//! from the target and activates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::draw::DrawType;
use super::weights::PPM;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStatus {
    Draft,
    Scheduled,
    Active,
    Archived,
}

impl PricingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "scheduled" => Some(Self::Scheduled),
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// The priced operations of a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingMap {
    /// Cost of one single draw, in points.
    pub single_cost: i64,
    /// Explicit cost of a ten-draw. Zero means "derive from
    /// `single_cost * 10` with the discount applied".
    #[serde(default)]
    pub multi_10_cost: i64,
    /// Discount applied when deriving the ten-draw cost, in ppm.
    #[serde(default)]
    pub multi_10_discount_ppm: u64,
    /// Forward-compatible extension fields carried verbatim.
    #[serde(default)]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl PricingMap {
    /// Total cost of a draw request.
    pub fn cost_for(&self, draw_type: DrawType) -> i64 {
        match draw_type {
            DrawType::Single => self.single_cost,
            DrawType::Multi10 => {
                if self.multi_10_cost > 0 {
                    self.multi_10_cost
                } else {
                    let gross = self.single_cost.saturating_mul(10);
                    let discount_ppm = self.multi_10_discount_ppm.min(PPM);
                    let kept = u128::from(PPM - discount_ppm);
                    i64::try_from(gross.max(0) as u128 * kept / u128::from(PPM))
                        .unwrap_or(i64::MAX)
                }
            }
        }
    }
}

/// One version of a campaign's pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub id: Uuid,
    pub campaign_id: Uuid,
    /// Monotonic per campaign, assigned by the store on insert.
    pub version: i64,
    pub pricing: PricingMap,
    pub status: PricingStatus,
    /// Required (and future) when status is `Scheduled`.
    pub effective_at: Option<DateTime<Utc>>,
    /// Set when the version is archived.
    pub expired_at: Option<DateTime<Utc>>,
    /// Audit author.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_multi_cost_wins() {
        let map = PricingMap {
            single_cost: 100,
            multi_10_cost: 900,
            multi_10_discount_ppm: 0,
            extras: BTreeMap::new(),
        };
        assert_eq!(map.cost_for(DrawType::Single), 100);
        assert_eq!(map.cost_for(DrawType::Multi10), 900);
    }

    #[test]
    fn derived_multi_cost_applies_discount() {
        let map = PricingMap {
            single_cost: 100,
            multi_10_cost: 0,
            multi_10_discount_ppm: 100_000, // 10% off
            extras: BTreeMap::new(),
        };
        assert_eq!(map.cost_for(DrawType::Multi10), 900);
    }
}
