//! Campaign domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::weights::PPM;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Ended,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }
}

/// How the campaign's prize economy is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    /// No budget accounting; pressure controller stays neutral.
    Unlimited,
    /// Awards deduct prize value from `remaining_budget`, which must
    /// never go negative.
    BudgetPool,
}

impl BudgetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unlimited => "unlimited",
            Self::BudgetPool => "budget_pool",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unlimited" => Some(Self::Unlimited),
            "budget_pool" => Some(Self::BudgetPool),
            _ => None,
        }
    }
}

/// Campaign-declared guarantee: a draw that would push the empty streak
/// to `threshold_draws` is overridden to a winning outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuaranteeConfig {
    pub enabled: bool,
    pub threshold_draws: u32,
    /// Specific prize to grant; None means "highest tier with an
    /// eligible prize".
    pub guarantee_prize_id: Option<Uuid>,
}

/// A lottery activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub status: CampaignStatus,
    pub budget_mode: BudgetMode,
    /// Units: value-points.
    pub total_budget: i64,
    pub remaining_budget: i64,
    pub guarantee: GuaranteeConfig,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Accepting draws: status is `Active` and `now` falls inside the
    /// validity window.
    pub fn accepts_draws(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Active
            && self.starts_at.map_or(true, |t| now >= t)
            && self.ends_at.map_or(true, |t| now < t)
    }

    /// remaining/total as ppm; unlimited campaigns report full budget.
    pub fn budget_ratio_ppm(&self) -> u64 {
        if self.budget_mode == BudgetMode::Unlimited || self.total_budget <= 0 {
            return PPM;
        }
        let remaining = self.remaining_budget.max(0) as u128;
        let total = self.total_budget as u128;
        u64::try_from(remaining * u128::from(PPM) / total).unwrap_or(PPM)
    }

    /// Remaining budget as an award ceiling; i64::MAX when unlimited.
    pub fn spendable_budget(&self) -> i64 {
        match self.budget_mode {
            BudgetMode::Unlimited => i64::MAX,
            BudgetMode::BudgetPool => self.remaining_budget.max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn campaign(status: CampaignStatus) -> Campaign {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        Campaign {
            id: Uuid::new_v4(),
            code: "c1".into(),
            name: "Campaign".into(),
            status,
            budget_mode: BudgetMode::BudgetPool,
            total_budget: 1000,
            remaining_budget: 300,
            guarantee: GuaranteeConfig::default(),
            starts_at: None,
            ends_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_active_campaigns_accept_draws() {
        let now = Utc::now();
        assert!(campaign(CampaignStatus::Active).accepts_draws(now));
        assert!(!campaign(CampaignStatus::Paused).accepts_draws(now));
        assert!(!campaign(CampaignStatus::Ended).accepts_draws(now));
    }

    #[test]
    fn window_bounds_are_half_open() {
        let mut c = campaign(CampaignStatus::Active);
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        c.starts_at = Some(start);
        c.ends_at = Some(end);
        assert!(c.accepts_draws(start));
        assert!(!c.accepts_draws(end));
    }

    #[test]
    fn budget_ratio_in_ppm() {
        let c = campaign(CampaignStatus::Active);
        assert_eq!(c.budget_ratio_ppm(), 300_000);
        let mut u = campaign(CampaignStatus::Active);
        u.budget_mode = BudgetMode::Unlimited;
        assert_eq!(u.budget_ratio_ppm(), PPM);
    }
}
