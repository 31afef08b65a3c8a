//! Metric buckets and business-day time helpers.
//!
//! Timestamps are stored UTC; business-day boundaries (daily quotas,
//! per-prize caps, unique-user sketches) use Asia/Shanghai, a fixed
//! +08:00 offset with no DST.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::decision::BudgetTier;
use super::prize::PrizeTier;

/// Asia/Shanghai offset in seconds east of UTC.
const SHANGHAI_OFFSET_SECS: i32 = 8 * 3600;

fn shanghai() -> FixedOffset {
    // +08:00 always fits the FixedOffset range.
    FixedOffset::east_opt(SHANGHAI_OFFSET_SECS).expect("+08:00 is a valid offset")
}

/// Hour bucket key `YYYYMMDDHH`, UTC.
pub fn hour_bucket(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H").to_string()
}

/// The Asia/Shanghai calendar day containing `at`.
pub fn shanghai_day(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&shanghai()).date_naive()
}

/// Shanghai day bucket key `YYYYMMDD`.
pub fn shanghai_day_bucket(at: DateTime<Utc>) -> String {
    shanghai_day(at).format("%Y%m%d").to_string()
}

/// One decision flattened for ingestion by the metrics sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawSample {
    pub campaign_id: Uuid,
    pub user_id: String,
    pub at: DateTime<Utc>,
    pub tier: PrizeTier,
    pub budget_tier: BudgetTier,
    /// Modules that fired (`pity`, `anti_empty`, ...).
    pub corrections_triggered: Vec<String>,
    /// Points charged (first record of a multi-draw carries the total).
    pub cost_points: i64,
    /// Value of the awarded prize; zero for empties.
    pub prize_value: i64,
}

/// Aggregated counters for one campaign-hour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HourlyMetric {
    pub campaign_id: Uuid,
    pub bucket: String,
    pub total_draws: u64,
    /// Keyed by tier name.
    pub tier_counts: BTreeMap<String, u64>,
    /// Keyed by budget tier name.
    pub budget_tier_counts: BTreeMap<String, u64>,
    /// Keyed by correction module name.
    pub correction_counts: BTreeMap<String, u64>,
    /// Prize value deducted from campaign budgets this hour.
    pub budget_consumed: i64,
    /// Total prize value granted this hour.
    pub prize_value: i64,
    /// Estimated distinct users this Shanghai day (sketch-derived).
    pub unique_users: u64,
}

impl HourlyMetric {
    pub fn new(campaign_id: Uuid, bucket: impl Into<String>) -> Self {
        Self { campaign_id, bucket: bucket.into(), ..Self::default() }
    }

    /// Fold one sample into the counters.
    pub fn absorb(&mut self, sample: &DrawSample) {
        self.total_draws += 1;
        *self.tier_counts.entry(sample.tier.as_str().to_string()).or_default() += 1;
        *self
            .budget_tier_counts
            .entry(sample.budget_tier.as_str().to_string())
            .or_default() += 1;
        for module in &sample.corrections_triggered {
            *self.correction_counts.entry(module.clone()).or_default() += 1;
        }
        self.budget_consumed += sample.prize_value;
        self.prize_value += sample.prize_value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hour_bucket_is_utc() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 0).unwrap();
        assert_eq!(hour_bucket(at), "2025030923");
    }

    #[test]
    fn shanghai_day_rolls_at_16_utc() {
        // 15:59 UTC is 23:59 in Shanghai; 16:00 UTC is next day 00:00.
        let before = Utc.with_ymd_and_hms(2025, 3, 9, 15, 59, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 3, 9, 16, 0, 0).unwrap();
        assert_eq!(shanghai_day_bucket(before), "20250309");
        assert_eq!(shanghai_day_bucket(after), "20250310");
    }

    #[test]
    fn absorb_counts_tiers_and_corrections() {
        let mut m = HourlyMetric::new(Uuid::nil(), "2025030910");
        let sample = DrawSample {
            campaign_id: Uuid::nil(),
            user_id: "u1".into(),
            at: Utc::now(),
            tier: PrizeTier::High,
            budget_tier: BudgetTier::B3,
            corrections_triggered: vec!["pity".into()],
            cost_points: 100,
            prize_value: 500,
        };
        m.absorb(&sample);
        m.absorb(&sample);
        assert_eq!(m.total_draws, 2);
        assert_eq!(m.tier_counts["high"], 2);
        assert_eq!(m.correction_counts["pity"], 2);
        assert_eq!(m.budget_consumed, 1000);
    }
}
