//! Budget pressure controller.
//!
//! Classifies each campaign into a `(budget_tier, pressure_tier)` cell
//! and hands the pipeline a frozen [`PressureCell`]. Budget tier comes
//! from the remaining/total ratio; pressure tier from the actual spend
//! rate over a trailing metrics window against the expected rate for
//! the campaign's horizon. Snapshots are cached with bounded staleness;
//! a stale cell can only skew weights, never correctness.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::{BudgetMode, BudgetTier, Campaign, PressureTier, PPM};
use crate::domain::ports::{Clock, MetricsSink};

use super::config::PressureConfig;

/// Frozen classification handed down through one draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressureCell {
    pub budget_tier: BudgetTier,
    pub pressure_tier: PressureTier,
    /// Scales the fallback tier's base weight during selection.
    pub empty_weight_multiplier_ppm: u64,
    /// Ceiling on composed correction multipliers.
    pub cap_multiplier_ppm: u64,
}

impl PressureCell {
    /// Cell for campaigns with no budget accounting.
    pub fn neutral() -> Self {
        Self {
            budget_tier: BudgetTier::B3,
            pressure_tier: PressureTier::P0,
            empty_weight_multiplier_ppm: PPM,
            cap_multiplier_ppm: 3_000_000,
        }
    }
}

struct CachedCell {
    cell: PressureCell,
    refreshed_at: DateTime<Utc>,
}

pub struct BudgetPressureController {
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    config: PressureConfig,
    cache: RwLock<HashMap<Uuid, CachedCell>>,
}

impl BudgetPressureController {
    pub fn new(metrics: Arc<dyn MetricsSink>, clock: Arc<dyn Clock>, config: PressureConfig) -> Self {
        Self { metrics, clock, config, cache: RwLock::new(HashMap::new()) }
    }

    /// Current cell for a campaign, served from cache within the
    /// staleness bound.
    pub async fn snapshot(&self, campaign: &Campaign) -> DrawResult<PressureCell> {
        if campaign.budget_mode == BudgetMode::Unlimited {
            return Ok(PressureCell::neutral());
        }

        let now = self.clock.now();
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&campaign.id) {
                let age = now.signed_duration_since(cached.refreshed_at);
                if age.num_seconds() >= 0
                    && (age.num_seconds() as u64) < self.config.snapshot_staleness_secs
                {
                    return Ok(cached.cell);
                }
            }
        }

        let cell = self.classify(campaign, now).await?;
        let mut cache = self.cache.write().await;
        cache.insert(campaign.id, CachedCell { cell, refreshed_at: now });
        Ok(cell)
    }

    async fn classify(&self, campaign: &Campaign, now: DateTime<Utc>) -> DrawResult<PressureCell> {
        let budget_tier = BudgetTier::from_ratio_ppm(campaign.budget_ratio_ppm());

        let actual_spend = self
            .metrics
            .spend_in_window(campaign.id, now, self.config.spend_window_hours)
            .await?;
        let expected_spend = self.expected_spend(campaign);
        let pressure_tier = if expected_spend <= 0 {
            PressureTier::P0
        } else {
            let ratio_ppm = u64::try_from(
                i128::from(actual_spend.max(0)) * i128::from(PPM) / i128::from(expected_spend),
            )
            .unwrap_or(u64::MAX);
            PressureTier::from_ratio_ppm(ratio_ppm)
        };

        Ok(self.cell_for(budget_tier, pressure_tier))
    }

    /// Expected spend for the trailing window: total budget spread
    /// evenly over the campaign horizon.
    fn expected_spend(&self, campaign: &Campaign) -> i64 {
        let horizon_hours = match (campaign.starts_at, campaign.ends_at) {
            (Some(start), Some(end)) if end > start => {
                let hours = (end - start).num_hours();
                u32::try_from(hours.max(1)).unwrap_or(u32::MAX)
            }
            _ => self.config.default_horizon_hours.max(1),
        };
        let window = i64::from(self.config.spend_window_hours.max(1));
        campaign.total_budget / i64::from(horizon_hours) * window
    }

    fn cell_for(&self, budget_tier: BudgetTier, pressure_tier: PressureTier) -> PressureCell {
        self.config
            .matrix
            .iter()
            .find(|c| c.budget_tier == budget_tier && c.pressure_tier == pressure_tier)
            .map_or_else(
                || PressureCell {
                    budget_tier,
                    pressure_tier,
                    ..PressureCell::neutral()
                },
                |c| PressureCell {
                    budget_tier,
                    pressure_tier,
                    empty_weight_multiplier_ppm: c.empty_weight_multiplier_ppm,
                    cap_multiplier_ppm: c.cap_multiplier_ppm,
                },
            )
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::MemoryMetricsSink;
    use crate::domain::models::{
        BudgetTier, CampaignStatus, DrawSample, GuaranteeConfig, PrizeTier,
    };
    use crate::domain::ports::FixedClock;
    use chrono::TimeZone;

    fn campaign(total: i64, remaining: i64) -> Campaign {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        Campaign {
            id: Uuid::new_v4(),
            code: "c".into(),
            name: "c".into(),
            status: CampaignStatus::Active,
            budget_mode: BudgetMode::BudgetPool,
            total_budget: total,
            remaining_budget: remaining,
            guarantee: GuaranteeConfig::default(),
            starts_at: Some(now - chrono::Duration::hours(50)),
            ends_at: Some(now + chrono::Duration::hours(50)),
            created_at: now,
            updated_at: now,
        }
    }

    fn controller(
        metrics: Arc<MemoryMetricsSink>,
        clock: Arc<FixedClock>,
    ) -> BudgetPressureController {
        BudgetPressureController::new(metrics, clock, PressureConfig::default())
    }

    #[tokio::test]
    async fn unlimited_campaigns_are_neutral() {
        let metrics = Arc::new(MemoryMetricsSink::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let ctrl = controller(metrics, clock);
        let mut c = campaign(0, 0);
        c.budget_mode = BudgetMode::Unlimited;
        let cell = ctrl.snapshot(&c).await.unwrap();
        assert_eq!(cell, PressureCell::neutral());
    }

    #[tokio::test]
    async fn healthy_budget_quiet_spend_is_b3_p0() {
        let metrics = Arc::new(MemoryMetricsSink::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let ctrl = controller(metrics, clock);
        let cell = ctrl.snapshot(&campaign(100_000, 90_000)).await.unwrap();
        assert_eq!(cell.budget_tier, BudgetTier::B3);
        assert_eq!(cell.pressure_tier, PressureTier::P0);
    }

    #[tokio::test]
    async fn hot_spend_raises_pressure_tier() {
        let metrics = Arc::new(MemoryMetricsSink::new());
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap();
        let clock = Arc::new(FixedClock::new(now));
        // Expected hourly spend for a 100h x 100_000 budget is 1000;
        // record 5000 actual in the current hour.
        for i in 0..5 {
            metrics
                .record(&DrawSample {
                    campaign_id: Uuid::nil(),
                    user_id: format!("u{i}"),
                    at: now,
                    tier: PrizeTier::High,
                    budget_tier: BudgetTier::B3,
                    corrections_triggered: vec![],
                    cost_points: 0,
                    prize_value: 1000,
                })
                .await
                .unwrap();
        }
        let mut c = campaign(100_000, 80_000);
        c.id = Uuid::nil();
        let ctrl = controller(metrics, clock);
        let cell = ctrl.snapshot(&c).await.unwrap();
        assert_eq!(cell.pressure_tier, PressureTier::P2);
    }

    #[tokio::test]
    async fn snapshot_is_cached_within_staleness() {
        let metrics = Arc::new(MemoryMetricsSink::new());
        let now = Utc::now();
        let clock = Arc::new(FixedClock::new(now));
        let ctrl = controller(metrics, Arc::clone(&clock));

        let mut c = campaign(100_000, 90_000);
        let first = ctrl.snapshot(&c).await.unwrap();
        // Budget drained, but the cached cell is still served.
        c.remaining_budget = 1_000;
        let cached = ctrl.snapshot(&c).await.unwrap();
        assert_eq!(first, cached);

        clock.advance(chrono::Duration::seconds(120));
        let refreshed = ctrl.snapshot(&c).await.unwrap();
        assert_eq!(refreshed.budget_tier, BudgetTier::B0);
    }
}
