//! In-process hourly metrics sink.
//!
//! Field-counter buckets keyed `(campaign, YYYYMMDDHH)` plus a daily
//! unique-user sketch keyed `(campaign, YYYYMMDD)`. Buckets expire
//! lazily past their retention horizon (25h hourly, 49h daily), long
//! enough for the rollup job to persist them.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::{hour_bucket, metrics::shanghai_day_bucket, DrawSample, HourlyMetric};
use crate::domain::ports::MetricsSink;

use super::hll::HyperLogLog;

const HOURLY_RETENTION_HOURS: i64 = 25;
const DAILY_RETENTION_HOURS: i64 = 49;

struct TimedBucket<T> {
    value: T,
    touched_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryMetricsSink {
    hourly: RwLock<HashMap<(Uuid, String), TimedBucket<HourlyMetric>>>,
    daily_users: RwLock<HashMap<(Uuid, String), TimedBucket<HyperLogLog>>>,
}

impl MemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep<T>(buckets: &mut HashMap<(Uuid, String), TimedBucket<T>>, horizon_hours: i64) {
        let cutoff = Utc::now() - ChronoDuration::hours(horizon_hours);
        buckets.retain(|_, b| b.touched_at > cutoff);
    }
}

#[async_trait]
impl MetricsSink for MemoryMetricsSink {
    async fn record(&self, sample: &DrawSample) -> DrawResult<()> {
        let hour_key = (sample.campaign_id, hour_bucket(sample.at));
        {
            let mut hourly = self.hourly.write().await;
            Self::sweep(&mut hourly, HOURLY_RETENTION_HOURS);
            let entry = hourly.entry(hour_key.clone()).or_insert_with(|| TimedBucket {
                value: HourlyMetric::new(sample.campaign_id, hour_key.1.clone()),
                touched_at: Utc::now(),
            });
            entry.value.absorb(sample);
            entry.touched_at = Utc::now();
        }

        let day_key = (sample.campaign_id, shanghai_day_bucket(sample.at));
        let mut daily = self.daily_users.write().await;
        Self::sweep(&mut daily, DAILY_RETENTION_HOURS);
        let entry = daily.entry(day_key).or_insert_with(|| TimedBucket {
            value: HyperLogLog::new(),
            touched_at: Utc::now(),
        });
        entry.value.insert(&sample.user_id);
        entry.touched_at = Utc::now();
        Ok(())
    }

    async fn hourly(&self, campaign_id: Uuid, bucket: &str) -> DrawResult<Option<HourlyMetric>> {
        let hourly = self.hourly.read().await;
        let mut metric = hourly.get(&(campaign_id, bucket.to_string())).map(|b| b.value.clone());
        if let Some(ref mut m) = metric {
            // Decorate with the day's sketch estimate at read time.
            if let Some(at) = parse_bucket_start(bucket) {
                let daily = self.daily_users.read().await;
                if let Some(sketch) = daily.get(&(campaign_id, shanghai_day_bucket(at))) {
                    m.unique_users = sketch.value.estimate();
                }
            }
        }
        Ok(metric)
    }

    async fn spend_in_window(
        &self,
        campaign_id: Uuid,
        now: DateTime<Utc>,
        hours: u32,
    ) -> DrawResult<i64> {
        let hourly = self.hourly.read().await;
        let mut total = 0i64;
        for offset in 0..hours {
            let at = now - ChronoDuration::hours(i64::from(offset));
            if let Some(bucket) = hourly.get(&(campaign_id, hour_bucket(at))) {
                total += bucket.value.budget_consumed;
            }
        }
        Ok(total)
    }

    async fn unique_users_on_day(
        &self,
        campaign_id: Uuid,
        now: DateTime<Utc>,
    ) -> DrawResult<u64> {
        let daily = self.daily_users.read().await;
        Ok(daily
            .get(&(campaign_id, shanghai_day_bucket(now)))
            .map_or(0, |b| b.value.estimate()))
    }
}

/// First instant of an hourly bucket key, if well-formed.
fn parse_bucket_start(bucket: &str) -> Option<DateTime<Utc>> {
    let naive = chrono::NaiveDateTime::parse_from_str(&format!("{bucket}0000"), "%Y%m%d%H%M%S").ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BudgetTier, PrizeTier};

    fn sample(campaign: Uuid, user: &str, at: DateTime<Utc>) -> DrawSample {
        DrawSample {
            campaign_id: campaign,
            user_id: user.to_string(),
            at,
            tier: PrizeTier::Low,
            budget_tier: BudgetTier::B2,
            corrections_triggered: vec!["anti_empty".into()],
            cost_points: 100,
            prize_value: 20,
        }
    }

    #[tokio::test]
    async fn record_accumulates_per_hour() {
        let sink = MemoryMetricsSink::new();
        let campaign = Uuid::new_v4();
        let at = Utc::now();
        sink.record(&sample(campaign, "u1", at)).await.unwrap();
        sink.record(&sample(campaign, "u2", at)).await.unwrap();

        let metric = sink.hourly(campaign, &hour_bucket(at)).await.unwrap().unwrap();
        assert_eq!(metric.total_draws, 2);
        assert_eq!(metric.tier_counts["low"], 2);
        assert_eq!(metric.correction_counts["anti_empty"], 2);
        assert_eq!(metric.budget_consumed, 40);
        assert_eq!(metric.unique_users, 2);
    }

    #[tokio::test]
    async fn unique_users_dedupe_within_day() {
        let sink = MemoryMetricsSink::new();
        let campaign = Uuid::new_v4();
        let at = Utc::now();
        for _ in 0..5 {
            sink.record(&sample(campaign, "u1", at)).await.unwrap();
        }
        assert_eq!(sink.unique_users_on_day(campaign, at).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn spend_window_sums_trailing_buckets() {
        let sink = MemoryMetricsSink::new();
        let campaign = Uuid::new_v4();
        let now = Utc::now();
        sink.record(&sample(campaign, "u1", now)).await.unwrap();
        sink.record(&sample(campaign, "u1", now - ChronoDuration::hours(1))).await.unwrap();
        sink.record(&sample(campaign, "u1", now - ChronoDuration::hours(10))).await.unwrap();

        assert_eq!(sink.spend_in_window(campaign, now, 2).await.unwrap(), 40);
        assert_eq!(sink.spend_in_window(campaign, now, 24).await.unwrap(), 60);
    }
}
