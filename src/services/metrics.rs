//! Metrics aggregation.
//!
//! Thin service over the hot-tier sink: folds committed decisions in
//! after the transaction commits, answers operator queries, and runs
//! the hourly rollup that persists hot buckets into the long-term
//! store before their TTL lapses.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::adapters::sqlite::SqliteMetricsStore;
use crate::domain::errors::DrawResult;
use crate::domain::models::{hour_bucket, DrawSample, HourlyMetric};
use crate::domain::ports::MetricsSink;

pub struct MetricsAggregator {
    sink: Arc<dyn MetricsSink>,
    /// Long-term store; None when running without one (tests).
    store: Option<SqliteMetricsStore>,
}

impl MetricsAggregator {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink, store: None }
    }

    pub fn with_store(sink: Arc<dyn MetricsSink>, store: SqliteMetricsStore) -> Self {
        Self { sink, store: Some(store) }
    }

    /// Fold committed samples in. Failures are logged, never surfaced:
    /// metrics loss must not fail a committed draw.
    pub async fn record_all(&self, samples: &[DrawSample]) {
        for sample in samples {
            if let Err(err) = self.sink.record(sample).await {
                warn!(error = %err, campaign = %sample.campaign_id, "metrics record failed");
            }
        }
    }

    pub async fn hourly(
        &self,
        campaign_id: Uuid,
        bucket: &str,
    ) -> DrawResult<Option<HourlyMetric>> {
        match self.sink.hourly(campaign_id, bucket).await? {
            Some(metric) => Ok(Some(metric)),
            None => match &self.store {
                Some(store) => store.get(campaign_id, bucket).await,
                None => Ok(None),
            },
        }
    }

    /// Persist the trailing hot buckets of a campaign into the
    /// long-term store. Idempotent per bucket; run at least hourly.
    pub async fn rollup(
        &self,
        campaign_id: Uuid,
        now: DateTime<Utc>,
        trailing_hours: u32,
    ) -> DrawResult<u32> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let mut persisted = 0;
        for offset in 0..trailing_hours {
            let at = now - ChronoDuration::hours(i64::from(offset));
            let bucket = hour_bucket(at);
            if let Some(metric) = self.sink.hourly(campaign_id, &bucket).await? {
                store.persist(&metric).await?;
                persisted += 1;
            }
        }
        Ok(persisted)
    }

    /// History straight from the long-term store (operator listings).
    pub async fn history(
        &self,
        campaign_id: Uuid,
        limit: u32,
    ) -> DrawResult<Vec<HourlyMetric>> {
        match &self.store {
            Some(store) => store.list_for_campaign(campaign_id, limit).await,
            None => Ok(Vec::new()),
        }
    }
}
