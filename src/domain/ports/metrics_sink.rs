//! Metrics sink port.
//!
//! The hot tier for hourly counters and the unique-user sketch. Writes
//! happen after the draw transaction commits; losing this tier never
//! threatens draw correctness.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::{DrawSample, HourlyMetric};

#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Fold one committed draw into the hourly bucket and the daily
    /// unique-user sketch.
    async fn record(&self, sample: &DrawSample) -> DrawResult<()>;

    /// Read one campaign-hour bucket.
    async fn hourly(&self, campaign_id: Uuid, bucket: &str) -> DrawResult<Option<HourlyMetric>>;

    /// Budget consumed across the trailing `hours` whole-hour buckets
    /// ending at `now`'s bucket. Feeds the pressure controller.
    async fn spend_in_window(
        &self,
        campaign_id: Uuid,
        now: DateTime<Utc>,
        hours: u32,
    ) -> DrawResult<i64>;

    /// Estimated distinct users for the Shanghai day containing `now`.
    async fn unique_users_on_day(&self, campaign_id: Uuid, now: DateTime<Utc>) -> DrawResult<u64>;
}
