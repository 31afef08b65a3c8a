//! Issue outbox worker.
//!
//! Drains deferred prize issuances with at-least-once semantics. Each
//! entry's idempotency key makes redelivery safe; transient failures
//! retry in-pass with exponential backoff, persistent ones reschedule
//! with a growing delay until the attempt budget flips them to dead.

use backoff::ExponentialBackoffBuilder;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::IssueOutboxEntry;
use crate::domain::ports::{AssetService, Clock, OutboxRepository};

use super::config::OutboxConfig;

pub struct IssueOutboxWorker {
    outbox: Arc<dyn OutboxRepository>,
    assets: Arc<dyn AssetService>,
    clock: Arc<dyn Clock>,
    config: OutboxConfig,
}

/// Result of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: u32,
    pub rescheduled: u32,
    pub dead: u32,
}

impl IssueOutboxWorker {
    pub fn new(
        outbox: Arc<dyn OutboxRepository>,
        assets: Arc<dyn AssetService>,
        clock: Arc<dyn Clock>,
        config: OutboxConfig,
    ) -> Self {
        Self { outbox, assets, clock, config }
    }

    /// One pass over the due entries.
    pub async fn drain_once(&self) -> DrawResult<DrainReport> {
        let now = self.clock.now();
        let due = self.outbox.due(now, self.config.batch_size).await?;
        let mut report = DrainReport::default();

        for entry in due {
            match self.deliver(&entry).await {
                Ok(()) => {
                    self.outbox.mark_delivered(entry.id).await?;
                    info!(draw = %entry.draw_id, prize = %entry.prize_id, "deferred issue delivered");
                    report.delivered += 1;
                }
                Err(err) => {
                    let attempts = entry.attempts + 1;
                    let dead = attempts >= self.config.max_attempts;
                    let next = self.next_attempt_at(now, attempts);
                    self.outbox.record_failure(entry.id, &err.to_string(), next, dead).await?;
                    if dead {
                        warn!(draw = %entry.draw_id, attempts, "issue outbox entry dead");
                        report.dead += 1;
                    } else {
                        report.rescheduled += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    /// Run forever with the given poll interval.
    pub async fn run(&self, poll_interval: Duration) -> DrawResult<()> {
        loop {
            if let Err(err) = self.drain_once().await {
                warn!(error = %err, "outbox drain pass failed");
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// In-pass delivery with short exponential backoff for transient
    /// asset-service blips.
    async fn deliver(&self, entry: &IssueOutboxEntry) -> DrawResult<()> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_interval(Duration::from_millis(500))
            .with_max_elapsed_time(Some(Duration::from_secs(1)))
            .build();

        backoff::future::retry(policy, || async {
            match self
                .assets
                .issue(&entry.user_id, &entry.item_ref, &entry.idempotency_key)
                .await
            {
                Ok(_) => Ok(()),
                Err(err @ DrawError::TransientStore(_)) => Err(backoff::Error::transient(err)),
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        })
        .await
    }

    /// Cross-pass schedule: base * 2^attempts, capped.
    fn next_attempt_at(&self, now: DateTime<Utc>, attempts: u32) -> DateTime<Utc> {
        let base = self.config.base_backoff_secs.max(1);
        let shift = attempts.min(16);
        let delay = base.saturating_mul(1u64 << shift).min(self.config.max_backoff_secs);
        now + ChronoDuration::seconds(i64::try_from(delay).unwrap_or(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::MemoryAssetService;
    use crate::domain::models::OutboxStatus;
    use crate::domain::ports::SystemClock;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct FakeOutbox {
        entries: Mutex<Vec<IssueOutboxEntry>>,
    }

    #[async_trait]
    impl OutboxRepository for FakeOutbox {
        async fn due(&self, now: DateTime<Utc>, limit: u32) -> DrawResult<Vec<IssueOutboxEntry>> {
            let entries = self.entries.lock().unwrap();
            Ok(entries
                .iter()
                .filter(|e| e.status == OutboxStatus::Pending && e.next_attempt_at <= now)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn mark_delivered(&self, id: Uuid) -> DrawResult<()> {
            let mut entries = self.entries.lock().unwrap();
            if let Some(e) = entries.iter_mut().find(|e| e.id == id) {
                e.status = OutboxStatus::Delivered;
            }
            Ok(())
        }

        async fn record_failure(
            &self,
            id: Uuid,
            error: &str,
            next_attempt_at: DateTime<Utc>,
            dead: bool,
        ) -> DrawResult<()> {
            let mut entries = self.entries.lock().unwrap();
            if let Some(e) = entries.iter_mut().find(|e| e.id == id) {
                e.attempts += 1;
                e.last_error = Some(error.to_string());
                e.next_attempt_at = next_attempt_at;
                e.status = if dead { OutboxStatus::Dead } else { OutboxStatus::Pending };
            }
            Ok(())
        }

        async fn list(
            &self,
            _status: Option<OutboxStatus>,
            _limit: u32,
        ) -> DrawResult<Vec<IssueOutboxEntry>> {
            Ok(self.entries.lock().unwrap().clone())
        }
    }

    fn entry() -> IssueOutboxEntry {
        IssueOutboxEntry {
            id: Uuid::new_v4(),
            draw_id: Uuid::new_v4(),
            user_id: "u1".into(),
            prize_id: Uuid::new_v4(),
            item_ref: "prize:x".into(),
            idempotency_key: "r1:issue".into(),
            attempts: 0,
            next_attempt_at: Utc::now() - ChronoDuration::minutes(1),
            status: OutboxStatus::Pending,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn drain_delivers_due_entries() {
        let outbox = Arc::new(FakeOutbox { entries: Mutex::new(vec![entry()]) });
        let assets = Arc::new(MemoryAssetService::new());
        let worker = IssueOutboxWorker::new(
            Arc::clone(&outbox) as _,
            Arc::clone(&assets) as _,
            Arc::new(SystemClock),
            OutboxConfig::default(),
        );

        let report = worker.drain_once().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(assets.issue_count().await, 1);
    }

    #[tokio::test]
    async fn failing_issue_reschedules_then_dies() {
        let outbox = Arc::new(FakeOutbox { entries: Mutex::new(vec![entry()]) });
        let assets = Arc::new(MemoryAssetService::new());
        assets.set_fail_issues(true);
        let config = OutboxConfig { max_attempts: 2, base_backoff_secs: 0, ..OutboxConfig::default() };
        let worker = IssueOutboxWorker::new(
            Arc::clone(&outbox) as _,
            Arc::clone(&assets) as _,
            Arc::new(SystemClock),
            config,
        );

        let first = worker.drain_once().await.unwrap();
        assert_eq!(first.rescheduled, 1);

        let second = worker.drain_once().await.unwrap();
        assert_eq!(second.dead, 1);

        let entries = outbox.list(None, 10).await.unwrap();
        assert_eq!(entries[0].status, OutboxStatus::Dead);
        assert_eq!(entries[0].attempts, 2);
    }

    #[tokio::test]
    async fn redelivery_is_idempotent() {
        let e = entry();
        let outbox = Arc::new(FakeOutbox { entries: Mutex::new(vec![e.clone()]) });
        let assets = Arc::new(MemoryAssetService::new());
        // Simulate the in-line attempt having landed before the defer.
        assets.issue(&e.user_id, &e.item_ref, &e.idempotency_key).await.unwrap();

        let worker = IssueOutboxWorker::new(
            Arc::clone(&outbox) as _,
            Arc::clone(&assets) as _,
            Arc::new(SystemClock),
            OutboxConfig::default(),
        );
        worker.drain_once().await.unwrap();
        assert_eq!(assets.issue_count().await, 1);
    }
}
