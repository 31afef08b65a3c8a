//! Issue outbox repository port (worker side).
//!
//! Enqueueing happens inside the draw unit of work; the worker drains
//! through this port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::{IssueOutboxEntry, OutboxStatus};

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Pending entries whose `next_attempt_at` has passed, oldest
    /// first, bounded by `limit`.
    async fn due(&self, now: DateTime<Utc>, limit: u32) -> DrawResult<Vec<IssueOutboxEntry>>;

    async fn mark_delivered(&self, id: Uuid) -> DrawResult<()>;

    /// Record a failed attempt and the next retry time; flips to
    /// `Dead` when the attempt budget is exhausted.
    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        dead: bool,
    ) -> DrawResult<()>;

    async fn list(&self, status: Option<OutboxStatus>, limit: u32)
        -> DrawResult<Vec<IssueOutboxEntry>>;
}
