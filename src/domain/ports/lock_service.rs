//! Per-user-per-campaign draw serialization lock.
//!
//! Guards carry an owner token and a TTL; release must succeed on
//! every exit path, and a crashed holder's lock expires on its own.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::DrawResult;

#[async_trait]
pub trait DrawLockService: Send + Sync {
    /// Acquire the lock for `key`, waiting up to `wait`. Returns
    /// `DrawError::LockTimeout` when the wait elapses.
    async fn acquire(
        &self,
        key: &str,
        ttl: Duration,
        wait: Duration,
    ) -> DrawResult<Box<dyn DrawLockGuard>>;
}

#[async_trait]
pub trait DrawLockGuard: Send {
    /// Fencing token distinguishing this acquisition from earlier
    /// holders of the same key.
    fn owner_token(&self) -> &str;

    /// Extend the TTL while still holding the lock.
    async fn renew(&self, ttl: Duration) -> DrawResult<()>;

    /// Release. Consumes the guard; releasing an expired or stolen
    /// lock is a no-op.
    async fn release(self: Box<Self>) -> DrawResult<()>;
}

/// Canonical lock key for a draw.
pub fn draw_lock_key(user_id: &str, campaign_id: uuid::Uuid) -> String {
    format!("draw:{campaign_id}:{user_id}")
}
