//! Idempotency store port.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::DrawResult;

/// What the store found (or did) for a key.
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationOutcome {
    /// Key was absent (or expired); an `in_flight` reservation now
    /// exists and the caller owns the execution.
    Reserved,
    /// Another execution holds an unexpired `in_flight` reservation.
    InFlight,
    /// The key committed earlier; replay this canonical response.
    Committed(serde_json::Value),
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically check the key and reserve it when absent.
    /// `fingerprint` is stored for key-reuse diagnostics.
    async fn check_or_reserve(
        &self,
        key: &str,
        fingerprint: &str,
        in_flight_ttl: Duration,
    ) -> DrawResult<ReservationOutcome>;

    /// Flip the reservation to committed with the canonical response.
    async fn commit(
        &self,
        key: &str,
        response: serde_json::Value,
        response_ttl: Duration,
    ) -> DrawResult<()>;

    /// Drop an in-flight reservation after a failed or timed-out
    /// execution so the caller can retry with the same key.
    async fn release(&self, key: &str) -> DrawResult<()>;
}
