//! In-process idempotency store.
//!
//! Short-TTL reservations and responses held in a keyed map; the
//! check-or-reserve is atomic under one async mutex acquisition.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{IdempotencyRecord, IdempotencyStatus};
use crate::domain::ports::{IdempotencyStore, ReservationOutcome};

#[derive(Default)]
pub struct MemoryIdempotencyStore {
    records: Mutex<HashMap<String, IdempotencyRecord>>,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn expiry(ttl: Duration) -> DateTime<Utc> {
        Utc::now() + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(5))
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn check_or_reserve(
        &self,
        key: &str,
        fingerprint: &str,
        in_flight_ttl: Duration,
    ) -> DrawResult<ReservationOutcome> {
        let now = Utc::now();
        let mut records = self.records.lock().await;

        if let Some(record) = records.get(key) {
            if record.expires_at > now {
                return match record.status {
                    IdempotencyStatus::Committed => {
                        let response = record.response.clone().ok_or_else(|| {
                            DrawError::Internal(
                                "committed idempotency record has no response".into(),
                            )
                        })?;
                        Ok(ReservationOutcome::Committed(response))
                    }
                    IdempotencyStatus::InFlight => Ok(ReservationOutcome::InFlight),
                };
            }
        }

        records.insert(
            key.to_string(),
            IdempotencyRecord {
                key: key.to_string(),
                first_seen: now,
                fingerprint: fingerprint.to_string(),
                response: None,
                status: IdempotencyStatus::InFlight,
                expires_at: Self::expiry(in_flight_ttl),
            },
        );
        Ok(ReservationOutcome::Reserved)
    }

    async fn commit(
        &self,
        key: &str,
        response: serde_json::Value,
        response_ttl: Duration,
    ) -> DrawResult<()> {
        let mut records = self.records.lock().await;
        match records.get_mut(key) {
            Some(record) => {
                record.status = IdempotencyStatus::Committed;
                record.response = Some(response);
                record.expires_at = Self::expiry(response_ttl);
                Ok(())
            }
            None => Err(DrawError::Internal(format!(
                "commit for unreserved idempotency key {key}"
            ))),
        }
    }

    async fn release(&self, key: &str) -> DrawResult<()> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get(key) {
            if record.status == IdempotencyStatus::InFlight {
                records.remove(key);
            }
        }
        Ok(())
    }
}
