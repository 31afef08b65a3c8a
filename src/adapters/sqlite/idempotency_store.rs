//! SQLite-backed idempotency store.
//!
//! The durable variant for single-node deployments and the admin CLI.
//! The atomic check-or-reserve leans on the primary key: INSERT wins
//! the race, the loser inspects the surviving row.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use std::time::Duration;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::IdempotencyStatus;
use crate::domain::ports::{IdempotencyStore, ReservationOutcome};

#[derive(Clone)]
pub struct SqliteIdempotencyStore {
    pool: SqlitePool,
}

impl SqliteIdempotencyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn chrono_ttl(ttl: Duration) -> ChronoDuration {
    ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(5))
}

#[async_trait]
impl IdempotencyStore for SqliteIdempotencyStore {
    async fn check_or_reserve(
        &self,
        key: &str,
        fingerprint: &str,
        in_flight_ttl: Duration,
    ) -> DrawResult<ReservationOutcome> {
        let now = Utc::now();
        let expires_at = now + chrono_ttl(in_flight_ttl);

        // Expired reservations are dead weight; clear before racing.
        sqlx::query("DELETE FROM idempotency_records WHERE key = ? AND status = 'in_flight' AND expires_at <= ?")
            .bind(key)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

        let inserted = sqlx::query(
            r#"INSERT OR IGNORE INTO idempotency_records (key, first_seen, fingerprint, response, status, expires_at)
               VALUES (?, ?, ?, NULL, 'in_flight', ?)"#,
        )
        .bind(key)
        .bind(now.to_rfc3339())
        .bind(fingerprint)
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        if inserted.rows_affected() > 0 {
            return Ok(ReservationOutcome::Reserved);
        }

        let row: Option<(String, Option<String>, String)> = sqlx::query_as(
            "SELECT status, response, expires_at FROM idempotency_records WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            None => {
                // Row vanished between insert and read; treat as retryable.
                Err(DrawError::TransientStore("idempotency record vanished".to_string()))
            }
            Some((status, response, _)) => match IdempotencyStatus::from_str(&status) {
                Some(IdempotencyStatus::Committed) => {
                    let payload = response.ok_or_else(|| {
                        DrawError::Internal("committed idempotency record has no response".into())
                    })?;
                    Ok(ReservationOutcome::Committed(serde_json::from_str(&payload)?))
                }
                Some(IdempotencyStatus::InFlight) => Ok(ReservationOutcome::InFlight),
                None => Err(DrawError::Internal(format!("bad idempotency status {status}"))),
            },
        }
    }

    async fn commit(
        &self,
        key: &str,
        response: serde_json::Value,
        response_ttl: Duration,
    ) -> DrawResult<()> {
        let expires_at = Utc::now() + chrono_ttl(response_ttl);
        sqlx::query(
            "UPDATE idempotency_records SET status = 'committed', response = ?, expires_at = ? WHERE key = ?",
        )
        .bind(serde_json::to_string(&response)?)
        .bind(expires_at.to_rfc3339())
        .bind(key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release(&self, key: &str) -> DrawResult<()> {
        sqlx::query("DELETE FROM idempotency_records WHERE key = ? AND status = 'in_flight'")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
