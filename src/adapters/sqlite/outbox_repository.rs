//! SQLite implementation of the OutboxRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{IssueOutboxEntry, OutboxStatus};
use crate::domain::ports::OutboxRepository;

use super::campaign_repository::{parse_utc, parse_uuid};

#[derive(Clone)]
pub struct SqliteOutboxRepository {
    pool: SqlitePool,
}

impl SqliteOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct OutboxRow {
    pub id: String,
    pub draw_id: String,
    pub user_id: String,
    pub prize_id: String,
    pub item_ref: String,
    pub idempotency_key: String,
    pub attempts: i64,
    pub next_attempt_at: String,
    pub status: String,
    pub last_error: Option<String>,
    pub created_at: String,
}

impl TryFrom<OutboxRow> for IssueOutboxEntry {
    type Error = DrawError;

    fn try_from(row: OutboxRow) -> DrawResult<Self> {
        Ok(IssueOutboxEntry {
            id: parse_uuid(&row.id)?,
            draw_id: parse_uuid(&row.draw_id)?,
            user_id: row.user_id,
            prize_id: parse_uuid(&row.prize_id)?,
            item_ref: row.item_ref,
            idempotency_key: row.idempotency_key,
            attempts: u32::try_from(row.attempts.max(0)).unwrap_or(0),
            next_attempt_at: parse_utc(&row.next_attempt_at)?,
            status: OutboxStatus::from_str(&row.status)
                .ok_or_else(|| DrawError::Internal(format!("bad outbox status {}", row.status)))?,
            last_error: row.last_error,
            created_at: parse_utc(&row.created_at)?,
        })
    }
}

#[async_trait]
impl OutboxRepository for SqliteOutboxRepository {
    async fn due(&self, now: DateTime<Utc>, limit: u32) -> DrawResult<Vec<IssueOutboxEntry>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"SELECT * FROM issue_outbox
               WHERE status = 'pending' AND next_attempt_at <= ?
               ORDER BY next_attempt_at LIMIT ?"#,
        )
        .bind(now.to_rfc3339())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(IssueOutboxEntry::try_from).collect()
    }

    async fn mark_delivered(&self, id: Uuid) -> DrawResult<()> {
        sqlx::query("UPDATE issue_outbox SET status = 'delivered' WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        dead: bool,
    ) -> DrawResult<()> {
        let status = if dead { OutboxStatus::Dead } else { OutboxStatus::Pending };
        sqlx::query(
            r#"UPDATE issue_outbox
               SET attempts = attempts + 1, last_error = ?, next_attempt_at = ?, status = ?
               WHERE id = ?"#,
        )
        .bind(error)
        .bind(next_attempt_at.to_rfc3339())
        .bind(status.as_str())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        status: Option<OutboxStatus>,
        limit: u32,
    ) -> DrawResult<Vec<IssueOutboxEntry>> {
        let rows: Vec<OutboxRow> = match status {
            Some(s) => {
                sqlx::query_as(
                    "SELECT * FROM issue_outbox WHERE status = ? ORDER BY created_at LIMIT ?",
                )
                .bind(s.as_str())
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM issue_outbox ORDER BY created_at LIMIT ?")
                    .bind(i64::from(limit))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(IssueOutboxEntry::try_from).collect()
    }
}
