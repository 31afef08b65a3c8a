//! Durable issue outbox.
//!
//! When the asset service fails the issue call after a successful
//! debit, the draw still commits and the issuance is queued here for
//! at-least-once redelivery. The idempotency key makes redelivery safe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Delivered,
    /// Exhausted its retry budget; needs operator attention.
    Dead,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Dead => "dead",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "delivered" => Some(Self::Delivered),
            "dead" => Some(Self::Dead),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueOutboxEntry {
    pub id: Uuid,
    pub draw_id: Uuid,
    pub user_id: String,
    pub prize_id: Uuid,
    /// Opaque item reference handed to the asset service.
    pub item_ref: String,
    /// `<client_request_id>:issue`, same key the in-line attempt used.
    pub idempotency_key: String,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub status: OutboxStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}
