//! Idempotency records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    InFlight,
    Committed,
}

impl IdempotencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InFlight => "in_flight",
            Self::Committed => "committed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_flight" => Some(Self::InFlight),
            "committed" => Some(Self::Committed),
            _ => None,
        }
    }
}

/// Binds a caller-provided request id to a committed response exactly
/// once. `in_flight` reservations expire slightly after the per-draw
/// deadline so a crashed holder cannot block the key forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub first_seen: DateTime<Utc>,
    /// Hash of the request fields, to detect key reuse with a
    /// different payload.
    pub fingerprint: String,
    /// Canonical response, present once committed.
    pub response: Option<serde_json::Value>,
    pub status: IdempotencyStatus,
    pub expires_at: DateTime<Utc>,
}
