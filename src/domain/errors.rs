//! Draw error taxonomy.
//!
//! Variant names are the semantics the caller programs against; the
//! `#[error]` strings are the operator-facing rendering. Propagation
//! rules: configuration and admission errors surface before any state
//! mutation, concurrency errors are retryable with the same request id,
//! and integrity errors describe committed-but-degraded outcomes.

use thiserror::Error;
use uuid::Uuid;

/// Result alias used throughout the engine.
pub type DrawResult<T> = Result<T, DrawError>;

/// Everything that can go wrong between a draw request and a committed
/// decision.
#[derive(Debug, Error)]
pub enum DrawError {
    // --- Configuration ---
    /// No campaign exists with the given id.
    #[error("campaign not found: {0}")]
    CampaignNotFound(Uuid),

    /// Campaign exists but is not accepting draws (draft/paused/ended,
    /// or outside its validity window).
    #[error("campaign {0} is not active")]
    CampaignInactive(Uuid),

    /// Campaign has no active pricing version.
    #[error("campaign {0} has no active pricing config")]
    NoActivePricing(Uuid),

    /// The campaign configuration violates an engine invariant
    /// (missing fallback prize, negative weights, over-unity tier rules).
    #[error("campaign config violation: {0}")]
    ConfigViolation(String),

    // --- Admission ---
    /// The resolved daily quota is exhausted.
    #[error("daily draw quota exceeded ({used}/{limit})")]
    QuotaExceeded { used: u32, limit: u32 },

    /// User asset balance cannot cover the draw cost.
    #[error("insufficient points: balance {balance}, cost {cost}")]
    InsufficientPoints { balance: i64, cost: i64 },

    /// Campaign declares a guarantee whose prize is absent, inactive,
    /// or belongs to another campaign.
    #[error("guarantee misconfigured for campaign {0}")]
    GuaranteeMisconfigured(Uuid),

    // --- Concurrency ---
    /// A request with the same idempotency key is still in flight.
    #[error("draw already in progress for request {0}")]
    InProgress(String),

    /// The per-user serialization lock could not be acquired in time.
    #[error("lock acquisition timed out for {0}")]
    LockTimeout(String),

    /// The per-draw deadline elapsed; no state was committed.
    #[error("draw timed out")]
    Timeout,

    // --- Degradation ---
    /// Every eligible prize ran out of stock mid-transaction; the draw
    /// committed as an empty fallback outcome. Non-fatal.
    #[error("fallback stock exhausted for campaign {0}")]
    FallbackExhaustion(Uuid),

    // --- Integrity ---
    /// The asset service rejected or failed the debit; nothing committed.
    #[error("asset debit failed: {0}")]
    AssetDebitFailed(String),

    /// Debit and draw committed but issuance is deferred to the outbox.
    /// Surfaced to callers as success with `pending_issue = true`.
    #[error("prize issuance deferred to outbox for draw {0}")]
    AssetIssueDeferred(Uuid),

    // --- Internal ---
    /// Storage-layer failure the caller may retry.
    #[error("transient store error: {0}")]
    TransientStore(String),

    /// Unexpected internal failure; logged with full context, returned
    /// opaquely.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DrawError {
    /// Whether the caller may retry with the same `client_request_id`.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InProgress(_) | Self::LockTimeout(_) | Self::Timeout | Self::TransientStore(_)
        )
    }

    /// Whether any state was committed despite the error surfacing.
    pub const fn is_committed_degradation(&self) -> bool {
        matches!(self, Self::FallbackExhaustion(_) | Self::AssetIssueDeferred(_))
    }

    /// Process exit code when the engine runs as a CLI admin tool:
    /// 0 success, 1 validation/config, 2 runtime, 3 timeout.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::CampaignNotFound(_)
            | Self::CampaignInactive(_)
            | Self::NoActivePricing(_)
            | Self::ConfigViolation(_)
            | Self::QuotaExceeded { .. }
            | Self::InsufficientPoints { .. }
            | Self::GuaranteeMisconfigured(_) => 1,
            Self::Timeout | Self::LockTimeout(_) => 3,
            _ => 2,
        }
    }
}

impl From<sqlx::Error> for DrawError {
    fn from(err: sqlx::Error) -> Self {
        Self::TransientStore(err.to_string())
    }
}

impl From<serde_json::Error> for DrawError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_covers_concurrency_and_transient() {
        assert!(DrawError::Timeout.is_retryable());
        assert!(DrawError::InProgress("r1".into()).is_retryable());
        assert!(DrawError::TransientStore("busy".into()).is_retryable());
        assert!(!DrawError::ConfigViolation("x".into()).is_retryable());
    }

    #[test]
    fn exit_codes_follow_cli_contract() {
        assert_eq!(DrawError::NoActivePricing(Uuid::nil()).exit_code(), 1);
        assert_eq!(DrawError::Timeout.exit_code(), 3);
        assert_eq!(DrawError::Internal("boom".into()).exit_code(), 2);
    }
}
