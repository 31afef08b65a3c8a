//! Pricing repository port.
//!
//! Activation is atomic at the store level: archive the current active
//! version and activate the target in one transaction, so "at most one
//! active per campaign" holds under concurrent activations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::{PricingConfig, PricingMap};

#[async_trait]
pub trait PricingRepository: Send + Sync {
    /// Insert a new draft version; the store assigns the next version
    /// number for the campaign and returns the full record.
    async fn create_version(
        &self,
        campaign_id: Uuid,
        pricing: &PricingMap,
        created_by: &str,
    ) -> DrawResult<PricingConfig>;

    async fn get_version(&self, campaign_id: Uuid, version: i64)
        -> DrawResult<Option<PricingConfig>>;

    async fn get_active(&self, campaign_id: Uuid) -> DrawResult<Option<PricingConfig>>;

    async fn list_versions(&self, campaign_id: Uuid) -> DrawResult<Vec<PricingConfig>>;

    /// Atomically archive the previous active version (stamping
    /// `expired_at = now`) and activate the target. Activating the
    /// already-active version is a no-op. Returns the active record.
    async fn activate(
        &self,
        campaign_id: Uuid,
        version: i64,
        now: DateTime<Utc>,
    ) -> DrawResult<PricingConfig>;

    /// Mark a draft as scheduled for `effective_at`.
    async fn schedule(
        &self,
        campaign_id: Uuid,
        version: i64,
        effective_at: DateTime<Utc>,
    ) -> DrawResult<PricingConfig>;

    /// All scheduled versions whose `effective_at` has passed.
    async fn due_scheduled(&self, now: DateTime<Utc>) -> DrawResult<Vec<PricingConfig>>;
}
