//! Versioned pricing administration.
//!
//! Thin policy layer over the pricing repository: drafts, scheduled
//! activations, the atomic activate, and rollback-as-new-version.
//! Every mutation logs its audit author.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{PricingConfig, PricingMap};
use crate::domain::ports::{Clock, PricingRepository};

pub struct PricingService {
    repository: Arc<dyn PricingRepository>,
    clock: Arc<dyn Clock>,
}

impl PricingService {
    pub fn new(repository: Arc<dyn PricingRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn create_version(
        &self,
        campaign_id: Uuid,
        pricing: PricingMap,
        created_by: &str,
    ) -> DrawResult<PricingConfig> {
        let config = self.repository.create_version(campaign_id, &pricing, created_by).await?;
        info!(
            campaign = %campaign_id,
            version = config.version,
            author = created_by,
            "pricing version drafted"
        );
        Ok(config)
    }

    /// Atomically archive the active version and activate the target.
    pub async fn activate_version(
        &self,
        campaign_id: Uuid,
        version: i64,
    ) -> DrawResult<PricingConfig> {
        let active = self.repository.activate(campaign_id, version, self.clock.now()).await?;
        info!(campaign = %campaign_id, version, "pricing version activated");
        Ok(active)
    }

    /// Mark a draft for future activation; `effective_at` must be in
    /// the future. The sweep promotes it when due.
    pub async fn schedule_activation(
        &self,
        campaign_id: Uuid,
        version: i64,
        effective_at: DateTime<Utc>,
    ) -> DrawResult<PricingConfig> {
        if effective_at <= self.clock.now() {
            return Err(DrawError::ConfigViolation(format!(
                "effective_at {effective_at} is not in the future"
            )));
        }
        let scheduled = self.repository.schedule(campaign_id, version, effective_at).await?;
        info!(campaign = %campaign_id, version, %effective_at, "pricing activation scheduled");
        Ok(scheduled)
    }

    /// Rollback = copy the target version's map into a new version and
    /// activate it. History stays intact; the audit author records who
    /// rolled back from where.
    pub async fn rollback_to_version(
        &self,
        campaign_id: Uuid,
        version: i64,
        requested_by: &str,
    ) -> DrawResult<PricingConfig> {
        let target = self
            .repository
            .get_version(campaign_id, version)
            .await?
            .ok_or_else(|| {
                DrawError::ConfigViolation(format!(
                    "pricing version {version} not found for campaign {campaign_id}"
                ))
            })?;
        let author = format!("{requested_by} (rollback from v{version})");
        let draft =
            self.repository.create_version(campaign_id, &target.pricing, &author).await?;
        let active = self.repository.activate(campaign_id, draft.version, self.clock.now()).await?;
        info!(
            campaign = %campaign_id,
            from_version = version,
            new_version = active.version,
            author = requested_by,
            "pricing rolled back"
        );
        Ok(active)
    }

    pub async fn get_active(&self, campaign_id: Uuid) -> DrawResult<Option<PricingConfig>> {
        self.repository.get_active(campaign_id).await
    }

    pub async fn list_versions(&self, campaign_id: Uuid) -> DrawResult<Vec<PricingConfig>> {
        self.repository.list_versions(campaign_id).await
    }

    /// Promote scheduled versions whose effective time has passed.
    /// Called periodically (or before admin reads); each promotion is
    /// an ordinary atomic activation.
    pub async fn promote_due(&self) -> DrawResult<u32> {
        let now = self.clock.now();
        let due = self.repository.due_scheduled(now).await?;
        let mut promoted = 0;
        for config in due {
            self.repository.activate(config.campaign_id, config.version, now).await?;
            info!(
                campaign = %config.campaign_id,
                version = config.version,
                "scheduled pricing promoted"
            );
            promoted += 1;
        }
        Ok(promoted)
    }
}
