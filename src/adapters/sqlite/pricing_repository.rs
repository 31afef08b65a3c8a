//! SQLite implementation of the PricingRepository.
//!
//! Activation runs in its own transaction so the partial unique index
//! on `(campaign_id) WHERE status = 'active'` can never be violated:
//! the previous active row is archived and the target activated before
//! commit. Under concurrent activations one transaction wins; the
//! loser either no-ops (target already active) or fails cleanly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{PricingConfig, PricingMap, PricingStatus};
use crate::domain::ports::PricingRepository;

use super::campaign_repository::{parse_opt_utc, parse_utc, parse_uuid};

#[derive(Clone)]
pub struct SqlitePricingRepository {
    pool: SqlitePool,
}

impl SqlitePricingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PricingRow {
    id: String,
    campaign_id: String,
    version: i64,
    pricing: String,
    status: String,
    effective_at: Option<String>,
    expired_at: Option<String>,
    created_by: String,
    created_at: String,
}

impl TryFrom<PricingRow> for PricingConfig {
    type Error = DrawError;

    fn try_from(row: PricingRow) -> DrawResult<Self> {
        Ok(PricingConfig {
            id: parse_uuid(&row.id)?,
            campaign_id: parse_uuid(&row.campaign_id)?,
            version: row.version,
            pricing: serde_json::from_str(&row.pricing)?,
            status: PricingStatus::from_str(&row.status)
                .ok_or_else(|| DrawError::Internal(format!("bad pricing status {}", row.status)))?,
            effective_at: parse_opt_utc(row.effective_at.as_deref())?,
            expired_at: parse_opt_utc(row.expired_at.as_deref())?,
            created_by: row.created_by,
            created_at: parse_utc(&row.created_at)?,
        })
    }
}

#[async_trait]
impl PricingRepository for SqlitePricingRepository {
    async fn create_version(
        &self,
        campaign_id: Uuid,
        pricing: &PricingMap,
        created_by: &str,
    ) -> DrawResult<PricingConfig> {
        if pricing.single_cost <= 0 {
            return Err(DrawError::ConfigViolation(format!(
                "single_cost must be positive, got {}",
                pricing.single_cost
            )));
        }
        let mut tx = self.pool.begin().await?;
        let (next_version,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM campaign_pricing_configs WHERE campaign_id = ?",
        )
        .bind(campaign_id.to_string())
        .fetch_one(&mut *tx)
        .await?;

        let config = PricingConfig {
            id: Uuid::new_v4(),
            campaign_id,
            version: next_version,
            pricing: pricing.clone(),
            status: PricingStatus::Draft,
            effective_at: None,
            expired_at: None,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"INSERT INTO campaign_pricing_configs
               (id, campaign_id, version, pricing, status, effective_at, expired_at, created_by, created_at)
               VALUES (?, ?, ?, ?, ?, NULL, NULL, ?, ?)"#,
        )
        .bind(config.id.to_string())
        .bind(config.campaign_id.to_string())
        .bind(config.version)
        .bind(serde_json::to_string(&config.pricing)?)
        .bind(config.status.as_str())
        .bind(&config.created_by)
        .bind(config.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(config)
    }

    async fn get_version(
        &self,
        campaign_id: Uuid,
        version: i64,
    ) -> DrawResult<Option<PricingConfig>> {
        let row: Option<PricingRow> = sqlx::query_as(
            "SELECT * FROM campaign_pricing_configs WHERE campaign_id = ? AND version = ?",
        )
        .bind(campaign_id.to_string())
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PricingConfig::try_from).transpose()
    }

    async fn get_active(&self, campaign_id: Uuid) -> DrawResult<Option<PricingConfig>> {
        let row: Option<PricingRow> = sqlx::query_as(
            "SELECT * FROM campaign_pricing_configs WHERE campaign_id = ? AND status = 'active'",
        )
        .bind(campaign_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(PricingConfig::try_from).transpose()
    }

    async fn list_versions(&self, campaign_id: Uuid) -> DrawResult<Vec<PricingConfig>> {
        let rows: Vec<PricingRow> = sqlx::query_as(
            "SELECT * FROM campaign_pricing_configs WHERE campaign_id = ? ORDER BY version",
        )
        .bind(campaign_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PricingConfig::try_from).collect()
    }

    async fn activate(
        &self,
        campaign_id: Uuid,
        version: i64,
        now: DateTime<Utc>,
    ) -> DrawResult<PricingConfig> {
        let mut tx = self.pool.begin().await?;

        let target: Option<PricingRow> = sqlx::query_as(
            "SELECT * FROM campaign_pricing_configs WHERE campaign_id = ? AND version = ?",
        )
        .bind(campaign_id.to_string())
        .bind(version)
        .fetch_optional(&mut *tx)
        .await?;
        let target = target.ok_or_else(|| {
            DrawError::ConfigViolation(format!(
                "pricing version {version} not found for campaign {campaign_id}"
            ))
        })?;

        if target.status == PricingStatus::Active.as_str() {
            // Concurrent activation already won; nothing to do.
            tx.commit().await?;
            return PricingConfig::try_from(target);
        }

        sqlx::query(
            r#"UPDATE campaign_pricing_configs
               SET status = 'archived', expired_at = ?
               WHERE campaign_id = ? AND status = 'active'"#,
        )
        .bind(now.to_rfc3339())
        .bind(campaign_id.to_string())
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            r#"UPDATE campaign_pricing_configs
               SET status = 'active', effective_at = ?
               WHERE campaign_id = ? AND version = ? AND status IN ('draft', 'scheduled', 'archived')"#,
        )
        .bind(now.to_rfc3339())
        .bind(campaign_id.to_string())
        .bind(version)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DrawError::TransientStore(format!(
                "pricing version {version} changed concurrently"
            )));
        }
        tx.commit().await?;

        self.get_active(campaign_id).await?.ok_or_else(|| {
            DrawError::Internal("active pricing missing after activation".to_string())
        })
    }

    async fn schedule(
        &self,
        campaign_id: Uuid,
        version: i64,
        effective_at: DateTime<Utc>,
    ) -> DrawResult<PricingConfig> {
        let updated = sqlx::query(
            r#"UPDATE campaign_pricing_configs
               SET status = 'scheduled', effective_at = ?
               WHERE campaign_id = ? AND version = ? AND status = 'draft'"#,
        )
        .bind(effective_at.to_rfc3339())
        .bind(campaign_id.to_string())
        .bind(version)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(DrawError::ConfigViolation(format!(
                "pricing version {version} is not a draft"
            )));
        }
        self.get_version(campaign_id, version).await?.ok_or_else(|| {
            DrawError::Internal("scheduled pricing missing after update".to_string())
        })
    }

    async fn due_scheduled(&self, now: DateTime<Utc>) -> DrawResult<Vec<PricingConfig>> {
        let rows: Vec<PricingRow> = sqlx::query_as(
            r#"SELECT * FROM campaign_pricing_configs
               WHERE status = 'scheduled' AND effective_at <= ?
               ORDER BY campaign_id, version"#,
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PricingConfig::try_from).collect()
    }
}
