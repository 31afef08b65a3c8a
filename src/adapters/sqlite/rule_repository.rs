//! SQLite implementations of the tier-rule and quota-rule repositories.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{PrizeTier, QuotaRule, QuotaScope, TierRule};
use crate::domain::ports::{QuotaRuleRepository, TierRuleRepository};

use super::campaign_repository::{parse_opt_utc, parse_utc, parse_uuid};

#[derive(Clone)]
pub struct SqliteTierRuleRepository {
    pool: SqlitePool,
}

impl SqliteTierRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TierRuleRow {
    id: String,
    campaign_id: String,
    segment_key: Option<String>,
    tier: String,
    weight_ppm: i64,
    priority: i64,
    created_at: String,
}

impl TryFrom<TierRuleRow> for TierRule {
    type Error = DrawError;

    fn try_from(row: TierRuleRow) -> DrawResult<Self> {
        Ok(TierRule {
            id: parse_uuid(&row.id)?,
            campaign_id: parse_uuid(&row.campaign_id)?,
            segment_key: row.segment_key,
            tier: PrizeTier::from_str(&row.tier)
                .ok_or_else(|| DrawError::Internal(format!("bad tier {}", row.tier)))?,
            weight_ppm: u32::try_from(row.weight_ppm.clamp(0, 1_000_000)).unwrap_or(0),
            priority: i32::try_from(row.priority).unwrap_or(0),
            created_at: parse_utc(&row.created_at)?,
        })
    }
}

#[async_trait]
impl TierRuleRepository for SqliteTierRuleRepository {
    async fn list_for_campaign(&self, campaign_id: Uuid) -> DrawResult<Vec<TierRule>> {
        let rows: Vec<TierRuleRow> =
            sqlx::query_as("SELECT * FROM tier_rules WHERE campaign_id = ? ORDER BY priority DESC")
                .bind(campaign_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TierRule::try_from).collect()
    }

    async fn upsert(&self, rule: &TierRule) -> DrawResult<()> {
        sqlx::query(
            r#"INSERT INTO tier_rules (id, campaign_id, segment_key, tier, weight_ppm, priority, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 segment_key = excluded.segment_key,
                 tier = excluded.tier,
                 weight_ppm = excluded.weight_ppm,
                 priority = excluded.priority"#,
        )
        .bind(rule.id.to_string())
        .bind(rule.campaign_id.to_string())
        .bind(&rule.segment_key)
        .bind(rule.tier.as_str())
        .bind(i64::from(rule.weight_ppm))
        .bind(i64::from(rule.priority))
        .bind(rule.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteQuotaRuleRepository {
    pool: SqlitePool,
}

impl SqliteQuotaRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct QuotaRuleRow {
    id: String,
    scope: String,
    scope_ref: Option<String>,
    daily_limit: i64,
    priority: i64,
    valid_from: Option<String>,
    valid_until: Option<String>,
    created_at: String,
}

impl TryFrom<QuotaRuleRow> for QuotaRule {
    type Error = DrawError;

    fn try_from(row: QuotaRuleRow) -> DrawResult<Self> {
        Ok(QuotaRule {
            id: parse_uuid(&row.id)?,
            scope: QuotaScope::from_str(&row.scope)
                .ok_or_else(|| DrawError::Internal(format!("bad quota scope {}", row.scope)))?,
            scope_ref: row.scope_ref,
            daily_limit: u32::try_from(row.daily_limit.max(0)).unwrap_or(u32::MAX),
            priority: i32::try_from(row.priority).unwrap_or(0),
            valid_from: parse_opt_utc(row.valid_from.as_deref())?,
            valid_until: parse_opt_utc(row.valid_until.as_deref())?,
            created_at: parse_utc(&row.created_at)?,
        })
    }
}

#[async_trait]
impl QuotaRuleRepository for SqliteQuotaRuleRepository {
    async fn list_candidates(
        &self,
        campaign_id: Uuid,
        user_id: &str,
    ) -> DrawResult<Vec<QuotaRule>> {
        let rows: Vec<QuotaRuleRow> = sqlx::query_as(
            r#"SELECT * FROM quota_rules
               WHERE scope = 'global'
                  OR scope = 'role'
                  OR (scope = 'campaign' AND scope_ref = ?)
                  OR (scope = 'user' AND scope_ref = ?)"#,
        )
        .bind(campaign_id.to_string())
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(QuotaRule::try_from).collect()
    }

    async fn upsert(&self, rule: &QuotaRule) -> DrawResult<()> {
        sqlx::query(
            r#"INSERT INTO quota_rules (id, scope, scope_ref, daily_limit, priority, valid_from, valid_until, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 scope = excluded.scope,
                 scope_ref = excluded.scope_ref,
                 daily_limit = excluded.daily_limit,
                 priority = excluded.priority,
                 valid_from = excluded.valid_from,
                 valid_until = excluded.valid_until"#,
        )
        .bind(rule.id.to_string())
        .bind(rule.scope.as_str())
        .bind(&rule.scope_ref)
        .bind(i64::from(rule.daily_limit))
        .bind(i64::from(rule.priority))
        .bind(rule.valid_from.map(|t| t.to_rfc3339()))
        .bind(rule.valid_until.map(|t| t.to_rfc3339()))
        .bind(rule.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_all(&self) -> DrawResult<Vec<QuotaRule>> {
        let rows: Vec<QuotaRuleRow> =
            sqlx::query_as("SELECT * FROM quota_rules ORDER BY priority DESC")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(QuotaRule::try_from).collect()
    }
}
