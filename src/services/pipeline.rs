//! Decision pipeline.
//!
//! One entry point, [`DecisionPipeline::decide`]: load, admission,
//! idempotency, corrections, selection, execution, metrics emission.
//! Constructed once with every collaborator injected through the
//! builder; no process-wide state. Configuration and admission errors
//! surface before any mutation; everything past the idempotency
//! reservation is the executor's serialized, transactional domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{
    metrics::shanghai_day, quota_rule, tier_rule, weights::mul_ppm, DrawType, PricingConfig,
    PrizeTier, UserExperienceState, UserGlobalState,
};
use crate::domain::ports::{
    AdminIntentRepository, AssetService, CampaignRepository, Clock, DrawRepository,
    ExperienceRepository, IdempotencyStore, PricingRepository, PrizeRepository,
    QuotaRuleRepository, ReservationOutcome, TierRuleRepository,
};

use super::config::EngineConfig;
use super::executor::{DrawExecutor, ExecutionRequest};
use super::metrics::MetricsAggregator;
use super::pressure::BudgetPressureController;

/// One draw request as the pipeline sees it.
#[derive(Debug, Clone)]
pub struct DrawContext {
    pub user_id: String,
    pub campaign_id: Uuid,
    pub draw_type: DrawType,
    /// Caller-provided idempotency key.
    pub client_request_id: String,
    /// Role for role-scoped quota rules.
    pub user_role: Option<String>,
    /// Segment for segment-scoped tier rules.
    pub segment: Option<String>,
}

impl DrawContext {
    /// Stable request fingerprint stored with the idempotency record.
    fn fingerprint(&self) -> String {
        format!(
            "{}:{}:{}",
            self.user_id,
            self.campaign_id,
            self.draw_type.as_str()
        )
    }
}

/// A prize as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeRef {
    pub id: Uuid,
    pub name: String,
    pub tier: PrizeTier,
    pub value_points: i64,
}

/// One committed sub-draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeGrant {
    pub draw_id: Uuid,
    pub decision_id: Uuid,
    pub tier: PrizeTier,
    /// None for a committed empty (fallback-exhaustion) outcome.
    pub prize: Option<PrizeRef>,
}

/// Canonical draw response; byte-identical across idempotent replays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResponse {
    pub request_id: String,
    pub grants: Vec<PrizeGrant>,
    pub new_balance: i64,
    /// True when issuance was deferred to the outbox.
    pub pending_issue: bool,
}

struct CachedPricing {
    config: PricingConfig,
    refreshed_at: DateTime<Utc>,
}

pub struct DecisionPipeline {
    campaigns: Arc<dyn CampaignRepository>,
    pricing: Arc<dyn PricingRepository>,
    prizes: Arc<dyn PrizeRepository>,
    tier_rules: Arc<dyn TierRuleRepository>,
    quota_rules: Arc<dyn QuotaRuleRepository>,
    experience: Arc<dyn ExperienceRepository>,
    draws: Arc<dyn DrawRepository>,
    intents: Arc<dyn AdminIntentRepository>,
    assets: Arc<dyn AssetService>,
    idempotency: Arc<dyn IdempotencyStore>,
    metrics: Arc<MetricsAggregator>,
    pressure: Arc<BudgetPressureController>,
    executor: Arc<DrawExecutor>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    pricing_cache: RwLock<HashMap<Uuid, CachedPricing>>,
}

impl DecisionPipeline {
    pub fn builder() -> DecisionPipelineBuilder {
        DecisionPipelineBuilder::default()
    }

    /// Decide one draw request end to end.
    pub async fn decide(&self, ctx: DrawContext) -> DrawResult<DrawResponse> {
        let reserved = Arc::new(AtomicBool::new(false));
        let deadline = Duration::from_secs(self.config.draw.deadline_secs);

        let result =
            tokio::time::timeout(deadline, self.decide_inner(&ctx, Arc::clone(&reserved))).await;
        match result {
            Ok(inner) => inner,
            Err(_elapsed) => {
                // Roll the reservation back so a retry with the same
                // request id can start fresh.
                if reserved.load(Ordering::SeqCst) {
                    let _ = self.idempotency.release(&ctx.client_request_id).await;
                }
                info!(request = %ctx.client_request_id, "draw deadline elapsed");
                Err(DrawError::Timeout)
            }
        }
    }

    async fn decide_inner(
        &self,
        ctx: &DrawContext,
        reserved: Arc<AtomicBool>,
    ) -> DrawResult<DrawResponse> {
        let now = self.clock.now();

        // --- Load ---
        let campaign = self
            .campaigns
            .get(ctx.campaign_id)
            .await?
            .ok_or(DrawError::CampaignNotFound(ctx.campaign_id))?;
        if !campaign.accepts_draws(now) {
            return Err(DrawError::CampaignInactive(ctx.campaign_id));
        }
        let pricing = self.active_pricing(ctx.campaign_id, now).await?;
        let prizes = self.prizes.list_by_campaign(ctx.campaign_id).await?;
        if !prizes.iter().any(|p| p.tier == PrizeTier::Fallback && p.is_active()) {
            return Err(DrawError::ConfigViolation(format!(
                "campaign {} has no active fallback prize",
                ctx.campaign_id
            )));
        }
        let rules = self.tier_rules.list_for_campaign(ctx.campaign_id).await?;
        let base_weights = tier_rule::base_weights(&rules, ctx.segment.as_deref());
        tier_rule::validate_weights(&base_weights).map_err(DrawError::ConfigViolation)?;

        let experience = self
            .experience
            .get_experience(&ctx.user_id, ctx.campaign_id)
            .await?
            .unwrap_or_else(|| UserExperienceState::fresh(&ctx.user_id, ctx.campaign_id, now));
        let global = self
            .experience
            .get_global(&ctx.user_id)
            .await?
            .unwrap_or_else(|| UserGlobalState::fresh(&ctx.user_id, now));

        // --- Admission ---
        let sub_draws = ctx.draw_type.count();
        let quota_limit = self.resolve_quota(ctx, now).await?;
        let used = self
            .draws
            .count_user_draws_on_day(ctx.campaign_id, &ctx.user_id, shanghai_day(now))
            .await?;
        if used + sub_draws > quota_limit {
            return Err(DrawError::QuotaExceeded { used, limit: quota_limit });
        }

        let cost = pricing.pricing.cost_for(ctx.draw_type);
        let balance = self.assets.balance(&ctx.user_id).await?;
        if balance < cost {
            return Err(DrawError::InsufficientPoints { balance, cost });
        }

        // --- Idempotency ---
        match self
            .idempotency
            .check_or_reserve(
                &ctx.client_request_id,
                &ctx.fingerprint(),
                Duration::from_secs(self.config.draw.in_flight_ttl_secs),
            )
            .await?
        {
            ReservationOutcome::Committed(response) => {
                debug!(request = %ctx.client_request_id, "idempotent replay");
                return Ok(serde_json::from_value(response)?);
            }
            ReservationOutcome::InFlight => {
                return self.await_first_flight(ctx).await;
            }
            ReservationOutcome::Reserved => {
                reserved.store(true, Ordering::SeqCst);
            }
        }

        // --- Classify, select, execute ---
        let outcome = async {
            let cell = self.pressure.snapshot(&campaign).await?;
            let mut weights = base_weights;
            weights.fallback = mul_ppm(weights.fallback, cell.empty_weight_multiplier_ppm);

            let daily_awards = self.load_daily_awards(&prizes, now).await?;
            let intent =
                self.intents.find_usable(ctx.campaign_id, &ctx.user_id, now).await?;

            self.executor
                .execute(ExecutionRequest {
                    ctx: ctx.clone(),
                    prizes,
                    base_weights: weights,
                    cell,
                    intent,
                    cost,
                    quota_limit,
                    experience,
                    global,
                    daily_awards,
                })
                .await
        }
        .await;

        match outcome {
            Ok(executed) => {
                // --- Emit (post-commit; metrics loss is acceptable) ---
                self.metrics.record_all(&executed.samples).await;
                info!(
                    request = %ctx.client_request_id,
                    user = %ctx.user_id,
                    campaign = %ctx.campaign_id,
                    grants = executed.response.grants.len(),
                    "draw committed"
                );
                Ok(executed.response)
            }
            Err(err) => {
                let _ = self.idempotency.release(&ctx.client_request_id).await;
                Err(err)
            }
        }
    }

    /// Bounded wait for a duplicate whose first flight is still
    /// running; replays its response if it commits in time.
    async fn await_first_flight(&self, ctx: &DrawContext) -> DrawResult<DrawResponse> {
        let budget = Duration::from_millis(self.config.draw.duplicate_wait_ms);
        let poll = Duration::from_millis(50).min(budget);
        let start = std::time::Instant::now();
        while start.elapsed() < budget {
            tokio::time::sleep(poll).await;
            match self
                .idempotency
                .check_or_reserve(
                    &ctx.client_request_id,
                    &ctx.fingerprint(),
                    Duration::from_secs(self.config.draw.in_flight_ttl_secs),
                )
                .await?
            {
                ReservationOutcome::Committed(response) => {
                    return Ok(serde_json::from_value(response)?);
                }
                ReservationOutcome::InFlight => {}
                ReservationOutcome::Reserved => {
                    // First flight failed and released; its retry slot
                    // is not ours to run, hand it back to the caller.
                    let _ = self.idempotency.release(&ctx.client_request_id).await;
                    return Err(DrawError::InProgress(ctx.client_request_id.clone()));
                }
            }
        }
        Err(DrawError::InProgress(ctx.client_request_id.clone()))
    }

    async fn active_pricing(
        &self,
        campaign_id: Uuid,
        now: DateTime<Utc>,
    ) -> DrawResult<PricingConfig> {
        let staleness = i64::try_from(self.config.pressure.pricing_staleness_secs).unwrap_or(30);
        {
            let cache = self.pricing_cache.read().await;
            if let Some(cached) = cache.get(&campaign_id) {
                let age = now.signed_duration_since(cached.refreshed_at).num_seconds();
                if (0..staleness).contains(&age) {
                    return Ok(cached.config.clone());
                }
            }
        }
        let config = self
            .pricing
            .get_active(campaign_id)
            .await?
            .ok_or(DrawError::NoActivePricing(campaign_id))?;
        self.pricing_cache
            .write()
            .await
            .insert(campaign_id, CachedPricing { config: config.clone(), refreshed_at: now });
        Ok(config)
    }

    async fn resolve_quota(&self, ctx: &DrawContext, now: DateTime<Utc>) -> DrawResult<u32> {
        let candidates = self.quota_rules.list_candidates(ctx.campaign_id, &ctx.user_id).await?;
        Ok(quota_rule::resolve(
            &candidates,
            ctx.campaign_id,
            &ctx.user_id,
            ctx.user_role.as_deref(),
            now,
        )
        .map_or(self.config.draw.default_daily_quota, |r| r.daily_limit))
    }

    /// Today's award counts for prizes carrying a daily cap.
    async fn load_daily_awards(
        &self,
        prizes: &[crate::domain::models::Prize],
        now: DateTime<Utc>,
    ) -> DrawResult<HashMap<Uuid, u32>> {
        let mut awards = HashMap::new();
        let day = shanghai_day(now);
        for prize in prizes.iter().filter(|p| p.daily_cap.is_some()) {
            let count = self.draws.count_prize_awards_on_day(prize.id, day).await?;
            awards.insert(prize.id, count);
        }
        Ok(awards)
    }

}

/// Plain builder wiring the pipeline's collaborators.
#[derive(Default)]
pub struct DecisionPipelineBuilder {
    campaigns: Option<Arc<dyn CampaignRepository>>,
    pricing: Option<Arc<dyn PricingRepository>>,
    prizes: Option<Arc<dyn PrizeRepository>>,
    tier_rules: Option<Arc<dyn TierRuleRepository>>,
    quota_rules: Option<Arc<dyn QuotaRuleRepository>>,
    experience: Option<Arc<dyn ExperienceRepository>>,
    draws: Option<Arc<dyn DrawRepository>>,
    intents: Option<Arc<dyn AdminIntentRepository>>,
    assets: Option<Arc<dyn AssetService>>,
    idempotency: Option<Arc<dyn IdempotencyStore>>,
    metrics: Option<Arc<MetricsAggregator>>,
    pressure: Option<Arc<BudgetPressureController>>,
    executor: Option<Arc<DrawExecutor>>,
    clock: Option<Arc<dyn Clock>>,
    config: Option<EngineConfig>,
}

impl DecisionPipelineBuilder {
    pub fn campaigns(mut self, v: Arc<dyn CampaignRepository>) -> Self {
        self.campaigns = Some(v);
        self
    }
    pub fn pricing(mut self, v: Arc<dyn PricingRepository>) -> Self {
        self.pricing = Some(v);
        self
    }
    pub fn prizes(mut self, v: Arc<dyn PrizeRepository>) -> Self {
        self.prizes = Some(v);
        self
    }
    pub fn tier_rules(mut self, v: Arc<dyn TierRuleRepository>) -> Self {
        self.tier_rules = Some(v);
        self
    }
    pub fn quota_rules(mut self, v: Arc<dyn QuotaRuleRepository>) -> Self {
        self.quota_rules = Some(v);
        self
    }
    pub fn experience(mut self, v: Arc<dyn ExperienceRepository>) -> Self {
        self.experience = Some(v);
        self
    }
    pub fn draws(mut self, v: Arc<dyn DrawRepository>) -> Self {
        self.draws = Some(v);
        self
    }
    pub fn intents(mut self, v: Arc<dyn AdminIntentRepository>) -> Self {
        self.intents = Some(v);
        self
    }
    pub fn assets(mut self, v: Arc<dyn AssetService>) -> Self {
        self.assets = Some(v);
        self
    }
    pub fn idempotency(mut self, v: Arc<dyn IdempotencyStore>) -> Self {
        self.idempotency = Some(v);
        self
    }
    pub fn metrics(mut self, v: Arc<MetricsAggregator>) -> Self {
        self.metrics = Some(v);
        self
    }
    pub fn pressure(mut self, v: Arc<BudgetPressureController>) -> Self {
        self.pressure = Some(v);
        self
    }
    pub fn executor(mut self, v: Arc<DrawExecutor>) -> Self {
        self.executor = Some(v);
        self
    }
    pub fn clock(mut self, v: Arc<dyn Clock>) -> Self {
        self.clock = Some(v);
        self
    }
    pub fn config(mut self, v: EngineConfig) -> Self {
        self.config = Some(v);
        self
    }

    pub fn build(self) -> DrawResult<DecisionPipeline> {
        fn require<T>(v: Option<T>, name: &str) -> DrawResult<T> {
            v.ok_or_else(|| DrawError::Internal(format!("pipeline builder missing {name}")))
        }
        Ok(DecisionPipeline {
            campaigns: require(self.campaigns, "campaigns")?,
            pricing: require(self.pricing, "pricing")?,
            prizes: require(self.prizes, "prizes")?,
            tier_rules: require(self.tier_rules, "tier_rules")?,
            quota_rules: require(self.quota_rules, "quota_rules")?,
            experience: require(self.experience, "experience")?,
            draws: require(self.draws, "draws")?,
            intents: require(self.intents, "intents")?,
            assets: require(self.assets, "assets")?,
            idempotency: require(self.idempotency, "idempotency")?,
            metrics: require(self.metrics, "metrics")?,
            pressure: require(self.pressure, "pressure")?,
            executor: require(self.executor, "executor")?,
            clock: require(self.clock, "clock")?,
            config: require(self.config, "config")?,
            pricing_cache: RwLock::new(HashMap::new()),
        })
    }
}
