//! Full-pipeline test harness: sqlite store, in-process asset ledger,
//! seeded RNG, fixed clock.

use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use fortuna::adapters::cache::{
    MemoryAssetService, MemoryIdempotencyStore, MemoryLockService, MemoryMetricsSink,
};
use fortuna::adapters::sqlite::{
    SqliteAdminIntentRepository, SqliteCampaignRepository, SqliteDrawRepository, SqliteDrawStore,
    SqliteExperienceRepository, SqliteMetricsStore, SqlitePricingRepository,
    SqlitePrizeRepository, SqliteQuotaRuleRepository, SqliteTierRuleRepository,
};
use fortuna::domain::models::{
    BudgetMode, Campaign, CampaignStatus, DrawType, GuaranteeConfig, PricingMap, Prize,
    PrizeStatus, PrizeTier, TierRule, UserExperienceState,
};
use fortuna::domain::ports::{
    CampaignRepository, Clock, FixedClock, PricingRepository, PrizeRepository, SeededDrawRng,
    TierRuleRepository,
};
use fortuna::services::{
    BudgetPressureController, DecisionPipeline, DrawContext, DrawExecutor, EngineConfig,
    MetricsAggregator,
};
use sqlx::SqlitePool;

use super::database::setup_test_db;

pub struct EngineHarness {
    pub pool: SqlitePool,
    pub pipeline: Arc<DecisionPipeline>,
    pub assets: Arc<MemoryAssetService>,
    pub clock: Arc<FixedClock>,
    pub metrics_sink: Arc<MemoryMetricsSink>,
    pub draws: SqliteDrawRepository,
    pub experience: SqliteExperienceRepository,
    pub config: EngineConfig,
}

impl EngineHarness {
    pub async fn new(seed: u64) -> Self {
        Self::with_config(seed, EngineConfig::default()).await
    }

    pub async fn with_config(seed: u64, config: EngineConfig) -> Self {
        let pool = setup_test_db().await;
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()));
        let assets = Arc::new(MemoryAssetService::new());
        let metrics_sink = Arc::new(MemoryMetricsSink::new());
        let metrics = Arc::new(MetricsAggregator::with_store(
            Arc::clone(&metrics_sink) as _,
            SqliteMetricsStore::new(pool.clone()),
        ));
        let pressure = Arc::new(BudgetPressureController::new(
            Arc::clone(&metrics_sink) as _,
            Arc::clone(&clock) as _,
            config.pressure.clone(),
        ));
        let idempotency = Arc::new(MemoryIdempotencyStore::new());
        let executor = Arc::new(DrawExecutor::new(
            Arc::new(SqliteDrawStore::new(pool.clone())),
            Arc::clone(&assets) as _,
            Arc::new(MemoryLockService::new()),
            Arc::clone(&idempotency) as _,
            Arc::clone(&clock) as _,
            Arc::new(SeededDrawRng::new(seed)),
            config.draw.clone(),
            config.corrections.clone(),
            config.outbox.clone(),
        ));

        let pipeline = DecisionPipeline::builder()
            .campaigns(Arc::new(SqliteCampaignRepository::new(pool.clone())))
            .pricing(Arc::new(SqlitePricingRepository::new(pool.clone())))
            .prizes(Arc::new(SqlitePrizeRepository::new(pool.clone())))
            .tier_rules(Arc::new(SqliteTierRuleRepository::new(pool.clone())))
            .quota_rules(Arc::new(SqliteQuotaRuleRepository::new(pool.clone())))
            .experience(Arc::new(SqliteExperienceRepository::new(pool.clone())))
            .draws(Arc::new(SqliteDrawRepository::new(pool.clone())))
            .intents(Arc::new(SqliteAdminIntentRepository::new(pool.clone())))
            .assets(Arc::clone(&assets) as _)
            .idempotency(idempotency)
            .metrics(metrics)
            .pressure(pressure)
            .executor(executor)
            .clock(Arc::clone(&clock) as _)
            .config(config.clone())
            .build()
            .expect("pipeline wiring");

        Self {
            draws: SqliteDrawRepository::new(pool.clone()),
            experience: SqliteExperienceRepository::new(pool.clone()),
            pool,
            pipeline: Arc::new(pipeline),
            assets,
            clock,
            metrics_sink,
            config,
        }
    }

    pub fn ctx(&self, fixture: &Fixture, user: &str, request_id: &str) -> DrawContext {
        DrawContext {
            user_id: user.to_string(),
            campaign_id: fixture.campaign_id,
            draw_type: DrawType::Single,
            client_request_id: request_id.to_string(),
            user_role: None,
            segment: None,
        }
    }

    /// Preload a user's per-campaign counters.
    pub async fn set_experience(&self, state: &UserExperienceState) {
        sqlx::query(
            r#"INSERT OR REPLACE INTO user_experience_states
               (user_id, campaign_id, empty_streak, recent_high_count, anti_high_cooldown,
                total_draws, total_empties, pity_trigger_count, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&state.user_id)
        .bind(state.campaign_id.to_string())
        .bind(i64::from(state.empty_streak))
        .bind(i64::from(state.recent_high_count))
        .bind(i64::from(state.anti_high_cooldown))
        .bind(state.total_draws as i64)
        .bind(state.total_empties as i64)
        .bind(i64::from(state.pity_trigger_count))
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .expect("preload experience state");
    }

    pub async fn remaining_budget(&self, campaign_id: Uuid) -> i64 {
        let (remaining,): (i64,) =
            sqlx::query_as("SELECT remaining_budget FROM campaigns WHERE id = ?")
                .bind(campaign_id.to_string())
                .fetch_one(&self.pool)
                .await
                .expect("campaign row");
        remaining
    }
}

/// One seeded campaign with a prize per tier.
pub struct Fixture {
    pub campaign_id: Uuid,
    pub prizes: HashMap<PrizeTier, Uuid>,
}

pub struct CampaignSpec {
    pub budget_mode: BudgetMode,
    pub total_budget: i64,
    pub remaining_budget: i64,
    pub guarantee: GuaranteeConfig,
    /// (high, mid, low, fallback) ppm.
    pub weights: (u32, u32, u32, u32),
    /// (tier, value, stock, daily_cap); one prize per entry.
    pub prizes: Vec<(PrizeTier, i64, Option<i64>, Option<u32>)>,
    pub single_cost: i64,
}

impl Default for CampaignSpec {
    fn default() -> Self {
        Self {
            budget_mode: BudgetMode::Unlimited,
            total_budget: 0,
            remaining_budget: 0,
            guarantee: GuaranteeConfig::default(),
            weights: (10_000, 90_000, 200_000, 700_000),
            prizes: vec![
                (PrizeTier::High, 500, None, None),
                (PrizeTier::Mid, 200, None, None),
                (PrizeTier::Low, 50, None, None),
                (PrizeTier::Fallback, 0, None, None),
            ],
            single_cost: 100,
        }
    }
}

pub async fn seed_campaign(harness: &EngineHarness, spec: CampaignSpec) -> Fixture {
    let now = harness.clock.now();
    let campaigns = SqliteCampaignRepository::new(harness.pool.clone());
    let prizes_repo = SqlitePrizeRepository::new(harness.pool.clone());
    let tier_rules = SqliteTierRuleRepository::new(harness.pool.clone());
    let pricing = SqlitePricingRepository::new(harness.pool.clone());

    let campaign_id = Uuid::new_v4();
    campaigns
        .upsert(&Campaign {
            id: campaign_id,
            code: format!("c-{campaign_id}"),
            name: "Test campaign".to_string(),
            status: CampaignStatus::Active,
            budget_mode: spec.budget_mode,
            total_budget: spec.total_budget,
            remaining_budget: spec.remaining_budget,
            guarantee: spec.guarantee.clone(),
            starts_at: None,
            ends_at: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("seed campaign");

    let mut prize_ids = HashMap::new();
    for (index, (tier, value, stock, daily_cap)) in spec.prizes.iter().enumerate() {
        let prize = Prize {
            id: Uuid::new_v4(),
            campaign_id,
            name: format!("{}-{index}", tier.as_str()),
            tier: *tier,
            win_weight: 1,
            value_points: *value,
            stock_quantity: *stock,
            daily_cap: *daily_cap,
            status: PrizeStatus::Active,
            created_at: now,
            updated_at: now,
        };
        prizes_repo.upsert(&prize).await.expect("seed prize");
        prize_ids.entry(*tier).or_insert(prize.id);
    }

    let (high, mid, low, fallback) = spec.weights;
    for (tier, weight) in [
        (PrizeTier::High, high),
        (PrizeTier::Mid, mid),
        (PrizeTier::Low, low),
        (PrizeTier::Fallback, fallback),
    ] {
        tier_rules
            .upsert(&TierRule {
                id: Uuid::new_v4(),
                campaign_id,
                segment_key: None,
                tier,
                weight_ppm: weight,
                priority: 0,
                created_at: now,
            })
            .await
            .expect("seed tier rule");
    }

    let draft = pricing
        .create_version(
            campaign_id,
            &PricingMap {
                single_cost: spec.single_cost,
                multi_10_cost: 0,
                multi_10_discount_ppm: 100_000,
                extras: Default::default(),
            },
            "tests",
        )
        .await
        .expect("seed pricing draft");
    pricing.activate(campaign_id, draft.version, now).await.expect("activate pricing");

    Fixture { campaign_id, prizes: prize_ids }
}

/// Update every tier rule of a campaign to new weights.
pub async fn set_weights(harness: &EngineHarness, campaign_id: Uuid, weights: (u32, u32, u32, u32)) {
    let tier_rules = SqliteTierRuleRepository::new(harness.pool.clone());
    let existing = tier_rules.list_for_campaign(campaign_id).await.expect("list rules");
    let (high, mid, low, fallback) = weights;
    for rule in existing {
        let weight = match rule.tier {
            PrizeTier::High => high,
            PrizeTier::Mid => mid,
            PrizeTier::Low => low,
            PrizeTier::Fallback => fallback,
        };
        tier_rules
            .upsert(&TierRule { weight_ppm: weight, ..rule })
            .await
            .expect("update rule");
    }
}
