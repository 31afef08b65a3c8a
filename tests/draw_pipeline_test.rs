//! End-to-end decision pipeline scenarios (deterministic, seed 42).

mod helpers;

use fortuna::domain::errors::DrawError;
use fortuna::domain::models::{
    BudgetMode, GuaranteeConfig, PipelineType, PrizeTier, QuotaRule, QuotaScope,
    UserExperienceState,
};
use fortuna::domain::ports::{AssetService, Clock, DrawRepository, ExperienceRepository, QuotaRuleRepository};
use fortuna::services::EngineConfig;
use helpers::engine::{seed_campaign, set_weights, CampaignSpec, EngineHarness};

#[tokio::test]
async fn first_draw_of_new_user_commits_and_debits() {
    let harness = EngineHarness::new(42).await;
    let fixture = seed_campaign(&harness, CampaignSpec::default()).await;
    harness.assets.credit("U1", 500).await;

    let response =
        harness.pipeline.decide(harness.ctx(&fixture, "U1", "R1")).await.expect("draw");

    assert_eq!(response.new_balance, 400);
    assert_eq!(response.grants.len(), 1);
    assert!(!response.pending_issue);

    let records = harness.draws.records_for_key("R1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].cost_points, 100);

    let decision = harness.draws.decision_for_draw(records[0].id).await.unwrap().unwrap();
    assert_eq!(decision.pipeline_type, PipelineType::Normal);
    assert_eq!(decision.selected_tier, records[0].reward_tier);

    let state = harness
        .experience
        .get_experience("U1", fixture.campaign_id)
        .await
        .unwrap()
        .expect("state created");
    assert_eq!(state.total_draws, 1);
}

#[tokio::test]
async fn pity_fires_when_streak_would_hit_threshold() {
    let harness = EngineHarness::new(42).await;
    // Heavy fallback weights so only the override can produce a win.
    let fixture = seed_campaign(
        &harness,
        CampaignSpec { weights: (0, 0, 0, 1_000_000), ..CampaignSpec::default() },
    )
    .await;
    harness.assets.credit("U1", 10_000).await;

    let mut state = UserExperienceState::fresh("U1", fixture.campaign_id, harness.clock.now());
    state.empty_streak = 9;
    state.total_draws = 9;
    state.total_empties = 9;
    harness.set_experience(&state).await;

    let response =
        harness.pipeline.decide(harness.ctx(&fixture, "U1", "R-pity")).await.expect("draw");
    let grant = &response.grants[0];
    assert_eq!(grant.tier, PrizeTier::High);

    let decision = harness.draws.decision_for_draw(grant.draw_id).await.unwrap().unwrap();
    assert_eq!(decision.pipeline_type, PipelineType::Pity);
    let pity = decision.corrections.iter().find(|c| c.module == "pity").unwrap();
    assert!(pity.triggered);

    let after = harness
        .experience
        .get_experience("U1", fixture.campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.empty_streak, 0);
    assert_eq!(after.pity_trigger_count, 1);
}

#[tokio::test]
async fn campaign_guarantee_wins_over_pity() {
    let harness = EngineHarness::new(42).await;
    let fixture = seed_campaign(
        &harness,
        CampaignSpec {
            guarantee: GuaranteeConfig {
                enabled: true,
                threshold_draws: 10,
                guarantee_prize_id: None,
            },
            weights: (0, 0, 0, 1_000_000),
            ..CampaignSpec::default()
        },
    )
    .await;
    harness.assets.credit("U1", 10_000).await;

    let mut state = UserExperienceState::fresh("U1", fixture.campaign_id, harness.clock.now());
    state.empty_streak = 9;
    harness.set_experience(&state).await;

    let response =
        harness.pipeline.decide(harness.ctx(&fixture, "U1", "R-g")).await.expect("draw");
    let decision =
        harness.draws.decision_for_draw(response.grants[0].draw_id).await.unwrap().unwrap();
    assert_eq!(decision.pipeline_type, PipelineType::Guarantee);
    // Pity saw the same streak and still traced as triggered.
    assert!(decision.corrections.iter().any(|c| c.module == "pity" && c.triggered));
}

#[tokio::test]
async fn anti_high_cooldown_arms_counts_down_and_dampens() {
    let harness = EngineHarness::new(42).await;
    // All weight on high: the first two draws must win high.
    let fixture = seed_campaign(
        &harness,
        CampaignSpec { weights: (1_000_000, 0, 0, 0), ..CampaignSpec::default() },
    )
    .await;
    harness.assets.credit("U1", 10_000).await;

    let mut state = UserExperienceState::fresh("U1", fixture.campaign_id, harness.clock.now());
    state.recent_high_count = 1;
    harness.set_experience(&state).await;

    // Arming draw: second consecutive high win.
    let response =
        harness.pipeline.decide(harness.ctx(&fixture, "U1", "R-arm")).await.expect("draw");
    assert_eq!(response.grants[0].tier, PrizeTier::High);
    let after_arm = harness
        .experience
        .get_experience("U1", fixture.campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_arm.anti_high_cooldown, 3);
    assert_eq!(after_arm.recent_high_count, 0);

    // Park the weights on low so the cooldown can drain without
    // re-arming.
    set_weights(&harness, fixture.campaign_id, (0, 0, 1_000_000, 0)).await;

    for (round, expected_after) in [(1u32, 2u32), (2, 1), (3, 0)] {
        let response = harness
            .pipeline
            .decide(harness.ctx(&fixture, "U1", &format!("R-cool-{round}")))
            .await
            .expect("draw");
        let decision =
            harness.draws.decision_for_draw(response.grants[0].draw_id).await.unwrap().unwrap();
        let anti_high =
            decision.corrections.iter().find(|c| c.module == "anti_high").unwrap();
        assert!(anti_high.triggered, "round {round} should be dampened");
        assert_eq!(anti_high.outputs["high_multiplier_ppm"], 200_000);
        assert_eq!(decision.weights.adjusted.high, 0);

        let state = harness
            .experience
            .get_experience("U1", fixture.campaign_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.anti_high_cooldown, expected_after, "after round {round}");
    }

    // Cooldown spent: the next draw is no longer dampened.
    let response =
        harness.pipeline.decide(harness.ctx(&fixture, "U1", "R-idle")).await.expect("draw");
    let decision =
        harness.draws.decision_for_draw(response.grants[0].draw_id).await.unwrap().unwrap();
    assert!(!decision.corrections.iter().any(|c| c.module == "anti_high" && c.triggered));
}

#[tokio::test]
async fn budget_exhaustion_falls_back_and_never_overdraws() {
    let harness = EngineHarness::new(42).await;
    let fixture = seed_campaign(
        &harness,
        CampaignSpec {
            budget_mode: BudgetMode::BudgetPool,
            total_budget: 10_000,
            remaining_budget: 10, // below every non-fallback prize value
            weights: (900_000, 50_000, 40_000, 10_000),
            ..CampaignSpec::default()
        },
    )
    .await;
    harness.assets.credit("U1", 10_000).await;

    let response =
        harness.pipeline.decide(harness.ctx(&fixture, "U1", "R-budget")).await.expect("draw");
    let grant = &response.grants[0];
    assert_eq!(grant.tier, PrizeTier::Fallback);
    let value = grant.prize.as_ref().map_or(0, |p| p.value_points);
    assert!(value <= 10);

    let remaining = harness.remaining_budget(fixture.campaign_id).await;
    assert!(remaining >= 0);
    assert_eq!(remaining, 10 - value);
}

#[tokio::test]
async fn quota_rule_caps_daily_draws() {
    let harness = EngineHarness::new(42).await;
    let fixture = seed_campaign(&harness, CampaignSpec::default()).await;
    harness.assets.credit("U1", 10_000).await;

    let quotas =
        fortuna::adapters::sqlite::SqliteQuotaRuleRepository::new(harness.pool.clone());
    quotas
        .upsert(&QuotaRule {
            id: uuid::Uuid::new_v4(),
            scope: QuotaScope::User,
            scope_ref: Some("U1".to_string()),
            daily_limit: 2,
            priority: 10,
            valid_from: None,
            valid_until: None,
            created_at: harness.clock.now(),
        })
        .await
        .unwrap();

    harness.pipeline.decide(harness.ctx(&fixture, "U1", "Q1")).await.expect("first");
    harness.pipeline.decide(harness.ctx(&fixture, "U1", "Q2")).await.expect("second");
    let third = harness.pipeline.decide(harness.ctx(&fixture, "U1", "Q3")).await;
    assert!(matches!(third, Err(DrawError::QuotaExceeded { used: 2, limit: 2 })));
}

#[tokio::test]
async fn insufficient_balance_rejects_before_any_mutation() {
    let harness = EngineHarness::new(42).await;
    let fixture = seed_campaign(&harness, CampaignSpec::default()).await;
    harness.assets.credit("U1", 50).await;

    let result = harness.pipeline.decide(harness.ctx(&fixture, "U1", "R-poor")).await;
    assert!(matches!(
        result,
        Err(DrawError::InsufficientPoints { balance: 50, cost: 100 })
    ));
    assert!(harness.draws.records_for_key("R-poor").await.unwrap().is_empty());
    assert_eq!(harness.assets.balance("U1").await.unwrap(), 50);
}

#[tokio::test]
async fn unknown_campaign_is_terminal() {
    let harness = EngineHarness::new(42).await;
    let fixture = seed_campaign(&harness, CampaignSpec::default()).await;
    harness.assets.credit("U1", 500).await;

    let mut ctx = harness.ctx(&fixture, "U1", "R-x");
    ctx.campaign_id = uuid::Uuid::new_v4();
    let result = harness.pipeline.decide(ctx).await;
    assert!(matches!(result, Err(DrawError::CampaignNotFound(_))));
}

#[tokio::test]
async fn multi10_commits_ten_records_under_one_key() {
    let mut config = EngineConfig::default();
    config.draw.default_daily_quota = 50;
    let harness = EngineHarness::with_config(42, config).await;
    let fixture = seed_campaign(&harness, CampaignSpec::default()).await;
    harness.assets.credit("U1", 10_000).await;

    let mut ctx = harness.ctx(&fixture, "U1", "R-multi");
    ctx.draw_type = fortuna::domain::models::DrawType::Multi10;
    let response = harness.pipeline.decide(ctx).await.expect("multi draw");

    assert_eq!(response.grants.len(), 10);
    // Derived ten-draw price: 10 x 100 with a 10% discount.
    assert_eq!(response.new_balance, 10_000 - 900);

    let records = harness.draws.records_for_key("R-multi").await.unwrap();
    assert_eq!(records.len(), 10);
    let total_cost: i64 = records.iter().map(|r| r.cost_points).sum();
    assert_eq!(total_cost, 900);

    let state = harness
        .experience
        .get_experience("U1", fixture.campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.total_draws, 10);
}

#[tokio::test]
async fn missing_fallback_prize_is_config_violation() {
    let harness = EngineHarness::new(42).await;
    let fixture = seed_campaign(
        &harness,
        CampaignSpec {
            prizes: vec![(PrizeTier::High, 500, None, None), (PrizeTier::Low, 50, None, None)],
            ..CampaignSpec::default()
        },
    )
    .await;
    harness.assets.credit("U1", 500).await;

    let result = harness.pipeline.decide(harness.ctx(&fixture, "U1", "R-nofb")).await;
    assert!(matches!(result, Err(DrawError::ConfigViolation(_))));
}
