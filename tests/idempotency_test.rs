//! Idempotency and concurrency behavior of the draw pipeline.

mod helpers;

use std::sync::Arc;

use fortuna::domain::errors::DrawError;
use fortuna::domain::models::PrizeTier;
use fortuna::domain::ports::{AssetService, DrawRepository, ExperienceRepository};
use helpers::engine::{seed_campaign, CampaignSpec, EngineHarness};

#[tokio::test]
async fn same_request_id_replays_identical_response_and_mutates_once() {
    let harness = EngineHarness::new(42).await;
    let fixture = seed_campaign(&harness, CampaignSpec::default()).await;
    harness.assets.credit("U1", 1_000).await;

    let first = harness.pipeline.decide(harness.ctx(&fixture, "U1", "R7")).await.expect("first");
    let replay =
        harness.pipeline.decide(harness.ctx(&fixture, "U1", "R7")).await.expect("replay");

    assert_eq!(first, replay);
    assert_eq!(harness.draws.records_for_key("R7").await.unwrap().len(), 1);
    // Debited exactly once.
    assert_eq!(harness.assets.balance("U1").await.unwrap(), 900);

    let state = harness
        .experience
        .get_experience("U1", fixture.campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.total_draws, 1);
}

#[tokio::test]
async fn concurrent_duplicates_commit_exactly_one_draw() {
    let harness = EngineHarness::new(42).await;
    let fixture = seed_campaign(&harness, CampaignSpec::default()).await;
    harness.assets.credit("U1", 1_000).await;

    let pipeline_a = Arc::clone(&harness.pipeline);
    let pipeline_b = Arc::clone(&harness.pipeline);
    let ctx_a = harness.ctx(&fixture, "U1", "R7");
    let ctx_b = harness.ctx(&fixture, "U1", "R7");

    let (a, b) = tokio::join!(pipeline_a.decide(ctx_a), pipeline_b.decide(ctx_b));

    // Either both see the committed response, or the loser surfaced
    // IN_PROGRESS and may retry with the same key.
    let mut responses = Vec::new();
    for result in [a, b] {
        match result {
            Ok(response) => responses.push(response),
            Err(DrawError::InProgress(key)) => assert_eq!(key, "R7"),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(!responses.is_empty());
    if responses.len() == 2 {
        assert_eq!(responses[0], responses[1]);
    }

    assert_eq!(harness.draws.records_for_key("R7").await.unwrap().len(), 1);
    assert_eq!(harness.assets.balance("U1").await.unwrap(), 900);
}

#[tokio::test]
async fn failed_draw_releases_the_key_for_retry() {
    let harness = EngineHarness::new(42).await;
    // Only a guarantee-pinned prize that is misconfigured can make the
    // executor fail after reservation: point the campaign guarantee at
    // a prize that does not exist and preload the streak.
    let fixture = seed_campaign(
        &harness,
        CampaignSpec {
            guarantee: fortuna::domain::models::GuaranteeConfig {
                enabled: true,
                threshold_draws: 1,
                guarantee_prize_id: Some(uuid::Uuid::new_v4()),
            },
            ..CampaignSpec::default()
        },
    )
    .await;
    harness.assets.credit("U1", 1_000).await;

    let failed = harness.pipeline.decide(harness.ctx(&fixture, "U1", "R-retry")).await;
    assert!(matches!(failed, Err(DrawError::GuaranteeMisconfigured(_))));
    assert!(harness.draws.records_for_key("R-retry").await.unwrap().is_empty());

    // Fix the guarantee, then the same request id succeeds.
    let campaigns =
        fortuna::adapters::sqlite::SqliteCampaignRepository::new(harness.pool.clone());
    use fortuna::domain::ports::CampaignRepository;
    let mut campaign = campaigns.get(fixture.campaign_id).await.unwrap().unwrap();
    campaign.guarantee.guarantee_prize_id = Some(fixture.prizes[&PrizeTier::High]);
    campaigns.upsert(&campaign).await.unwrap();

    let response = harness
        .pipeline
        .decide(harness.ctx(&fixture, "U1", "R-retry"))
        .await
        .expect("retry succeeds");
    assert_eq!(response.grants[0].prize.as_ref().unwrap().id, fixture.prizes[&PrizeTier::High]);
}

#[tokio::test]
async fn stock_of_one_is_never_double_awarded() {
    let harness = EngineHarness::new(42).await;
    let fixture = seed_campaign(
        &harness,
        CampaignSpec {
            weights: (1_000_000, 0, 0, 0),
            prizes: vec![
                (PrizeTier::High, 500, Some(1), None),
                (PrizeTier::Fallback, 0, None, None),
            ],
            ..CampaignSpec::default()
        },
    )
    .await;
    harness.assets.credit("A", 1_000).await;
    harness.assets.credit("B", 1_000).await;

    let pipeline_a = Arc::clone(&harness.pipeline);
    let pipeline_b = Arc::clone(&harness.pipeline);
    let ctx_a = harness.ctx(&fixture, "A", "RA");
    let ctx_b = harness.ctx(&fixture, "B", "RB");
    let (a, b) = tokio::join!(pipeline_a.decide(ctx_a), pipeline_b.decide(ctx_b));
    let (a, b) = (a.expect("draw A"), b.expect("draw B"));

    let high_prize = fixture.prizes[&PrizeTier::High];
    let winners = [&a, &b]
        .iter()
        .filter(|r| r.grants[0].prize.as_ref().is_some_and(|p| p.id == high_prize))
        .count();
    assert_eq!(winners, 1, "exactly one draw may win the last unit");

    // The loser was demoted to a committed fallback outcome.
    let loser = if a.grants[0].prize.as_ref().is_some_and(|p| p.id == high_prize) { &b } else { &a };
    assert_eq!(loser.grants[0].tier, PrizeTier::Fallback);

    let (stock,): (i64,) = sqlx::query_as("SELECT stock_quantity FROM prizes WHERE id = ?")
        .bind(high_prize.to_string())
        .fetch_one(&harness.pool)
        .await
        .unwrap();
    assert_eq!(stock, 0);
}
