//! Draw commands.
//!
//! `draw submit` runs the full decision pipeline against the local
//! store with an in-process asset ledger, which makes it a smoke and
//! audit tool rather than a production surface.

use clap::Subcommand;
use comfy_table::Table;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::cache::{MemoryAssetService, MemoryLockService, MemoryMetricsSink};
use crate::adapters::sqlite::{
    SqliteAdminIntentRepository, SqliteCampaignRepository, SqliteDrawRepository,
    SqliteDrawStore, SqliteExperienceRepository, SqliteIdempotencyStore, SqliteMetricsStore,
    SqlitePricingRepository, SqlitePrizeRepository, SqliteQuotaRuleRepository,
    SqliteTierRuleRepository,
};
use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::DrawType;
use crate::domain::ports::{DrawRepository, DrawRng, OsDrawRng, SeededDrawRng, SystemClock};
use crate::services::{
    BudgetPressureController, DecisionPipeline, DrawContext, DrawExecutor, MetricsAggregator,
};

use super::{emit, AppContext};

#[derive(Subcommand)]
pub enum DrawCommands {
    /// Run one draw request through the pipeline.
    Submit {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        user: String,
        /// single | multi10
        #[arg(long, default_value = "single")]
        draw_type: String,
        #[arg(long)]
        request_id: String,
        /// Points credited to the in-process ledger before the draw.
        #[arg(long, default_value_t = 10_000)]
        balance: i64,
        /// Deterministic RNG seed; omit for OS entropy.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        segment: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Show the committed records for an idempotency key.
    Show {
        #[arg(long)]
        request_id: String,
    },
}

pub async fn handle(command: DrawCommands, app: &AppContext) -> DrawResult<()> {
    match command {
        DrawCommands::Submit {
            campaign,
            user,
            draw_type,
            request_id,
            balance,
            seed,
            segment,
            role,
        } => {
            let draw_type = DrawType::from_str(&draw_type)
                .ok_or_else(|| DrawError::ConfigViolation(format!("bad draw type {draw_type}")))?;

            let assets = Arc::new(MemoryAssetService::new());
            assets.credit(&user, balance).await;
            let rng: Arc<dyn DrawRng> = match seed {
                Some(seed) => Arc::new(SeededDrawRng::new(seed)),
                None => Arc::new(OsDrawRng),
            };
            let pipeline = build_pipeline(app, Arc::clone(&assets) as _, rng)?;

            let response = pipeline
                .decide(DrawContext {
                    user_id: user,
                    campaign_id: campaign,
                    draw_type,
                    client_request_id: request_id,
                    user_role: role,
                    segment,
                })
                .await?;

            let mut table = Table::new();
            table.set_header(["draw", "tier", "prize", "value"]);
            for grant in &response.grants {
                table.add_row([
                    grant.draw_id.to_string(),
                    grant.tier.as_str().to_string(),
                    grant.prize.as_ref().map_or_else(|| "-".to_string(), |p| p.name.clone()),
                    grant.prize.as_ref().map_or_else(String::new, |p| p.value_points.to_string()),
                ]);
            }
            emit(app.json, &response, table);
            if !app.json {
                println!("balance {} pending_issue {}", response.new_balance, response.pending_issue);
            }
            Ok(())
        }
        DrawCommands::Show { request_id } => {
            let repo = SqliteDrawRepository::new(app.pool.clone());
            let records = repo.records_for_key(&request_id).await?;
            let mut table = Table::new();
            table.set_header(["draw", "tier", "prize_id", "value", "cost", "at"]);
            for r in &records {
                table.add_row([
                    r.id.to_string(),
                    r.reward_tier.as_str().to_string(),
                    r.prize_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
                    r.prize_value_points.to_string(),
                    r.cost_points.to_string(),
                    r.created_at.to_rfc3339(),
                ]);
            }
            emit(app.json, &records, table);
            Ok(())
        }
    }
}

fn build_pipeline(
    app: &AppContext,
    assets: Arc<dyn crate::domain::ports::AssetService>,
    rng: Arc<dyn DrawRng>,
) -> DrawResult<DecisionPipeline> {
    let pool = app.pool.clone();
    let clock = Arc::new(SystemClock);
    let metrics_sink = Arc::new(MemoryMetricsSink::new());
    let metrics = Arc::new(MetricsAggregator::with_store(
        Arc::clone(&metrics_sink) as _,
        SqliteMetricsStore::new(pool.clone()),
    ));
    let pressure = Arc::new(BudgetPressureController::new(
        Arc::clone(&metrics_sink) as _,
        Arc::clone(&clock) as _,
        app.config.pressure.clone(),
    ));
    let idempotency = Arc::new(SqliteIdempotencyStore::new(pool.clone()));
    let executor = Arc::new(DrawExecutor::new(
        Arc::new(SqliteDrawStore::new(pool.clone())),
        Arc::clone(&assets),
        Arc::new(MemoryLockService::new()),
        Arc::clone(&idempotency) as _,
        Arc::clone(&clock) as _,
        rng,
        app.config.draw.clone(),
        app.config.corrections.clone(),
        app.config.outbox.clone(),
    ));

    DecisionPipeline::builder()
        .campaigns(Arc::new(SqliteCampaignRepository::new(pool.clone())))
        .pricing(Arc::new(SqlitePricingRepository::new(pool.clone())))
        .prizes(Arc::new(SqlitePrizeRepository::new(pool.clone())))
        .tier_rules(Arc::new(SqliteTierRuleRepository::new(pool.clone())))
        .quota_rules(Arc::new(SqliteQuotaRuleRepository::new(pool.clone())))
        .experience(Arc::new(SqliteExperienceRepository::new(pool.clone())))
        .draws(Arc::new(SqliteDrawRepository::new(pool.clone())))
        .intents(Arc::new(SqliteAdminIntentRepository::new(pool)))
        .assets(assets)
        .idempotency(idempotency)
        .metrics(metrics)
        .pressure(pressure)
        .executor(executor)
        .clock(clock)
        .config(app.config.clone())
        .build()
}
