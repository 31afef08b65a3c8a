//! Draw executor.
//!
//! The only mutating component. Serializes per (user, campaign) via
//! the lock service, opens one unit of work, re-validates admission
//! inside it, debits the asset service, then resolves each sub-draw:
//! corrections, selection, conditional stock and budget updates,
//! record and trace inserts, experience diff. Issuance failures defer
//! to the durable outbox; the idempotency record flips to committed
//! with the canonical response before the transaction commits.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{
    metrics::shanghai_day, AdminIntent, BudgetMode, CorrectionTrace, DrawDecision, DrawRecord,
    DrawSample, IssueOutboxEntry, OutboxStatus, Prize, PrizeTier, TierWeights,
    UserExperienceState, UserGlobalState, WeightSnapshot,
};
use crate::domain::ports::lock_service::draw_lock_key;
use crate::domain::ports::{
    AssetService, Clock, DrawLockService, DrawRng, DrawStore, DrawUnitOfWork, IdempotencyStore,
};

use super::config::{CorrectionsConfig, DrawConfig, OutboxConfig};
use super::corrections::{CorrectionContext, CorrectionRegistry, CorrectionResult, PinnedOutcome};
use super::experience::{advance, advance_global, OutcomeFacts};
use super::pipeline::{DrawContext, DrawResponse, PrizeGrant, PrizeRef};
use super::pressure::PressureCell;
use super::selector::{self, EligibilityView, Selection};

/// Everything the pipeline resolved before handing off execution.
pub struct ExecutionRequest {
    pub ctx: DrawContext,
    pub prizes: Vec<Prize>,
    /// Tier weights with the pressure cell's empty multiplier already
    /// folded into the fallback weight.
    pub base_weights: TierWeights,
    pub cell: PressureCell,
    pub intent: Option<AdminIntent>,
    pub cost: i64,
    pub quota_limit: u32,
    pub experience: UserExperienceState,
    pub global: UserGlobalState,
    /// Prize award counts for today (per-day cap gate).
    pub daily_awards: HashMap<Uuid, u32>,
}

/// Committed result plus the samples to feed the metrics sink.
pub struct ExecutionOutcome {
    pub response: DrawResponse,
    pub samples: Vec<DrawSample>,
}

pub struct DrawExecutor {
    store: Arc<dyn DrawStore>,
    assets: Arc<dyn AssetService>,
    locks: Arc<dyn DrawLockService>,
    idempotency: Arc<dyn IdempotencyStore>,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn DrawRng>,
    corrections: CorrectionRegistry,
    draw_config: DrawConfig,
    corrections_config: CorrectionsConfig,
    outbox_config: OutboxConfig,
}

impl DrawExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DrawStore>,
        assets: Arc<dyn AssetService>,
        locks: Arc<dyn DrawLockService>,
        idempotency: Arc<dyn IdempotencyStore>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn DrawRng>,
        draw_config: DrawConfig,
        corrections_config: CorrectionsConfig,
        outbox_config: OutboxConfig,
    ) -> Self {
        Self {
            store,
            assets,
            locks,
            idempotency,
            clock,
            rng,
            corrections: CorrectionRegistry::standard(),
            draw_config,
            corrections_config,
            outbox_config,
        }
    }

    pub async fn execute(&self, request: ExecutionRequest) -> DrawResult<ExecutionOutcome> {
        let lock_key = draw_lock_key(&request.ctx.user_id, request.ctx.campaign_id);
        let guard = self
            .locks
            .acquire(
                &lock_key,
                Duration::from_secs(self.draw_config.lock_ttl_secs),
                Duration::from_millis(self.draw_config.lock_wait_ms),
            )
            .await?;

        let outcome = self.execute_locked(request).await;
        if let Err(release_err) = guard.release().await {
            warn!(error = %release_err, key = %lock_key, "draw lock release failed");
        }
        outcome
    }

    async fn execute_locked(&self, request: ExecutionRequest) -> DrawResult<ExecutionOutcome> {
        let mut uow = self.store.begin().await?;
        match self.run_in_tx(&mut uow, request).await {
            Ok(outcome) => {
                // Spec order: idempotency commits before the store does.
                // A crash between the two expires the reservation and a
                // retry replays the canonical response.
                self.idempotency
                    .commit(
                        &outcome.response.request_id,
                        serde_json::to_value(&outcome.response)?,
                        Duration::from_secs(self.draw_config.response_ttl_secs),
                    )
                    .await?;
                uow.commit().await?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "draw rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn run_in_tx(
        &self,
        uow: &mut Box<dyn DrawUnitOfWork>,
        request: ExecutionRequest,
    ) -> DrawResult<ExecutionOutcome> {
        let now = self.clock.now();
        let ctx = &request.ctx;
        let sub_draws = ctx.draw_type.count();

        // Re-validate admission against authoritative rows.
        let campaign = uow.campaign(ctx.campaign_id).await?;
        if !campaign.accepts_draws(now) {
            return Err(DrawError::CampaignInactive(ctx.campaign_id));
        }
        let used = uow
            .count_user_draws_on_day(ctx.campaign_id, &ctx.user_id, shanghai_day(now))
            .await?;
        if used + sub_draws > request.quota_limit {
            return Err(DrawError::QuotaExceeded { used, limit: request.quota_limit });
        }

        let receipt = self
            .assets
            .debit(&ctx.user_id, request.cost, &format!("{}:debit", ctx.client_request_id))
            .await?;

        let mut experience = request.experience.clone();
        let mut global = request.global.clone();
        let mut daily_awards = request.daily_awards.clone();
        let mut intent = request.intent.clone();
        let mut budget_ceiling = campaign.spendable_budget();
        let is_budget_pool = campaign.budget_mode == BudgetMode::BudgetPool;

        let mut grants = Vec::with_capacity(sub_draws as usize);
        let mut samples = Vec::with_capacity(sub_draws as usize);
        let mut issued: Vec<(Uuid, Option<Prize>)> = Vec::new();

        for index in 0..sub_draws {
            let correction_ctx = CorrectionContext {
                campaign: &campaign,
                experience: &experience,
                global: &global,
                cell: &request.cell,
                config: &self.corrections_config,
                intent: intent.as_ref(),
            };
            let verdict = self.corrections.evaluate(&correction_ctx);
            let adjusted_weights = request.base_weights.scaled(&verdict.multipliers);

            let resolved = self
                .resolve_award(
                    uow,
                    &request,
                    &verdict,
                    &adjusted_weights,
                    &daily_awards,
                    budget_ceiling,
                    is_budget_pool,
                )
                .await?;

            if let Some(prize) = &resolved.prize {
                *daily_awards.entry(prize.id).or_default() += 1;
                if is_budget_pool {
                    budget_ceiling -= prize.value_points;
                }
            }

            let record = DrawRecord {
                id: Uuid::new_v4(),
                campaign_id: ctx.campaign_id,
                user_id: ctx.user_id.clone(),
                draw_type: ctx.draw_type,
                cost_points: if index == 0 { request.cost } else { 0 },
                reward_tier: resolved.tier,
                prize_id: resolved.prize.as_ref().map(|p| p.id),
                prize_value_points: resolved.prize.as_ref().map_or(0, |p| p.value_points),
                idempotency_key: ctx.client_request_id.clone(),
                created_at: now,
            };
            uow.insert_draw(&record).await?;

            let decision = DrawDecision {
                id: Uuid::new_v4(),
                draw_id: record.id,
                campaign_id: ctx.campaign_id,
                user_id: ctx.user_id.clone(),
                budget_tier: request.cell.budget_tier,
                pressure_tier: request.cell.pressure_tier,
                effective_budget: if is_budget_pool { budget_ceiling } else { 0 },
                pipeline_type: verdict.pipeline_type,
                corrections: resolved.traces,
                selected_tier: resolved.tier,
                weights: WeightSnapshot { base: request.base_weights, adjusted: adjusted_weights },
                created_at: now,
            };
            uow.insert_decision(&decision).await?;

            let facts = OutcomeFacts { tier: resolved.tier, pity_applied: verdict.pity_applied };
            experience = advance(&experience, facts, &self.corrections_config.anti_high, now);
            global = advance_global(&global, facts, &self.corrections_config.luck_debt, now);

            if let Some(pinned) = &verdict.pinned {
                if let Some(intent_id) = pinned.intent_id {
                    uow.consume_admin_intent(intent_id).await?;
                    intent = None;
                }
            }

            samples.push(DrawSample {
                campaign_id: ctx.campaign_id,
                user_id: ctx.user_id.clone(),
                at: now,
                tier: resolved.tier,
                budget_tier: request.cell.budget_tier,
                corrections_triggered: decision
                    .triggered_modules()
                    .map(String::from)
                    .collect(),
                cost_points: record.cost_points,
                prize_value: record.prize_value_points,
            });
            issued.push((record.id, resolved.prize.clone()));
            grants.push(PrizeGrant {
                draw_id: record.id,
                decision_id: decision.id,
                tier: resolved.tier,
                prize: resolved.prize.as_ref().map(|p| PrizeRef {
                    id: p.id,
                    name: p.name.clone(),
                    tier: p.tier,
                    value_points: p.value_points,
                }),
            });

            debug!(
                user = %ctx.user_id,
                campaign = %ctx.campaign_id,
                sub_draw = index,
                tier = resolved.tier.as_str(),
                pipeline = verdict.pipeline_type.as_str(),
                "sub-draw resolved"
            );
        }

        uow.upsert_experience(&experience).await?;
        uow.upsert_global(&global).await?;

        let pending_issue = self.issue_or_defer(uow, ctx, &issued, now).await?;

        Ok(ExecutionOutcome {
            response: DrawResponse {
                request_id: ctx.client_request_id.clone(),
                grants,
                new_balance: receipt.balance_after,
                pending_issue,
            },
            samples,
        })
    }

    /// Selection plus the conditional budget/stock updates, with one
    /// in-transaction retry when a row-level race steals the prize.
    #[allow(clippy::too_many_arguments)]
    async fn resolve_award(
        &self,
        uow: &mut Box<dyn DrawUnitOfWork>,
        request: &ExecutionRequest,
        verdict: &CorrectionResult,
        adjusted_weights: &TierWeights,
        daily_awards: &HashMap<Uuid, u32>,
        budget_ceiling: i64,
        is_budget_pool: bool,
    ) -> DrawResult<ResolvedAward> {
        let mut excluded: HashSet<Uuid> = HashSet::new();
        let max_attempts = 2;

        for attempt in 0..max_attempts {
            let view = EligibilityView {
                daily_awards: daily_awards.clone(),
                budget_ceiling,
                excluded: excluded.clone(),
            };
            let selection =
                self.plan_selection(request, verdict, adjusted_weights, &view)?;

            let Some(prize) = selection.prize else {
                // Fallback tier itself is dry. With no fallback prize
                // configured at all this is a config violation; with
                // one configured but exhausted it is the committed
                // empty degradation.
                let has_fallback = request
                    .prizes
                    .iter()
                    .any(|p| p.tier == PrizeTier::Fallback && p.is_active());
                if !has_fallback {
                    return Err(DrawError::ConfigViolation(format!(
                        "campaign {} has no active fallback prize",
                        request.ctx.campaign_id
                    )));
                }
                warn!(campaign = %request.ctx.campaign_id, "fallback exhaustion, committing empty outcome");
                return Ok(ResolvedAward {
                    tier: PrizeTier::Fallback,
                    prize: None,
                    traces: verdict.traces.clone(),
                });
            };

            if is_budget_pool && prize.value_points > 0 {
                let consumed =
                    uow.consume_budget(request.ctx.campaign_id, prize.value_points).await?;
                if !consumed {
                    excluded.insert(prize.id);
                    continue;
                }
            }
            if uow.decrement_stock(prize.id).await? {
                return Ok(ResolvedAward {
                    tier: selection.awarded_tier,
                    prize: Some(prize.clone()),
                    traces: verdict.traces.clone(),
                });
            }
            // Stock raced away after the budget hold; give it back.
            if is_budget_pool && prize.value_points > 0 {
                uow.refund_budget(request.ctx.campaign_id, prize.value_points).await?;
            }
            excluded.insert(prize.id);
            debug!(prize = %prize.id, attempt, "stock decrement lost the race, demoting");
        }

        // Retry budget exhausted: commit the empty outcome.
        Ok(ResolvedAward { tier: PrizeTier::Fallback, prize: None, traces: verdict.traces.clone() })
    }

    fn plan_selection<'a>(
        &self,
        request: &'a ExecutionRequest,
        verdict: &CorrectionResult,
        adjusted_weights: &TierWeights,
        view: &EligibilityView,
    ) -> DrawResult<Selection<'a>> {
        match &verdict.pinned {
            Some(pinned) => {
                if let Some(prize_id) = pinned.prize_id {
                    let prize = request.prizes.iter().find(|p| p.id == prize_id);
                    return match prize {
                        Some(prize) if prize.is_active() => {
                            if view.eligible(prize) {
                                Ok(Selection {
                                    sampled_tier: prize.tier,
                                    awarded_tier: prize.tier,
                                    prize: Some(prize),
                                })
                            } else {
                                // Configured prize exists but is not
                                // currently winnable; fall back to its
                                // tier and demote normally.
                                Ok(selector::select_pinned(
                                    prize.tier,
                                    &request.prizes,
                                    view,
                                    self.rng.as_ref(),
                                ))
                            }
                        }
                        _ => Err(self.pinned_prize_error(pinned, request)),
                    };
                }
                Ok(selector::select_pinned(pinned.tier, &request.prizes, view, self.rng.as_ref()))
            }
            None => Ok(selector::select(adjusted_weights, &request.prizes, view, self.rng.as_ref())),
        }
    }

    fn pinned_prize_error(&self, pinned: &PinnedOutcome, request: &ExecutionRequest) -> DrawError {
        if pinned.source == "guarantee" {
            DrawError::GuaranteeMisconfigured(request.ctx.campaign_id)
        } else {
            DrawError::ConfigViolation(format!(
                "{} pins prize {:?} which is absent or inactive",
                pinned.source, pinned.prize_id
            ))
        }
    }

    /// Issue item prizes; a failed issue enqueues durable redelivery
    /// and the draw still commits.
    async fn issue_or_defer(
        &self,
        uow: &mut Box<dyn DrawUnitOfWork>,
        ctx: &DrawContext,
        issued: &[(Uuid, Option<Prize>)],
        now: DateTime<Utc>,
    ) -> DrawResult<bool> {
        let mut pending = false;
        for (index, (draw_id, prize)) in issued.iter().enumerate() {
            let Some(prize) = prize else { continue };
            let item_ref = format!("prize:{}", prize.id);
            let idem_key = if issued.len() == 1 {
                format!("{}:issue", ctx.client_request_id)
            } else {
                format!("{}:issue:{index}", ctx.client_request_id)
            };
            match self.assets.issue(&ctx.user_id, &item_ref, &idem_key).await {
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, draw = %draw_id, "prize issue deferred to outbox");
                    let entry = IssueOutboxEntry {
                        id: Uuid::new_v4(),
                        draw_id: *draw_id,
                        user_id: ctx.user_id.clone(),
                        prize_id: prize.id,
                        item_ref,
                        idempotency_key: idem_key,
                        attempts: 1,
                        next_attempt_at: now
                            + ChronoDuration::seconds(
                                i64::try_from(self.outbox_config.base_backoff_secs).unwrap_or(30),
                            ),
                        status: OutboxStatus::Pending,
                        last_error: Some(err.to_string()),
                        created_at: now,
                    };
                    uow.enqueue_issue(&entry).await?;
                    pending = true;
                }
            }
        }
        Ok(pending)
    }
}

/// One sub-draw's resolved outcome.
struct ResolvedAward {
    tier: PrizeTier,
    prize: Option<Prize>,
    traces: Vec<CorrectionTrace>,
}
