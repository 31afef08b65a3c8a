//! Correction modules.
//!
//! Each module is pure: it inspects the draw context and returns a
//! [`CorrectionOutcome`] plus a trace entry. The registry evaluates
//! them in fixed order (admin intent, guarantee, pity, anti-empty,
//! anti-high, luck debt); the first override pins the outcome and
//! later modules can only attach traces. Weight adjustments compose
//! multiplicatively and clamp to the pressure cell's cap.

pub mod admin_intent;
pub mod anti_empty;
pub mod anti_high;
pub mod guarantee;
pub mod luck_debt;
pub mod pity;

pub use admin_intent::AdminIntentCorrection;
pub use anti_empty::AntiEmptyCorrection;
pub use anti_high::AntiHighCorrection;
pub use guarantee::GuaranteeCorrection;
pub use luck_debt::LuckDebtCorrection;
pub use pity::PityCorrection;

use uuid::Uuid;

use crate::domain::models::{
    AdminIntent, Campaign, CorrectionTrace, PipelineType, PrizeTier, TierMultipliers,
    UserExperienceState, UserGlobalState,
};

use super::config::CorrectionsConfig;
use super::pressure::PressureCell;

/// Read-only context every module evaluates against.
pub struct CorrectionContext<'a> {
    pub campaign: &'a Campaign,
    pub experience: &'a UserExperienceState,
    pub global: &'a UserGlobalState,
    pub cell: &'a PressureCell,
    pub config: &'a CorrectionsConfig,
    pub intent: Option<&'a AdminIntent>,
}

/// What one module decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectionOutcome {
    /// Pin the selected tier (or a specific prize), bypassing sampling.
    Override { tier: PrizeTier, prize_id: Option<Uuid> },
    /// Multiply per-tier weights.
    Adjust(TierMultipliers),
    NoOp,
}

pub trait Correction: Send + Sync {
    /// Stable module name used in traces and metrics.
    fn name(&self) -> &'static str;

    fn evaluate(&self, ctx: &CorrectionContext<'_>) -> (CorrectionOutcome, CorrectionTrace);
}

/// The pinned outcome after registry evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedOutcome {
    pub source: &'static str,
    pub tier: PrizeTier,
    pub prize_id: Option<Uuid>,
    /// Intent consumed in-transaction when the admin path fired.
    pub intent_id: Option<Uuid>,
}

/// Composite verdict of the whole registry for one draw.
#[derive(Debug, Clone)]
pub struct CorrectionResult {
    pub pinned: Option<PinnedOutcome>,
    pub multipliers: TierMultipliers,
    pub traces: Vec<CorrectionTrace>,
    pub pipeline_type: PipelineType,
    /// Whether the pity module fired (drives the pity counter).
    pub pity_applied: bool,
}

/// Fixed-order correction registry.
pub struct CorrectionRegistry {
    modules: Vec<Box<dyn Correction>>,
}

impl CorrectionRegistry {
    /// The standard module set in evaluation order.
    pub fn standard() -> Self {
        Self {
            modules: vec![
                Box::new(AdminIntentCorrection),
                Box::new(GuaranteeCorrection),
                Box::new(PityCorrection),
                Box::new(AntiEmptyCorrection),
                Box::new(AntiHighCorrection),
                Box::new(LuckDebtCorrection),
            ],
        }
    }

    pub fn evaluate(&self, ctx: &CorrectionContext<'_>) -> CorrectionResult {
        let mut pinned: Option<PinnedOutcome> = None;
        let mut multipliers = TierMultipliers::identity();
        let mut traces = Vec::with_capacity(self.modules.len());
        let mut pipeline_type = PipelineType::Normal;
        let mut pity_applied = false;

        for module in &self.modules {
            let (outcome, trace) = module.evaluate(ctx);
            match outcome {
                CorrectionOutcome::Override { tier, prize_id } => {
                    if pinned.is_none() {
                        let intent_id = (module.name() == "admin_intent")
                            .then(|| ctx.intent.map(|i| i.id))
                            .flatten();
                        pipeline_type = match module.name() {
                            "admin_intent" => PipelineType::Admin,
                            "guarantee" => PipelineType::Guarantee,
                            "pity" => PipelineType::Pity,
                            _ => PipelineType::Normal,
                        };
                        if module.name() == "pity" {
                            pity_applied = true;
                        }
                        pinned = Some(PinnedOutcome {
                            source: module.name(),
                            tier,
                            prize_id,
                            intent_id,
                        });
                    }
                    // A later module's override is recorded in its
                    // trace but cannot displace the pinned one.
                }
                CorrectionOutcome::Adjust(adjustment) => multipliers.compose(&adjustment),
                CorrectionOutcome::NoOp => {}
            }
            traces.push(trace);
        }

        multipliers.clamp_to(ctx.cell.cap_multiplier_ppm);
        CorrectionResult { pinned, multipliers, traces, pipeline_type, pity_applied }
    }
}
