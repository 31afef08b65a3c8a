//! Operator-forced outcome, evaluated ahead of every other module.

use serde_json::json;

use crate::domain::models::{CorrectionTrace, PrizeTier};

use super::{Correction, CorrectionContext, CorrectionOutcome};

pub struct AdminIntentCorrection;

impl Correction for AdminIntentCorrection {
    fn name(&self) -> &'static str {
        "admin_intent"
    }

    fn evaluate(&self, ctx: &CorrectionContext<'_>) -> (CorrectionOutcome, CorrectionTrace) {
        match ctx.intent {
            Some(intent) => {
                // A prize-specific intent pins its tier too; the planner
                // resolves the tier from the prize itself.
                let tier = intent.forced_tier.unwrap_or(PrizeTier::High);
                let trace = CorrectionTrace {
                    module: self.name().to_string(),
                    triggered: true,
                    inputs: json!({
                        "intent_id": intent.id,
                        "created_by": intent.created_by,
                    }),
                    outputs: json!({
                        "forced_tier": intent.forced_tier.map(|t| t.as_str()),
                        "forced_prize_id": intent.forced_prize_id,
                    }),
                };
                (
                    CorrectionOutcome::Override { tier, prize_id: intent.forced_prize_id },
                    trace,
                )
            }
            None => (
                CorrectionOutcome::NoOp,
                CorrectionTrace {
                    module: self.name().to_string(),
                    triggered: false,
                    inputs: json!({}),
                    outputs: json!({}),
                },
            ),
        }
    }
}
