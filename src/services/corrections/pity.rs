//! System-wide pity guarantee.
//!
//! The campaign-agnostic default: once the empty streak reaches the
//! configured threshold the draw is forced non-empty. Pins the high
//! tier; selection demotes to the best winnable tier when high is dry.
//! When a campaign guarantee also fires, the guarantee wins (it runs
//! earlier in the registry).

use serde_json::json;

use crate::domain::models::{CorrectionTrace, PrizeTier};

use super::{Correction, CorrectionContext, CorrectionOutcome};

pub struct PityCorrection;

impl Correction for PityCorrection {
    fn name(&self) -> &'static str {
        "pity"
    }

    fn evaluate(&self, ctx: &CorrectionContext<'_>) -> (CorrectionOutcome, CorrectionTrace) {
        // Preemptive, like the campaign guarantee: fire when this draw
        // would otherwise become the threshold-th consecutive empty.
        let threshold = ctx.config.pity.threshold;
        let triggered = ctx.experience.empty_streak + 1 >= threshold;

        let trace = CorrectionTrace {
            module: self.name().to_string(),
            triggered,
            inputs: json!({
                "empty_streak": ctx.experience.empty_streak,
                "threshold": threshold,
            }),
            outputs: if triggered {
                json!({ "tier": PrizeTier::High.as_str() })
            } else {
                json!({})
            },
        };

        if triggered {
            (CorrectionOutcome::Override { tier: PrizeTier::High, prize_id: None }, trace)
        } else {
            (CorrectionOutcome::NoOp, trace)
        }
    }
}
