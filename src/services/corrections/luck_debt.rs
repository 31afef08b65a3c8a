//! Luck-debt weight correction.
//!
//! Applies the user's global luck-debt multiplier to the high tier.
//! The multiplier itself moves slowly: the executor folds each outcome
//! into an empty-rate EMA at commit and recomputes the multiplier from
//! its excess over the target (see `experience::advance_global`).

use serde_json::json;

use crate::domain::models::{CorrectionTrace, TierMultipliers, PPM};

use super::{Correction, CorrectionContext, CorrectionOutcome};

pub struct LuckDebtCorrection;

impl Correction for LuckDebtCorrection {
    fn name(&self) -> &'static str {
        "luck_debt"
    }

    fn evaluate(&self, ctx: &CorrectionContext<'_>) -> (CorrectionOutcome, CorrectionTrace) {
        let multiplier = u64::from(ctx.global.luck_debt_multiplier_ppm);
        let triggered = multiplier > PPM;

        let trace = CorrectionTrace {
            module: self.name().to_string(),
            triggered,
            inputs: json!({
                "historical_empty_rate_ppm": ctx.global.historical_empty_rate_ppm,
                "luck_debt_multiplier_ppm": ctx.global.luck_debt_multiplier_ppm,
            }),
            outputs: if triggered {
                json!({ "high_multiplier_ppm": multiplier })
            } else {
                json!({})
            },
        };

        if triggered {
            let mut multipliers = TierMultipliers::identity();
            multipliers.high = multiplier;
            (CorrectionOutcome::Adjust(multipliers), trace)
        } else {
            (CorrectionOutcome::NoOp, trace)
        }
    }
}
