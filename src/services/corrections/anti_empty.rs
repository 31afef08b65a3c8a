//! Anti-empty weight correction.
//!
//! While the empty streak sits at or above the threshold, shift weight
//! away from the fallback tier and toward high/mid. The composite is
//! clamped by the pressure cell's cap downstream.

use serde_json::json;

use crate::domain::models::{CorrectionTrace, TierMultipliers};

use super::{Correction, CorrectionContext, CorrectionOutcome};

pub struct AntiEmptyCorrection;

impl Correction for AntiEmptyCorrection {
    fn name(&self) -> &'static str {
        "anti_empty"
    }

    fn evaluate(&self, ctx: &CorrectionContext<'_>) -> (CorrectionOutcome, CorrectionTrace) {
        let cfg = &ctx.config.anti_empty;
        let triggered = cfg.threshold > 0 && ctx.experience.empty_streak >= cfg.threshold;

        let trace = CorrectionTrace {
            module: self.name().to_string(),
            triggered,
            inputs: json!({
                "empty_streak": ctx.experience.empty_streak,
                "threshold": cfg.threshold,
            }),
            outputs: if triggered {
                json!({
                    "fallback_multiplier_ppm": cfg.fallback_multiplier_ppm,
                    "boost_multiplier_ppm": cfg.boost_multiplier_ppm,
                })
            } else {
                json!({})
            },
        };

        if triggered {
            let mut multipliers = TierMultipliers::identity();
            multipliers.fallback = cfg.fallback_multiplier_ppm;
            multipliers.high = cfg.boost_multiplier_ppm;
            multipliers.mid = cfg.boost_multiplier_ppm;
            (CorrectionOutcome::Adjust(multipliers), trace)
        } else {
            (CorrectionOutcome::NoOp, trace)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::services::config::CorrectionsConfig;
    use crate::services::pressure::PressureCell;

    #[test]
    fn shifts_weight_off_fallback_when_streaking() {
        let campaign = campaign();
        let mut experience = experience(campaign.id);
        experience.empty_streak = 3;
        let global = global();
        let cell = PressureCell::neutral();
        let config = CorrectionsConfig::default();

        let (outcome, trace) = AntiEmptyCorrection.evaluate(&CorrectionContext {
            campaign: &campaign,
            experience: &experience,
            global: &global,
            cell: &cell,
            config: &config,
            intent: None,
        });
        assert!(trace.triggered);
        match outcome {
            CorrectionOutcome::Adjust(m) => {
                assert_eq!(m.fallback, 500_000);
                assert_eq!(m.high, 1_500_000);
                assert_eq!(m.low, 1_000_000);
            }
            other => panic!("expected adjust, got {other:?}"),
        }
    }
}
