//! Anti-high weight correction.
//!
//! Active while the user's anti-high cooldown is nonzero; dampens the
//! high-tier weight for the duration. The cooldown itself is armed and
//! decremented by the experience commit rules, not here.

use serde_json::json;

use crate::domain::models::{CorrectionTrace, TierMultipliers};

use super::{Correction, CorrectionContext, CorrectionOutcome};

pub struct AntiHighCorrection;

impl Correction for AntiHighCorrection {
    fn name(&self) -> &'static str {
        "anti_high"
    }

    fn evaluate(&self, ctx: &CorrectionContext<'_>) -> (CorrectionOutcome, CorrectionTrace) {
        let cfg = &ctx.config.anti_high;
        let triggered = ctx.experience.anti_high_cooldown > 0;

        let trace = CorrectionTrace {
            module: self.name().to_string(),
            triggered,
            inputs: json!({
                "anti_high_cooldown": ctx.experience.anti_high_cooldown,
                "recent_high_count": ctx.experience.recent_high_count,
            }),
            outputs: if triggered {
                json!({ "high_multiplier_ppm": cfg.dampen_multiplier_ppm })
            } else {
                json!({})
            },
        };

        if triggered {
            let mut multipliers = TierMultipliers::identity();
            multipliers.high = cfg.dampen_multiplier_ppm;
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
    fn dampens_high_only_while_cooling() {
        let campaign = campaign();
        let global = global();
        let cell = PressureCell::neutral();
        let config = CorrectionsConfig::default();

        let mut experience = experience(campaign.id);
        experience.anti_high_cooldown = 2;
        let (outcome, _) = AntiHighCorrection.evaluate(&CorrectionContext {
            campaign: &campaign,
            experience: &experience,
            global: &global,
            cell: &cell,
            config: &config,
            intent: None,
        });
        match outcome {
            CorrectionOutcome::Adjust(m) => {
                assert_eq!(m.high, 200_000);
                assert_eq!(m.fallback, 1_000_000);
            }
            other => panic!("expected adjust, got {other:?}"),
        }

        experience.anti_high_cooldown = 0;
        let (idle, trace) = AntiHighCorrection.evaluate(&CorrectionContext {
            campaign: &campaign,
            experience: &experience,
            global: &global,
            cell: &cell,
            config: &config,
            intent: None,
        });
        assert_eq!(idle, CorrectionOutcome::NoOp);
        assert!(!trace.triggered);
    }
}
