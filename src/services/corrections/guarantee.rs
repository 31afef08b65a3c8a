//! Campaign-declared guarantee.
//!
//! Fires when this draw would push the empty streak to the campaign's
//! threshold, so the streak can never actually reach it.

use serde_json::json;

use crate::domain::models::{CorrectionTrace, PrizeTier};

use super::{Correction, CorrectionContext, CorrectionOutcome};

pub struct GuaranteeCorrection;

impl Correction for GuaranteeCorrection {
    fn name(&self) -> &'static str {
        "guarantee"
    }

    fn evaluate(&self, ctx: &CorrectionContext<'_>) -> (CorrectionOutcome, CorrectionTrace) {
        let guarantee = &ctx.campaign.guarantee;
        let triggered = guarantee.enabled
            && guarantee.threshold_draws > 0
            && ctx.experience.empty_streak + 1 >= guarantee.threshold_draws;

        let trace = CorrectionTrace {
            module: self.name().to_string(),
            triggered,
            inputs: json!({
                "enabled": guarantee.enabled,
                "threshold_draws": guarantee.threshold_draws,
                "empty_streak": ctx.experience.empty_streak,
            }),
            outputs: if triggered {
                json!({
                    "tier": PrizeTier::High.as_str(),
                    "guarantee_prize_id": guarantee.guarantee_prize_id,
                })
            } else {
                json!({})
            },
        };

        if triggered {
            (
                CorrectionOutcome::Override {
                    tier: PrizeTier::High,
                    prize_id: guarantee.guarantee_prize_id,
                },
                trace,
            )
        } else {
            (CorrectionOutcome::NoOp, trace)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::domain::models::GuaranteeConfig;
    use crate::services::config::CorrectionsConfig;
    use crate::services::pressure::PressureCell;

    fn eval(streak: u32, threshold: u32, enabled: bool) -> CorrectionOutcome {
        let mut campaign = campaign();
        campaign.guarantee =
            GuaranteeConfig { enabled, threshold_draws: threshold, guarantee_prize_id: None };
        let mut experience = experience(campaign.id);
        experience.empty_streak = streak;
        let global = global();
        let cell = PressureCell::neutral();
        let config = CorrectionsConfig::default();
        GuaranteeCorrection
            .evaluate(&CorrectionContext {
                campaign: &campaign,
                experience: &experience,
                global: &global,
                cell: &cell,
                config: &config,
                intent: None,
            })
            .0
    }

    #[test]
    fn fires_one_draw_before_threshold() {
        assert!(matches!(eval(4, 5, true), CorrectionOutcome::Override { .. }));
        assert_eq!(eval(3, 5, true), CorrectionOutcome::NoOp);
    }

    #[test]
    fn disabled_guarantee_never_fires() {
        assert_eq!(eval(99, 5, false), CorrectionOutcome::NoOp);
    }
}
