//! Experience state transitions.
//!
//! Pure functions deriving the post-draw state from the committed
//! outcome; the executor applies the results inside its transaction,
//! under the per-user lock, so no read-modify-write races exist.

use chrono::{DateTime, Utc};

use crate::domain::models::{PrizeTier, UserExperienceState, UserGlobalState, PPM};

use super::config::{AntiHighConfig, LuckDebtConfig};

/// Committed facts of one sub-draw, as the state rules see them.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeFacts {
    pub tier: PrizeTier,
    pub pity_applied: bool,
}

impl OutcomeFacts {
    /// Fallback-tier outcomes count as empties for streak purposes,
    /// whether or not a consolation prize was attached.
    pub fn is_empty(&self) -> bool {
        self.tier == PrizeTier::Fallback
    }
}

/// Apply the commit rules to a per-campaign state.
pub fn advance(
    state: &UserExperienceState,
    facts: OutcomeFacts,
    anti_high: &AntiHighConfig,
    now: DateTime<Utc>,
) -> UserExperienceState {
    let mut next = state.clone();
    next.total_draws += 1;

    if facts.is_empty() {
        next.empty_streak += 1;
        next.total_empties += 1;
        next.recent_high_count = 0;
    } else {
        next.empty_streak = 0;
        if facts.tier == PrizeTier::High {
            next.recent_high_count += 1;
        } else {
            next.recent_high_count = 0;
        }
    }

    if facts.pity_applied {
        next.pity_trigger_count += 1;
        next.empty_streak = 0;
    }

    // A cooldown that was active when this draw was evaluated burns
    // one round at commit. Arming happens afterwards and stores the
    // full round count, so the dampened window spans exactly
    // `cooldown_rounds` subsequent draws.
    if state.anti_high_cooldown > 0 {
        next.anti_high_cooldown = state.anti_high_cooldown - 1;
    }
    if anti_high.threshold > 0 && next.recent_high_count >= anti_high.threshold {
        next.anti_high_cooldown = anti_high.cooldown_rounds;
        next.recent_high_count = 0;
    }

    next.updated_at = now;
    next
}

/// Fold the outcome into the cross-campaign state: draw counters, the
/// empty-rate EMA, and the resulting luck-debt multiplier.
pub fn advance_global(
    state: &UserGlobalState,
    facts: OutcomeFacts,
    config: &LuckDebtConfig,
    now: DateTime<Utc>,
) -> UserGlobalState {
    let mut next = state.clone();
    next.total_draws += 1;
    if facts.tier == PrizeTier::High {
        next.total_high_wins += 1;
    }

    // ema' = ema + alpha * (x - ema), all in ppm, x in {0, PPM}.
    let ema = i64::from(state.historical_empty_rate_ppm);
    let x = if facts.is_empty() { PPM as i64 } else { 0 };
    let alpha = i64::try_from(config.alpha_ppm.min(PPM)).unwrap_or(0);
    let ema_next = ema + alpha * (x - ema) / PPM as i64;
    next.historical_empty_rate_ppm = u32::try_from(ema_next.clamp(0, PPM as i64)).unwrap_or(0);

    // multiplier = 1 + slope * max(0, ema - target), clamped.
    let target = i64::try_from(config.target_empty_rate_ppm).unwrap_or(0);
    let excess = i64::from(next.historical_empty_rate_ppm) - target;
    let multiplier = if excess > 0 {
        let slope = i128::from(config.slope_ppm);
        let bump = i128::from(excess) * slope / i128::from(PPM);
        u64::try_from(i128::from(PPM) + bump).unwrap_or(u64::MAX)
    } else {
        PPM
    };
    next.luck_debt_multiplier_ppm =
        u32::try_from(multiplier.clamp(PPM, config.max_multiplier_ppm)).unwrap_or(PPM as u32);

    next.updated_at = now;
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn fresh() -> UserExperienceState {
        UserExperienceState::fresh("u1", Uuid::new_v4(), Utc::now())
    }

    fn facts(tier: PrizeTier) -> OutcomeFacts {
        OutcomeFacts { tier, pity_applied: false }
    }

    #[test]
    fn empty_outcome_extends_streak() {
        let state = fresh();
        let next = advance(&state, facts(PrizeTier::Fallback), &AntiHighConfig::default(), Utc::now());
        assert_eq!(next.empty_streak, 1);
        assert_eq!(next.total_empties, 1);
        assert_eq!(next.total_draws, 1);
    }

    #[test]
    fn any_win_resets_streak() {
        let mut state = fresh();
        state.empty_streak = 7;
        for tier in [PrizeTier::High, PrizeTier::Mid, PrizeTier::Low] {
            let next = advance(&state, facts(tier), &AntiHighConfig::default(), Utc::now());
            assert_eq!(next.empty_streak, 0, "{tier:?}");
        }
    }

    #[test]
    fn non_high_resets_recent_high_count() {
        let mut state = fresh();
        state.recent_high_count = 1;
        let next = advance(&state, facts(PrizeTier::Mid), &AntiHighConfig::default(), Utc::now());
        assert_eq!(next.recent_high_count, 0);
    }

    #[test]
    fn pity_resets_streak_and_counts() {
        let mut state = fresh();
        state.empty_streak = 10;
        let next = advance(
            &state,
            OutcomeFacts { tier: PrizeTier::High, pity_applied: true },
            &AntiHighConfig::default(),
            Utc::now(),
        );
        assert_eq!(next.pity_trigger_count, 1);
        assert_eq!(next.empty_streak, 0);
    }

    #[test]
    fn anti_high_arms_at_threshold_and_counts_down() {
        let config = AntiHighConfig { threshold: 2, cooldown_rounds: 3, dampen_multiplier_ppm: 200_000 };
        let mut state = fresh();

        // First high win.
        state = advance(&state, facts(PrizeTier::High), &config, Utc::now());
        assert_eq!(state.recent_high_count, 1);
        assert_eq!(state.anti_high_cooldown, 0);

        // Second high win arms the full cooldown.
        state = advance(&state, facts(PrizeTier::High), &config, Utc::now());
        assert_eq!(state.recent_high_count, 0);
        assert_eq!(state.anti_high_cooldown, 3);

        // The next three draws each see an active cooldown and burn
        // one round; the fourth sees it idle.
        for expected in [2, 1, 0] {
            assert!(state.anti_high_cooldown > 0);
            state = advance(&state, facts(PrizeTier::Low), &config, Utc::now());
            assert_eq!(state.anti_high_cooldown, expected);
        }
    }

    #[test]
    fn global_ema_rises_on_empties_and_debt_accrues() {
        let config = LuckDebtConfig {
            alpha_ppm: 500_000, // fast EMA to reach debt quickly
            target_empty_rate_ppm: 700_000,
            slope_ppm: 2_000_000,
            max_multiplier_ppm: 2_000_000,
        };
        let mut global = UserGlobalState::fresh("u1", Utc::now());
        for _ in 0..6 {
            global = advance_global(&global, facts(PrizeTier::Fallback), &config, Utc::now());
        }
        assert!(global.historical_empty_rate_ppm > 700_000);
        assert!(global.luck_debt_multiplier_ppm > PPM as u32);
        assert!(global.luck_debt_multiplier_ppm <= 2_000_000);

        // Wins pay the debt back down.
        for _ in 0..10 {
            global = advance_global(&global, facts(PrizeTier::High), &config, Utc::now());
        }
        assert_eq!(global.luck_debt_multiplier_ppm, PPM as u32);
        assert_eq!(global.total_high_wins, 10);
    }
}
