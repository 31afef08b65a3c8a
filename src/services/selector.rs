//! Tier and prize selection.
//!
//! Two-stage integer weighted sampling. The selector is pure: stock,
//! caps, and budget are read through an eligibility view assembled by
//! the caller, and nothing is mutated here. Stock decrement happens in
//! the executor's transaction.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::domain::models::{Prize, PrizeTier, TierWeights};
use crate::domain::ports::DrawRng;

/// Per-draw view of what is currently winnable.
#[derive(Debug, Clone, Default)]
pub struct EligibilityView {
    /// Awards already granted today, per prize (Shanghai day).
    pub daily_awards: HashMap<Uuid, u32>,
    /// Prize value ceiling; awards above this are ineligible
    /// (remaining budget in budget-pool mode).
    pub budget_ceiling: i64,
    /// Prizes excluded for this attempt (stock raced away mid-draw).
    pub excluded: HashSet<Uuid>,
}

impl EligibilityView {
    pub fn unlimited() -> Self {
        Self { budget_ceiling: i64::MAX, ..Self::default() }
    }

    pub fn eligible(&self, prize: &Prize) -> bool {
        if !prize.is_active() || !prize.has_stock() || self.excluded.contains(&prize.id) {
            return false;
        }
        if prize.value_points > self.budget_ceiling {
            return false;
        }
        match prize.daily_cap {
            Some(cap) => self.daily_awards.get(&prize.id).copied().unwrap_or(0) < cap,
            None => true,
        }
    }
}

/// Outcome of one selection pass.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    /// Tier the sampler landed on before demotion.
    pub sampled_tier: PrizeTier,
    /// Tier the prize actually came from.
    pub awarded_tier: PrizeTier,
    /// None only when even the fallback tier had no eligible prize.
    pub prize: Option<&'a Prize>,
}

/// Weighted tier sample over the adjusted weights. Zero total weight
/// defaults to fallback.
pub fn select_tier(weights: &TierWeights, rng: &dyn DrawRng) -> PrizeTier {
    let total = weights.total();
    if total == 0 {
        return PrizeTier::Fallback;
    }
    let roll = rng.next_in_range(total);
    let mut cumulative = 0u64;
    for tier in PrizeTier::ALL {
        cumulative = cumulative.saturating_add(weights.get(tier));
        if roll < cumulative {
            return tier;
        }
    }
    PrizeTier::Fallback
}

/// Weighted prize sample within a tier. Equal-weight ties and the
/// iteration order are fixed by prize id so replays are deterministic.
pub fn select_prize_in_tier<'a>(
    prizes: &'a [Prize],
    tier: PrizeTier,
    view: &EligibilityView,
    rng: &dyn DrawRng,
) -> Option<&'a Prize> {
    let mut candidates: Vec<&Prize> = prizes
        .iter()
        .filter(|p| p.tier == tier && view.eligible(p))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by_key(|p| p.id);

    let total: u64 = candidates.iter().map(|p| u64::from(p.win_weight)).sum();
    if total == 0 {
        // All-zero weights inside a tier: deterministic first by id.
        return candidates.first().copied();
    }
    let roll = rng.next_in_range(total);
    let mut cumulative = 0u64;
    for prize in &candidates {
        cumulative += u64::from(prize.win_weight);
        if roll < cumulative {
            return Some(prize);
        }
    }
    candidates.last().copied()
}

/// Full selection: sample a tier, pick a prize, demote through
/// lower tiers while the chosen one has nothing eligible.
pub fn select<'a>(
    weights: &TierWeights,
    prizes: &'a [Prize],
    view: &EligibilityView,
    rng: &dyn DrawRng,
) -> Selection<'a> {
    let sampled_tier = select_tier(weights, rng);
    let mut tier = sampled_tier;
    loop {
        if let Some(prize) = select_prize_in_tier(prizes, tier, view, rng) {
            return Selection { sampled_tier, awarded_tier: tier, prize: Some(prize) };
        }
        match tier.demoted() {
            Some(next) => tier = next,
            None => {
                return Selection {
                    sampled_tier,
                    awarded_tier: PrizeTier::Fallback,
                    prize: None,
                }
            }
        }
    }
}

/// Pin selection to a specific tier (correction override), demoting
/// as usual when the tier is dry.
pub fn select_pinned<'a>(
    tier: PrizeTier,
    prizes: &'a [Prize],
    view: &EligibilityView,
    rng: &dyn DrawRng,
) -> Selection<'a> {
    let mut current = tier;
    loop {
        if let Some(prize) = select_prize_in_tier(prizes, current, view, rng) {
            return Selection { sampled_tier: tier, awarded_tier: current, prize: Some(prize) };
        }
        match current.demoted() {
            Some(next) => current = next,
            None => {
                return Selection { sampled_tier: tier, awarded_tier: PrizeTier::Fallback, prize: None }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PrizeStatus;
    use crate::domain::ports::SeededDrawRng;
    use chrono::Utc;
    use proptest::prelude::*;

    fn prize(tier: PrizeTier, weight: u32, value: i64) -> Prize {
        Prize {
            id: Uuid::new_v4(),
            campaign_id: Uuid::nil(),
            name: format!("{}-{weight}", tier.as_str()),
            tier,
            win_weight: weight,
            value_points: value,
            stock_quantity: None,
            daily_cap: None,
            status: PrizeStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn zero_total_weight_defaults_to_fallback() {
        let rng = SeededDrawRng::new(42);
        let weights = TierWeights::default();
        assert_eq!(select_tier(&weights, &rng), PrizeTier::Fallback);
    }

    #[test]
    fn tier_sampling_respects_buckets() {
        // With seed 42 the sequence is fixed; verify every draw lands
        // in a tier with nonzero weight.
        let rng = SeededDrawRng::new(42);
        let weights = TierWeights { high: 0, mid: 300_000, low: 0, fallback: 700_000 };
        for _ in 0..200 {
            let tier = select_tier(&weights, &rng);
            assert!(matches!(tier, PrizeTier::Mid | PrizeTier::Fallback));
        }
    }

    #[test]
    fn exhausted_tier_demotes() {
        let rng = SeededDrawRng::new(42);
        let mut high = prize(PrizeTier::High, 100, 500);
        high.stock_quantity = Some(0);
        let low = prize(PrizeTier::Low, 100, 10);
        let fallback = prize(PrizeTier::Fallback, 100, 1);
        let prizes = vec![high, low, fallback];

        let weights = TierWeights { high: 1_000_000, mid: 0, low: 0, fallback: 0 };
        let selection = select(&weights, &prizes, &EligibilityView::unlimited(), &rng);
        assert_eq!(selection.sampled_tier, PrizeTier::High);
        assert_eq!(selection.awarded_tier, PrizeTier::Low);
        assert!(selection.prize.is_some());
    }

    #[test]
    fn budget_ceiling_filters_expensive_prizes() {
        let rng = SeededDrawRng::new(42);
        let prizes = vec![prize(PrizeTier::High, 100, 5_000), prize(PrizeTier::Fallback, 100, 1)];
        let view = EligibilityView { budget_ceiling: 100, ..EligibilityView::default() };

        let weights = TierWeights { high: 1_000_000, mid: 0, low: 0, fallback: 0 };
        let selection = select(&weights, &prizes, &view, &rng);
        assert_eq!(selection.awarded_tier, PrizeTier::Fallback);
    }

    #[test]
    fn daily_cap_exhaustion_excludes_prize() {
        let rng = SeededDrawRng::new(42);
        let mut capped = prize(PrizeTier::Low, 100, 10);
        capped.daily_cap = Some(2);
        let other = prize(PrizeTier::Low, 100, 10);
        let mut view = EligibilityView::unlimited();
        view.daily_awards.insert(capped.id, 2);

        let prizes = vec![capped.clone(), other.clone()];
        for _ in 0..50 {
            let selected = select_prize_in_tier(&prizes, PrizeTier::Low, &view, &rng).unwrap();
            assert_eq!(selected.id, other.id);
        }
    }

    #[test]
    fn empty_fallback_returns_no_prize() {
        let rng = SeededDrawRng::new(42);
        let selection =
            select(&TierWeights::default(), &[], &EligibilityView::unlimited(), &rng);
        assert!(selection.prize.is_none());
        assert_eq!(selection.awarded_tier, PrizeTier::Fallback);
    }

    #[test]
    fn disabled_prizes_are_never_selected() {
        let rng = SeededDrawRng::new(42);
        let mut high = prize(PrizeTier::High, 100, 500);
        high.status = PrizeStatus::Disabled;
        let mid = prize(PrizeTier::Mid, 100, 50);
        let prizes = vec![high, mid.clone()];
        let selection = select_pinned(PrizeTier::High, &prizes, &EligibilityView::unlimited(), &rng);
        assert_eq!(selection.awarded_tier, PrizeTier::Mid);
        assert_eq!(selection.prize.unwrap().id, mid.id);
    }

    proptest! {
        #[test]
        fn selected_tier_always_has_weight_or_is_fallback(
            high in 0u64..1_000_000,
            mid in 0u64..1_000_000,
            low in 0u64..1_000_000,
            fallback in 0u64..1_000_000,
            seed in any::<u64>(),
        ) {
            let rng = SeededDrawRng::new(seed);
            let weights = TierWeights { high, mid, low, fallback };
            let tier = select_tier(&weights, &rng);
            prop_assert!(weights.get(tier) > 0 || weights.total() == 0 || tier == PrizeTier::Fallback);
            if weights.total() > 0 {
                prop_assert!(weights.get(tier) > 0);
            }
        }
    }
}
