//! Tier weighting rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prize::PrizeTier;
use super::weights::{TierWeights, PPM};

/// One tier's base weight for a campaign, optionally scoped to a user
/// segment. Per (campaign, segment) the weights must sum to at most
/// the ppm denominator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierRule {
    pub id: Uuid,
    pub campaign_id: Uuid,
    /// None = applies to every user without a more specific match.
    pub segment_key: Option<String>,
    pub tier: PrizeTier,
    /// Weight in ppm of the tier-selection denominator.
    pub weight_ppm: u32,
    /// Higher wins when several rules target the same (segment, tier).
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

/// Collapse a campaign's rules into per-tier base weights for a user
/// segment. Segment-specific rules shadow generic ones; within a
/// (segment, tier) group the highest priority wins.
pub fn base_weights(rules: &[TierRule], segment: Option<&str>) -> TierWeights {
    let mut weights = TierWeights::default();
    for tier in PrizeTier::ALL {
        let best = rules
            .iter()
            .filter(|r| r.tier == tier)
            .filter(|r| match (&r.segment_key, segment) {
                (None, _) => true,
                (Some(key), Some(seg)) => key == seg,
                (Some(_), None) => false,
            })
            // Segment match outranks priority, then higher priority wins.
            .max_by_key(|r| (r.segment_key.is_some(), r.priority));
        if let Some(rule) = best {
            weights.set(tier, u64::from(rule.weight_ppm));
        }
    }
    weights
}

/// Validate the invariant sum(weight_ppm) <= denominator per segment
/// group, counting only the effective (post-shadowing) weights.
pub fn validate_weights(weights: &TierWeights) -> Result<(), String> {
    let total = weights.total();
    if total > PPM {
        return Err(format!("tier weights sum to {total} ppm, max {PPM}"));
    }
    Ok(())
}
