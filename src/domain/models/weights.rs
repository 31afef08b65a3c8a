//! Integer weight arithmetic.
//!
//! The sampling path is float-free: multipliers are parts-per-million,
//! intermediate products widen to u128, results saturate into u64.

use serde::{Deserialize, Serialize};

use super::prize::PrizeTier;

/// Multiplier denominator: 1_000_000 ppm == 1.0x.
pub const PPM: u64 = 1_000_000;

/// `weight * ppm / PPM` with a widened intermediate.
pub fn mul_ppm(weight: u64, ppm: u64) -> u64 {
    let wide = u128::from(weight) * u128::from(ppm) / u128::from(PPM);
    u64::try_from(wide).unwrap_or(u64::MAX)
}

/// Compose two ppm multipliers: `(a/PPM) * (b/PPM)` as ppm.
pub fn compose_ppm(a: u64, b: u64) -> u64 {
    let wide = u128::from(a) * u128::from(b) / u128::from(PPM);
    u64::try_from(wide).unwrap_or(u64::MAX)
}

/// Per-tier sampling weights, in canonical tier order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierWeights {
    pub high: u64,
    pub mid: u64,
    pub low: u64,
    pub fallback: u64,
}

impl TierWeights {
    pub fn get(&self, tier: PrizeTier) -> u64 {
        match tier {
            PrizeTier::High => self.high,
            PrizeTier::Mid => self.mid,
            PrizeTier::Low => self.low,
            PrizeTier::Fallback => self.fallback,
        }
    }

    pub fn set(&mut self, tier: PrizeTier, weight: u64) {
        match tier {
            PrizeTier::High => self.high = weight,
            PrizeTier::Mid => self.mid = weight,
            PrizeTier::Low => self.low = weight,
            PrizeTier::Fallback => self.fallback = weight,
        }
    }

    pub fn total(&self) -> u64 {
        self.high
            .saturating_add(self.mid)
            .saturating_add(self.low)
            .saturating_add(self.fallback)
    }

    /// Apply per-tier multipliers, returning the adjusted weights.
    pub fn scaled(&self, multipliers: &TierMultipliers) -> Self {
        let mut out = *self;
        for tier in PrizeTier::ALL {
            out.set(tier, mul_ppm(self.get(tier), multipliers.get(tier)));
        }
        out
    }
}

/// Per-tier ppm multipliers, composed multiplicatively across correction
/// modules and clamped by the pressure cell's cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierMultipliers {
    pub high: u64,
    pub mid: u64,
    pub low: u64,
    pub fallback: u64,
}

impl Default for TierMultipliers {
    fn default() -> Self {
        Self { high: PPM, mid: PPM, low: PPM, fallback: PPM }
    }
}

impl TierMultipliers {
    /// Identity (1.0x everywhere).
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn get(&self, tier: PrizeTier) -> u64 {
        match tier {
            PrizeTier::High => self.high,
            PrizeTier::Mid => self.mid,
            PrizeTier::Low => self.low,
            PrizeTier::Fallback => self.fallback,
        }
    }

    pub fn set(&mut self, tier: PrizeTier, ppm: u64) {
        match tier {
            PrizeTier::High => self.high = ppm,
            PrizeTier::Mid => self.mid = ppm,
            PrizeTier::Low => self.low = ppm,
            PrizeTier::Fallback => self.fallback = ppm,
        }
    }

    /// Multiply this set by another, tier-wise.
    pub fn compose(&mut self, other: &Self) {
        for tier in PrizeTier::ALL {
            self.set(tier, compose_ppm(self.get(tier), other.get(tier)));
        }
    }

    /// Clamp every multiplier into `[0, cap_ppm]`.
    pub fn clamp_to(&mut self, cap_ppm: u64) {
        for tier in PrizeTier::ALL {
            if self.get(tier) > cap_ppm {
                self.set(tier, cap_ppm);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn mul_ppm_identity_and_half() {
        assert_eq!(mul_ppm(400_000, PPM), 400_000);
        assert_eq!(mul_ppm(400_000, 500_000), 200_000);
        assert_eq!(mul_ppm(3, 500_000), 1); // rounds toward zero
    }

    #[test]
    fn compose_and_clamp() {
        let mut m = TierMultipliers::identity();
        m.compose(&TierMultipliers { high: 2_000_000, ..TierMultipliers::identity() });
        m.compose(&TierMultipliers { high: 3_000_000, ..TierMultipliers::identity() });
        assert_eq!(m.high, 6_000_000);
        m.clamp_to(2_500_000);
        assert_eq!(m.high, 2_500_000);
        assert_eq!(m.mid, PPM);
    }

    #[test]
    fn scaled_weights() {
        let w = TierWeights { high: 10_000, mid: 100_000, low: 300_000, fallback: 590_000 };
        let mut m = TierMultipliers::identity();
        m.fallback = 500_000;
        m.high = 1_500_000;
        let s = w.scaled(&m);
        assert_eq!(s.high, 15_000);
        assert_eq!(s.fallback, 295_000);
        assert_eq!(s.mid, 100_000);
    }

    proptest! {
        #[test]
        fn mul_ppm_never_panics(w in any::<u64>(), p in 0u64..10_000_000) {
            let _ = mul_ppm(w, p);
        }

        #[test]
        fn mul_ppm_monotone_in_weight(w in 0u64..u64::MAX / 2, p in 0u64..2_000_000) {
            prop_assert!(mul_ppm(w, p) <= mul_ppm(w + 1, p));
        }
    }
}
