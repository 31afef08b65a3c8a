//! Dense HyperLogLog for daily unique-user estimation.
//!
//! 2^12 registers (~4 KiB per campaign-day), SipHash-keyed. Standard
//! bias-corrected estimator with the small-range linear-counting
//! switch; accuracy is about 1.6% RSE, far more than the operator
//! dashboards need.

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

const REGISTER_BITS: u32 = 12;
const REGISTER_COUNT: usize = 1 << REGISTER_BITS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperLogLog {
    registers: Vec<u8>,
}

impl Default for HyperLogLog {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperLogLog {
    pub fn new() -> Self {
        Self { registers: vec![0; REGISTER_COUNT] }
    }

    pub fn insert(&mut self, item: &str) {
        let mut hasher = SipHasher13::new_with_keys(0x6c6f7474_65727921, 0x64726177_73212121);
        hasher.write(item.as_bytes());
        let hash = hasher.finish();

        let index = (hash >> (64 - REGISTER_BITS)) as usize;
        let remainder = hash << REGISTER_BITS;
        // Rank of the first set bit in the remaining stream, 1-based;
        // an all-zero remainder maps to the maximum rank.
        let rank = u8::try_from(remainder.leading_zeros() + 1).unwrap_or(u8::MAX);
        if rank > self.registers[index] {
            self.registers[index] = rank;
        }
    }

    pub fn estimate(&self) -> u64 {
        let m = REGISTER_COUNT as f64;
        let alpha = 0.7213 / (1.0 + 1.079 / m);

        let mut sum = 0.0;
        let mut zeros = 0u64;
        for &r in &self.registers {
            sum += 2f64.powi(-i32::from(r));
            if r == 0 {
                zeros += 1;
            }
        }
        let raw = alpha * m * m / sum;

        let estimate = if raw <= 2.5 * m && zeros > 0 {
            // Linear counting in the small range.
            m * (m / zeros as f64).ln()
        } else {
            raw
        };
        if estimate < 0.0 {
            0
        } else {
            estimate.round() as u64
        }
    }

    pub fn merge(&mut self, other: &Self) {
        for (mine, theirs) in self.registers.iter_mut().zip(&other.registers) {
            if *theirs > *mine {
                *mine = *theirs;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sketch_estimates_zero() {
        assert_eq!(HyperLogLog::new().estimate(), 0);
    }

    #[test]
    fn duplicates_do_not_inflate() {
        let mut hll = HyperLogLog::new();
        for _ in 0..1000 {
            hll.insert("user-1");
        }
        assert_eq!(hll.estimate(), 1);
    }

    #[test]
    fn small_cardinalities_are_near_exact() {
        let mut hll = HyperLogLog::new();
        for i in 0..100 {
            hll.insert(&format!("user-{i}"));
        }
        let est = hll.estimate();
        assert!((95..=105).contains(&est), "estimate {est} too far from 100");
    }

    #[test]
    fn large_cardinalities_within_tolerance() {
        let mut hll = HyperLogLog::new();
        for i in 0..50_000 {
            hll.insert(&format!("user-{i}"));
        }
        let est = hll.estimate() as f64;
        let error = (est - 50_000.0).abs() / 50_000.0;
        assert!(error < 0.05, "relative error {error} above 5%");
    }

    #[test]
    fn merge_is_union() {
        let mut a = HyperLogLog::new();
        let mut b = HyperLogLog::new();
        for i in 0..500 {
            a.insert(&format!("a-{i}"));
            b.insert(&format!("b-{i}"));
        }
        a.merge(&b);
        let est = a.estimate() as f64;
        assert!((est - 1000.0).abs() / 1000.0 < 0.05);
    }
}
