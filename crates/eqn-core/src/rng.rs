//! Deterministic PRNG for simulation use (weighted dispatch, etc.).
//!
//! Uses the SplitMix64 algorithm: fast, 8 bytes of state, excellent
//! statistical properties, and trivially serializable.

use crate::fixed::Fixed64;

/// SplitMix64 pseudo-random number generator.
///
/// Deterministic across platforms, so experiments are reproducible from
/// their seed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform value in `[0, 1)` as a Fixed64.
    pub fn next_unit(&mut self) -> Fixed64 {
        // The upper 32 bits become the fractional part of a Q32.32 value.
        let upper = self.next_u64() >> 32;
        Fixed64::from_bits(upper as i64)
    }

    /// Pick an index with probability proportional to `weights`.
    ///
    /// Non-positive weights are never picked. Returns `None` when no weight
    /// is positive.
    pub fn pick_weighted(&mut self, weights: &[Fixed64]) -> Option<usize> {
        let total = weights
            .iter()
            .filter(|w| **w > Fixed64::ZERO)
            .fold(Fixed64::ZERO, |acc, w| acc.saturating_add(*w));
        if total <= Fixed64::ZERO {
            return None;
        }
        let target = self.next_unit().saturating_mul(total);
        let mut acc = Fixed64::ZERO;
        let mut last_positive = None;
        for (i, w) in weights.iter().enumerate() {
            if *w <= Fixed64::ZERO {
                continue;
            }
            acc = acc.saturating_add(*w);
            last_positive = Some(i);
            if target < acc {
                return Some(i);
            }
        }
        // Rounding in the scaled target can land exactly on the total.
        last_positive
    }

    /// Get the internal state (for hashing/serialization).
    pub fn state(&self) -> u64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = SimRng::new(1);
        let mut b = SimRng::new(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn unit_is_in_range() {
        let mut rng = SimRng::new(7);
        for _ in 0..1000 {
            let u = rng.next_unit();
            assert!(u >= Fixed64::ZERO);
            assert!(u < Fixed64::from_num(1));
        }
    }

    #[test]
    fn weighted_skips_zero_weights() {
        let mut rng = SimRng::new(3);
        let weights = [Fixed64::ZERO, Fixed64::from_num(1), Fixed64::ZERO];
        for _ in 0..100 {
            assert_eq!(rng.pick_weighted(&weights), Some(1));
        }
    }

    #[test]
    fn weighted_all_zero_is_none() {
        let mut rng = SimRng::new(3);
        assert_eq!(rng.pick_weighted(&[Fixed64::ZERO, Fixed64::ZERO]), None);
        assert_eq!(rng.pick_weighted(&[]), None);
    }

    #[test]
    fn weighted_roughly_proportional() {
        let mut rng = SimRng::new(12345);
        let weights = [Fixed64::from_num(0.25), Fixed64::from_num(0.75)];
        let trials = 10_000;
        let mut hits = [0u32; 2];
        for _ in 0..trials {
            let i = rng.pick_weighted(&weights).unwrap();
            hits[i] += 1;
        }
        // Expect ~2500 / ~7500 (very generous tolerance).
        assert!((2000..=3000).contains(&hits[0]), "got {hits:?}");
    }

    #[test]
    fn serialization_round_trip() {
        let mut rng = SimRng::new(42);
        for _ in 0..50 {
            rng.next_u64();
        }

        let json = serde_json::to_string(&rng).unwrap();
        let restored: SimRng = serde_json::from_str(&json).unwrap();
        assert_eq!(rng, restored);

        let mut rng2 = restored;
        for _ in 0..10 {
            assert_eq!(rng.next_u64(), rng2.next_u64());
        }
    }
}
