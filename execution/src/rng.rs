//! Seeded dice stream.
//!
//! All randomness in a match flows through one [`DiceRng`] owned by the
//! room's orchestrator: dice rolls, forced-timeout move picks, and the AI's
//! weighted tie-breaks. Seeding it makes whole matches replayable; the
//! `force` hook lets tests script exact roll sequences.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Faces on the die.
pub const DIE_FACES: u8 = 6;

pub struct DiceRng {
    rng: ChaCha8Rng,
    forced: VecDeque<u8>,
}

impl DiceRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            forced: VecDeque::new(),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
            forced: VecDeque::new(),
        }
    }

    /// Queue a value to be returned by the next [`Self::roll_die`] call.
    /// Values outside 1..=6 are clamped into range.
    pub fn force(&mut self, value: u8) {
        self.forced.push_back(value.clamp(1, DIE_FACES));
    }

    /// Draw a die face, consuming a forced value first if one is queued.
    pub fn roll_die(&mut self) -> u8 {
        if let Some(value) = self.forced.pop_front() {
            return value;
        }
        self.rng.gen_range(1..=DIE_FACES)
    }

    /// Uniform pick of an index in `0..len`.
    pub fn pick_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        self.rng.gen_range(0..len)
    }

    /// Weighted pick of an index. Weights must be non-negative; a zero-sum
    /// weight vector falls back to a uniform pick.
    pub fn pick_weighted(&mut self, weights: &[f64]) -> usize {
        debug_assert!(!weights.is_empty());
        let total: f64 = weights.iter().copied().filter(|w| *w > 0.0).sum();
        if total <= 0.0 {
            return self.pick_index(weights.len());
        }
        let mut ticket = self.rng.gen_range(0.0..total);
        for (index, weight) in weights.iter().enumerate() {
            if *weight <= 0.0 {
                continue;
            }
            if ticket < *weight {
                return index;
            }
            ticket -= weight;
        }
        weights.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolls_stay_in_range() {
        let mut rng = DiceRng::new(7);
        for _ in 0..1_000 {
            let value = rng.roll_die();
            assert!((1..=6).contains(&value));
        }
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = DiceRng::new(42);
        let mut b = DiceRng::new(42);
        let rolls_a: Vec<u8> = (0..32).map(|_| a.roll_die()).collect();
        let rolls_b: Vec<u8> = (0..32).map(|_| b.roll_die()).collect();
        assert_eq!(rolls_a, rolls_b);
    }

    #[test]
    fn test_forced_values_drain_in_order() {
        let mut rng = DiceRng::new(0);
        rng.force(6);
        rng.force(3);
        assert_eq!(rng.roll_die(), 6);
        assert_eq!(rng.roll_die(), 3);
        // Queue drained, back to the seeded stream.
        assert!((1..=6).contains(&rng.roll_die()));
    }

    #[test]
    fn test_forced_values_clamped() {
        let mut rng = DiceRng::new(0);
        rng.force(0);
        rng.force(9);
        assert_eq!(rng.roll_die(), 1);
        assert_eq!(rng.roll_die(), 6);
    }

    #[test]
    fn test_weighted_pick_prefers_heavy_weights() {
        let mut rng = DiceRng::new(5);
        let weights = [0.0, 100.0, 1.0];
        let mut counts = [0usize; 3];
        for _ in 0..500 {
            counts[rng.pick_weighted(&weights)] += 1;
        }
        assert_eq!(counts[0], 0);
        assert!(counts[1] > counts[2]);
    }

    #[test]
    fn test_weighted_pick_zero_sum_falls_back_to_uniform() {
        let mut rng = DiceRng::new(5);
        let weights = [0.0, 0.0];
        let picked = rng.pick_weighted(&weights);
        assert!(picked < 2);
    }
}
