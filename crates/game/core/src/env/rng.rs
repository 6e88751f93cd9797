//! RNG oracle for deterministic random number generation.
//!
//! Every random draw in the engine flows through this module. The RNG is
//! stateless: each draw derives its own 64-bit seed from an activation's
//! wire seeds plus a stream context, so draw order never matters and a
//! replay of the same activation reproduces the same numbers.

/// RNG oracle for deterministic random number generation.
///
/// Implementations must be deterministic and produce the same values
/// given the same seed.
pub trait RngOracle: Send + Sync {
    /// Generate a random u32 value from a seed.
    fn next_u32(&self, seed: u64) -> u32;

    /// Uniform float in `[0, 1)`.
    fn next_f32(&self, seed: u64) -> f32 {
        // 24 mantissa bits keep the quotient exactly representable
        (self.next_u32(seed) >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform float in `[min, max)`.
    fn range_f32(&self, seed: u64, min: f32, max: f32) -> f32 {
        if min >= max {
            return min;
        }
        min + self.next_f32(seed) * (max - min)
    }

    /// Uniform integer in `[0, bound)`. `bound` of zero returns zero.
    fn below(&self, seed: u64, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.next_u32(seed) % bound
    }

    /// Probability check: true with chance `p` (clamped to [0, 1]).
    fn check(&self, seed: u64, p: f32) -> bool {
        if p >= 1.0 {
            true
        } else if p <= 0.0 {
            false
        } else {
            self.next_f32(seed) < p
        }
    }
}

/// PCG random number generator (Permuted Congruential Generator).
///
/// PCG-XSH-RR: 32-bit output permuted from 64-bit state. Fast, tiny
/// state, passes the usual statistical batteries, and branch-free, which
/// keeps replay verification cheap.
///
/// # References
///
/// - PCG paper: <https://www.pcg-random.org/>
#[derive(Clone, Copy, Debug, Default)]
pub struct PcgRng;

impl PcgRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    /// Advance the PCG state by one LCG step.
    #[inline]
    fn pcg_step(state: u64) -> u64 {
        state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
    }

    /// XSH-RR output permutation: xorshift high bits, then rotate by the
    /// top bits of state.
    #[inline]
    fn pcg_output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

impl RngOracle for PcgRng {
    fn next_u32(&self, seed: u64) -> u32 {
        let state = Self::pcg_step(seed);
        Self::pcg_output(state)
    }
}

/// Stream contexts for [`compute_seed`]. Each logically independent draw
/// inside one activation uses a distinct context so draws never alias.
pub mod stream {
    /// Damage variance roll; add the damage type index.
    pub const DAMAGE_VARIANCE: u32 = 0;
    /// Target dodge roll.
    pub const DODGE: u32 = 4;
    /// Target block roll.
    pub const BLOCK: u32 = 5;
    /// Critical hit roll.
    pub const CRIT: u32 = 8;
    /// Super-critical upgrade roll.
    pub const SUPER_CRIT: u32 = 9;
    /// Healing variance roll.
    pub const HEAL_VARIANCE: u32 = 10;
    /// Condition application chance; add the condition index.
    pub const CONDITION_CHANCE: u32 = 12;
    /// Aim point scatter inside `random_position_radius`.
    pub const AOE_POSITION: u32 = 16;
    /// Random target draws; add the draw index.
    pub const AOE_PICK: u32 = 32;
    /// Bounce retarget draws; add the hop index.
    pub const BOUNCE_PICK: u32 = 96;
    /// Event table chance gates; add the entry index.
    pub const EVENT_CHANCE: u32 = 160;
}

/// Compute a deterministic seed for one draw.
///
/// # Arguments
///
/// * `base_seed` - the activation's wire seed (power or fx stream)
/// * `entity` - target or subject of the draw, so per-target rolls differ
/// * `context` - a [`stream`] constant distinguishing co-located draws
pub fn compute_seed(base_seed: u64, entity: u64, context: u32) -> u64 {
    // SplitMix64 / FxHash multipliers, finished with an avalanche step
    let mut hash = base_seed;
    hash ^= entity.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= (context as u64).wrapping_mul(0x517cc1b727220a95);

    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51afd7ed558ccd);
    hash ^= hash >> 33;

    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_output() {
        let rng = PcgRng;
        assert_eq!(rng.next_u32(42), rng.next_u32(42));
        assert_eq!(rng.next_f32(42), rng.next_f32(42));
    }

    #[test]
    fn next_f32_stays_in_unit_interval() {
        let rng = PcgRng;
        for seed in 0..1000u64 {
            let v = rng.next_f32(seed);
            assert!((0.0..1.0).contains(&v), "seed {seed} gave {v}");
        }
    }

    #[test]
    fn contexts_decorrelate_draws() {
        let a = compute_seed(1234, 7, stream::DAMAGE_VARIANCE);
        let b = compute_seed(1234, 7, stream::CRIT);
        let c = compute_seed(1234, 8, stream::DAMAGE_VARIANCE);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn check_handles_degenerate_probabilities() {
        let rng = PcgRng;
        assert!(rng.check(1, 1.0));
        assert!(!rng.check(1, 0.0));
        assert!(rng.check(1, 2.5));
    }
}
