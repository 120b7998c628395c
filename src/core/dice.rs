//! Roll helpers over the explicit battle RNG
//!
//! Every roll in the simulation draws from one seeded ChaCha stream so a
//! fixed seed and a fixed call sequence replay bit-identically.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Percentage roll; `chance` is clamped to [0, 100]
pub fn percent(rng: &mut ChaCha8Rng, chance: i32) -> bool {
    let chance = chance.clamp(0, 100);
    rng.gen_range(0..100) < chance
}

/// Uniform roll in `[low, high]` inclusive
pub fn range(rng: &mut ChaCha8Rng, low: i32, high: i32) -> i32 {
    if low >= high {
        return low;
    }
    rng.gen_range(low..=high)
}

/// Coin flip
pub fn flip(rng: &mut ChaCha8Rng) -> bool {
    rng.gen_range(0..2) == 1
}
