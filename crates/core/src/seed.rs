//! Random sampler seeds.

use rand::Rng;

/// Seeds are drawn from 14 decimal digits.
const SEED_UPPER_BOUND: u64 = 100_000_000_000_000;

/// Fresh sampler seed so repeated requests do not hit the backend's cache.
pub fn random_seed() -> u64 {
    rand::rng().random_range(0..SEED_UPPER_BOUND)
}
