//! Deterministic message sampling

use serde::{Deserialize, Serialize};
use fnv::FnvHasher;
use std::hash::Hasher;

/// Resolution of the sampling decision: rates are compared in 1/10000 steps
const SAMPLE_BUCKETS: u64 = 10_000;

/// Decide whether `message` is accepted at `rate` for the given `seed`.
///
/// The decision hashes `message` followed by the decimal text of `seed`
/// with 64-bit FNV-1a, so the same inputs give the same answer in every
/// process and on every run.
#[must_use]
pub fn should_sample(message: &str, rate: f64, seed: i64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 || rate.is_nan() {
        return false;
    }

    let bucket = sample_hash(message, seed) % SAMPLE_BUCKETS;

    #[allow(clippy::cast_precision_loss)]
    let bucket = bucket as f64;
    #[allow(clippy::cast_precision_loss)]
    let threshold = rate * SAMPLE_BUCKETS as f64;
    bucket < threshold
}

fn sample_hash(message: &str, seed: i64) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(message.as_bytes());
    hasher.write(seed.to_string().as_bytes());
    hasher.finish()
}

/// Sampling settings bound together
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sampler {
    /// Probability in `[0, 1]` that a message is accepted
    pub rate: f64,
    /// Seed mixed into the hash
    pub seed: i64,
}

impl Sampler {
    /// Create a sampler
    #[must_use]
    pub const fn new(rate: f64, seed: i64) -> Self {
        Self { rate, seed }
    }

    /// Whether this sampler can ever reject a message
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.rate < 1.0
    }

    /// Apply the sampling decision to a message
    #[must_use]
    pub fn accepts(&self, message: &str) -> bool {
        should_sample(message, self.rate, self.seed)
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(1.0, 0)
    }
}
