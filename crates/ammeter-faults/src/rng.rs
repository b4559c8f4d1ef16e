//! Seeded RNG for reproducible fault decisions.
//!
//! Every run owns exactly one [`FaultRng`]. It is never shared between runs and
//! there is no process-wide generator, so concurrent runs (and concurrent tests)
//! cannot disturb each other's sequences.

use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

/// Seeded RNG wrapper for reproducible fault injection.
pub struct FaultRng {
    inner: ChaCha8Rng,
    seed: u64,
}

impl FaultRng {
    /// Create a new RNG with optional seed.
    /// If seed is None, a seed is drawn from the OS and kept so the run can
    /// still be replayed via [`seed`](Self::seed).
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| OsRng.next_u64());
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed this generator was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// One Bernoulli trial with success probability `p`.
    ///
    /// Always consumes exactly one draw, even for `p <= 0` or `p >= 1`, so the
    /// stream stays aligned whatever the probabilities are.
    pub fn trial(&mut self, p: f64) -> bool {
        let draw: f64 = self.inner.gen();
        if p <= 0.0 {
            false
        } else if p >= 1.0 {
            true
        } else {
            draw < p
        }
    }

    /// Uniform value in `[low, high)`; returns `low` when the range is empty.
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        let draw: f64 = self.inner.gen();
        if high <= low {
            low
        } else {
            low + draw * (high - low)
        }
    }

    /// Uniform duration in `[min, max]`.
    pub fn uniform_duration(&mut self, min: Duration, max: Duration) -> Duration {
        let secs = self.uniform(min.as_secs_f64(), max.as_secs_f64());
        Duration::from_secs_f64(secs).clamp(min, max.max(min))
    }

    /// `1.0` or `-1.0` with equal probability.
    pub fn sign(&mut self) -> f64 {
        if self.inner.gen::<bool>() {
            1.0
        } else {
            -1.0
        }
    }
}

impl std::fmt::Debug for FaultRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultRng")
            .field("inner", &"<ChaCha8Rng>")
            .field("seed", &self.seed)
            .finish()
    }
}
