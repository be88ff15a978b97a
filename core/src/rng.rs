//! Random jitter for the local heuristic score.
//!
//! RULE: the scoring engine never calls a platform RNG directly.
//! Every random term is drawn from a JitterSource handed to it, so
//! tests can pin the jitter to zero or to a fixed seed.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// Source of the uniform `[0, 1)` draws used as score jitter.
pub trait JitterSource: Send {
    fn next_unit(&mut self) -> f64;
}

/// Seedable PCG stream. Same seed, same scores.
pub struct ScoreRng {
    seed: u64,
    inner: Pcg64Mcg,
}

impl ScoreRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed,
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Seed from the thread RNG. Production scoring uses this.
    pub fn from_entropy() -> Self {
        Self::seeded(rand::random::<u64>())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

impl JitterSource for ScoreRng {
    fn next_unit(&mut self) -> f64 {
        self.next_f64()
    }
}

/// Always zero. Makes local scores fully deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn next_unit(&mut self) -> f64 {
        0.0
    }
}

/// Fixed draw, for pinning jitter at a boundary in tests.
#[derive(Debug, Clone, Copy)]
pub struct ConstantJitter(pub f64);

impl JitterSource for ConstantJitter {
    fn next_unit(&mut self) -> f64 {
        self.0.clamp(0.0, 1.0 - f64::EPSILON)
    }
}
