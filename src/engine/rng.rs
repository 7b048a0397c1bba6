//! Deterministic random number generation.
//!
//! Implements PCG (Permuted Congruential Generator) with one stream per
//! replication, derived from the master seed and the replication index.
//!
//! # Reproducibility Guarantee
//!
//! Given the same master seed, replication `k` draws a bitwise-identical
//! sequence across:
//! - Different runs
//! - Different platforms
//! - Different worker counts and completion orders

use rand::prelude::*;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

/// Golden-ratio increment used to spread stream seeds.
const STREAM_SPREAD: u64 = 0x9E37_79B9_7F4A_7C15;

/// Lower clamp for uniforms fed to `ln`.
const MIN_UNIFORM: f64 = 1e-12;

/// Upper bound on Erlang phases per draw (reached at `cv = 0.05`).
pub const MAX_ERLANG_PHASES: usize = 400;

/// Deterministic, reproducible random number generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimRng {
    /// Master seed for reproducibility.
    master_seed: u64,
    /// Stream index (the replication this generator belongs to).
    stream: u64,
    /// Internal PCG state.
    rng: Pcg64,
}

impl SimRng {
    /// Create a generator on stream 0 of the given master seed.
    #[must_use]
    pub fn new(master_seed: u64) -> Self {
        Self::for_stream(master_seed, 0)
    }

    /// Create the generator for one replication.
    ///
    /// The stream depends only on `(master_seed, replication)`, never on
    /// which worker runs the replication or when.
    ///
    /// # Example
    ///
    /// ```rust
    /// use simrep::engine::rng::SimRng;
    ///
    /// let mut a = SimRng::for_replication(42, 7);
    /// let mut b = SimRng::for_replication(42, 7);
    /// assert_eq!(a.gen_f64(), b.gen_f64());
    /// ```
    #[must_use]
    pub fn for_replication(master_seed: u64, replication: usize) -> Self {
        Self::for_stream(master_seed, replication as u64)
    }

    fn for_stream(master_seed: u64, stream: u64) -> Self {
        let seed = master_seed.wrapping_add(stream.wrapping_mul(STREAM_SPREAD));
        Self {
            master_seed,
            stream,
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Get the master seed.
    #[must_use]
    pub const fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Get the stream index.
    #[must_use]
    pub const fn stream(&self) -> u64 {
        self.stream
    }

    /// Generate a random f64 in [0, 1).
    pub fn gen_f64(&mut self) -> f64 {
        self.rng.gen()
    }

    /// Generate a random u64.
    pub fn gen_u64(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Generate an exponential variate with the given mean.
    pub fn gen_exponential(&mut self, mean: f64) -> f64 {
        let u = self.gen_f64().max(MIN_UNIFORM);
        -mean * u.ln()
    }

    /// Generate a positive variate with the given mean and coefficient of variation.
    ///
    /// - `cv ≈ 1`: exponential
    /// - `cv < 1`: Erlang-k with `k = round(1/cv²)`, capped at [`MAX_ERLANG_PHASES`]
    /// - `cv > 1`: balanced two-phase hyper-exponential
    pub fn gen_with_cv(&mut self, mean: f64, cv: f64) -> f64 {
        if (cv - 1.0).abs() < 0.01 {
            return self.gen_exponential(mean);
        }

        if cv < 1.0 {
            let k = ((1.0 / (cv * cv)).round().max(1.0) as usize).min(MAX_ERLANG_PHASES);
            let phase_mean = mean / k as f64;
            return (0..k).map(|_| self.gen_exponential(phase_mean)).sum();
        }

        // Balanced means: p₁/μ₁ = p₂/μ₂
        let cv2 = cv * cv;
        let p1 = 0.5 * (1.0 + ((cv2 - 1.0) / (cv2 + 1.0)).sqrt());
        let p2 = 1.0 - p1;
        if self.gen_f64() < p1 {
            self.gen_exponential(mean / (2.0 * p1))
        } else {
            self.gen_exponential(mean / (2.0 * p2))
        }
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification test: reproducibility holds for any seed and replication.
        #[test]
        fn prop_replication_reproducible(seed in 0u64..u64::MAX, k in 0usize..10_000) {
            let mut rng1 = SimRng::for_replication(seed, k);
            let mut rng2 = SimRng::for_replication(seed, k);

            let seq1: Vec<f64> = (0..50).map(|_| rng1.gen_f64()).collect();
            let seq2: Vec<f64> = (0..50).map(|_| rng2.gen_f64()).collect();

            prop_assert_eq!(seq1, seq2);
        }

        /// Falsification test: values in [0, 1) for any seed.
        #[test]
        fn prop_unit_interval(seed in 0u64..u64::MAX) {
            let mut rng = SimRng::new(seed);

            for _ in 0..100 {
                let v = rng.gen_f64();
                prop_assert!((0.0..1.0).contains(&v), "Value {} not in [0, 1)", v);
            }
        }

        /// Falsification test: variates are positive and finite for any shape.
        #[test]
        fn prop_cv_variates_positive(seed in 0u64..10_000, mean in 0.1f64..10.0, cv in 0.2f64..3.0) {
            let mut rng = SimRng::new(seed);
            for _ in 0..50 {
                let v = rng.gen_with_cv(mean, cv);
                prop_assert!(v >= 0.0 && v.is_finite());
            }
        }
    }
}
