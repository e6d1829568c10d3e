//! Random source collaborator.
//!
//! The engine consumes randomness through [`RandomSource`] only: uniform
//! positions, normal intensities, and Poisson spawn counts, all drawn from
//! one seeded stream. The seed is either supplied or derived from the wall
//! clock at startup, and is always reported so a run can be reproduced.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson, StandardNormal};
use std::time::{SystemTime, UNIX_EPOCH};

/// One seeded random stream.
pub trait RandomSource: Send {
    /// Uniform deviate in `[low, high)`.
    fn uniform(&mut self, low: f64, high: f64) -> f64;
    /// Normal deviate with mean 0 and standard deviation `sigma`.
    fn normal(&mut self, sigma: f64) -> f64;
    /// Poisson deviate with mean `rate * dt`.
    fn poisson(&mut self, rate: f64, dt: f64) -> u64;
    /// The seed this stream was created with.
    fn seed(&self) -> u64;
}

/// [`RandomSource`] backed by a seeded `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededSource {
    rng: StdRng,
    seed: u64,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), seed }
    }

    /// Seed from the wall clock. The caller is expected to log the seed.
    pub fn from_clock() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::new(seed)
    }
}

impl RandomSource for SeededSource {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.rng.gen_range(low..high)
    }

    fn normal(&mut self, sigma: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        z * sigma
    }

    fn poisson(&mut self, rate: f64, dt: f64) -> u64 {
        let mean = rate * dt;
        if mean <= 0.0 {
            return 0;
        }
        match Poisson::new(mean) {
            Ok(dist) => dist.sample(&mut self.rng) as u64,
            Err(_) => 0, // non-finite mean; treat as no spawns
        }
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
