//! Logical time and random number generation for deterministic simulations.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::scheduler::SimulationError;

/// Logical simulation clock in seconds since run start.
///
/// Time only moves forward and is independent of wall-clock time. The
/// scheduler is the only writer.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: f64,
}

impl SimClock {
    /// Creates a clock at time zero.
    pub fn new() -> Self {
        Self { now: 0.0 }
    }

    /// Returns current simulation time.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Moves the clock to `target`.
    ///
    /// # Errors
    ///
    /// - `SimulationError::TimeReversal` - If target is earlier than now or not finite
    pub(crate) fn advance_to(&mut self, target: f64) -> Result<(), SimulationError> {
        if !target.is_finite() || target < self.now {
            return Err(SimulationError::TimeReversal {
                now: self.now,
                target,
            });
        }
        self.now = target;
        Ok(())
    }
}

/// Source of uniform draws shared by every stochastic decision in a run.
///
/// Only `random` is required; the derived draws consume it in a fixed
/// pattern so any implementation yields the same decision sequence for the
/// same uniform stream.
pub trait RandomSource {
    /// Uniform draw in `[0, 1)`.
    fn random(&mut self) -> f64;

    /// Exponential draw with the given rate. Consumes one uniform.
    fn expovariate(&mut self, rate: f64) -> f64 {
        -(1.0 - self.random()).ln() / rate
    }

    /// Index drawn proportionally to `weights`. Consumes one uniform.
    ///
    /// Returns `None` without drawing when the weights are empty or their
    /// sum is not positive.
    fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0.0;
        for weight in weights {
            total += weight;
            cumulative.push(total);
        }
        if cumulative.is_empty() || !total.is_finite() || total <= 0.0 {
            return None;
        }

        let target = self.random() * total;
        let idx = cumulative.partition_point(|&c| c <= target);
        Some(idx.min(cumulative.len() - 1))
    }
}

/// Picks one item proportionally to `weights`.
///
/// Items beyond the length of `weights` are never chosen.
pub fn weighted_choice<'a, T, R>(rng: &mut R, items: &'a [T], weights: &[f64]) -> Option<&'a T>
where
    R: RandomSource + ?Sized,
{
    let usable = items.len().min(weights.len());
    rng.weighted_index(&weights[..usable])
        .and_then(|idx| items.get(idx))
}

/// Picks `k` items with replacement, proportionally to `weights`.
pub fn weighted_choices<'a, T, R>(
    rng: &mut R,
    items: &'a [T],
    weights: &[f64],
    k: usize,
) -> Vec<&'a T>
where
    R: RandomSource + ?Sized,
{
    (0..k)
        .map_while(|_| weighted_choice(&mut *rng, items, weights))
        .collect()
}

/// Seeded ChaCha8 generator used for every run.
#[derive(Debug, Clone)]
pub struct SimRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl SimRng {
    /// Creates deterministic RNG from seed value.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Returns the seed used for this RNG.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for SimRng {
    fn random(&mut self) -> f64 {
        // 53 high bits give every representable step in [0, 1)
        (self.rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}
