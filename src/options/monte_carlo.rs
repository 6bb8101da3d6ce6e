//! Monte Carlo pricing under geometric Brownian motion.
//!
//! Paths are simulated in fixed-size chunks, each with its own RNG seeded
//! from (seed, chunk index). Chunks run in parallel via Rayon and are
//! reduced in chunk order, so the result depends only on the inputs and
//! never on the thread count.

use crate::errors::{EngineError, EngineResult};
use crate::math::stats::{validate_level, z_score, ConfidenceInterval};
use crate::options::black_scholes::VOL_FLOOR;
use crate::options::{ModelKind, OptionContract, PricingModel, PricingResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

/// Paths per chunk (unit of parallel work and of seeding).
const CHUNK_SIZE: usize = 8192;

/// Minimum paths needed for a sample standard deviation.
const MIN_SIMULATIONS: usize = 2;

/// Golden-ratio increment used to spread chunk seeds.
const SEED_STRIDE: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Clone, Copy)]
pub struct MonteCarlo {
    pub simulations: usize,
    pub seed: u64,
    /// Level of the reported confidence interval, e.g. 0.95
    pub confidence: f64,
}

/// Running sums for one chunk of paths.
#[derive(Debug, Clone, Copy, Default)]
struct ChunkSums {
    sum: f64,
    sum_sq: f64,
}

impl MonteCarlo {
    pub fn new(simulations: usize, seed: u64, confidence: f64) -> Self {
        Self { simulations, seed, confidence }
    }

    fn validate(&self) -> EngineResult<()> {
        if self.simulations < MIN_SIMULATIONS {
            return Err(EngineError::invalid(format!(
                "monte carlo needs at least {MIN_SIMULATIONS} simulations, got {}",
                self.simulations
            )));
        }
        validate_level(self.confidence)
    }
}

/// RNG for chunk `index` of a run seeded with `seed`.
#[inline]
pub(crate) fn chunk_rng(seed: u64, index: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (index as u64).wrapping_add(1).wrapping_mul(SEED_STRIDE))
}

impl PricingModel for MonteCarlo {
    #[inline]
    fn kind(&self) -> ModelKind {
        ModelKind::MonteCarlo
    }

    fn price(&self, contract: &OptionContract) -> EngineResult<PricingResult> {
        contract.validate()?;
        self.validate()?;

        let sigma = contract.volatility.max(VOL_FLOOR);
        let t = contract.time_to_expiry;
        let drift = (contract.risk_free_rate - 0.5 * sigma * sigma) * t;
        let diffusion = sigma * t.sqrt();
        let discount = (-contract.risk_free_rate * t).exp();
        let spot = contract.underlying_value;

        let n_chunks = self.simulations.div_ceil(CHUNK_SIZE);
        tracing::debug!(
            simulations = self.simulations,
            chunks = n_chunks,
            seed = self.seed,
            "monte carlo run"
        );

        let chunk_sums: Vec<ChunkSums> = (0..n_chunks)
            .into_par_iter()
            .map(|chunk| {
                let start = chunk * CHUNK_SIZE;
                let len = CHUNK_SIZE.min(self.simulations - start);
                let mut rng = chunk_rng(self.seed, chunk);
                let mut sums = ChunkSums::default();
                for _ in 0..len {
                    let z: f64 = rng.sample(StandardNormal);
                    let terminal = spot * (drift + diffusion * z).exp();
                    let pv = discount * contract.payoff(terminal);
                    sums.sum += pv;
                    sums.sum_sq += pv * pv;
                }
                sums
            })
            .collect();

        // Ordered reduction keeps the result bit-for-bit reproducible
        let total = chunk_sums.iter().fold(ChunkSums::default(), |acc, c| ChunkSums {
            sum: acc.sum + c.sum,
            sum_sq: acc.sum_sq + c.sum_sq,
        });

        let n = self.simulations as f64;
        let mean = total.sum / n;
        let variance = ((total.sum_sq - n * mean * mean) / (n - 1.0)).max(0.0);
        let standard_error = (variance / n).sqrt();
        let half_width = z_score(self.confidence)? * standard_error;

        let mut result = PricingResult::plain(ModelKind::MonteCarlo, mean.max(0.0));
        result.standard_error = Some(standard_error);
        result.confidence_interval = Some(ConfidenceInterval {
            level: self.confidence,
            lower: (mean - half_width).max(0.0),
            mean,
            upper: mean + half_width,
        });
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::black_scholes::BlackScholes;
    use crate::options::OptionKind;

    fn contract() -> OptionContract {
        OptionContract {
            underlying_value: 100.0,
            strike: 100.0,
            time_to_expiry: 1.0,
            risk_free_rate: 0.05,
            volatility: 0.3,
            option_type: OptionKind::Call,
        }
    }

    #[test]
    fn test_same_seed_same_price() {
        let c = contract();
        let a = MonteCarlo::new(50_000, 11, 0.95).price(&c).unwrap();
        let b = MonteCarlo::new(50_000, 11, 0.95).price(&c).unwrap();
        assert_eq!(a.value, b.value);
        assert_eq!(a.standard_error, b.standard_error);

        let other = MonteCarlo::new(50_000, 12, 0.95).price(&c).unwrap();
        assert_ne!(a.value, other.value, "different seeds should give different paths");
    }

    #[test]
    fn test_within_standard_errors_of_bs() {
        let c = contract();
        let bs = BlackScholes::new().price(&c).unwrap().value;
        let mc = MonteCarlo::new(200_000, 3, 0.95).price(&c).unwrap();
        let se = mc.standard_error.unwrap();
        assert!((mc.value - bs).abs() < 5.0 * se, "mc={} bs={bs} se={se}", mc.value);
    }

    #[test]
    fn test_standard_error_shrinks_with_sqrt_n() {
        let c = contract();
        let small = MonteCarlo::new(10_000, 5, 0.95).price(&c).unwrap().standard_error.unwrap();
        let large = MonteCarlo::new(40_000, 5, 0.95).price(&c).unwrap().standard_error.unwrap();
        let ratio = small / large;
        assert!(ratio > 1.7 && ratio < 2.3, "4x paths should halve SE: ratio={ratio}");
    }

    #[test]
    fn test_interval_widens_with_level() {
        let c = contract();
        let mut prev_width = 0.0;
        for &level in &[0.90, 0.95, 0.99] {
            let ci = MonteCarlo::new(20_000, 9, level).price(&c).unwrap().confidence_interval.unwrap();
            assert!(ci.contains(ci.mean), "{ci:?}");
            assert!(ci.width() > prev_width, "width at {level} = {}", ci.width());
            prev_width = ci.width();
        }
    }

    #[test]
    fn test_rejects_tiny_run_and_bad_level() {
        let c = contract();
        assert!(MonteCarlo::new(1, 0, 0.95).price(&c).is_err());
        assert!(MonteCarlo::new(1000, 0, 1.5).price(&c).is_err());
    }
}
