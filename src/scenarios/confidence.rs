//! Confidence intervals for projected metrics.
//!
//! Two sources of spread:
//! - the probability-weighted blend of scenario outcomes (normal approximation)
//! - a GBM simulation of valuation uncertainty (empirical percentiles)
//!
//! Either way every interval satisfies lower <= mean <= upper, and intervals
//! for higher levels contain those for lower levels.

use crate::errors::{ensure_non_negative, ensure_positive, EngineError, EngineResult};
use crate::math::stats::{percentile_sorted, validate_level, z_score, ConfidenceInterval};
use crate::options::monte_carlo::chunk_rng;
use crate::scenarios::{validate_probabilities, ScenarioDefinition, YearlyProjection};
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use smallvec::SmallVec;

/// Paths per simulation chunk.
const CHUNK_SIZE: usize = 8192;

/// Upper bound on simulated valuation paths (all samples are kept for percentiles).
pub const MAX_VALUATION_PATHS: usize = 2_000_000;

/// Typical request: 90 / 95 / 99
pub type Intervals = SmallVec<[ConfidenceInterval; 3]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMetric {
    Revenue,
    Ebitda,
    CashFlow,
    Valuation,
}

impl ProjectionMetric {
    #[inline]
    pub fn of(&self, row: &YearlyProjection) -> f64 {
        match self {
            Self::Revenue => row.revenue,
            Self::Ebitda => row.ebitda,
            Self::CashFlow => row.cash_flow,
            Self::Valuation => row.valuation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricConfidence {
    pub mean: f64,
    pub standard_deviation: f64,
    pub intervals: Intervals,
}

fn validate_levels(levels: &[f64]) -> EngineResult<()> {
    if levels.is_empty() {
        return Err(EngineError::invalid("at least one confidence level is required"));
    }
    levels.iter().try_for_each(|&l| validate_level(l))
}

/// Intervals for `metric` in `year` from the probability-weighted scenario blend.
///
/// Scenario probabilities (percent) become weights summing to 1.
/// mean = sum w_i x_i, var = sum w_i (x_i - mean)^2, bounds = mean -/+ z * sd.
pub fn weighted_confidence(
    scenarios: &[ScenarioDefinition],
    metric: ProjectionMetric,
    year: i32,
    levels: &[f64],
) -> EngineResult<MetricConfidence> {
    validate_probabilities(scenarios)?;
    validate_levels(levels)?;

    let mut points: SmallVec<[(f64, f64); 4]> = SmallVec::new();
    for s in scenarios {
        let row = s.year(year).ok_or_else(|| {
            EngineError::invalid(format!("scenario '{}' has no projection for year {year}", s.name))
        })?;
        points.push((s.probability / 100.0, metric.of(row)));
    }

    let mean: f64 = points.iter().map(|(w, x)| w * x).sum();
    let variance: f64 = points.iter().map(|(w, x)| w * (x - mean) * (x - mean)).sum();
    let sd = variance.max(0.0).sqrt();

    let intervals = levels
        .iter()
        .map(|&level| {
            let half = z_score(level)? * sd;
            Ok(ConfidenceInterval { level, lower: mean - half, mean, upper: mean + half })
        })
        .collect::<EngineResult<Intervals>>()?;

    Ok(MetricConfidence { mean, standard_deviation: sd, intervals })
}

/// Simulate valuation uncertainty around a projected valuation.
///
/// V_T = V * exp(-sigma^2 T / 2 + sigma sqrt(T) Z), so E[V_T] = V.
/// Intervals are the empirical (1 - level)/2 and (1 + level)/2 percentiles
/// of one shared sample, which makes them nested across levels.
pub fn simulate_valuation_confidence(
    valuation: f64,
    volatility: f64,
    years: f64,
    levels: &[f64],
    simulations: usize,
    seed: u64,
) -> EngineResult<MetricConfidence> {
    ensure_non_negative("valuation", valuation)?;
    ensure_non_negative("volatility", volatility)?;
    ensure_positive("years", years)?;
    validate_levels(levels)?;
    if simulations < 2 || simulations > MAX_VALUATION_PATHS {
        return Err(EngineError::invalid(format!(
            "valuation simulations must be in 2..={MAX_VALUATION_PATHS}, got {simulations}"
        )));
    }

    let drift = -0.5 * volatility * volatility * years;
    let diffusion = volatility * years.sqrt();
    let n_chunks = simulations.div_ceil(CHUNK_SIZE);

    let chunks: Vec<Vec<f64>> = (0..n_chunks)
        .into_par_iter()
        .map(|chunk| {
            let len = CHUNK_SIZE.min(simulations - chunk * CHUNK_SIZE);
            let mut rng = chunk_rng(seed, chunk);
            (0..len)
                .map(|_| {
                    let z: f64 = rng.sample(StandardNormal);
                    valuation * (drift + diffusion * z).exp()
                })
                .collect()
        })
        .collect();

    let mut samples: Vec<f64> = chunks.into_iter().flatten().collect();
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1.0);
    samples.sort_by(f64::total_cmp);

    let intervals = levels
        .iter()
        .map(|&level| {
            let lo = percentile_sorted(&samples, 0.5 - 0.5 * level);
            let hi = percentile_sorted(&samples, 0.5 + 0.5 * level);
            // Heavy right skew can push the mean past a narrow upper percentile
            ConfidenceInterval { level, lower: lo.min(mean), mean, upper: hi.max(mean) }
        })
        .collect();

    tracing::debug!(simulations, seed, mean, "valuation uncertainty simulated");
    Ok(MetricConfidence { mean, standard_deviation: variance.sqrt(), intervals })
}
