//! Target capital structure search.
//!
//! Each candidate debt-to-equity ratio is costed end to end:
//!   beta_L = beta_U * (1 + (1 - t) * D/E)          (Hamada)
//!   ke     = rf + beta_L * MRP
//!   kd     = rf + spread(rating(EBIT / interest))  (iterated to a fixed point)
//!   WACC   = kd (1 - t) wd + ke we
//! and the objective picks one candidate from the scan. Rising equity beta
//! and widening credit spreads give WACC its interior minimum.

use crate::capital::rating::CreditRating;
use crate::capital::wacc::{calculate_wacc, CapitalWeights, CostOfCapital};
use crate::errors::{ensure_finite, ensure_non_negative, ensure_positive, EngineError, EngineResult};
use crate::math::Ratio;
use rayon::prelude::*;

/// Candidates within this much of the minimum WACC count as "no costlier"
/// when maximizing coverage.
pub const COVERAGE_WACC_TOLERANCE: f64 = 0.0025;

/// Upper bound on scan size.
pub const MAX_CANDIDATES: usize = 10_000;

/// Rating fixed-point iterations; the sequence only moves down so it settles fast.
const MAX_RATING_PASSES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "objective", rename_all = "snake_case", deny_unknown_fields)]
pub enum OptimizationGoal {
    MinimizeWacc,
    /// Best debt-service coverage among near-minimum-WACC structures
    MaximizeCoverage,
    /// Cheapest structure rated at least `target`
    ImproveRating { target: CreditRating },
}

impl std::fmt::Display for OptimizationGoal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MinimizeWacc => write!(f, "minimize_wacc"),
            Self::MaximizeCoverage => write!(f, "maximize_coverage"),
            Self::ImproveRating { target } => write!(f, "improve_rating({target})"),
        }
    }
}

fn default_max_debt_ratio() -> f64 {
    9.0
}

fn default_ratio_step() -> f64 {
    0.05
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizationInputs {
    pub risk_free_rate: f64,
    pub unlevered_beta: f64,
    pub market_risk_premium: f64,
    pub tax_rate: f64,
    /// Enterprise value the weights apply to
    pub firm_value: f64,
    pub ebit: f64,
    pub ebitda: f64,
    /// Debt assumed repaid evenly over this many years (for debt service)
    pub amortization_years: f64,
    /// Current debt-to-equity
    pub current_debt_ratio: f64,
    pub goal: OptimizationGoal,
    /// Largest D/E scanned (9.0 = 90% debt)
    #[serde(default = "default_max_debt_ratio")]
    pub max_debt_ratio: f64,
    #[serde(default = "default_ratio_step")]
    pub ratio_step: f64,
}

impl OptimizationInputs {
    pub fn validate(&self) -> EngineResult<()> {
        ensure_non_negative("risk_free_rate", self.risk_free_rate)?;
        ensure_non_negative("unlevered_beta", self.unlevered_beta)?;
        ensure_non_negative("market_risk_premium", self.market_risk_premium)?;
        ensure_non_negative("tax_rate", self.tax_rate)?;
        if self.tax_rate > 1.0 {
            return Err(EngineError::invalid(format!("tax_rate must be <= 1, got {}", self.tax_rate)));
        }
        ensure_positive("firm_value", self.firm_value)?;
        ensure_finite("ebit", self.ebit)?;
        ensure_finite("ebitda", self.ebitda)?;
        ensure_positive("amortization_years", self.amortization_years)?;
        ensure_non_negative("current_debt_ratio", self.current_debt_ratio)?;
        ensure_positive("max_debt_ratio", self.max_debt_ratio)?;
        ensure_positive("ratio_step", self.ratio_step)?;
        if self.max_debt_ratio / self.ratio_step > MAX_CANDIDATES as f64 {
            return Err(EngineError::invalid(format!(
                "scan of {} / {} exceeds {MAX_CANDIDATES} candidates",
                self.max_debt_ratio, self.ratio_step
            )));
        }
        Ok(())
    }
}

/// A fully costed capital structure.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CapitalStructure {
    /// D/E the structure was built from
    pub debt_ratio: f64,
    pub debt_weight: f64,
    pub equity_weight: f64,
    pub debt_to_equity: Ratio,
    pub levered_beta: f64,
    pub cost_of_debt: f64,
    pub cost_of_equity: f64,
    pub wacc: f64,
    pub interest_coverage: Ratio,
    pub debt_service_coverage: Ratio,
    pub credit_rating: CreditRating,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CapitalStructureAnalysis {
    pub goal: OptimizationGoal,
    pub current: CapitalStructure,
    pub optimized: CapitalStructure,
    /// optimized.wacc - current.wacc
    pub wacc_delta: f64,
    pub candidates_evaluated: usize,
}

/// Cost a structure at debt-to-equity `ratio`.
pub fn evaluate_structure(inputs: &OptimizationInputs, ratio: f64) -> EngineResult<CapitalStructure> {
    let weights = CapitalWeights::from_debt_ratio(ratio)?;
    let debt = inputs.firm_value * weights.debt();
    let levered_beta = inputs.unlevered_beta * (1.0 + (1.0 - inputs.tax_rate) * ratio);
    let cost_of_equity = inputs.risk_free_rate + levered_beta * inputs.market_risk_premium;

    let mut rating = CreditRating::Aaa;
    let mut cost_of_debt = inputs.risk_free_rate + rating.spread();
    let mut coverage = Ratio::of(inputs.ebit, debt * cost_of_debt);
    for _ in 0..MAX_RATING_PASSES {
        let implied = CreditRating::from_coverage(coverage);
        if implied == rating {
            break;
        }
        rating = implied;
        cost_of_debt = inputs.risk_free_rate + rating.spread();
        coverage = Ratio::of(inputs.ebit, debt * cost_of_debt);
    }

    let interest = debt * cost_of_debt;
    let principal = debt / inputs.amortization_years;
    let costs = CostOfCapital {
        cost_of_debt,
        cost_of_equity,
        tax_rate: inputs.tax_rate,
    };

    Ok(CapitalStructure {
        debt_ratio: ratio,
        debt_weight: weights.debt(),
        equity_weight: weights.equity(),
        debt_to_equity: weights.debt_to_equity(),
        levered_beta,
        cost_of_debt,
        cost_of_equity,
        wacc: calculate_wacc(&costs, &weights)?,
        interest_coverage: coverage,
        debt_service_coverage: Ratio::of(inputs.ebitda, interest + principal),
        credit_rating: rating,
    })
}

/// Coverage for ranking; no debt service counts as unlimited coverage.
#[inline]
fn coverage_rank(r: Ratio) -> f64 {
    r.value().unwrap_or(f64::INFINITY)
}

/// Candidate D/E ratios 0, step, 2*step, ... never above `max_debt_ratio`.
/// When the step does not divide the maximum, the maximum itself is the last candidate.
fn candidate_ratios(max_debt_ratio: f64, ratio_step: f64) -> Vec<f64> {
    let slack = 1e-9 * max_debt_ratio.max(1.0);
    let n = ((max_debt_ratio + slack) / ratio_step).floor() as usize;
    let mut ratios: Vec<f64> = (0..=n)
        .map(|k| (k as f64 * ratio_step).min(max_debt_ratio))
        .collect();
    if ratios.last().is_some_and(|&last| max_debt_ratio - last > slack) {
        ratios.push(max_debt_ratio);
    }
    ratios
}

/// Scan candidate ratios and pick per the goal.
pub fn optimize_capital_structure(inputs: &OptimizationInputs) -> EngineResult<CapitalStructureAnalysis> {
    inputs.validate()?;

    let candidates: Vec<CapitalStructure> = candidate_ratios(inputs.max_debt_ratio, inputs.ratio_step)
        .into_par_iter()
        .map(|ratio| evaluate_structure(inputs, ratio))
        .collect::<EngineResult<_>>()?;

    let cheapest = candidates
        .iter()
        .copied()
        .reduce(|best, c| if c.wacc < best.wacc { c } else { best })
        .ok_or_else(|| EngineError::Model("empty capital structure scan".into()))?;

    let optimized = match inputs.goal {
        OptimizationGoal::MinimizeWacc => cheapest,
        OptimizationGoal::MaximizeCoverage => candidates
            .iter()
            .copied()
            .filter(|c| c.wacc <= cheapest.wacc + COVERAGE_WACC_TOLERANCE)
            .reduce(|best, c| {
                if coverage_rank(c.debt_service_coverage) > coverage_rank(best.debt_service_coverage) {
                    c
                } else {
                    best
                }
            })
            .unwrap_or(cheapest),
        // The zero-debt candidate always rates AAA, so some candidate qualifies.
        OptimizationGoal::ImproveRating { target } => candidates
            .iter()
            .copied()
            .filter(|c| c.credit_rating >= target)
            .reduce(|best, c| if c.wacc < best.wacc { c } else { best })
            .unwrap_or(cheapest),
    };

    let current = evaluate_structure(inputs, inputs.current_debt_ratio)?;
    tracing::debug!(
        goal = %inputs.goal,
        candidates = candidates.len(),
        current_wacc = current.wacc,
        optimized_wacc = optimized.wacc,
        optimized_ratio = optimized.debt_ratio,
        investment_grade = optimized.credit_rating.is_investment_grade(),
        "capital structure scan complete"
    );

    Ok(CapitalStructureAnalysis {
        goal: inputs.goal,
        current,
        optimized,
        wacc_delta: optimized.wacc - current.wacc,
        candidates_evaluated: candidates.len(),
    })
}
