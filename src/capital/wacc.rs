use crate::errors::{ensure_non_negative, EngineError, EngineResult};
use crate::math::Ratio;

/// Tolerance on debt + equity weights summing to 1.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Debt and equity shares of total capital. Always sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CapitalWeights {
    debt: f64,
    equity: f64,
}

impl CapitalWeights {
    /// Explicit weights; rejected unless both are in [0, 1] and sum to 1.
    pub fn new(debt: f64, equity: f64) -> EngineResult<Self> {
        ensure_non_negative("debt_weight", debt)?;
        ensure_non_negative("equity_weight", equity)?;
        if (debt + equity - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::invalid(format!(
                "debt and equity weights must sum to 1, got {debt} + {equity}"
            )));
        }
        Ok(Self { debt, equity })
    }

    /// From a target debt-to-equity ratio:
    /// debt = ratio / (1 + ratio), equity = 1 / (1 + ratio).
    pub fn from_debt_ratio(ratio: f64) -> EngineResult<Self> {
        ensure_non_negative("debt_ratio", ratio)?;
        let debt = ratio / (1.0 + ratio);
        Ok(Self { debt, equity: 1.0 - debt })
    }

    #[inline]
    pub fn debt(&self) -> f64 {
        self.debt
    }

    #[inline]
    pub fn equity(&self) -> f64 {
        self.equity
    }

    /// Undefined for an all-debt structure.
    #[inline]
    pub fn debt_to_equity(&self) -> Ratio {
        Ratio::of(self.debt, self.equity)
    }
}

/// Component costs of capital, as fractions.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostOfCapital {
    /// Pre-tax cost of debt
    pub cost_of_debt: f64,
    pub cost_of_equity: f64,
    pub tax_rate: f64,
}

impl CostOfCapital {
    pub fn validate(&self) -> EngineResult<()> {
        ensure_non_negative("cost_of_debt", self.cost_of_debt)?;
        ensure_non_negative("cost_of_equity", self.cost_of_equity)?;
        ensure_non_negative("tax_rate", self.tax_rate)?;
        if self.tax_rate > 1.0 {
            return Err(EngineError::invalid(format!("tax_rate must be <= 1, got {}", self.tax_rate)));
        }
        Ok(())
    }

    #[inline]
    pub fn after_tax_cost_of_debt(&self) -> f64 {
        self.cost_of_debt * (1.0 - self.tax_rate)
    }
}

/// WACC = kd * (1 - t) * wd + ke * we
pub fn calculate_wacc(costs: &CostOfCapital, weights: &CapitalWeights) -> EngineResult<f64> {
    costs.validate()?;
    Ok(costs.after_tax_cost_of_debt() * weights.debt + costs.cost_of_equity * weights.equity)
}
