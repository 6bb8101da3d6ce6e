use crate::errors::{ensure_finite, ensure_non_negative, ensure_positive, EngineResult};
use crate::math::Ratio;

/// Caller-supplied financial statement figures for one period.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeverageInputs {
    pub total_debt: f64,
    pub total_equity: f64,
    pub total_assets: f64,
    pub ebit: f64,
    pub ebitda: f64,
    pub operating_cash_flow: f64,
    pub interest_expense: f64,
    /// Scheduled principal repayments in the period
    pub principal_repayment: f64,
}

impl LeverageInputs {
    pub fn validate(&self) -> EngineResult<()> {
        ensure_non_negative("total_debt", self.total_debt)?;
        ensure_finite("total_equity", self.total_equity)?;
        ensure_non_negative("total_assets", self.total_assets)?;
        ensure_finite("ebit", self.ebit)?;
        ensure_finite("ebitda", self.ebitda)?;
        ensure_finite("operating_cash_flow", self.operating_cash_flow)?;
        ensure_non_negative("interest_expense", self.interest_expense)?;
        ensure_non_negative("principal_repayment", self.principal_repayment)?;
        Ok(())
    }
}

/// Every ratio is `Undefined` when its denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LeverageMetrics {
    pub debt_to_equity: Ratio,
    pub debt_to_assets: Ratio,
    /// EBITDA / interest
    pub interest_coverage: Ratio,
    /// EBITDA / (interest + principal)
    pub debt_service_coverage: Ratio,
    /// EBIT / interest
    pub times_interest_earned: Ratio,
    /// Operating cash flow / interest
    pub cash_coverage: Ratio,
}

pub fn leverage_metrics(inputs: &LeverageInputs) -> EngineResult<LeverageMetrics> {
    inputs.validate()?;
    let interest = inputs.interest_expense;
    Ok(LeverageMetrics {
        debt_to_equity: Ratio::of(inputs.total_debt, inputs.total_equity),
        debt_to_assets: Ratio::of(inputs.total_debt, inputs.total_assets),
        interest_coverage: Ratio::of(inputs.ebitda, interest),
        debt_service_coverage: Ratio::of(inputs.ebitda, interest + inputs.principal_repayment),
        times_interest_earned: Ratio::of(inputs.ebit, interest),
        cash_coverage: Ratio::of(inputs.operating_cash_flow, interest),
    })
}

/// Lending limits used to size debt capacity.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebtCapacityInputs {
    pub ebitda: f64,
    pub ebit: f64,
    pub current_debt: f64,
    pub cost_of_debt: f64,
    /// Maximum debt / EBITDA a lender accepts
    pub max_leverage_multiple: f64,
    /// Minimum EBIT / interest a lender accepts
    pub min_interest_coverage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct DebtCapacity {
    pub by_leverage: f64,
    pub by_coverage: f64,
    /// The binding (smaller) limit
    pub capacity: f64,
    /// capacity - current debt; negative when already over the limit
    pub headroom: f64,
}

/// capacity = min(EBITDA * max multiple, EBIT / (min coverage * kd))
pub fn debt_capacity(inputs: &DebtCapacityInputs) -> EngineResult<DebtCapacity> {
    ensure_finite("ebitda", inputs.ebitda)?;
    ensure_finite("ebit", inputs.ebit)?;
    ensure_non_negative("current_debt", inputs.current_debt)?;
    ensure_positive("cost_of_debt", inputs.cost_of_debt)?;
    ensure_non_negative("max_leverage_multiple", inputs.max_leverage_multiple)?;
    ensure_positive("min_interest_coverage", inputs.min_interest_coverage)?;

    let by_leverage = (inputs.ebitda * inputs.max_leverage_multiple).max(0.0);
    let by_coverage = (inputs.ebit / (inputs.min_interest_coverage * inputs.cost_of_debt)).max(0.0);
    let capacity = by_leverage.min(by_coverage);

    Ok(DebtCapacity {
        by_leverage,
        by_coverage,
        capacity,
        headroom: capacity - inputs.current_debt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> LeverageInputs {
        LeverageInputs {
            total_debt: 40.0,
            total_equity: 60.0,
            total_assets: 100.0,
            ebit: 15.0,
            ebitda: 20.0,
            operating_cash_flow: 18.0,
            interest_expense: 4.0,
            principal_repayment: 6.0,
        }
    }

    #[test]
    fn test_direct_ratios() {
        let m = leverage_metrics(&inputs()).unwrap();
        assert_eq!(m.debt_to_assets, Ratio::Defined(0.4));
        assert_eq!(m.interest_coverage, Ratio::Defined(5.0));
        assert_eq!(m.debt_service_coverage, Ratio::Defined(2.0));
        assert_eq!(m.times_interest_earned, Ratio::Defined(3.75));
        assert_eq!(m.cash_coverage, Ratio::Defined(4.5));
        assert!((m.debt_to_equity.value().unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominators_are_undefined() {
        let m = leverage_metrics(&LeverageInputs {
            total_equity: 0.0,
            interest_expense: 0.0,
            principal_repayment: 0.0,
            ..inputs()
        })
        .unwrap();
        assert_eq!(m.debt_to_equity, Ratio::Undefined);
        assert_eq!(m.interest_coverage, Ratio::Undefined);
        assert_eq!(m.debt_service_coverage, Ratio::Undefined);
        assert_eq!(m.times_interest_earned, Ratio::Undefined);
        assert_eq!(m.cash_coverage, Ratio::Undefined);
        assert!(m.debt_to_assets.is_defined());
    }

    #[test]
    fn test_debt_capacity_binding_limit() {
        let cap = debt_capacity(&DebtCapacityInputs {
            ebitda: 20.0,
            ebit: 15.0,
            current_debt: 40.0,
            cost_of_debt: 0.06,
            max_leverage_multiple: 3.0,
            min_interest_coverage: 3.0,
        })
        .unwrap();
        assert!((cap.by_leverage - 60.0).abs() < 1e-12);
        assert!((cap.by_coverage - 15.0 / 0.18).abs() < 1e-9);
        assert_eq!(cap.capacity, cap.by_leverage);
        assert!((cap.headroom - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_negative_interest_rejected() {
        assert!(leverage_metrics(&LeverageInputs { interest_expense: -1.0, ..inputs() }).is_err());
    }
}
