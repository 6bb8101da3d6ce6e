use crate::errors::{ensure_finite, EngineError, EngineResult};
use crate::math::Ratio;
use crate::scenarios::projection::project;
use crate::scenarios::{BaseFinancials, ScenarioAssumptions, YearlyProjection};
use rayon::prelude::*;

/// Relative slack allowed between a variable's `base_value` and the assumption it shadows.
const BASE_VALUE_TOLERANCE: f64 = 1e-9;

/// Which scenario driver a sensitivity variable moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionField {
    GrowthRate,
    MarketMultiplier,
    RiskDiscount,
    CostInflation,
    CapitalEfficiency,
    EbitdaMargin,
    CashConversion,
    ValuationMultiple,
}

impl ScenarioAssumptions {
    pub fn get(&self, field: AssumptionField) -> f64 {
        match field {
            AssumptionField::GrowthRate => self.growth_rate,
            AssumptionField::MarketMultiplier => self.market_multiplier,
            AssumptionField::RiskDiscount => self.risk_discount,
            AssumptionField::CostInflation => self.cost_inflation,
            AssumptionField::CapitalEfficiency => self.capital_efficiency,
            AssumptionField::EbitdaMargin => self.ebitda_margin,
            AssumptionField::CashConversion => self.cash_conversion,
            AssumptionField::ValuationMultiple => self.valuation_multiple,
        }
    }

    /// Copy with one driver replaced.
    pub fn with(&self, field: AssumptionField, value: f64) -> Self {
        let mut next = *self;
        let slot = match field {
            AssumptionField::GrowthRate => &mut next.growth_rate,
            AssumptionField::MarketMultiplier => &mut next.market_multiplier,
            AssumptionField::RiskDiscount => &mut next.risk_discount,
            AssumptionField::CostInflation => &mut next.cost_inflation,
            AssumptionField::CapitalEfficiency => &mut next.capital_efficiency,
            AssumptionField::EbitdaMargin => &mut next.ebitda_margin,
            AssumptionField::CashConversion => &mut next.cash_conversion,
            AssumptionField::ValuationMultiple => &mut next.valuation_multiple,
        };
        *slot = value;
        next
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensitivityVariable {
    pub name: String,
    pub field: AssumptionField,
    /// Must equal the supplied assumption for `field`; impacts are measured from it.
    pub base_value: f64,
    pub pessimistic: f64,
    pub optimistic: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityCase {
    Pessimistic,
    Optimistic,
}

/// Percentage change of each final-year metric versus the base case.
/// `Undefined` when the base-case metric is zero.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MetricImpacts {
    pub revenue: Ratio,
    pub ebitda: Ratio,
    pub cash_flow: Ratio,
    pub valuation: Ratio,
}

impl MetricImpacts {
    fn between(base: &YearlyProjection, shocked: &YearlyProjection) -> Self {
        let pct = |b: f64, s: f64| Ratio::of((s - b) * 100.0, b.abs());
        Self {
            revenue: pct(base.revenue, shocked.revenue),
            ebitda: pct(base.ebitda, shocked.ebitda),
            cash_flow: pct(base.cash_flow, shocked.cash_flow),
            valuation: pct(base.valuation, shocked.valuation),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SensitivityResult {
    pub variable: String,
    pub case: SensitivityCase,
    /// Value the variable was set to
    pub value: f64,
    pub impacts: MetricImpacts,
}

/// One bar of a tornado chart: valuation impact range of a variable.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TornadoBar {
    pub variable: String,
    pub low: f64,
    pub high: f64,
    pub swing: f64,
}

/// Shock each variable to its pessimistic and optimistic bound, holding
/// every other driver at base, and compare final-year metrics.
///
/// Results come back in input order, pessimistic before optimistic.
pub fn analyze_sensitivity(
    base: &BaseFinancials,
    assumptions: &ScenarioAssumptions,
    horizon: u32,
    variables: &[SensitivityVariable],
) -> EngineResult<Vec<SensitivityResult>> {
    if variables.is_empty() {
        return Err(EngineError::invalid("at least one sensitivity variable is required"));
    }
    for v in variables {
        ensure_finite(&format!("{}.base_value", v.name), v.base_value)?;
        ensure_finite(&format!("{}.pessimistic", v.name), v.pessimistic)?;
        ensure_finite(&format!("{}.optimistic", v.name), v.optimistic)?;
        let assumed = assumptions.get(v.field);
        if (v.base_value - assumed).abs() > BASE_VALUE_TOLERANCE * assumed.abs().max(1.0) {
            return Err(EngineError::invalid(format!(
                "{}.base_value {} does not match the base assumption {assumed}",
                v.name, v.base_value
            )));
        }
    }

    let per_variable: Vec<[SensitivityResult; 2]> = variables
        .par_iter()
        .map(|v| shock_variable(base, assumptions, horizon, v))
        .collect::<EngineResult<_>>()?;

    tracing::debug!(variables = variables.len(), "sensitivity analysis complete");
    Ok(per_variable.into_iter().flatten().collect())
}

fn shock_variable(
    base: &BaseFinancials,
    assumptions: &ScenarioAssumptions,
    horizon: u32,
    v: &SensitivityVariable,
) -> EngineResult<[SensitivityResult; 2]> {
    let final_year = |value: f64| -> EngineResult<YearlyProjection> {
        let rows = project(base, &assumptions.with(v.field, value), horizon)?;
        rows.last()
            .copied()
            .ok_or_else(|| EngineError::Model("projection produced no rows".into()))
    };

    let reference = final_year(v.base_value)?;
    let low = final_year(v.pessimistic)?;
    let high = final_year(v.optimistic)?;

    Ok([
        SensitivityResult {
            variable: v.name.clone(),
            case: SensitivityCase::Pessimistic,
            value: v.pessimistic,
            impacts: MetricImpacts::between(&reference, &low),
        },
        SensitivityResult {
            variable: v.name.clone(),
            case: SensitivityCase::Optimistic,
            value: v.optimistic,
            impacts: MetricImpacts::between(&reference, &high),
        },
    ])
}

/// Collapse results into tornado bars, widest valuation swing first.
/// Variables whose valuation impact is undefined are left out.
pub fn tornado(results: &[SensitivityResult]) -> Vec<TornadoBar> {
    let mut bars: Vec<TornadoBar> = Vec::new();
    for r in results {
        let Some(impact) = r.impacts.valuation.value() else {
            continue;
        };
        match bars.iter_mut().find(|b| b.variable == r.variable) {
            Some(bar) => {
                bar.low = bar.low.min(impact);
                bar.high = bar.high.max(impact);
                bar.swing = bar.high - bar.low;
            }
            None => bars.push(TornadoBar {
                variable: r.variable.clone(),
                low: impact.min(0.0),
                high: impact.max(0.0),
                swing: impact.abs(),
            }),
        }
    }
    bars.sort_by(|a, b| b.swing.total_cmp(&a.swing));
    bars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BaseFinancials {
        BaseFinancials { revenue: 5_000_000.0, start_year: 2025 }
    }

    fn variable(name: &str, field: AssumptionField, base_value: f64, low: f64, high: f64) -> SensitivityVariable {
        SensitivityVariable {
            name: name.to_string(),
            field,
            base_value,
            pessimistic: low,
            optimistic: high,
        }
    }

    #[test]
    fn test_multiple_shock_is_linear_in_valuation() {
        let a = ScenarioAssumptions::simple(0.10, 0.2, 0.8, 4.0);
        let vars = [variable("multiple", AssumptionField::ValuationMultiple, 4.0, 3.0, 5.0)];
        let results = analyze_sensitivity(&base(), &a, 5, &vars).unwrap();
        assert_eq!(results.len(), 2);

        let pess = &results[0];
        assert_eq!(pess.case, SensitivityCase::Pessimistic);
        assert!((pess.impacts.valuation.value().unwrap() + 25.0).abs() < 1e-9);
        assert_eq!(pess.impacts.revenue, Ratio::Defined(0.0));

        let opt = &results[1];
        assert!((opt.impacts.valuation.value().unwrap() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_growth_shock_direction() {
        let a = ScenarioAssumptions::simple(0.10, 0.2, 0.8, 4.0);
        let vars = [variable("growth", AssumptionField::GrowthRate, 0.10, 0.02, 0.18)];
        let results = analyze_sensitivity(&base(), &a, 5, &vars).unwrap();
        assert!(results[0].impacts.revenue.value().unwrap() < 0.0);
        assert!(results[1].impacts.revenue.value().unwrap() > 0.0);
    }

    #[test]
    fn test_zero_base_metric_is_undefined() {
        let a = ScenarioAssumptions::simple(0.10, 0.0, 0.8, 4.0);
        let vars = [variable("margin", AssumptionField::EbitdaMargin, 0.0, 0.0, 0.1)];
        let results = analyze_sensitivity(&base(), &a, 3, &vars).unwrap();
        assert_eq!(results[1].impacts.ebitda, Ratio::Undefined);
        assert!(results[1].impacts.revenue.is_defined());
    }

    #[test]
    fn test_tornado_sorted_by_swing() {
        let a = ScenarioAssumptions::simple(0.10, 0.2, 0.8, 4.0);
        let vars = [
            variable("margin", AssumptionField::EbitdaMargin, 0.2, 0.15, 0.25),
            variable("growth", AssumptionField::GrowthRate, 0.10, 0.0, 0.20),
            variable("multiple", AssumptionField::ValuationMultiple, 4.0, 3.8, 4.2),
        ];
        let results = analyze_sensitivity(&base(), &a, 5, &vars).unwrap();
        let bars = tornado(&results);
        // Margin does not move valuation; it still gets a zero-width bar
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].variable, "growth");
        assert!(bars.windows(2).all(|w| w[0].swing >= w[1].swing));
        assert!(bars[0].low < 0.0 && bars[0].high > 0.0);
    }

    #[test]
    fn test_base_value_must_match_assumptions() {
        let a = ScenarioAssumptions::simple(0.10, 0.2, 0.8, 4.0);
        let vars = [variable("growth", AssumptionField::GrowthRate, 0.05, 0.02, 0.18)];
        let err = analyze_sensitivity(&base(), &a, 5, &vars).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)), "got {err:?}");

        let vars = [variable("growth", AssumptionField::GrowthRate, a.get(AssumptionField::GrowthRate), 0.02, 0.18)];
        assert!(analyze_sensitivity(&base(), &a, 5, &vars).is_ok());
    }

    #[test]
    fn test_get_reads_what_with_writes() {
        let a = ScenarioAssumptions::simple(0.10, 0.2, 0.8, 4.0);
        for field in [
            AssumptionField::GrowthRate,
            AssumptionField::MarketMultiplier,
            AssumptionField::RiskDiscount,
            AssumptionField::CostInflation,
            AssumptionField::CapitalEfficiency,
            AssumptionField::EbitdaMargin,
            AssumptionField::CashConversion,
            AssumptionField::ValuationMultiple,
        ] {
            let moved = a.with(field, 0.42);
            assert_eq!(moved.get(field), 0.42, "{field:?}");
        }
        assert_eq!(a.get(AssumptionField::ValuationMultiple), 4.0);
    }

    #[test]
    fn test_invalid_bound_rejected() {
        let a = ScenarioAssumptions::simple(0.10, 0.2, 0.8, 4.0);
        let vars = [variable("risk", AssumptionField::RiskDiscount, 0.0, 1.5, 0.0)];
        assert!(analyze_sensitivity(&base(), &a, 5, &vars).is_err());
        assert!(analyze_sensitivity(&base(), &a, 5, &[]).is_err());
    }
}
