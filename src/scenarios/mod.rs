pub mod confidence;
pub mod projection;
pub mod sensitivity;

use crate::errors::{ensure_finite, ensure_non_negative, ensure_percentage, EngineError, EngineResult};

/// Longest projection horizon accepted, in years.
pub const MAX_HORIZON: u32 = 50;

/// Tolerance, in percentage points, on scenario probabilities summing to 100.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    Base,
    Optimistic,
    Conservative,
    Custom,
}

impl std::fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Optimistic => write!(f, "optimistic"),
            Self::Conservative => write!(f, "conservative"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Starting point shared by every scenario of one company.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseFinancials {
    /// Revenue of the first projected year
    pub revenue: f64,
    /// Calendar year of the first projected year
    pub start_year: i32,
}

impl BaseFinancials {
    pub fn validate(&self) -> EngineResult<()> {
        ensure_non_negative("revenue", self.revenue)
    }
}

/// Quantitative drivers of one scenario. All rates are fractions.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioAssumptions {
    pub growth_rate: f64,
    /// Scales the growth rate for market conditions, >= 0
    pub market_multiplier: f64,
    /// Haircut on growth for execution risk, in [0, 1]
    pub risk_discount: f64,
    /// Annual erosion of the EBITDA margin, >= 0
    pub cost_inflation: f64,
    /// Scales cash conversion, >= 0
    pub capital_efficiency: f64,
    pub ebitda_margin: f64,
    /// Share of EBITDA that becomes cash flow
    pub cash_conversion: f64,
    /// Revenue multiple used for valuation
    pub valuation_multiple: f64,
}

/// Growth shift applied by the optimistic preset.
pub const OPTIMISTIC_GROWTH_SHIFT: f64 = 0.10;
/// Growth shift applied by the conservative preset.
pub const CONSERVATIVE_GROWTH_SHIFT: f64 = -0.07;

impl ScenarioAssumptions {
    /// Plain assumption set: no market, risk, inflation or efficiency adjustment.
    pub fn simple(growth_rate: f64, ebitda_margin: f64, cash_conversion: f64, valuation_multiple: f64) -> Self {
        Self {
            growth_rate,
            market_multiplier: 1.0,
            risk_discount: 0.0,
            cost_inflation: 0.0,
            capital_efficiency: 1.0,
            ebitda_margin,
            cash_conversion,
            valuation_multiple,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        ensure_finite("growth_rate", self.growth_rate)?;
        ensure_non_negative("market_multiplier", self.market_multiplier)?;
        ensure_non_negative("risk_discount", self.risk_discount)?;
        if self.risk_discount > 1.0 {
            return Err(EngineError::invalid(format!(
                "risk_discount must be in [0, 1], got {}",
                self.risk_discount
            )));
        }
        ensure_non_negative("cost_inflation", self.cost_inflation)?;
        ensure_non_negative("capital_efficiency", self.capital_efficiency)?;
        ensure_non_negative("ebitda_margin", self.ebitda_margin)?;
        ensure_non_negative("cash_conversion", self.cash_conversion)?;
        ensure_non_negative("valuation_multiple", self.valuation_multiple)?;

        let g = self.effective_growth();
        if g <= -1.0 {
            return Err(EngineError::invalid(format!(
                "effective growth {g} would drive revenue negative"
            )));
        }
        Ok(())
    }

    /// growth * market multiplier * (1 - risk discount)
    #[inline]
    pub fn effective_growth(&self) -> f64 {
        self.growth_rate * self.market_multiplier * (1.0 - self.risk_discount)
    }

    /// Preset derived from this (base) set.
    ///
    /// Optimistic: growth +10pts, margin +5pts, multiple x1.2.
    /// Conservative: growth -7pts, margin x0.8, multiple x0.8.
    /// Market, risk, inflation and efficiency stay at base, so growth
    /// ordering carries straight through to revenue and EBITDA.
    pub fn preset(&self, kind: ScenarioKind) -> Self {
        match kind {
            ScenarioKind::Base | ScenarioKind::Custom => *self,
            ScenarioKind::Optimistic => Self {
                growth_rate: self.growth_rate + OPTIMISTIC_GROWTH_SHIFT,
                ebitda_margin: self.ebitda_margin + 0.05,
                valuation_multiple: self.valuation_multiple * 1.2,
                ..*self
            },
            ScenarioKind::Conservative => Self {
                growth_rate: self.growth_rate + CONSERVATIVE_GROWTH_SHIFT,
                ebitda_margin: self.ebitda_margin * 0.8,
                valuation_multiple: self.valuation_multiple * 0.8,
                ..*self
            },
        }
    }

    /// Describe the numeric drivers as assumption records.
    pub fn to_assumption_list(&self, confidence: f64) -> Vec<Assumption> {
        let rows: [(&str, &str, f64); 8] = [
            ("growth", "annual revenue growth rate", self.growth_rate),
            ("market", "market conditions multiplier on growth", self.market_multiplier),
            ("risk", "execution risk discount on growth", self.risk_discount),
            ("costs", "annual cost inflation eroding margin", self.cost_inflation),
            ("capital", "capital efficiency on cash conversion", self.capital_efficiency),
            ("profitability", "EBITDA margin", self.ebitda_margin),
            ("cash", "EBITDA to cash flow conversion", self.cash_conversion),
            ("valuation", "revenue valuation multiple", self.valuation_multiple),
        ];
        rows.iter()
            .map(|&(category, description, value)| Assumption {
                category: category.to_string(),
                description: description.to_string(),
                value,
                confidence,
            })
            .collect()
    }
}

/// A single qualitative or quantitative assumption behind a scenario.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Assumption {
    pub category: String,
    pub description: String,
    pub value: f64,
    /// [0, 100]
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct YearlyProjection {
    pub year: i32,
    pub revenue: f64,
    pub ebitda: f64,
    pub cash_flow: f64,
    pub valuation: f64,
}

/// Caller-supplied description of one scenario to project.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioInput {
    pub name: String,
    pub kind: ScenarioKind,
    pub assumptions: ScenarioAssumptions,
    #[serde(default)]
    pub extra_assumptions: Vec<Assumption>,
    #[serde(default)]
    pub key_drivers: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    /// [0, 100]
    pub confidence: f64,
    /// [0, 100]
    pub probability: f64,
}

impl ScenarioInput {
    pub fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::invalid("scenario name must not be empty"));
        }
        self.assumptions.validate()?;
        ensure_percentage("confidence", self.confidence)?;
        ensure_percentage("probability", self.probability)?;
        for a in &self.extra_assumptions {
            ensure_finite("assumption value", a.value)?;
            ensure_percentage("assumption confidence", a.confidence)?;
        }
        Ok(())
    }
}

/// A fully projected scenario.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScenarioDefinition {
    pub name: String,
    pub kind: ScenarioKind,
    pub projections: Vec<YearlyProjection>,
    pub assumptions: Vec<Assumption>,
    pub key_drivers: Vec<String>,
    pub risk_factors: Vec<String>,
    pub confidence: f64,
    pub probability: f64,
}

impl ScenarioDefinition {
    #[inline]
    pub fn final_year(&self) -> Option<&YearlyProjection> {
        self.projections.last()
    }

    pub fn year(&self, year: i32) -> Option<&YearlyProjection> {
        self.projections.iter().find(|p| p.year == year)
    }
}

/// Fail unless the scenarios' probabilities add up to 100.
pub fn validate_probabilities(scenarios: &[ScenarioDefinition]) -> EngineResult<()> {
    if scenarios.is_empty() {
        return Err(EngineError::invalid("at least one scenario is required"));
    }
    let total: f64 = scenarios.iter().map(|s| s.probability).sum();
    if (total - 100.0).abs() > PROBABILITY_SUM_TOLERANCE {
        return Err(EngineError::invalid(format!(
            "scenario probabilities must sum to 100, got {total}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_growth_combines_factors() {
        let mut a = ScenarioAssumptions::simple(0.20, 0.3, 0.8, 3.0);
        assert!((a.effective_growth() - 0.20).abs() < 1e-12);
        a.market_multiplier = 1.5;
        a.risk_discount = 0.5;
        assert!((a.effective_growth() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_presets_order_growth() {
        let base = ScenarioAssumptions::simple(0.12, 0.25, 0.7, 2.5);
        let opt = base.preset(ScenarioKind::Optimistic);
        let cons = base.preset(ScenarioKind::Conservative);
        assert!(opt.growth_rate > base.growth_rate && base.growth_rate > cons.growth_rate);
        assert_eq!(base.preset(ScenarioKind::Custom), base);
    }

    #[test]
    fn test_validation() {
        let mut a = ScenarioAssumptions::simple(0.1, 0.2, 0.8, 2.0);
        assert!(a.validate().is_ok());
        a.risk_discount = 1.2;
        assert!(a.validate().is_err());

        let a = ScenarioAssumptions::simple(-1.5, 0.2, 0.8, 2.0);
        assert!(a.validate().is_err(), "growth below -100% must be rejected");

        let a = ScenarioAssumptions::simple(0.1, -0.2, 0.8, 2.0);
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_assumption_list_covers_every_driver() {
        let list = ScenarioAssumptions::simple(0.1, 0.2, 0.8, 2.0).to_assumption_list(70.0);
        assert_eq!(list.len(), 8);
        assert!(list.iter().all(|a| a.confidence == 70.0));
        assert!(list.iter().any(|a| a.category == "growth" && a.value == 0.1));
    }
}
