//! Portfolio aggregation over a selected set of strategic options.
//!
//!   total      = sum(investment_i)
//!   w_i        = investment_i / total
//!   return_i   = (valuation_i - investment_i) / investment_i
//!   expected   = sum(w_i * return_i)
//!   risk       = mean(volatility_i) * risk_scaling
//!   diversity  = min(cap, distinct_ids * per_option_bonus)
//!
//! Pure function: deterministic from inputs.

use crate::errors::{ensure_finite, ensure_non_negative, ensure_positive, EngineResult};
use std::collections::HashSet;

/// One strategic option already priced by the caller.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategicOption {
    pub id: String,
    pub name: String,
    pub investment_required: f64,
    pub valuation: f64,
    /// Annualized volatility as a fraction
    pub volatility: f64,
}

impl StrategicOption {
    pub fn validate(&self) -> EngineResult<()> {
        ensure_positive("investment_required", self.investment_required)?;
        ensure_finite("valuation", self.valuation)?;
        ensure_non_negative("volatility", self.volatility)?;
        Ok(())
    }

    #[inline]
    pub fn return_rate(&self) -> f64 {
        (self.valuation - self.investment_required) / self.investment_required
    }
}

fn default_risk_scaling() -> f64 {
    100.0
}

fn default_per_option_bonus() -> f64 {
    20.0
}

fn default_diversification_cap() -> f64 {
    100.0
}

/// Scoring constants.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortfolioParams {
    #[serde(default = "default_risk_scaling")]
    pub risk_scaling: f64,
    #[serde(default = "default_per_option_bonus")]
    pub per_option_bonus: f64,
    #[serde(default = "default_diversification_cap")]
    pub diversification_cap: f64,
}

impl Default for PortfolioParams {
    fn default() -> Self {
        Self {
            risk_scaling: default_risk_scaling(),
            per_option_bonus: default_per_option_bonus(),
            diversification_cap: default_diversification_cap(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PortfolioOptimization {
    pub selected: Vec<StrategicOption>,
    pub total_investment: f64,
    /// Investment-weighted return rate, as a fraction
    pub expected_return: f64,
    pub risk_score: f64,
    pub diversification_score: f64,
}

/// Aggregate the selection. An empty selection scores zero on every metric.
pub fn optimize_portfolio(
    selection: Vec<StrategicOption>,
    params: &PortfolioParams,
) -> EngineResult<PortfolioOptimization> {
    ensure_non_negative("risk_scaling", params.risk_scaling)?;
    ensure_non_negative("per_option_bonus", params.per_option_bonus)?;
    ensure_non_negative("diversification_cap", params.diversification_cap)?;
    for option in &selection {
        option.validate()?;
    }

    if selection.is_empty() {
        return Ok(PortfolioOptimization {
            selected: selection,
            total_investment: 0.0,
            expected_return: 0.0,
            risk_score: 0.0,
            diversification_score: 0.0,
        });
    }

    let total_investment: f64 = selection.iter().map(|o| o.investment_required).sum();
    let expected_return: f64 = selection
        .iter()
        .map(|o| o.investment_required / total_investment * o.return_rate())
        .sum();
    let mean_vol = selection.iter().map(|o| o.volatility).sum::<f64>() / selection.len() as f64;

    // Repeated ids are one position for diversification purposes
    let distinct = selection.iter().map(|o| o.id.as_str()).collect::<HashSet<_>>().len();
    let diversification_score = (distinct as f64 * params.per_option_bonus).min(params.diversification_cap);

    tracing::debug!(
        options = selection.len(),
        distinct,
        total_investment,
        expected_return,
        "portfolio aggregated"
    );

    Ok(PortfolioOptimization {
        selected: selection,
        total_investment,
        expected_return,
        risk_score: mean_vol * params.risk_scaling,
        diversification_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(id: &str, investment: f64, valuation: f64, vol: f64) -> StrategicOption {
        StrategicOption {
            id: id.into(),
            name: format!("option {id}"),
            investment_required: investment,
            valuation,
            volatility: vol,
        }
    }

    #[test]
    fn test_weighted_return_and_risk() {
        let p = optimize_portfolio(
            vec![opt("a", 100.0, 150.0, 0.2), opt("b", 300.0, 330.0, 0.4)],
            &PortfolioParams::default(),
        )
        .unwrap();
        assert_eq!(p.total_investment, 400.0);
        // 0.25 * 0.5 + 0.75 * 0.1
        assert!((p.expected_return - 0.2).abs() < 1e-12, "ret={}", p.expected_return);
        assert!((p.risk_score - 30.0).abs() < 1e-9, "risk={}", p.risk_score);
        assert_eq!(p.diversification_score, 40.0);
        assert_eq!(p.selected.len(), 2);
    }

    #[test]
    fn test_diversification_monotone_and_capped() {
        let params = PortfolioParams::default();
        let mut last = 0.0;
        for n in 1..=8 {
            let selection = (0..n).map(|i| opt(&i.to_string(), 10.0, 12.0, 0.3)).collect();
            let score = optimize_portfolio(selection, &params).unwrap().diversification_score;
            assert!(score >= last, "n={n}: {score} < {last}");
            assert!(score <= params.diversification_cap);
            last = score;
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn test_duplicate_ids_count_once() {
        let p = optimize_portfolio(
            vec![opt("a", 10.0, 12.0, 0.3), opt("a", 10.0, 12.0, 0.3)],
            &PortfolioParams::default(),
        )
        .unwrap();
        assert_eq!(p.diversification_score, 20.0);
        assert_eq!(p.total_investment, 20.0);
    }

    #[test]
    fn test_empty_selection_is_zero() {
        let p = optimize_portfolio(Vec::new(), &PortfolioParams::default()).unwrap();
        assert_eq!(p.total_investment, 0.0);
        assert_eq!(p.expected_return, 0.0);
        assert_eq!(p.risk_score, 0.0);
        assert_eq!(p.diversification_score, 0.0);
    }

    #[test]
    fn test_non_positive_investment_rejected() {
        let r = optimize_portfolio(vec![opt("a", 0.0, 10.0, 0.2)], &PortfolioParams::default());
        assert!(r.is_err());
    }
}
