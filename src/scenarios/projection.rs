use crate::errors::{EngineError, EngineResult};
use crate::scenarios::{
    validate_probabilities, BaseFinancials, ScenarioAssumptions, ScenarioDefinition, ScenarioInput,
    ScenarioKind, YearlyProjection, MAX_HORIZON,
};
use rayon::prelude::*;

/// Project `horizon` years of financials.
///
/// For t = 0..horizon (t = 0 is the first projected year):
///   revenue_t   = revenue_0 * (1 + g_eff)^t
///   margin_t    = margin / (1 + cost_inflation)^t
///   ebitda_t    = revenue_t * margin_t
///   cash_flow_t = ebitda_t * cash_conversion * capital_efficiency
///   valuation_t = revenue_t * multiple
pub fn project(
    base: &BaseFinancials,
    assumptions: &ScenarioAssumptions,
    horizon: u32,
) -> EngineResult<Vec<YearlyProjection>> {
    base.validate()?;
    assumptions.validate()?;
    if horizon == 0 || horizon > MAX_HORIZON {
        return Err(EngineError::invalid(format!(
            "horizon must be in 1..={MAX_HORIZON} years, got {horizon}"
        )));
    }

    let growth = 1.0 + assumptions.effective_growth();
    let inflation = 1.0 + assumptions.cost_inflation;
    let conversion = assumptions.cash_conversion * assumptions.capital_efficiency;

    let mut revenue = base.revenue;
    let mut margin = assumptions.ebitda_margin;
    let mut rows = Vec::with_capacity(horizon as usize);

    for t in 0..horizon {
        let ebitda = revenue * margin;
        rows.push(YearlyProjection {
            year: base.start_year + t as i32,
            revenue,
            ebitda,
            cash_flow: ebitda * conversion,
            valuation: revenue * assumptions.valuation_multiple,
        });
        revenue *= growth;
        margin /= inflation;
    }

    Ok(rows)
}

/// Project a single scenario into its full definition.
pub fn build_scenario(
    base: &BaseFinancials,
    input: &ScenarioInput,
    horizon: u32,
) -> EngineResult<ScenarioDefinition> {
    input.validate()?;
    let projections = project(base, &input.assumptions, horizon)?;

    let mut assumptions = input.assumptions.to_assumption_list(input.confidence);
    assumptions.extend(input.extra_assumptions.iter().cloned());

    Ok(ScenarioDefinition {
        name: input.name.clone(),
        kind: input.kind,
        projections,
        assumptions,
        key_drivers: input.key_drivers.clone(),
        risk_factors: input.risk_factors.clone(),
        confidence: input.confidence,
        probability: input.probability,
    })
}

/// Project every scenario. Scenarios are independent and run in parallel;
/// output order matches input order.
pub fn build_scenarios(
    base: &BaseFinancials,
    inputs: &[ScenarioInput],
    horizon: u32,
) -> EngineResult<Vec<ScenarioDefinition>> {
    if inputs.is_empty() {
        return Err(EngineError::invalid("at least one scenario is required"));
    }
    inputs
        .par_iter()
        .map(|input| build_scenario(base, input, horizon))
        .collect()
}

/// Base, optimistic and conservative scenarios derived from one assumption
/// set, weighted 50/25/25.
pub fn standard_scenarios(assumptions: &ScenarioAssumptions) -> Vec<ScenarioInput> {
    let presets: [(&str, ScenarioKind, f64, f64); 3] = [
        ("Base Case", ScenarioKind::Base, 70.0, 50.0),
        ("Optimistic", ScenarioKind::Optimistic, 50.0, 25.0),
        ("Conservative", ScenarioKind::Conservative, 60.0, 25.0),
    ];
    presets
        .iter()
        .map(|&(name, kind, confidence, probability)| ScenarioInput {
            name: name.to_string(),
            kind,
            assumptions: assumptions.preset(kind),
            extra_assumptions: Vec::new(),
            key_drivers: Vec::new(),
            risk_factors: Vec::new(),
            confidence,
            probability,
        })
        .collect()
}

/// Probability-weighted final-year valuation across scenarios.
pub fn expected_valuation(scenarios: &[ScenarioDefinition]) -> EngineResult<f64> {
    validate_probabilities(scenarios)?;
    let mut total = 0.0;
    for s in scenarios {
        let last = s
            .final_year()
            .ok_or_else(|| EngineError::invalid(format!("scenario '{}' has no projections", s.name)))?;
        total += s.probability / 100.0 * last.valuation;
    }
    Ok(total)
}
