use crate::errors::{ensure_finite, ensure_positive, EngineError, EngineResult};
use crate::math::root_finder::{NewtonRaphson, RootEstimate};

/// Starting rate for the IRR iteration.
pub const IRR_INITIAL_GUESS: f64 = 0.10;

/// Hard iteration cap so the solver always terminates.
pub const IRR_MAX_ITERATIONS: usize = 1000;

/// NPV = sum_i cf_i / (1 + rate)^i, with cf_0 undiscounted.
pub fn npv(rate: f64, cash_flows: &[f64]) -> EngineResult<f64> {
    ensure_finite("rate", rate)?;
    if rate <= -1.0 {
        return Err(EngineError::invalid(format!("discount rate must be > -1, got {rate}")));
    }
    validate_flows(cash_flows)?;
    Ok(npv_and_derivative(rate, cash_flows).0)
}

/// Internal rate of return by Newton-Raphson from 10%.
///
/// Assumes a single dominant root near the initial guess. Series with
/// several sign changes may have several roots; whichever one the
/// iteration reaches is returned, and nothing more is promised.
pub fn irr(cash_flows: &[f64], precision: f64) -> EngineResult<RootEstimate> {
    validate_flows(cash_flows)?;
    ensure_positive("precision", precision)?;

    let has_inflow = cash_flows.iter().any(|&cf| cf > 0.0);
    let has_outflow = cash_flows.iter().any(|&cf| cf < 0.0);
    if !(has_inflow && has_outflow) {
        return Err(EngineError::invalid(
            "cash flows must contain both an outflow and an inflow for IRR to exist",
        ));
    }

    let solver = NewtonRaphson::new(precision, IRR_MAX_ITERATIONS).with_bounds(-1.0, f64::MAX);
    let estimate = solver.solve(|rate| npv_and_derivative(rate, cash_flows), IRR_INITIAL_GUESS);

    if !estimate.converged {
        tracing::warn!(
            status = %estimate.status,
            iterations = estimate.iterations,
            rate = estimate.root,
            "IRR solver did not converge, returning last estimate"
        );
    }

    Ok(estimate)
}

/// NPV and dNPV/drate in one pass. No allocations.
#[inline]
fn npv_and_derivative(rate: f64, cash_flows: &[f64]) -> (f64, f64) {
    let growth = 1.0 + rate;
    let mut discount = 1.0;
    let mut value = 0.0;
    let mut derivative = 0.0;

    for (i, &cf) in cash_flows.iter().enumerate() {
        value += cf * discount;
        // d/dr [cf * (1+r)^-i] = -i * cf * (1+r)^-(i+1)
        derivative -= i as f64 * cf * discount / growth;
        discount /= growth;
    }

    (value, derivative)
}

fn validate_flows(cash_flows: &[f64]) -> EngineResult<()> {
    if cash_flows.len() < 2 {
        return Err(EngineError::invalid("at least two cash flows are required"));
    }
    for (i, &cf) in cash_flows.iter().enumerate() {
        ensure_finite(&format!("cash_flows[{i}]"), cf)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::root_finder::SolverStatus;

    #[test]
    fn test_npv_simple() {
        let v = npv(0.10, &[-100.0, 110.0]).unwrap();
        assert!(v.abs() < 1e-9, "npv={v}");
        let v = npv(0.0, &[-100.0, 30.0, 30.0]).unwrap();
        assert!((v + 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_irr_round_trip() {
        let r: f64 = 0.12;
        let partial = -1000.0 + 300.0 / (1.0 + r) + 400.0 / (1.0 + r).powi(2) + 500.0 / (1.0 + r).powi(3);
        let last = -partial * (1.0 + r).powi(4);
        let flows = [-1000.0, 300.0, 400.0, 500.0, last];

        let est = irr(&flows, 1e-10).unwrap();
        assert!(est.converged, "status={}", est.status);
        assert!((est.root - r).abs() < 1e-7, "irr={} expected {r}", est.root);
    }

    #[test]
    fn test_irr_zeroes_npv() {
        let flows = [-100.0, 60.0, 60.0];
        let est = irr(&flows, 1e-9).unwrap();
        assert!(est.converged);
        let residual = npv(est.root, &flows).unwrap();
        assert!(residual.abs() < 1e-6, "npv at irr={residual}");
        assert!(est.root > 0.13 && est.root < 0.135, "irr={}", est.root);
    }

    #[test]
    fn test_irr_negative_rate() {
        // Getting back less than invested
        let est = irr(&[-100.0, 50.0, 40.0], 1e-10).unwrap();
        assert!(est.converged);
        assert!(est.root < 0.0, "irr={}", est.root);
    }

    #[test]
    fn test_irr_requires_sign_change() {
        assert!(irr(&[100.0, 10.0, 10.0], 1e-8).is_err());
        assert!(irr(&[-100.0], 1e-8).is_err());
        assert!(irr(&[-100.0, 110.0], 0.0).is_err());
    }

    #[test]
    fn test_irr_without_real_root_returns_last_estimate() {
        // NPV = -1 + 2x - 1.5x^2 with x = 1/(1+r) peaks at -1/3: sign change, no root
        let flows = [-1.0, 2.0, -1.5];
        let est = irr(&flows, 1e-10).unwrap();
        assert!(!est.converged, "status={} root={}", est.status, est.root);
        assert_eq!(est.status, SolverStatus::MaxIterations);
        assert_eq!(est.iterations, IRR_MAX_ITERATIONS);
        assert!(est.root.is_finite() && est.root > -1.0, "root={}", est.root);
        assert!(est.residual.abs() >= 1.0 / 3.0 - 1e-9, "residual={}", est.residual);
    }

    #[test]
    fn test_npv_rejects_rate_at_minus_one() {
        assert!(npv(-1.0, &[-1.0, 2.0]).is_err());
    }
}
