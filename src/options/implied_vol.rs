use crate::errors::{ensure_positive, EngineError, EngineResult};
use crate::math::root_finder::{NewtonRaphson, RootEstimate};
use crate::options::black_scholes::{BlackScholes, ContractTerms};
use crate::options::{OptionContract, OptionKind};

const IV_INITIAL_GUESS: f64 = 0.2;
const IV_MAX_ITERATIONS: usize = 100;
const IV_PRECISION: f64 = 1e-8;
/// Volatility search interval (open)
const IV_LOWER: f64 = 1e-6;
const IV_UPPER: f64 = 10.0;

/// Volatility that reproduces `observed_price` under Black-Scholes.
///
/// The contract's own `volatility` field is ignored. Prices outside the
/// no-arbitrage band (discounted intrinsic, upper bound) have no solution
/// and are rejected up front.
pub fn implied_volatility(contract: &OptionContract, observed_price: f64) -> EngineResult<RootEstimate> {
    contract.validate()?;
    ensure_positive("observed_price", observed_price)?;

    let k_disc = contract.strike * (-contract.risk_free_rate * contract.time_to_expiry).exp();
    let (lower, upper) = match contract.option_type {
        OptionKind::Call => ((contract.underlying_value - k_disc).max(0.0), contract.underlying_value),
        OptionKind::Put => ((k_disc - contract.underlying_value).max(0.0), k_disc),
    };
    if observed_price <= lower || observed_price >= upper {
        return Err(EngineError::invalid(format!(
            "observed price {observed_price} outside no-arbitrage bounds ({lower}, {upper})"
        )));
    }

    let model = BlackScholes::new();
    let solver = NewtonRaphson::new(IV_PRECISION, IV_MAX_ITERATIONS).with_bounds(IV_LOWER, IV_UPPER);
    let estimate = solver.solve(
        |sigma| {
            let trial = OptionContract { volatility: sigma, ..*contract };
            let terms = ContractTerms::new(&trial);
            let value = model.value(&terms, contract.option_type);
            let vega = model.greeks(&terms, contract.option_type).vega;
            (value - observed_price, vega)
        },
        IV_INITIAL_GUESS,
    );

    if !estimate.converged {
        tracing::warn!(
            status = %estimate.status,
            sigma = estimate.root,
            "implied volatility solver did not converge"
        );
    }
    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PricingModel;

    #[test]
    fn test_recovers_input_vol() {
        for &(sigma, option_type) in &[(0.15, OptionKind::Call), (0.45, OptionKind::Put), (0.8, OptionKind::Call)] {
            let c = OptionContract {
                underlying_value: 100.0,
                strike: 105.0,
                time_to_expiry: 1.5,
                risk_free_rate: 0.04,
                volatility: sigma,
                option_type,
            };
            let price = BlackScholes::new().price(&c).unwrap().value;
            let est = implied_volatility(&c, price).unwrap();
            assert!(est.converged, "status={} for sigma={sigma}", est.status);
            assert!((est.root - sigma).abs() < 1e-6, "iv={} expected {sigma}", est.root);
        }
    }

    #[test]
    fn test_price_below_intrinsic_rejected() {
        let c = OptionContract {
            underlying_value: 150.0,
            strike: 100.0,
            time_to_expiry: 1.0,
            risk_free_rate: 0.05,
            volatility: 0.2,
            option_type: OptionKind::Call,
        };
        assert!(implied_volatility(&c, 40.0).is_err());
        assert!(implied_volatility(&c, 151.0).is_err());
    }
}
