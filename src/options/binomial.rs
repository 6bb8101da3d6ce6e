use crate::errors::{EngineError, EngineResult};
use crate::options::black_scholes::VOL_FLOOR;
use crate::options::{ModelKind, OptionContract, PricingModel, PricingResult};

/// Upper bound on lattice depth. Memory is O(steps), time O(steps^2).
pub const MAX_TREE_STEPS: usize = 20_000;

/// Largest node log-price; exp(700) leaves headroom under f64::MAX.
const MAX_LN_NODE: f64 = 700.0;

/// Cox-Ross-Rubinstein binomial lattice.
///
/// dt = T / n, u = e^{sigma * sqrt(dt)}, d = 1 / u
/// p = (e^{r dt} - d) / (u - d)
///
/// When sigma * sqrt(dt) < r * dt the CRR probability leaves [0, 1], so the
/// lattice is re-centred on the risk-neutral drift instead:
///
/// ln u = (r - sigma^2 / 2) dt + sigma * sqrt(dt), ln d = (r - sigma^2 / 2) dt - sigma * sqrt(dt), p = 1/2
///
/// Terminal payoffs are rolled back with V = e^{-r dt} (p V_up + (1 - p) V_down).
/// With `early_exercise`, each node is floored at its exercise value,
/// which is how abandonment and expansion options are usually valued.
#[derive(Debug, Clone, Copy)]
pub struct BinomialTree {
    pub steps: usize,
    pub early_exercise: bool,
}

impl BinomialTree {
    pub fn new(steps: usize, early_exercise: bool) -> Self {
        Self { steps, early_exercise }
    }

    fn validate(&self) -> EngineResult<()> {
        if self.steps == 0 || self.steps > MAX_TREE_STEPS {
            return Err(EngineError::invalid(format!(
                "binomial steps must be in 1..={MAX_TREE_STEPS}, got {}",
                self.steps
            )));
        }
        Ok(())
    }
}

impl PricingModel for BinomialTree {
    #[inline]
    fn kind(&self) -> ModelKind {
        ModelKind::Binomial
    }

    fn price(&self, contract: &OptionContract) -> EngineResult<PricingResult> {
        contract.validate()?;
        self.validate()?;

        let n = self.steps;
        let sigma = contract.volatility.max(VOL_FLOOR);
        let dt = contract.time_to_expiry / n as f64;
        let step = sigma * dt.sqrt();
        let growth = (contract.risk_free_rate * dt).exp();

        let crr_p = (growth - (-step).exp()) / (step.exp() - (-step).exp());
        let (drift, p) = if crr_p.is_finite() && (0.0..=1.0).contains(&crr_p) {
            (0.0, crr_p)
        } else {
            ((contract.risk_free_rate - 0.5 * sigma * sigma) * dt, 0.5)
        };
        tracing::trace!(steps = n, p, drift, "binomial lattice");

        let disc = 1.0 / growth;
        let disc_p = disc * p;
        let disc_1mp = disc * (1.0 - p);

        // Node (i, j) sits at ln S + i * drift + (2j - i) * step. Built from the
        // log each time so deep rows never underflow to a zero price. The far
        // upper tail is capped below f64::MAX; its weight has long underflowed.
        let ln_spot = contract.underlying_value.ln();
        let node = |i: usize, j: usize| {
            (ln_spot + i as f64 * drift + (2.0 * j as f64 - i as f64) * step)
                .min(MAX_LN_NODE)
                .exp()
        };

        let mut values: Vec<f64> = (0..=n).map(|j| contract.payoff(node(n, j))).collect();

        for i in (0..n).rev() {
            for j in 0..=i {
                let continuation = disc_p * values[j + 1] + disc_1mp * values[j];
                values[j] = if self.early_exercise {
                    continuation.max(contract.payoff(node(i, j)))
                } else {
                    continuation
                };
            }
        }

        Ok(PricingResult::plain(ModelKind::Binomial, values[0].max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::black_scholes::BlackScholes;
    use crate::options::OptionKind;

    fn contract(option_type: OptionKind) -> OptionContract {
        OptionContract {
            underlying_value: 100.0,
            strike: 110.0,
            time_to_expiry: 1.0,
            risk_free_rate: 0.05,
            volatility: 0.3,
            option_type,
        }
    }

    #[test]
    fn test_more_steps_converge_to_bs() {
        let c = contract(OptionKind::Call);
        let bs = BlackScholes::new().price(&c).unwrap().value;
        let coarse = BinomialTree::new(10, false).price(&c).unwrap().value;
        let fine = BinomialTree::new(1000, false).price(&c).unwrap().value;
        assert!((fine - bs).abs() < 0.01, "fine={fine} bs={bs}");
        assert!((fine - bs).abs() <= (coarse - bs).abs(), "coarse={coarse} fine={fine} bs={bs}");
    }

    #[test]
    fn test_american_put_premium() {
        let c = contract(OptionKind::Put);
        let european = BinomialTree::new(500, false).price(&c).unwrap().value;
        let american = BinomialTree::new(500, true).price(&c).unwrap().value;
        assert!(american > european, "american={american} european={european}");
        assert!(american >= c.payoff(c.underlying_value));
    }

    #[test]
    fn test_american_call_equals_european_without_dividends() {
        let c = contract(OptionKind::Call);
        let european = BinomialTree::new(300, false).price(&c).unwrap().value;
        let american = BinomialTree::new(300, true).price(&c).unwrap().value;
        assert!((american - european).abs() < 1e-9);
    }

    #[test]
    fn test_zero_steps_rejected() {
        let c = contract(OptionKind::Call);
        assert!(matches!(
            BinomialTree::new(0, false).price(&c),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zero_vol_matches_discounted_intrinsic() {
        let c = OptionContract {
            underlying_value: 120.0,
            strike: 100.0,
            time_to_expiry: 1.0,
            risk_free_rate: 0.05,
            volatility: 0.0,
            option_type: OptionKind::Call,
        };
        let expected = 120.0 - 100.0 * (-0.05_f64).exp();
        let bs = BlackScholes::new().price(&c).unwrap().value;
        for early_exercise in [false, true] {
            let tree = BinomialTree::new(100, early_exercise).price(&c).unwrap().value;
            assert!((tree - expected).abs() < 1e-6, "tree={tree} expected={expected}");
            assert!((tree - bs).abs() < 1e-6, "tree={tree} bs={bs}");
        }
    }

    #[test]
    fn test_low_vol_high_rate_uses_drift_lattice() {
        // r * dt exceeds sigma * sqrt(dt): CRR up move cannot beat the risk-free growth
        let mut c = contract(OptionKind::Call);
        c.volatility = 0.01;
        c.risk_free_rate = 0.10;
        let bs = BlackScholes::new().price(&c).unwrap().value;
        let tree = BinomialTree::new(80, false).price(&c).unwrap().value;
        assert!(tree.is_finite() && tree >= 0.0, "tree={tree}");
        assert!((tree - bs).abs() < 0.1, "tree={tree} bs={bs}");
    }

    #[test]
    fn test_deep_lattice_keeps_node_prices() {
        // sigma * sqrt(T * n) is well past the f64 exponent range of d^n
        let c = OptionContract {
            underlying_value: 100.0,
            strike: 100.0,
            time_to_expiry: 30.0,
            risk_free_rate: 0.03,
            volatility: 2.0,
            option_type: OptionKind::Call,
        };
        let bs = BlackScholes::new().price(&c).unwrap().value;
        let shallow = BinomialTree::new(500, false).price(&c).unwrap().value;
        let deep = BinomialTree::new(5000, false).price(&c).unwrap().value;
        assert!(deep.is_finite() && deep > 0.0, "deep tree collapsed to {deep}");
        assert!((deep - bs).abs() / bs < 0.01, "deep={deep} bs={bs}");
        assert!((deep - shallow).abs() / bs < 0.01, "deep={deep} shallow={shallow}");
    }

    #[test]
    fn test_deep_lattice_american_put_stays_above_intrinsic() {
        let c = OptionContract {
            underlying_value: 80.0,
            strike: 100.0,
            time_to_expiry: 30.0,
            risk_free_rate: 0.03,
            volatility: 1.0,
            option_type: OptionKind::Put,
        };
        let american = BinomialTree::new(1200, true).price(&c).unwrap().value;
        assert!(american >= c.payoff(c.underlying_value), "american={american}");
        assert!(american <= c.strike, "american={american}");
    }
}
