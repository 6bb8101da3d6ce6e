use crate::errors::EngineResult;
use crate::math::stats::standard_normal;
use crate::options::{Greeks, ModelKind, OptionContract, OptionKind, PricingModel, PricingResult};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Volatility used in place of an exact zero so d1/d2 stay finite.
/// At this level the price is the discounted forward intrinsic value.
pub const VOL_FLOOR: f64 = 1e-8;

/// Precomputed contract terms shared by price and Greeks. Stack, no alloc.
#[derive(Debug, Clone, Copy)]
pub struct ContractTerms {
    pub spot: f64,
    pub strike: f64,
    pub t: f64,
    pub rate: f64,
    pub sigma: f64,
    pub sqrt_t: f64,
    pub sigma_sqrt_t: f64,
    /// e^{-rT}
    pub discount: f64,
    pub d1: f64,
    pub d2: f64,
}

impl ContractTerms {
    #[inline]
    pub fn new(contract: &OptionContract) -> Self {
        let sigma = contract.volatility.max(VOL_FLOOR);
        let t = contract.time_to_expiry;
        let sqrt_t = t.sqrt();
        let sigma_sqrt_t = sigma * sqrt_t;
        let ln_s_k = (contract.underlying_value / contract.strike).ln();
        let d1 = (ln_s_k + (contract.risk_free_rate + 0.5 * sigma * sigma) * t) / sigma_sqrt_t;
        Self {
            spot: contract.underlying_value,
            strike: contract.strike,
            t,
            rate: contract.risk_free_rate,
            sigma,
            sqrt_t,
            sigma_sqrt_t,
            discount: (-contract.risk_free_rate * t).exp(),
            d1,
            d2: d1 - sigma_sqrt_t,
        }
    }
}

/// Black-Scholes European option pricing.
///
/// C = S * Phi(d1) - K * e^{-rT} * Phi(d2)
/// P = K * e^{-rT} * Phi(-d2) - S * Phi(-d1)
///
/// where d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// and d2 = d1 - sigma * sqrt(T).
pub struct BlackScholes {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl BlackScholes {
    pub fn new() -> Self {
        Self { normal: standard_normal() }
    }

    /// Closed-form value for a validated contract.
    #[inline]
    pub fn value(&self, terms: &ContractTerms, option_type: OptionKind) -> f64 {
        let k_disc = terms.strike * terms.discount;
        let v = match option_type {
            OptionKind::Call => {
                terms.spot * self.normal.cdf(terms.d1) - k_disc * self.normal.cdf(terms.d2)
            }
            OptionKind::Put => {
                k_disc * self.normal.cdf(-terms.d2) - terms.spot * self.normal.cdf(-terms.d1)
            }
        };
        // Rounding can leave deep OTM values a hair below zero
        v.max(0.0)
    }

    /// Analytic Greeks.
    pub fn greeks(&self, terms: &ContractTerms, option_type: OptionKind) -> Greeks {
        let pdf_d1 = self.normal.pdf(terms.d1);
        let k_disc = terms.strike * terms.discount;

        let gamma = pdf_d1 / (terms.spot * terms.sigma_sqrt_t);
        let vega = terms.spot * pdf_d1 * terms.sqrt_t;
        // Time decay from volatility, common to both sides
        let decay = -terms.spot * pdf_d1 * terms.sigma / (2.0 * terms.sqrt_t);

        match option_type {
            OptionKind::Call => {
                let n_d2 = self.normal.cdf(terms.d2);
                Greeks {
                    delta: self.normal.cdf(terms.d1),
                    gamma,
                    theta: decay - terms.rate * k_disc * n_d2,
                    vega,
                    rho: k_disc * terms.t * n_d2,
                }
            }
            OptionKind::Put => {
                let n_minus_d2 = self.normal.cdf(-terms.d2);
                Greeks {
                    delta: self.normal.cdf(terms.d1) - 1.0,
                    gamma,
                    theta: decay + terms.rate * k_disc * n_minus_d2,
                    vega,
                    rho: -k_disc * terms.t * n_minus_d2,
                }
            }
        }
    }
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingModel for BlackScholes {
    #[inline]
    fn kind(&self) -> ModelKind {
        ModelKind::BlackScholes
    }

    fn price(&self, contract: &OptionContract) -> EngineResult<PricingResult> {
        contract.validate()?;
        let terms = ContractTerms::new(contract);
        let mut result = PricingResult::plain(ModelKind::BlackScholes, self.value(&terms, contract.option_type));
        result.greeks = Some(self.greeks(&terms, contract.option_type));
        Ok(result)
    }
}

/// C - P - (S - K e^{-rT}). Zero for a consistent pricer.
pub fn put_call_parity_gap(call: f64, put: f64, contract: &OptionContract) -> f64 {
    let forward_gap =
        contract.underlying_value - contract.strike * (-contract.risk_free_rate * contract.time_to_expiry).exp();
    call - put - forward_gap
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(s: f64, k: f64, t: f64, r: f64, sigma: f64, option_type: OptionKind) -> OptionContract {
        OptionContract {
            underlying_value: s,
            strike: k,
            time_to_expiry: t,
            risk_free_rate: r,
            volatility: sigma,
            option_type,
        }
    }

    #[test]
    fn test_regression_fixture() {
        // Strategic option: 120M project value, 100M investment, 1 year
        let c = contract(120e6, 100e6, 1.0, 0.05, 0.25, OptionKind::Call);
        let result = BlackScholes::new().price(&c).unwrap();
        assert!(result.value > 20e6, "must exceed intrinsic: {}", result.value);
        assert!(
            result.value > 27.0e6 && result.value < 27.8e6,
            "regression value drifted: {}",
            result.value
        );
    }

    #[test]
    fn test_textbook_value() {
        // Hull: S=42, K=40, r=0.10, sigma=0.20, T=0.5 -> C=4.76, P=0.81
        let call = BlackScholes::new()
            .price(&contract(42.0, 40.0, 0.5, 0.10, 0.20, OptionKind::Call))
            .unwrap();
        let put = BlackScholes::new()
            .price(&contract(42.0, 40.0, 0.5, 0.10, 0.20, OptionKind::Put))
            .unwrap();
        assert!((call.value - 4.76).abs() < 0.01, "call={}", call.value);
        assert!((put.value - 0.81).abs() < 0.01, "put={}", put.value);
    }

    #[test]
    fn test_put_call_parity() {
        let model = BlackScholes::new();
        let c = contract(95.0, 100.0, 2.0, 0.03, 0.35, OptionKind::Call);
        let p = OptionContract { option_type: OptionKind::Put, ..c };
        let gap = put_call_parity_gap(model.price(&c).unwrap().value, model.price(&p).unwrap().value, &c);
        assert!(gap.abs() < 1e-9, "parity gap={gap}");
    }

    #[test]
    fn test_call_greek_signs() {
        let model = BlackScholes::new();
        for &s in &[60.0, 90.0, 100.0, 110.0, 160.0] {
            for &t in &[0.01, 0.25, 1.0, 3.0] {
                let g = model.price(&contract(s, 100.0, t, 0.05, 0.3, OptionKind::Call)).unwrap().greeks.unwrap();
                assert!((0.0..=1.0).contains(&g.delta), "delta={} at S={s} T={t}", g.delta);
                assert!(g.gamma >= 0.0, "gamma={}", g.gamma);
                assert!(g.theta <= 0.0, "theta={} at S={s} T={t}", g.theta);
                assert!(g.vega >= 0.0);
                assert!(g.rho >= 0.0);
            }
        }
    }

    #[test]
    fn test_delta_matches_finite_difference() {
        let model = BlackScholes::new();
        let c = contract(100.0, 100.0, 1.0, 0.05, 0.25, OptionKind::Put);
        let h = 1e-3;
        let up = model.price(&OptionContract { underlying_value: 100.0 + h, ..c }).unwrap().value;
        let down = model.price(&OptionContract { underlying_value: 100.0 - h, ..c }).unwrap().value;
        let fd = (up - down) / (2.0 * h);
        let delta = model.price(&c).unwrap().greeks.unwrap().delta;
        assert!((fd - delta).abs() < 1e-5, "fd={fd} delta={delta}");
    }

    #[test]
    fn test_zero_vol_is_discounted_intrinsic() {
        let c = contract(120.0, 100.0, 1.0, 0.05, 0.0, OptionKind::Call);
        let result = BlackScholes::new().price(&c).unwrap();
        let expected = 120.0 - 100.0 * (-0.05f64).exp();
        assert!((result.value - expected).abs() < 1e-9, "value={}", result.value);
        let g = result.greeks.unwrap();
        assert!(g.delta.is_finite() && g.gamma.is_finite() && g.theta.is_finite());
    }
}
