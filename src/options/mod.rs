pub mod binomial;
pub mod black_scholes;
pub mod implied_vol;
pub mod monte_carlo;

use crate::errors::{ensure_non_negative, ensure_positive, EngineResult};
use crate::math::stats::ConfidenceInterval;

use self::binomial::BinomialTree;
use self::black_scholes::BlackScholes;
use self::monte_carlo::MonteCarlo;

/// All pricing models implement this trait.
/// price() must be a pure function: deterministic output from inputs only.
/// Send + Sync required so contracts can be priced from rayon or tokio workers.
pub trait PricingModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Price a validated contract. Returns a value >= 0.
    fn price(&self, contract: &OptionContract) -> EngineResult<PricingResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    BlackScholes,
    Binomial,
    MonteCarlo,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlackScholes => write!(f, "black-scholes"),
            Self::Binomial => write!(f, "binomial"),
            Self::MonteCarlo => write!(f, "monte-carlo"),
        }
    }
}

/// A strategic (real) option expressed as a vanilla contract.
///
/// For real options the underlying is the present value of the project's
/// cash flows and the strike is the investment required to exercise.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionContract {
    pub underlying_value: f64,
    pub strike: f64,
    /// Years, > 0
    pub time_to_expiry: f64,
    pub risk_free_rate: f64,
    /// Annualized standard deviation, >= 0
    pub volatility: f64,
    pub option_type: OptionKind,
}

impl OptionContract {
    pub fn validate(&self) -> EngineResult<()> {
        ensure_positive("underlying_value", self.underlying_value)?;
        ensure_positive("strike", self.strike)?;
        ensure_positive("time_to_expiry", self.time_to_expiry)?;
        ensure_non_negative("risk_free_rate", self.risk_free_rate)?;
        ensure_non_negative("volatility", self.volatility)?;
        Ok(())
    }

    /// Payoff if exercised against `spot` right now.
    #[inline]
    pub fn payoff(&self, spot: f64) -> f64 {
        intrinsic(self.option_type, spot, self.strike)
    }
}

#[inline(always)]
pub fn intrinsic(option_type: OptionKind, spot: f64, strike: f64) -> f64 {
    match option_type {
        OptionKind::Call => (spot - strike).max(0.0),
        OptionKind::Put => (strike - spot).max(0.0),
    }
}

/// Price sensitivities. Theta and rho are per year, vega per unit of volatility.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PricingResult {
    pub model: ModelKind,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeks: Option<Greeks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_error: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<ConfidenceInterval>,
}

impl PricingResult {
    pub(crate) fn plain(model: ModelKind, value: f64) -> Self {
        Self {
            model,
            value,
            greeks: None,
            standard_error: None,
            confidence_interval: None,
        }
    }
}

/// Model choice plus its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelSelector {
    BlackScholes,
    Binomial { steps: usize, early_exercise: bool },
    MonteCarlo { simulations: usize, seed: u64, confidence: f64 },
}

impl ModelSelector {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::BlackScholes => ModelKind::BlackScholes,
            Self::Binomial { .. } => ModelKind::Binomial,
            Self::MonteCarlo { .. } => ModelKind::MonteCarlo,
        }
    }
}

/// Price `contract` with the selected model.
pub fn price(contract: &OptionContract, selector: ModelSelector) -> EngineResult<PricingResult> {
    let model: Box<dyn PricingModel> = match selector {
        ModelSelector::BlackScholes => Box::new(BlackScholes::new()),
        ModelSelector::Binomial { steps, early_exercise } => Box::new(BinomialTree::new(steps, early_exercise)),
        ModelSelector::MonteCarlo { simulations, seed, confidence } => {
            Box::new(MonteCarlo::new(simulations, seed, confidence))
        }
    };
    tracing::debug!(model = %model.kind(), "pricing contract");
    model.price(contract)
}
