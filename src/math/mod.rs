pub mod cash_flows;
pub mod root_finder;
pub mod stats;

/// Denominators smaller than this are treated as zero by `Ratio::of`.
const RATIO_EPSILON: f64 = 1e-12;

/// Result of a financial ratio.
///
/// A zero denominator produces `Undefined`, which is deliberately distinct
/// from `Defined(0.0)`: "no interest expense" is not "zero coverage".
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Ratio {
    Defined(f64),
    Undefined,
}

impl Ratio {
    #[inline]
    pub fn of(numerator: f64, denominator: f64) -> Self {
        if denominator.abs() < RATIO_EPSILON || !denominator.is_finite() || !numerator.is_finite() {
            return Ratio::Undefined;
        }
        Ratio::Defined(numerator / denominator)
    }

    #[inline]
    pub fn value(&self) -> Option<f64> {
        match self {
            Ratio::Defined(v) => Some(*v),
            Ratio::Undefined => None,
        }
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        matches!(self, Ratio::Defined(_))
    }
}

impl std::fmt::Display for Ratio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defined(v) => write!(f, "{v:.4}"),
            Self::Undefined => write!(f, "n/a"),
        }
    }
}
