use crate::errors::{EngineError, EngineResult};
use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided interval around a point estimate.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ConfidenceInterval {
    /// Confidence level as a fraction, e.g. 0.95
    pub level: f64,
    pub lower: f64,
    pub mean: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    #[inline]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    #[inline]
    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }
}

/// Standard normal, created on demand.
#[inline]
pub fn standard_normal() -> Normal {
    Normal::new(0.0, 1.0).unwrap_or(Normal::standard())
}

/// Accept a confidence level in (0, 1).
pub fn validate_level(level: f64) -> EngineResult<()> {
    if !(level > 0.0 && level < 1.0) {
        return Err(EngineError::invalid(format!(
            "confidence level must be a fraction in (0, 1), got {level}"
        )));
    }
    Ok(())
}

/// Two-sided z-score: P(|Z| <= z) = level.
pub fn z_score(level: f64) -> EngineResult<f64> {
    validate_level(level)?;
    Ok(standard_normal().inverse_cdf(0.5 + 0.5 * level))
}

/// Linear-interpolated percentile of an ascending slice, q in [0, 1].
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_scores() {
        assert!((z_score(0.95).unwrap() - 1.959964).abs() < 1e-4);
        assert!((z_score(0.90).unwrap() - 1.644854).abs() < 1e-4);
        assert!(z_score(0.99).unwrap() > z_score(0.95).unwrap());
        assert!(z_score(1.0).is_err());
        assert!(z_score(95.0).is_err());
    }

    #[test]
    fn test_percentile() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&data, 0.0), 1.0);
        assert_eq!(percentile_sorted(&data, 0.5), 3.0);
        assert_eq!(percentile_sorted(&data, 1.0), 5.0);
        assert!((percentile_sorted(&data, 0.125) - 1.5).abs() < 1e-12);
    }
}
