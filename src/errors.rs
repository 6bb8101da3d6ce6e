/// Domain-specific error types for the valuation engine.
/// Every failure is local to a single computation. The engine must:
/// - Reject invalid financial inputs instead of clamping them
/// - Report numerical breakdown distinctly from bad input
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model computation error: {0}")]
    Model(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl EngineError {
    /// Shorthand used by the input validators.
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Task(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Fail with `InvalidInput` unless `value` is finite.
pub(crate) fn ensure_finite(name: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid(format!("{name} must be a finite number, got {value}")))
    }
}

/// Fail with `InvalidInput` unless `value` is finite and >= 0.
pub(crate) fn ensure_non_negative(name: &str, value: f64) -> EngineResult<()> {
    ensure_finite(name, value)?;
    if value < 0.0 {
        return Err(EngineError::invalid(format!("{name} must be >= 0, got {value}")));
    }
    Ok(())
}

/// Fail with `InvalidInput` unless `value` is finite and > 0.
pub(crate) fn ensure_positive(name: &str, value: f64) -> EngineResult<()> {
    ensure_finite(name, value)?;
    if value <= 0.0 {
        return Err(EngineError::invalid(format!("{name} must be > 0, got {value}")));
    }
    Ok(())
}

/// Fail with `InvalidInput` unless `value` lies in [0, 100].
pub(crate) fn ensure_percentage(name: &str, value: f64) -> EngineResult<()> {
    ensure_finite(name, value)?;
    if !(0.0..=100.0).contains(&value) {
        return Err(EngineError::invalid(format!("{name} must be in [0, 100], got {value}")));
    }
    Ok(())
}
