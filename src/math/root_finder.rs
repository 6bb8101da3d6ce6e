//! Newton-Raphson root finding.
//!
//! x_{n+1} = x_n - f(x_n) / f'(x_n)
//!
//! Non-convergence is not an error here: the solver always hands back its
//! last stable estimate together with a status, and the caller decides
//! whether an approximate number with a caveat is good enough.

/// Derivatives with magnitude below this abort the iteration.
const DEFAULT_MIN_DERIVATIVE: f64 = 1e-14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    /// |f(x)| or |step| dropped below the precision.
    Converged,
    /// Iteration cap reached; root is the last estimate.
    MaxIterations,
    /// f'(x) was ~0; root is the last stable estimate.
    FlatDerivative,
    /// f or f' stopped being finite; root is the last stable estimate.
    NonFinite,
}

impl std::fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::MaxIterations => write!(f, "max_iterations"),
            Self::FlatDerivative => write!(f, "flat_derivative"),
            Self::NonFinite => write!(f, "non_finite"),
        }
    }
}

/// Solver output. Stack-allocated, Copy.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RootEstimate {
    pub root: f64,
    /// f(root) as last evaluated
    pub residual: f64,
    pub iterations: usize,
    pub converged: bool,
    pub status: SolverStatus,
}

impl RootEstimate {
    fn new(root: f64, residual: f64, iterations: usize, status: SolverStatus) -> Self {
        Self {
            root,
            residual,
            iterations,
            converged: status == SolverStatus::Converged,
            status,
        }
    }
}

/// Newton-Raphson solver configuration.
#[derive(Debug, Clone, Copy)]
pub struct NewtonRaphson {
    pub precision: f64,
    pub max_iterations: usize,
    pub min_derivative: f64,
    /// Open interval the iterate must stay inside. A step that lands outside
    /// is replaced by the midpoint between the current iterate and the bound.
    pub bounds: Option<(f64, f64)>,
}

impl NewtonRaphson {
    pub fn new(precision: f64, max_iterations: usize) -> Self {
        Self {
            precision,
            max_iterations,
            min_derivative: DEFAULT_MIN_DERIVATIVE,
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.bounds = Some((lower, upper));
        self
    }

    /// Find a root of `f`, where `f(x)` returns `(value, derivative)`.
    ///
    /// Stops when |f(x)| < precision or |x_{n+1} - x_n| < precision.
    pub fn solve<F>(&self, mut f: F, x0: f64) -> RootEstimate
    where
        F: FnMut(f64) -> (f64, f64),
    {
        let mut x = x0;
        let mut residual = f64::NAN;

        for iteration in 0..self.max_iterations {
            let (fx, dfx) = f(x);

            if !fx.is_finite() || !dfx.is_finite() {
                return RootEstimate::new(x, residual, iteration, SolverStatus::NonFinite);
            }
            residual = fx;

            if fx.abs() < self.precision {
                return RootEstimate::new(x, fx, iteration, SolverStatus::Converged);
            }

            if dfx.abs() < self.min_derivative {
                return RootEstimate::new(x, fx, iteration, SolverStatus::FlatDerivative);
            }

            let mut next = x - fx / dfx;
            if let Some((lower, upper)) = self.bounds {
                if next <= lower {
                    next = 0.5 * (x + lower);
                } else if next >= upper {
                    next = 0.5 * (x + upper);
                }
            }

            if !next.is_finite() {
                return RootEstimate::new(x, fx, iteration + 1, SolverStatus::NonFinite);
            }

            if (next - x).abs() < self.precision {
                let (f_next, _) = f(next);
                let residual = if f_next.is_finite() { f_next } else { fx };
                return RootEstimate::new(next, residual, iteration + 1, SolverStatus::Converged);
            }

            x = next;
        }

        RootEstimate::new(x, residual, self.max_iterations, SolverStatus::MaxIterations)
    }
}
