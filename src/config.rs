use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    /// Hard cap on Monte Carlo paths accepted per request.
    pub max_simulations: usize,
    pub default_simulations: usize,
    pub default_tree_steps: usize,
    pub default_seed: u64,
    pub solver_precision: f64,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| EngineError::Config(format!("SERVER_PORT: {e}")))?;

        let max_simulations = env_var_or("MAX_SIMULATIONS", "1000000")
            .parse::<usize>()
            .map_err(|e| EngineError::Config(format!("MAX_SIMULATIONS: {e}")))?;

        let default_simulations = env_var_or("DEFAULT_SIMULATIONS", "100000")
            .parse::<usize>()
            .map_err(|e| EngineError::Config(format!("DEFAULT_SIMULATIONS: {e}")))?;

        let default_tree_steps = env_var_or("DEFAULT_TREE_STEPS", "100")
            .parse::<usize>()
            .map_err(|e| EngineError::Config(format!("DEFAULT_TREE_STEPS: {e}")))?;

        let default_seed = env_var_or("DEFAULT_SEED", "42")
            .parse::<u64>()
            .map_err(|e| EngineError::Config(format!("DEFAULT_SEED: {e}")))?;

        let solver_precision = env_var_or("SOLVER_PRECISION", "1e-7")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("SOLVER_PRECISION: {e}")))?;

        let cfg = Self {
            server_port,
            max_simulations,
            default_simulations,
            default_tree_steps,
            default_seed,
            solver_precision,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.max_simulations == 0 {
            return Err(EngineError::Config("MAX_SIMULATIONS must be > 0".into()));
        }
        if self.default_simulations == 0 || self.default_simulations > self.max_simulations {
            return Err(EngineError::Config(format!(
                "DEFAULT_SIMULATIONS must be in 1..={}",
                self.max_simulations
            )));
        }
        if self.default_tree_steps == 0 {
            return Err(EngineError::Config("DEFAULT_TREE_STEPS must be > 0".into()));
        }
        if !(self.solver_precision > 0.0 && self.solver_precision.is_finite()) {
            return Err(EngineError::Config("SOLVER_PRECISION must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 3001,
            max_simulations: 1_000_000,
            default_simulations: 100_000,
            default_tree_steps: 100,
            default_seed: 42,
            solver_precision: 1e-7,
        }
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
