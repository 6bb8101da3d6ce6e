use crate::capital::leverage::{self, DebtCapacity, DebtCapacityInputs, LeverageInputs, LeverageMetrics};
use crate::capital::optimizer::{self, CapitalStructureAnalysis, OptimizationInputs};
use crate::capital::{calculate_wacc, CapitalWeights, CostOfCapital};
use crate::config::AppConfig;
use crate::errors::{EngineError, EngineResult};
use crate::math::cash_flows;
use crate::math::root_finder::RootEstimate;
use crate::options::implied_vol;
use crate::options::{self, ModelKind, ModelSelector, OptionContract, PricingResult};
use crate::portfolio::{self, PortfolioOptimization, PortfolioParams, StrategicOption};
use crate::scenarios::confidence::{self, MetricConfidence, ProjectionMetric};
use crate::scenarios::projection;
use crate::scenarios::sensitivity::{self, SensitivityResult, SensitivityVariable, TornadoBar};
use crate::scenarios::{BaseFinancials, ScenarioAssumptions, ScenarioDefinition, ScenarioInput};
use crate::state::{AppState, CounterSnapshot, PerfCounters};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Json;
use std::sync::Arc;

/// Confidence level for Monte Carlo option intervals when a request omits one.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

type Payload<T> = Result<Json<T>, JsonRejection>;

/// Count the request and, on failure, the error.
fn finish<T>(state: &AppState, route: &'static str, result: EngineResult<T>) -> EngineResult<Json<T>> {
    PerfCounters::add(&state.counters.requests_served, 1);
    if let Err(e) = &result {
        PerfCounters::add(&state.counters.errors_returned, 1);
        tracing::warn!(route, error = %e, "request failed");
    }
    result.map(Json)
}

/// Run CPU-heavy work off the async workers.
async fn blocking<T, F>(f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

fn check_simulations(cfg: &AppConfig, simulations: usize) -> EngineResult<()> {
    if simulations > cfg.max_simulations {
        return Err(EngineError::invalid(format!(
            "simulations {simulations} exceed the limit of {}",
            cfg.max_simulations
        )));
    }
    Ok(())
}

// ── Options ──

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriceRequest {
    pub contract: OptionContract,
    pub model: ModelKind,
    pub steps: Option<usize>,
    pub early_exercise: Option<bool>,
    pub simulations: Option<usize>,
    pub seed: Option<u64>,
    pub confidence: Option<f64>,
}

impl PriceRequest {
    /// Model parameters, falling back to configured defaults.
    fn selector(&self, cfg: &AppConfig) -> EngineResult<ModelSelector> {
        Ok(match self.model {
            ModelKind::BlackScholes => ModelSelector::BlackScholes,
            ModelKind::Binomial => ModelSelector::Binomial {
                steps: self.steps.unwrap_or(cfg.default_tree_steps),
                early_exercise: self.early_exercise.unwrap_or(false),
            },
            ModelKind::MonteCarlo => {
                let simulations = self.simulations.unwrap_or(cfg.default_simulations);
                check_simulations(cfg, simulations)?;
                ModelSelector::MonteCarlo {
                    simulations,
                    seed: self.seed.unwrap_or(cfg.default_seed),
                    confidence: self.confidence.unwrap_or(DEFAULT_CONFIDENCE_LEVEL),
                }
            }
        })
    }
}

/// POST /api/options/price
pub async fn price_option(
    State(state): State<Arc<AppState>>,
    payload: Payload<PriceRequest>,
) -> EngineResult<Json<PricingResult>> {
    let result = async {
        let Json(req) = payload?;
        let selector = req.selector(&state.config)?;
        let contract = req.contract;
        let priced = match selector {
            ModelSelector::BlackScholes => options::price(&contract, selector)?,
            _ => blocking(move || options::price(&contract, selector)).await?,
        };
        PerfCounters::add(&state.counters.options_priced, 1);
        if let ModelSelector::MonteCarlo { simulations, .. } = selector {
            PerfCounters::add(&state.counters.simulation_paths, simulations as u64);
        }
        Ok::<_, EngineError>(priced)
    }
    .await;
    finish(&state, "options/price", result)
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImpliedVolRequest {
    pub contract: OptionContract,
    pub observed_price: f64,
}

#[derive(Debug, serde::Serialize)]
pub struct ImpliedVolResponse {
    pub volatility: f64,
    pub solver: RootEstimate,
}

/// POST /api/options/implied-volatility
pub async fn implied_volatility(
    State(state): State<Arc<AppState>>,
    payload: Payload<ImpliedVolRequest>,
) -> EngineResult<Json<ImpliedVolResponse>> {
    let result = payload.map_err(EngineError::from).and_then(|Json(req)| {
        let solver = implied_vol::implied_volatility(&req.contract, req.observed_price)?;
        Ok(ImpliedVolResponse { volatility: solver.root, solver })
    });
    finish(&state, "options/implied-volatility", result)
}

// ── Scenarios ──

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectRequest {
    pub base: BaseFinancials,
    pub horizon: u32,
    #[serde(default)]
    pub scenarios: Vec<ScenarioInput>,
    /// Appends base, optimistic and conservative scenarios derived from these
    #[serde(default)]
    pub presets_from: Option<ScenarioAssumptions>,
}

impl ProjectRequest {
    fn build(&self) -> EngineResult<Vec<ScenarioDefinition>> {
        let mut inputs = self.scenarios.clone();
        if let Some(a) = &self.presets_from {
            inputs.extend(projection::standard_scenarios(a));
        }
        projection::build_scenarios(&self.base, &inputs, self.horizon)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ProjectResponse {
    pub scenarios: Vec<ScenarioDefinition>,
    /// Present only when the probabilities sum to 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_valuation: Option<f64>,
}

/// POST /api/scenarios/project
pub async fn project_scenarios(
    State(state): State<Arc<AppState>>,
    payload: Payload<ProjectRequest>,
) -> EngineResult<Json<ProjectResponse>> {
    let result = payload.map_err(EngineError::from).and_then(|Json(req)| {
        let scenarios = req.build()?;
        PerfCounters::add(&state.counters.scenarios_projected, scenarios.len() as u64);
        let expected_valuation = projection::expected_valuation(&scenarios).ok();
        Ok(ProjectResponse { scenarios, expected_valuation })
    });
    finish(&state, "scenarios/project", result)
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensitivityRequest {
    pub base: BaseFinancials,
    pub assumptions: ScenarioAssumptions,
    pub horizon: u32,
    pub variables: Vec<SensitivityVariable>,
}

#[derive(Debug, serde::Serialize)]
pub struct SensitivityResponse {
    pub results: Vec<SensitivityResult>,
    pub tornado: Vec<TornadoBar>,
}

/// POST /api/scenarios/sensitivity
pub async fn scenario_sensitivity(
    State(state): State<Arc<AppState>>,
    payload: Payload<SensitivityRequest>,
) -> EngineResult<Json<SensitivityResponse>> {
    let result = payload.map_err(EngineError::from).and_then(|Json(req)| {
        let results = sensitivity::analyze_sensitivity(&req.base, &req.assumptions, req.horizon, &req.variables)?;
        let tornado = sensitivity::tornado(&results);
        Ok(SensitivityResponse { results, tornado })
    });
    finish(&state, "scenarios/sensitivity", result)
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValuationSimulation {
    pub volatility: f64,
    pub simulations: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfidenceRequest {
    pub base: BaseFinancials,
    pub horizon: u32,
    pub scenarios: Vec<ScenarioInput>,
    pub metric: ProjectionMetric,
    pub year: i32,
    pub levels: Vec<f64>,
    /// Also simulate the expected valuation out to `year`
    #[serde(default)]
    pub simulation: Option<ValuationSimulation>,
}

#[derive(Debug, serde::Serialize)]
pub struct ConfidenceResponse {
    pub weighted: MetricConfidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated: Option<MetricConfidence>,
}

/// POST /api/scenarios/confidence
pub async fn scenario_confidence(
    State(state): State<Arc<AppState>>,
    payload: Payload<ConfidenceRequest>,
) -> EngineResult<Json<ConfidenceResponse>> {
    let cfg = state.config.clone();
    let result = async {
        let Json(req) = payload?;
        let scenarios = projection::build_scenarios(&req.base, &req.scenarios, req.horizon)?;
        PerfCounters::add(&state.counters.scenarios_projected, scenarios.len() as u64);
        let weighted = confidence::weighted_confidence(&scenarios, req.metric, req.year, &req.levels)?;

        let simulated = match req.simulation {
            None => None,
            Some(sim) => {
                let simulations = sim.simulations.unwrap_or(cfg.default_simulations);
                check_simulations(&cfg, simulations)?;
                let seed = sim.seed.unwrap_or(cfg.default_seed);
                let expected = weighted_valuation(&scenarios, req.year)?;
                // The first projected year is one year out
                let years = f64::from(req.year - req.base.start_year + 1);
                let levels = req.levels.clone();
                let out = blocking(move || {
                    confidence::simulate_valuation_confidence(expected, sim.volatility, years, &levels, simulations, seed)
                })
                .await?;
                PerfCounters::add(&state.counters.simulation_paths, simulations as u64);
                Some(out)
            }
        };
        Ok::<_, EngineError>(ConfidenceResponse { weighted, simulated })
    }
    .await;
    finish(&state, "scenarios/confidence", result)
}

/// Probability-weighted valuation in `year`.
fn weighted_valuation(scenarios: &[ScenarioDefinition], year: i32) -> EngineResult<f64> {
    Ok(confidence::weighted_confidence(scenarios, ProjectionMetric::Valuation, year, &[DEFAULT_CONFIDENCE_LEVEL])?.mean)
}

// ── Valuation ──

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IrrRequest {
    pub cash_flows: Vec<f64>,
    pub precision: Option<f64>,
}

#[derive(Debug, serde::Serialize)]
pub struct IrrResponse {
    pub irr: f64,
    pub solver: RootEstimate,
}

/// POST /api/valuation/irr
pub async fn internal_rate_of_return(
    State(state): State<Arc<AppState>>,
    payload: Payload<IrrRequest>,
) -> EngineResult<Json<IrrResponse>> {
    let result = payload.map_err(EngineError::from).and_then(|Json(req)| {
        let precision = req.precision.unwrap_or(state.config.solver_precision);
        let solver = cash_flows::irr(&req.cash_flows, precision)?;
        Ok(IrrResponse { irr: solver.root, solver })
    });
    finish(&state, "valuation/irr", result)
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NpvRequest {
    pub rate: f64,
    pub cash_flows: Vec<f64>,
}

#[derive(Debug, serde::Serialize)]
pub struct NpvResponse {
    pub npv: f64,
}

/// POST /api/valuation/npv
pub async fn net_present_value(
    State(state): State<Arc<AppState>>,
    payload: Payload<NpvRequest>,
) -> EngineResult<Json<NpvResponse>> {
    let result = payload
        .map_err(EngineError::from)
        .and_then(|Json(req)| Ok(NpvResponse { npv: cash_flows::npv(req.rate, &req.cash_flows)? }));
    finish(&state, "valuation/npv", result)
}

// ── Capital structure ──

/// Either explicit weights or a debt-to-equity ratio, not both.
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaccRequest {
    pub cost_of_debt: f64,
    pub cost_of_equity: f64,
    pub tax_rate: f64,
    pub debt_weight: Option<f64>,
    pub equity_weight: Option<f64>,
    pub debt_ratio: Option<f64>,
}

impl WaccRequest {
    fn weights(&self) -> EngineResult<CapitalWeights> {
        match (self.debt_weight, self.equity_weight, self.debt_ratio) {
            (Some(d), Some(e), None) => CapitalWeights::new(d, e),
            (None, None, Some(ratio)) => CapitalWeights::from_debt_ratio(ratio),
            _ => Err(EngineError::invalid(
                "provide either debt_weight and equity_weight, or debt_ratio",
            )),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct WaccResponse {
    pub wacc: f64,
    pub after_tax_cost_of_debt: f64,
    pub weights: CapitalWeights,
}

/// POST /api/capital/wacc
pub async fn wacc(
    State(state): State<Arc<AppState>>,
    payload: Payload<WaccRequest>,
) -> EngineResult<Json<WaccResponse>> {
    let result = payload.map_err(EngineError::from).and_then(|Json(req)| {
        let weights = req.weights()?;
        let costs = CostOfCapital {
            cost_of_debt: req.cost_of_debt,
            cost_of_equity: req.cost_of_equity,
            tax_rate: req.tax_rate,
        };
        Ok(WaccResponse {
            wacc: calculate_wacc(&costs, &weights)?,
            after_tax_cost_of_debt: costs.after_tax_cost_of_debt(),
            weights,
        })
    });
    finish(&state, "capital/wacc", result)
}

/// POST /api/capital/leverage
pub async fn leverage(
    State(state): State<Arc<AppState>>,
    payload: Payload<LeverageInputs>,
) -> EngineResult<Json<LeverageMetrics>> {
    let result = payload
        .map_err(EngineError::from)
        .and_then(|Json(inputs)| leverage::leverage_metrics(&inputs));
    finish(&state, "capital/leverage", result)
}

/// POST /api/capital/debt-capacity
pub async fn debt_capacity(
    State(state): State<Arc<AppState>>,
    payload: Payload<DebtCapacityInputs>,
) -> EngineResult<Json<DebtCapacity>> {
    let result = payload
        .map_err(EngineError::from)
        .and_then(|Json(inputs)| leverage::debt_capacity(&inputs));
    finish(&state, "capital/debt-capacity", result)
}

/// POST /api/capital/optimize
pub async fn optimize_capital(
    State(state): State<Arc<AppState>>,
    payload: Payload<OptimizationInputs>,
) -> EngineResult<Json<CapitalStructureAnalysis>> {
    let result = async {
        let Json(inputs) = payload?;
        blocking(move || optimizer::optimize_capital_structure(&inputs)).await
    }
    .await;
    finish(&state, "capital/optimize", result)
}

// ── Portfolio ──

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortfolioRequest {
    pub options: Vec<StrategicOption>,
    #[serde(default)]
    pub params: PortfolioParams,
}

/// POST /api/portfolio/optimize
pub async fn optimize_portfolio(
    State(state): State<Arc<AppState>>,
    payload: Payload<PortfolioRequest>,
) -> EngineResult<Json<PortfolioOptimization>> {
    let result = payload
        .map_err(EngineError::from)
        .and_then(|Json(req)| portfolio::optimize_portfolio(req.options, &req.params));
    finish(&state, "portfolio/optimize", result)
}

// ── Service ──

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<CounterSnapshot> {
    Json(state.counters.snapshot())
}

/// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
