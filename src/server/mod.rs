pub mod routes;

use crate::errors::EngineError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use std::sync::Arc;

impl EngineError {
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::Model(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Config(_) | EngineError::Io(_) | EngineError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        (self.status(), Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Malformed, unknown or missing JSON fields are bad input.
impl From<JsonRejection> for EngineError {
    fn from(e: JsonRejection) -> Self {
        EngineError::InvalidInput(e.body_text())
    }
}

pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/api/options/price", post(routes::price_option))
        .route("/api/options/implied-volatility", post(routes::implied_volatility))
        .route("/api/scenarios/project", post(routes::project_scenarios))
        .route("/api/scenarios/sensitivity", post(routes::scenario_sensitivity))
        .route("/api/scenarios/confidence", post(routes::scenario_confidence))
        .route("/api/valuation/irr", post(routes::internal_rate_of_return))
        .route("/api/valuation/npv", post(routes::net_present_value))
        .route("/api/capital/wacc", post(routes::wacc))
        .route("/api/capital/leverage", post(routes::leverage))
        .route("/api/capital/debt-capacity", post(routes::debt_capacity))
        .route("/api/capital/optimize", post(routes::optimize_capital))
        .route("/api/portfolio/optimize", post(routes::optimize_portfolio))
        .route("/api/counters", get(routes::get_counters))
        .route("/api/health", get(routes::health))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
