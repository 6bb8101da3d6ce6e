use valuation_engine::config::AppConfig;
use valuation_engine::errors::EngineResult;
use valuation_engine::server;
use valuation_engine::state::AppState;

#[tokio::main]
async fn main() {
    // Early stderr line in case tracing setup fails
    eprintln!("[valuation_engine] binary started, setting up logging...");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("valuation engine starting");

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        max_simulations = cfg.max_simulations,
        default_simulations = cfg.default_simulations,
        default_tree_steps = cfg.default_tree_steps,
        "config loaded"
    );

    if let Err(e) = serve(cfg).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}

async fn serve(cfg: AppConfig) -> EngineResult<()> {
    let addr = format!("0.0.0.0:{}", cfg.server_port);
    let app = server::router(AppState::new(cfg));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("server listening on {addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
