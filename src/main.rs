use chart_gateway::api::http_server::{start_server, AppState};
use chart_gateway::connectors::build_rate_limit_gate;
use chart_gateway::connectors::kiwoom_rest::ReqwestExecutor;
use chart_gateway::core::chart_service::ChartService;
use chart_gateway::core::error::GatewayError;
use chart_gateway::utils::config::AppConfig;
use log::{debug, error, info, warn};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // 1. Load configuration (.env.local, .env, config file, environment)
    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // 2. Initialize Logger with a default level of "info"
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!(">>> Kiwoom Chart Gateway is Starting... <<<");
    debug!("Loaded {:?}", config);

    // 3. Build components
    let state = match build_state(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    if !state.service.is_configured() {
        warn!("Kiwoom credentials missing, chart requests will answer 503 until configured");
    }

    // 4. Run server
    if let Err(e) = start_server(state, &config.bind_address()).await {
        error!("Server error: {}", e);
        process::exit(1);
    }
}

fn build_state(config: &AppConfig) -> Result<Arc<AppState>, GatewayError> {
    let policy = config.backoff_policy()?;
    let executor = Arc::new(ReqwestExecutor::new(config.upstream_timeout())?);
    let service = ChartService::new(config, executor, policy);
    let gate = build_rate_limit_gate(config)?;

    Ok(AppState::new(service, gate, config.client_origin.clone()))
}
