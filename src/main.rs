use anyhow::{Context, Result};
use sim_stream::api::{create_router, AppState};
use sim_stream::config::{apply_env_overrides, load_config, SimStreamConfig, CONFIG_PATH_VAR};
use sim_stream::scenario::{Scenario, ScenarioRegistry};
use sim_stream::source::UnavailableEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sim_stream=info".into()),
        )
        .init();

    info!("Sim stream starting...");

    let mut config = match std::env::var_os(CONFIG_PATH_VAR) {
        Some(path) => {
            let path = PathBuf::from(path);
            load_config(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => SimStreamConfig::default(),
    };
    apply_env_overrides(&mut config);

    let registry = match &config.simulation.configuration_file {
        Some(file) => ScenarioRegistry::from_configuration_file(file),
        None => ScenarioRegistry::load(&config.simulation.scenarios_file),
    }
    .context("Failed to register scenarios")?;

    if registry.iter().any(Scenario::is_live) {
        warn!(
            engine = %config.engine.binary_name(),
            "No simulation engine client available; live scenarios will report unavailable"
        );
    }

    info!(
        scenarios = registry.len(),
        default = %registry.default_key(),
        delay_ms = config.simulation.default_delay_ms,
        "Configuration loaded"
    );

    let bind_addr = config.server.bind_addr();
    let state = Arc::new(AppState::new(registry, config, UnavailableEngine::factory()));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    info!("Sim stream stopped");
    Ok(())
}
