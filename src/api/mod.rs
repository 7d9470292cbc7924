// HTTP and WebSocket APIs

pub mod scenarios;
pub mod websocket;

pub use scenarios::create_scenario_router;
pub use websocket::{create_ws_router, ws_handler};

use crate::config::SimStreamConfig;
use crate::scenario::{Scenario, ScenarioError, ScenarioRegistry};
use crate::source::EngineFactory;
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

/// Shared application state.
///
/// Holds no simulation state: every websocket session builds its own
/// controller from the scenario selected when it connects.
pub struct AppState {
    pub registry: ScenarioRegistry,
    /// Scenario key used by sessions opened from now on
    pub selected: RwLock<String>,
    pub config: SimStreamConfig,
    pub engines: EngineFactory,
    pub active_sessions: AtomicUsize,
}

impl AppState {
    pub fn new(registry: ScenarioRegistry, config: SimStreamConfig, engines: EngineFactory) -> Self {
        let selected = RwLock::new(registry.default_key().to_string());
        Self {
            registry,
            selected,
            config,
            engines,
            active_sessions: AtomicUsize::new(0),
        }
    }

    /// Currently selected scenario
    pub async fn selected_scenario(&self) -> Result<Scenario, ScenarioError> {
        let key = self.selected.read().await.clone();
        self.registry.get(&key).cloned()
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }
}

/// Full router: websocket endpoint plus scenario API, with permissive CORS
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(create_ws_router(Arc::clone(&state)))
        .merge(create_scenario_router(state))
        .layer(CorsLayer::permissive())
}
