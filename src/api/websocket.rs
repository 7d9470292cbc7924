use crate::api::AppState;
use crate::session::StreamingSession;
use crate::simulation::SimulationController;
use crate::source;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

/// GET /api/ws - WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

pub fn create_ws_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ws", get(ws_handler))
        .with_state(state)
}

/// Run one streaming session bound to the scenario selected at connect time
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let scenario = match state.selected_scenario().await {
        Ok(scenario) => scenario,
        Err(e) => {
            error!(error = %e, "Selected scenario unavailable, dropping connection");
            return;
        }
    };

    let source = source::for_scenario(&scenario, &state.config.engine, &state.engines);
    let controller = SimulationController::new(
        scenario.key.clone(),
        source,
        state.config.simulation.default_delay_ms,
    );

    let active = state.active_sessions.fetch_add(1, Ordering::SeqCst) + 1;
    info!(scenario = %scenario.key, live = scenario.is_live(), active, "Session starting");

    StreamingSession::new(controller).run(&mut socket).await;

    state.active_sessions.fetch_sub(1, Ordering::SeqCst);
}
