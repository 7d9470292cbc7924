use crate::api::AppState;
use crate::scenario::{LaneMap, ScenarioError, ScenarioSummary};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ScenarioError {
    fn into_response(self) -> Response {
        let status = match self {
            ScenarioError::NotFound(_) | ScenarioError::NoLaneMap(_) => StatusCode::NOT_FOUND,
            ScenarioError::ConfigParse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Response to a scenario selection
#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub scenario: String,
}

/// Server-wide view returned by GET /api/state
#[derive(Debug, Serialize)]
pub struct ServerState {
    pub scenario: String,
    #[serde(rename = "delayMs")]
    pub delay_ms: u64,
    #[serde(rename = "activeSessions")]
    pub active_sessions: usize,
}

pub fn create_scenario_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/scenarios", get(list_scenarios))
        .route("/api/scenarios/:name", put(select_scenario))
        .route("/api/scenarios/:name/lanemap", get(lane_map))
        .route("/api/state", get(server_state))
        .with_state(state)
}

/// GET /api/scenarios
async fn list_scenarios(State(state): State<Arc<AppState>>) -> Json<Vec<ScenarioSummary>> {
    Json(state.registry.summaries())
}

/// PUT /api/scenarios/:name - selects the scenario for sessions opened afterwards
async fn select_scenario(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SelectionResponse>, ScenarioError> {
    state.registry.get(&name)?;
    *state.selected.write().await = name.clone();
    info!(scenario = %name, "Scenario selected");
    Ok(Json(SelectionResponse { scenario: name }))
}

/// GET /api/scenarios/:name/lanemap
async fn lane_map(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<LaneMap>, ScenarioError> {
    state
        .registry
        .get(&name)?
        .lane_map
        .clone()
        .map(Json)
        .ok_or(ScenarioError::NoLaneMap(name))
}

/// GET /api/state
async fn server_state(State(state): State<Arc<AppState>>) -> Json<ServerState> {
    Json(ServerState {
        scenario: state.selected.read().await.clone(),
        delay_ms: state.config.simulation.default_delay_ms,
        active_sessions: state.active_sessions(),
    })
}
