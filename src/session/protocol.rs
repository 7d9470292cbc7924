use crate::delta::Delta;
use crate::entity::{LaneDistributions, MovingEntity, TrafficSignal, VehicleClass};
use crate::simulation::{Action, SimulationState, SimulationStatus, TickReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inbound messages the session refuses to process
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("missing 'action' field")]
    MissingAction,

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("changeDelay requires 'delayLengthMs'")]
    MissingDelay,

    #[error("{0} frames are not supported")]
    UnsupportedFrame(&'static str),
}

/// Client → Server: control action, as received
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(rename = "delayLengthMs", default)]
    pub delay_length_ms: Option<u64>,
}

impl ClientMessage {
    /// Validate into a controller action
    pub fn into_action(self) -> Result<Action, ProtocolError> {
        if self.msg_type != "action" {
            return Err(ProtocolError::UnknownType(self.msg_type));
        }
        let action = self.action.ok_or(ProtocolError::MissingAction)?;
        match action.as_str() {
            "start" => Ok(Action::Start),
            "pause" => Ok(Action::Pause),
            "resume" => Ok(Action::Resume),
            "cancel" => Ok(Action::Cancel),
            "changeDelay" => self
                .delay_length_ms
                .map(Action::ChangeDelay)
                .ok_or(ProtocolError::MissingDelay),
            _ => Err(ProtocolError::UnknownAction(action)),
        }
    }
}

/// Parse one inbound text frame
pub fn parse_action(text: &str) -> Result<Action, ProtocolError> {
    serde_json::from_str::<ClientMessage>(text)?.into_action()
}

/// Server → Client: controller status, sent after every action
#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(rename = "delayMs")]
    pub delay_ms: u64,
    pub scenario: String,
    #[serde(rename = "simulationStatus")]
    pub simulation_status: SimulationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusMessage {
    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

impl From<SimulationState> for StatusMessage {
    fn from(state: SimulationState) -> Self {
        Self {
            msg_type: "state".to_string(),
            delay_ms: state.delay_ms,
            scenario: state.scenario,
            simulation_status: state.status,
            error: None,
        }
    }
}

/// Server → Client: one tick's delta
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Simulated milliseconds as a decimal string
    pub time: String,
    pub vehicles: Delta<MovingEntity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lights: Option<Delta<TrafficSignal>>,
    pub vehicle_counts: BTreeMap<VehicleClass, u64>,
    pub simulate_secs: f64,
    pub snapshot_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane_distributions: Option<LaneDistributions>,
}

impl From<TickReport> for SnapshotMessage {
    fn from(report: TickReport) -> Self {
        Self {
            msg_type: "snapshot".to_string(),
            time: report.time_ms.to_string(),
            vehicles: report.vehicles,
            lights: report.lights,
            vehicle_counts: report.vehicle_counts,
            simulate_secs: report.simulate_secs,
            snapshot_secs: report.snapshot_secs,
            lane_distributions: report.lane_distributions,
        }
    }
}

/// Server → Client: protocol error, sent right before closing
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub error: String,
}

impl From<&ProtocolError> for ErrorMessage {
    fn from(err: &ProtocolError) -> Self {
        Self {
            msg_type: "error".to_string(),
            error: err.to_string(),
        }
    }
}
