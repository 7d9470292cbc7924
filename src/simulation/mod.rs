// Simulation state machine and tick production

mod controller;
#[cfg(test)]
mod tests;

pub use controller::{SimulationController, TickOutcome, TickReport};

use crate::source::SourceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of one session's simulation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    Off,
    Running,
    Paused,
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Off => "off",
            Self::Running => "running",
            Self::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// Control actions accepted from clients
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Start,
    Pause,
    Resume,
    Cancel,
    ChangeDelay(u64),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Cancel => "cancel",
            Self::ChangeDelay(_) => "changeDelay",
        }
    }
}

/// Observable controller state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationState {
    pub status: SimulationStatus,
    pub scenario: String,
    pub delay_ms: u64,
}

/// Rejected control actions
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("cannot {action} while simulation is {status}")]
    IllegalTransition {
        action: &'static str,
        status: SimulationStatus,
    },

    #[error(transparent)]
    Source(#[from] SourceError),
}
