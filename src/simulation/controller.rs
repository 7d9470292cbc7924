use super::{Action, ControlError, SimulationState, SimulationStatus};
use crate::delta::{diff, Delta};
use crate::entity::{LaneDistributions, MovingEntity, TrafficSignal, VehicleClass};
use crate::source::{DataSource, SourceError};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Result of one tick, ready to be packaged for the wire
#[derive(Clone, Debug)]
pub struct TickReport {
    pub time_ms: u64,
    pub vehicles: Delta<MovingEntity>,
    pub lights: Option<Delta<TrafficSignal>>,
    pub vehicle_counts: BTreeMap<VehicleClass, u64>,
    /// Wall-clock time spent advancing the source
    pub simulate_secs: f64,
    /// Wall-clock time spent diffing
    pub snapshot_secs: f64,
    pub lane_distributions: Option<LaneDistributions>,
}

/// What a tick attempt produced
#[derive(Debug)]
pub enum TickOutcome {
    /// A new frame was diffed against the previous one
    Snapshot(TickReport),
    /// The recording is exhausted; the controller is now off
    Ended,
    /// The source failed; the controller is now off
    Failed(SourceError),
    /// Not running, so the source was not touched
    Idle,
}

/// Owns one session's simulation status, scenario, tick delay, data source
/// and the previously sent frame.
pub struct SimulationController {
    scenario: String,
    source: Box<dyn DataSource>,
    status: SimulationStatus,
    delay_ms: u64,
    last_vehicles: HashMap<String, MovingEntity>,
    last_lights: HashMap<String, TrafficSignal>,
    steps: u64,
}

impl SimulationController {
    pub fn new(scenario: impl Into<String>, source: Box<dyn DataSource>, delay_ms: u64) -> Self {
        Self {
            scenario: scenario.into(),
            source,
            status: SimulationStatus::Off,
            delay_ms,
            last_vehicles: HashMap::new(),
            last_lights: HashMap::new(),
            steps: 0,
        }
    }

    pub fn state(&self) -> SimulationState {
        SimulationState {
            status: self.status,
            scenario: self.scenario.clone(),
            delay_ms: self.delay_ms,
        }
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn is_running(&self) -> bool {
        self.status == SimulationStatus::Running
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Number of `next_frame` calls made on the source
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// True when no previous frame is cached
    pub fn cache_is_empty(&self) -> bool {
        self.last_vehicles.is_empty() && self.last_lights.is_empty()
    }

    /// Apply a control action.
    ///
    /// Illegal transitions leave the state unchanged and return an error.
    /// A failed `start` leaves the controller off.
    pub async fn apply(&mut self, action: Action) -> Result<(), ControlError> {
        use SimulationStatus::*;

        let illegal = |status| ControlError::IllegalTransition {
            action: action.name(),
            status,
        };

        match (action, self.status) {
            (Action::Start, Off) => {
                if let Err(e) = self.source.start().await {
                    error!(scenario = %self.scenario, error = %e, "Failed to start source");
                    self.source.stop().await;
                    return Err(e.into());
                }
                self.status = Running;
            }
            (Action::Start, _) => {}

            (Action::Pause, Off) => return Err(illegal(Off)),
            (Action::Pause, Running) => self.status = Paused,
            (Action::Pause, Paused) => {}

            (Action::Resume, Off) => return Err(illegal(Off)),
            (Action::Resume, Paused) => self.status = Running,
            (Action::Resume, Running) => {}

            (Action::Cancel, _) => self.shutdown().await,

            (Action::ChangeDelay(ms), _) => self.delay_ms = ms,
        }

        info!(
            scenario = %self.scenario,
            action = action.name(),
            status = %self.status,
            delay_ms = self.delay_ms,
            "Control action applied"
        );
        Ok(())
    }

    /// Run one tick if running: step the source, diff against the cached
    /// frame, then cache the new frame.
    ///
    /// End of recording and source failures both turn the controller off.
    pub async fn tick(&mut self) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Idle;
        }

        let started = Instant::now();
        self.steps += 1;
        let frame = match self.source.next_frame().await {
            Ok(frame) => frame,
            Err(SourceError::EndOfRecording) => {
                info!(scenario = %self.scenario, steps = self.steps - 1, "Recording finished");
                self.shutdown().await;
                return TickOutcome::Ended;
            }
            Err(e) => {
                warn!(scenario = %self.scenario, error = %e, "Source failed, stopping");
                self.shutdown().await;
                return TickOutcome::Failed(e);
            }
        };
        let simulated = Instant::now();

        let vehicle_counts = frame.class_counts();
        let vehicles = diff(&self.last_vehicles, &frame.vehicles);
        let lights = frame
            .lights
            .as_ref()
            .map(|lights| diff(&self.last_lights, lights));

        self.last_vehicles = frame.vehicles;
        if let Some(lights) = frame.lights {
            self.last_lights = lights;
        }

        let report = TickReport {
            time_ms: frame.time_ms,
            vehicles,
            lights,
            vehicle_counts,
            simulate_secs: (simulated - started).as_secs_f64(),
            snapshot_secs: simulated.elapsed().as_secs_f64(),
            lane_distributions: frame.lane_distributions,
        };

        debug!(
            time_ms = report.time_ms,
            changed = report.vehicles.len(),
            "Tick"
        );
        TickOutcome::Snapshot(report)
    }

    /// Stop the source and clear the previous-frame cache; status becomes off.
    ///
    /// Used for cancel, end of recording, failures and disconnects.
    pub async fn shutdown(&mut self) {
        if self.status != SimulationStatus::Off {
            self.source.stop().await;
        }
        self.status = SimulationStatus::Off;
        self.last_vehicles.clear();
        self.last_lights.clear();
    }
}
