// Data sources: live engine stepping and recorded log replay

pub mod lanes;
pub mod live;
pub mod recorded;
pub mod trajectory;


pub use lanes::LaneDistributionReader;
pub use live::{
    EngineError, EngineFactory, LaunchOptions, LiveSource, SimulationEngine, UnavailableEngine,
};
pub use recorded::RecordedSource;
pub use trajectory::{RawTimestep, RecordingError, TrajectoryReader};

use crate::config::EngineConfig;
use crate::entity::{EntityError, Frame};
use crate::scenario::{Scenario, ScenarioBacking};
use async_trait::async_trait;

/// Errors raised while starting or stepping a data source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// External engine missing or failed to start
    #[error("simulation source unavailable: {0}")]
    Unavailable(String),

    /// Recorded trajectory exhausted
    #[error("end of recording")]
    EndOfRecording,

    /// `next_frame` called before a successful `start`
    #[error("source not started")]
    NotStarted,

    #[error("recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("invalid entity: {0}")]
    Entity(#[from] EntityError),
}

/// Source of simulation frames, stepped once per tick.
///
/// The controller only sees this contract; whether frames come from a live
/// engine or a recording is decided once when the source is built.
#[async_trait]
pub trait DataSource: Send {
    /// Prepare the source; for recordings this rewinds to the first timestep
    async fn start(&mut self) -> Result<(), SourceError>;

    /// Advance exactly one tick and return the full resulting frame
    async fn next_frame(&mut self) -> Result<Frame, SourceError>;

    /// Release resources. Safe to call at any time, repeatedly.
    async fn stop(&mut self);
}

/// Build the data source variant a scenario is backed by
pub fn for_scenario(
    scenario: &Scenario,
    engine_config: &EngineConfig,
    engines: &EngineFactory,
) -> Box<dyn DataSource> {
    match &scenario.backing {
        ScenarioBacking::Live { config_file } => Box::new(LiveSource::new(
            engines(),
            LaunchOptions::new(engine_config, config_file.clone()),
        )),
        ScenarioBacking::Recorded {
            trajectory_file,
            lane_file,
        } => Box::new(RecordedSource::new(
            trajectory_file.clone(),
            lane_file.clone(),
        )),
    }
}
