use super::lanes::LaneDistributionReader;
use super::trajectory::TrajectoryReader;
use super::{DataSource, SourceError};
use crate::entity::{seconds_to_ms, Frame, MovingEntity};
use async_trait::async_trait;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{info, warn};

struct Cursors {
    trajectory: TrajectoryReader<BufReader<File>>,
    lanes: Option<LaneDistributionReader<BufReader<File>>>,
    steps: u64,
}

/// Replays a recorded trajectory log, optionally paired with a lane log.
///
/// `start` reopens both files, so every session replays from the beginning.
pub struct RecordedSource {
    trajectory_file: PathBuf,
    lane_file: Option<PathBuf>,
    cursors: Option<Cursors>,
}

impl RecordedSource {
    pub fn new(trajectory_file: PathBuf, lane_file: Option<PathBuf>) -> Self {
        Self {
            trajectory_file,
            lane_file,
            cursors: None,
        }
    }
}

#[async_trait]
impl DataSource for RecordedSource {
    async fn start(&mut self) -> Result<(), SourceError> {
        let trajectory = TrajectoryReader::open(&self.trajectory_file)?;
        let lanes = self
            .lane_file
            .as_deref()
            .map(LaneDistributionReader::open)
            .transpose()?;

        info!(
            trajectory = %self.trajectory_file.display(),
            lanes = lanes.is_some(),
            "Recorded source opened"
        );

        self.cursors = Some(Cursors {
            trajectory,
            lanes,
            steps: 0,
        });
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let cursors = self.cursors.as_mut().ok_or(SourceError::NotStarted)?;

        let step = cursors
            .trajectory
            .next_timestep()?
            .ok_or(SourceError::EndOfRecording)?;

        let entities = step
            .records
            .iter()
            .map(|record| MovingEntity::from_attributes(record.kind, &record.attributes))
            .collect::<Result<Vec<_>, _>>()?;

        let mut frame = Frame::from_entities(seconds_to_ms(step.time), entities);

        if let Some(lanes) = cursors.lanes.as_mut() {
            match lanes.next_block()? {
                Some(block) => frame.lane_distributions = Some(block),
                None => {
                    warn!(
                        timestep = cursors.steps,
                        "Lane log exhausted before trajectory log; further frames carry no lane data"
                    );
                    cursors.lanes = None;
                }
            }
        }

        cursors.steps += 1;
        Ok(frame)
    }

    async fn stop(&mut self) {
        if let Some(cursors) = self.cursors.take() {
            info!(steps = cursors.steps, "Recorded source closed");
        }
    }
}
