use super::trajectory::RecordingError;
use crate::entity::LaneDistributions;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Line that closes one timestep block
const BLOCK_SEPARATOR: &str = "-";

/// Forward-only reader over a lane occupancy log.
///
/// Each timestep is a run of lines, one bracketed number list per lane,
/// closed by a line holding only `-`. Blocks pair with trajectory timesteps by
/// position, not by time.
pub struct LaneDistributionReader<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
}

impl LaneDistributionReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, RecordingError> {
        let file = File::open(path).map_err(|source| RecordingError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> LaneDistributionReader<R> {
    pub fn from_reader(inner: R) -> Self {
        Self {
            lines: inner.lines(),
            line_no: 0,
        }
    }

    /// Read the next timestep block, or `None` at end of log
    pub fn next_block(&mut self) -> Result<Option<LaneDistributions>, RecordingError> {
        let mut block: LaneDistributions = Vec::new();

        for line in self.lines.by_ref() {
            let line = line?;
            self.line_no += 1;
            let trimmed = line.trim();

            if trimmed == BLOCK_SEPARATOR {
                return Ok(Some(block));
            }
            if trimmed.is_empty() {
                continue;
            }

            let lane: Vec<f64> =
                serde_json::from_str(trimmed).map_err(|e| RecordingError::LaneLine {
                    line: self.line_no,
                    reason: e.to_string(),
                })?;
            block.push(lane);
        }

        // Trailing block without a final separator still counts
        if block.is_empty() {
            Ok(None)
        } else {
            Ok(Some(block))
        }
    }
}

impl<R: BufRead> Iterator for LaneDistributionReader<R> {
    type Item = Result<LaneDistributions, RecordingError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block().transpose()
    }
}
