use crate::entity::RecordKind;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Errors reading recorded logs
#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML at byte {position}: {reason}")]
    Xml { position: usize, reason: String },

    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("invalid timestep time '{0}'")]
    InvalidTime(String),

    #[error("timestep time went backwards: {previous} -> {current}")]
    TimeWentBackwards { previous: f64, current: f64 },

    #[error("recording ended inside a timestep")]
    Truncated,

    #[error("invalid lane distribution on line {line}: {reason}")]
    LaneLine { line: usize, reason: String },
}

/// One entity record as written in the trajectory log
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    pub kind: RecordKind,
    pub attributes: HashMap<String, String>,
}

/// One `<timestep>` element with its buffered records
#[derive(Clone, Debug, PartialEq)]
pub struct RawTimestep {
    /// Simulated time in seconds
    pub time: f64,
    pub records: Vec<RawRecord>,
}

/// Forward-only reader over a floating-car-data trajectory log.
///
/// Parses incrementally; only the timestep being assembled is held in memory.
pub struct TrajectoryReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    last_time: Option<f64>,
    finished: bool,
}

impl TrajectoryReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, RecordingError> {
        let file = File::open(path).map_err(|source| RecordingError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> TrajectoryReader<R> {
    pub fn from_reader(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            last_time: None,
            finished: false,
        }
    }

    /// Read the next complete timestep, or `None` once the log is exhausted
    pub fn next_timestep(&mut self) -> Result<Option<RawTimestep>, RecordingError> {
        if self.finished {
            return Ok(None);
        }

        let mut current: Option<RawTimestep> = None;

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    self.finished = true;
                    return Err(RecordingError::Xml {
                        position: self.reader.buffer_position(),
                        reason: e.to_string(),
                    });
                }
            };

            match event {
                Event::Start(ref e) | Event::Empty(ref e) if e.name().as_ref() == b"timestep" => {
                    let self_closing = matches!(event, Event::Empty(_));
                    let time = timestep_time(e, self.reader.buffer_position())?;
                    current = Some(RawTimestep {
                        time,
                        records: Vec::new(),
                    });
                    if self_closing {
                        break;
                    }
                }
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let kind = match e.name().as_ref() {
                        b"vehicle" => RecordKind::Vehicle,
                        b"person" => RecordKind::Person,
                        _ => continue,
                    };
                    if let Some(step) = current.as_mut() {
                        step.records.push(RawRecord {
                            kind,
                            attributes: attributes(e, self.reader.buffer_position())?,
                        });
                    }
                }
                Event::End(ref e) if e.name().as_ref() == b"timestep" => break,
                Event::Eof => {
                    self.finished = true;
                    if current.is_some() {
                        return Err(RecordingError::Truncated);
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }

        let step = current.ok_or(RecordingError::Truncated)?;
        if let Some(previous) = self.last_time {
            if step.time < previous {
                return Err(RecordingError::TimeWentBackwards {
                    previous,
                    current: step.time,
                });
            }
        }
        self.last_time = Some(step.time);
        Ok(Some(step))
    }
}

impl<R: BufRead> Iterator for TrajectoryReader<R> {
    type Item = Result<RawTimestep, RecordingError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_timestep().transpose()
    }
}

/// Timestep time in seconds, finite and not negative
fn timestep_time(e: &BytesStart<'_>, position: usize) -> Result<f64, RecordingError> {
    let attrs = attributes(e, position)?;
    let raw = attrs.get("time").ok_or(RecordingError::MissingAttribute {
        element: "timestep",
        attribute: "time",
    })?;
    match raw.trim().parse::<f64>() {
        Ok(time) if time.is_finite() && time >= 0.0 => Ok(time),
        _ => Err(RecordingError::InvalidTime(raw.clone())),
    }
}

fn attributes(e: &BytesStart<'_>, position: usize) -> Result<HashMap<String, String>, RecordingError> {
    let xml_error = |reason: String| RecordingError::Xml { position, reason };
    let mut out = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| xml_error(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(e.to_string()))?
            .into_owned();
        out.insert(key, value);
    }
    Ok(out)
}
