use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

mod frame;
#[cfg(test)]
mod tests;

pub use frame::{seconds_to_ms, Frame, LaneDistributions};

/// Vehicle type literal the engine assigns when a route has no explicit type
pub const DEFAULT_VEHICLE_TYPE: &str = "DEFAULT_VEHTYPE";

/// Canonical label sent in place of [`DEFAULT_VEHICLE_TYPE`]
pub const CAR_VEHICLE_TYPE: &str = "car";

/// Fallback dimensions (meters) for records that do not carry them
pub const DEFAULT_LENGTH: f64 = 4.5;
pub const DEFAULT_WIDTH: f64 = 1.8;

/// Entity construction errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntityError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not a finite number: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("invalid color '{0}': expected 'r,g,b' with components in 0..=255")]
    InvalidColor(String),
}

/// Coarse entity class, used for rendering and per-frame counts
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Passenger,
    Bicycle,
    Pedestrian,
    Other,
}

impl VehicleClass {
    /// Map an engine class label onto the coarse class
    pub fn from_label(label: &str) -> Self {
        match label {
            "passenger" => Self::Passenger,
            "bicycle" => Self::Bicycle,
            "pedestrian" => Self::Pedestrian,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passenger => "passenger",
            Self::Bicycle => "bicycle",
            Self::Pedestrian => "pedestrian",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RGB color triple
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl FromStr for Rgb {
    type Err = EntityError;

    /// Parses "r,g,b" (whitespace around components allowed)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EntityError::InvalidColor(s.to_string());
        let parts: Vec<u8> = s
            .split(',')
            .map(|part| part.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;

        match parts.as_slice() {
            [r, g, b] => Ok(Rgb(*r, *g, *b)),
            _ => Err(invalid()),
        }
    }
}

/// Which element a raw recorded record came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Vehicle,
    Person,
}

/// One simulated vehicle, bicycle, or pedestrian at a single tick.
///
/// Equality is structural over every attribute; the delta engine relies on it
/// to decide whether an entity must be retransmitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovingEntity {
    /// Unique within a tick; carried as the map key on the wire
    #[serde(skip)]
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub speed: f64,
    pub angle: f64,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    #[serde(rename = "vClass")]
    pub class: VehicleClass,
    pub length: f64,
    pub width: f64,
    pub signals: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl MovingEntity {
    /// Build an entity from the textual attributes of a recorded trajectory record.
    ///
    /// Normalization:
    /// - `DEFAULT_VEHTYPE` (or a missing type) becomes `car`
    /// - missing class defaults to `passenger` (`pedestrian` for person records)
    /// - missing color stays absent
    /// - numbers must parse and be finite; nothing is coerced to zero
    pub fn from_attributes(
        kind: RecordKind,
        attrs: &HashMap<String, String>,
    ) -> Result<Self, EntityError> {
        let id = attrs
            .get("id")
            .ok_or(EntityError::MissingField("id"))?
            .clone();

        let class = match (attrs.get("vClass"), kind) {
            (Some(label), _) => VehicleClass::from_label(label),
            (None, RecordKind::Person) => VehicleClass::Pedestrian,
            (None, RecordKind::Vehicle) => VehicleClass::Passenger,
        };

        let color = attrs.get("color").map(|c| c.parse()).transpose()?;

        let entity = Self {
            id,
            x: required_number(attrs, "x")?,
            y: required_number(attrs, "y")?,
            z: optional_number(attrs, "z")?.unwrap_or(0.0),
            speed: required_number(attrs, "speed")?,
            angle: required_number(attrs, "angle")?,
            vehicle_type: normalize_vehicle_type(attrs.get("type").map(String::as_str)),
            class,
            length: optional_number(attrs, "length")?.unwrap_or(DEFAULT_LENGTH),
            width: optional_number(attrs, "width")?.unwrap_or(DEFAULT_WIDTH),
            signals: optional_integer(attrs, "signals")?.unwrap_or(0),
            color,
        };

        entity.validate()
    }

    /// Check the numeric invariants: every float finite, speed non-negative
    pub fn validate(self) -> Result<Self, EntityError> {
        for (field, value) in [
            ("x", self.x),
            ("y", self.y),
            ("z", self.z),
            ("speed", self.speed),
            ("angle", self.angle),
            ("length", self.length),
            ("width", self.width),
        ] {
            if !value.is_finite() {
                return Err(EntityError::InvalidNumber {
                    field,
                    value: value.to_string(),
                });
            }
        }
        if self.speed < 0.0 {
            return Err(EntityError::OutOfRange {
                field: "speed",
                value: self.speed,
            });
        }
        Ok(self)
    }

    /// Round position to centimeters and speed/angle to whole units.
    ///
    /// Applied to live-engine entities so sub-visible jitter does not force a
    /// full retransmission every tick.
    pub fn rounded(mut self) -> Self {
        self.x = round_to(self.x, 2);
        self.y = round_to(self.y, 2);
        self.speed = self.speed.round();
        self.angle = self.angle.round();
        self
    }
}

/// One traffic-light installation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSignal {
    #[serde(skip)]
    pub id: String,
    pub phase: i64,
    #[serde(rename = "programID")]
    pub program_id: String,
}

/// Rewrite the engine's generic type literal to the canonical car label
pub fn normalize_vehicle_type(raw: Option<&str>) -> String {
    match raw {
        None | Some(DEFAULT_VEHICLE_TYPE) => CAR_VEHICLE_TYPE.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Count entities per class
pub fn class_counts<'a>(
    entities: impl IntoIterator<Item = &'a MovingEntity>,
) -> BTreeMap<VehicleClass, u64> {
    let mut counts = BTreeMap::new();
    for entity in entities {
        *counts.entry(entity.class).or_insert(0) += 1;
    }
    counts
}

/// Parse a finite float from its textual form
pub fn parse_number(field: &'static str, raw: &str) -> Result<f64, EntityError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(EntityError::InvalidNumber {
            field,
            value: raw.to_string(),
        }),
    }
}

fn required_number(
    attrs: &HashMap<String, String>,
    field: &'static str,
) -> Result<f64, EntityError> {
    let raw = attrs.get(field).ok_or(EntityError::MissingField(field))?;
    parse_number(field, raw)
}

fn optional_number(
    attrs: &HashMap<String, String>,
    field: &'static str,
) -> Result<Option<f64>, EntityError> {
    attrs.get(field).map(|raw| parse_number(field, raw)).transpose()
}

/// Integer fields like the signal bitmask must not carry a fraction
fn optional_integer(
    attrs: &HashMap<String, String>,
    field: &'static str,
) -> Result<Option<i64>, EntityError> {
    attrs
        .get(field)
        .map(|raw| {
            raw.trim()
                .parse::<i64>()
                .map_err(|_| EntityError::InvalidNumber {
                    field,
                    value: raw.to_string(),
                })
        })
        .transpose()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
