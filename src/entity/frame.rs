use super::{class_counts, MovingEntity, TrafficSignal, VehicleClass};
use std::collections::{BTreeMap, HashMap};

/// Per-lane occupancy distributions for one recorded timestep (one row per lane)
pub type LaneDistributions = Vec<Vec<f64>>;

/// Full authoritative state at one simulated tick
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    /// Simulated time in milliseconds, non-decreasing across a session
    pub time_ms: u64,

    /// Moving entities keyed by id
    pub vehicles: HashMap<String, MovingEntity>,

    /// Traffic signals keyed by id; `None` when the source does not report signals
    pub lights: Option<HashMap<String, TrafficSignal>>,

    /// Recorded lane occupancy paired with this timestep, if any
    pub lane_distributions: Option<LaneDistributions>,
}

impl Frame {
    /// Build a frame from an entity list, keying by id
    pub fn from_entities(time_ms: u64, entities: impl IntoIterator<Item = MovingEntity>) -> Self {
        Self {
            time_ms,
            vehicles: entities
                .into_iter()
                .map(|entity| (entity.id.clone(), entity))
                .collect(),
            lights: None,
            lane_distributions: None,
        }
    }

    /// Entity-class counts derived from the moving-entity mapping
    pub fn class_counts(&self) -> BTreeMap<VehicleClass, u64> {
        class_counts(self.vehicles.values())
    }
}

/// Convert simulated seconds to whole milliseconds
pub fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds * 1000.0).round().max(0.0) as u64
}
