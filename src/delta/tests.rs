use super::*;
use crate::entity::{MovingEntity, TrafficSignal, VehicleClass};
use serde_json::json;
use std::collections::HashMap;

fn entity(id: &str, x: f64, speed: f64) -> MovingEntity {
    MovingEntity {
        id: id.to_string(),
        x,
        y: 10.0,
        z: 0.0,
        speed,
        angle: 90.0,
        vehicle_type: "car".to_string(),
        class: VehicleClass::Passenger,
        length: 4.5,
        width: 1.8,
        signals: 0,
        color: None,
    }
}

fn mapping(entities: Vec<MovingEntity>) -> HashMap<String, MovingEntity> {
    entities.into_iter().map(|e| (e.id.clone(), e)).collect()
}

#[test]
fn test_diff_of_identical_mappings_is_empty() {
    let a = mapping(vec![entity("veh0", 1.0, 5.0), entity("veh1", 2.0, 7.0)]);
    assert!(diff(&a, &a).is_empty());

    let empty: HashMap<String, MovingEntity> = HashMap::new();
    assert!(diff(&empty, &empty).is_empty());
}

#[test]
fn test_speed_change_resends_full_entity_only_for_that_id() {
    let previous = mapping(vec![entity("veh0", 1.0, 5.0), entity("veh1", 2.0, 7.0)]);
    let current = mapping(vec![entity("veh0", 1.0, 6.0), entity("veh1", 2.0, 7.0)]);

    let delta = diff(&previous, &current);
    assert_eq!(delta.len(), 1);
    assert_eq!(
        delta.get("veh0"),
        Some(&Change::Upsert(entity("veh0", 1.0, 6.0)))
    );
    assert!(delta.get("veh1").is_none());
}

#[test]
fn test_creation_and_removal() {
    let previous = mapping(vec![entity("obj2", 2.0, 0.0)]);
    let current = mapping(vec![entity("obj1", 1.0, 0.0)]);

    let delta = diff(&previous, &current);
    assert_eq!(delta.len(), 2);
    assert!(matches!(delta.get("obj1"), Some(Change::Upsert(_))));
    assert_eq!(delta.get("obj2"), Some(&Change::Tombstone));
    assert_eq!(delta.tombstones().collect::<Vec<_>>(), vec!["obj2"]);
}

#[test]
fn test_every_removed_id_is_tombstoned() {
    let previous = mapping((0..20).map(|i| entity(&format!("veh{i}"), i as f64, 1.0)).collect());
    let current = mapping((0..20).step_by(2).map(|i| entity(&format!("veh{i}"), i as f64, 1.0)).collect());

    let delta = diff(&previous, &current);
    for i in (1..20).step_by(2) {
        assert_eq!(delta.get(&format!("veh{i}")), Some(&Change::Tombstone));
    }
    assert_eq!(delta.len(), 10);
}

#[test]
fn test_diff_does_not_mutate_inputs() {
    let previous = mapping(vec![entity("veh0", 1.0, 5.0)]);
    let current = mapping(vec![entity("veh1", 1.0, 5.0)]);
    let (p, c) = (previous.clone(), current.clone());

    let _ = diff(&previous, &current);
    assert_eq!(previous, p);
    assert_eq!(current, c);
}

#[test]
fn test_sequential_application_reconstructs_each_state() {
    let a = mapping(vec![entity("veh0", 0.0, 1.0), entity("veh1", 0.0, 1.0)]);
    let b = mapping(vec![entity("veh0", 1.0, 1.0), entity("veh2", 0.0, 2.0)]);
    let c = mapping(vec![entity("veh2", 3.0, 2.0), entity("veh3", 0.0, 0.0)]);

    let mut client = a.clone();
    diff(&a, &b).apply(&mut client);
    assert_eq!(client, b);
    diff(&b, &c).apply(&mut client);
    assert_eq!(client, c);

    let mut direct = a.clone();
    diff(&a, &c).apply(&mut direct);
    assert_eq!(direct, client);
}

#[test]
fn test_signal_diff() {
    let light = |phase| TrafficSignal {
        id: "tl0".to_string(),
        phase,
        program_id: "0".to_string(),
    };
    let previous: HashMap<_, _> = [("tl0".to_string(), light(1))].into();
    let current: HashMap<_, _> = [("tl0".to_string(), light(2))].into();

    let delta = diff(&previous, &current);
    assert_eq!(
        serde_json::to_value(&delta).unwrap(),
        json!({"tl0": {"phase": 2, "programID": "0"}})
    );
}

#[test]
fn test_wire_encoding_uses_null_tombstones() {
    let previous = mapping(vec![entity("gone", 0.0, 0.0)]);
    let current = mapping(vec![entity("veh0", 1.5, 3.0)]);

    let value = serde_json::to_value(diff(&previous, &current)).unwrap();
    assert_eq!(value["gone"], serde_json::Value::Null);
    assert_eq!(value["veh0"]["x"], 1.5);
    assert_eq!(value["veh0"]["speed"], 3.0);
    assert_eq!(value["veh0"]["type"], "car");
}
