use super::*;
use std::collections::HashMap;

fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn base_vehicle() -> HashMap<String, String> {
    attrs(&[
        ("id", "veh0"),
        ("x", "12.5"),
        ("y", "40.25"),
        ("angle", "90.00"),
        ("type", "DEFAULT_VEHTYPE"),
        ("speed", "13.89"),
    ])
}

#[test]
fn test_default_vehicle_type_becomes_car() {
    let entity = MovingEntity::from_attributes(RecordKind::Vehicle, &base_vehicle()).unwrap();
    assert_eq!(entity.vehicle_type, "car");
    assert_eq!(entity.id, "veh0");
    assert_eq!(entity.x, 12.5);
    assert_eq!(entity.angle, 90.0);
}

#[test]
fn test_explicit_vehicle_type_kept() {
    let mut raw = base_vehicle();
    raw.insert("type".into(), "bus".into());
    let entity = MovingEntity::from_attributes(RecordKind::Vehicle, &raw).unwrap();
    assert_eq!(entity.vehicle_type, "bus");
}

#[test]
fn test_missing_class_defaults() {
    let vehicle = MovingEntity::from_attributes(RecordKind::Vehicle, &base_vehicle()).unwrap();
    assert_eq!(vehicle.class, VehicleClass::Passenger);

    let person = MovingEntity::from_attributes(RecordKind::Person, &base_vehicle()).unwrap();
    assert_eq!(person.class, VehicleClass::Pedestrian);
}

#[test]
fn test_class_label_mapping() {
    let mut raw = base_vehicle();
    raw.insert("vClass".into(), "bicycle".into());
    let entity = MovingEntity::from_attributes(RecordKind::Vehicle, &raw).unwrap();
    assert_eq!(entity.class, VehicleClass::Bicycle);

    raw.insert("vClass".into(), "truck".into());
    let entity = MovingEntity::from_attributes(RecordKind::Vehicle, &raw).unwrap();
    assert_eq!(entity.class, VehicleClass::Other);
}

#[test]
fn test_missing_color_is_absent_not_black() {
    let entity = MovingEntity::from_attributes(RecordKind::Vehicle, &base_vehicle()).unwrap();
    assert_eq!(entity.color, None);

    let json = serde_json::to_value(&entity).unwrap();
    assert!(json.get("color").is_none());
}

#[test]
fn test_color_parsed() {
    let mut raw = base_vehicle();
    raw.insert("color".into(), "255, 0,128".into());
    let entity = MovingEntity::from_attributes(RecordKind::Vehicle, &raw).unwrap();
    assert_eq!(entity.color, Some(Rgb(255, 0, 128)));

    let json = serde_json::to_value(&entity).unwrap();
    assert_eq!(json["color"], serde_json::json!([255, 0, 128]));
}

#[test]
fn test_bad_color_rejected() {
    let mut raw = base_vehicle();
    raw.insert("color".into(), "red".into());
    let err = MovingEntity::from_attributes(RecordKind::Vehicle, &raw).unwrap_err();
    assert!(matches!(err, EntityError::InvalidColor(_)));

    raw.insert("color".into(), "1,2".into());
    assert!(MovingEntity::from_attributes(RecordKind::Vehicle, &raw).is_err());
}

#[test]
fn test_non_numeric_rejected_not_zeroed() {
    let mut raw = base_vehicle();
    raw.insert("speed".into(), "fast".into());
    let err = MovingEntity::from_attributes(RecordKind::Vehicle, &raw).unwrap_err();
    assert_eq!(
        err,
        EntityError::InvalidNumber {
            field: "speed",
            value: "fast".into()
        }
    );
}

#[test]
fn test_fractional_signals_rejected() {
    let mut raw = base_vehicle();
    raw.insert("signals".into(), "2.9".into());
    assert_eq!(
        MovingEntity::from_attributes(RecordKind::Vehicle, &raw).unwrap_err(),
        EntityError::InvalidNumber {
            field: "signals",
            value: "2.9".into()
        }
    );

    raw.insert("signals".into(), "10".into());
    let entity = MovingEntity::from_attributes(RecordKind::Vehicle, &raw).unwrap();
    assert_eq!(entity.signals, 10);
}

#[test]
fn test_nan_rejected() {
    let mut raw = base_vehicle();
    raw.insert("x".into(), "nan".into());
    assert!(matches!(
        MovingEntity::from_attributes(RecordKind::Vehicle, &raw),
        Err(EntityError::InvalidNumber { field: "x", .. })
    ));
}

#[test]
fn test_negative_speed_rejected() {
    let mut raw = base_vehicle();
    raw.insert("speed".into(), "-1".into());
    assert!(matches!(
        MovingEntity::from_attributes(RecordKind::Vehicle, &raw),
        Err(EntityError::OutOfRange { field: "speed", .. })
    ));
}

#[test]
fn test_missing_required_field() {
    let mut raw = base_vehicle();
    raw.remove("y");
    assert_eq!(
        MovingEntity::from_attributes(RecordKind::Vehicle, &raw).unwrap_err(),
        EntityError::MissingField("y")
    );
}

#[test]
fn test_optional_fields_default() {
    let entity = MovingEntity::from_attributes(RecordKind::Vehicle, &base_vehicle()).unwrap();
    assert_eq!(entity.z, 0.0);
    assert_eq!(entity.length, DEFAULT_LENGTH);
    assert_eq!(entity.width, DEFAULT_WIDTH);
    assert_eq!(entity.signals, 0);
}

#[test]
fn test_rounding() {
    let mut raw = base_vehicle();
    raw.insert("x".into(), "1234.5678901234".into());
    raw.insert("y".into(), "2345.6789012346".into());
    raw.insert("speed".into(), "12.123456789".into());
    raw.insert("angle".into(), "359.002355689".into());
    let entity = MovingEntity::from_attributes(RecordKind::Vehicle, &raw)
        .unwrap()
        .rounded();
    assert_eq!(entity.x, 1234.57);
    assert_eq!(entity.y, 2345.68);
    assert_eq!(entity.speed, 12.0);
    assert_eq!(entity.angle, 359.0);
}

#[test]
fn test_wire_keys() {
    let entity = MovingEntity::from_attributes(RecordKind::Vehicle, &base_vehicle()).unwrap();
    let json = serde_json::to_value(&entity).unwrap();
    assert_eq!(json["type"], "car");
    assert_eq!(json["vClass"], "passenger");
    assert!(json.get("id").is_none());
}

#[test]
fn test_frame_class_counts() {
    let mut bike = base_vehicle();
    bike.insert("id".into(), "bike0".into());
    bike.insert("vClass".into(), "bicycle".into());
    let mut ped = base_vehicle();
    ped.insert("id".into(), "ped0".into());

    let frame = Frame::from_entities(
        1000,
        vec![
            MovingEntity::from_attributes(RecordKind::Vehicle, &base_vehicle()).unwrap(),
            MovingEntity::from_attributes(RecordKind::Vehicle, &bike).unwrap(),
            MovingEntity::from_attributes(RecordKind::Person, &ped).unwrap(),
        ],
    );

    let counts = frame.class_counts();
    assert_eq!(counts.get(&VehicleClass::Passenger), Some(&1));
    assert_eq!(counts.get(&VehicleClass::Bicycle), Some(&1));
    assert_eq!(counts.get(&VehicleClass::Pedestrian), Some(&1));
    assert_eq!(counts.get(&VehicleClass::Other), None);

    let json = serde_json::to_value(&counts).unwrap();
    assert_eq!(json["bicycle"], 1);
}

#[test]
fn test_seconds_to_ms() {
    assert_eq!(seconds_to_ms(0.1), 100);
    assert_eq!(seconds_to_ms(12.0), 12_000);
}
