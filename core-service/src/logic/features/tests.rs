//! Contract tests for raw feature validation.

use serde_json::{json, Map, Value};

use super::{validate, RawFeatures, FEATURE_COUNT, FEATURE_LAYOUT};
use crate::error::ContractError;

fn full_map() -> Map<String, Value> {
    FEATURE_LAYOUT
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_string(), json!(i as f64 * 0.5)))
        .collect()
}

#[test]
fn test_named_mapping_is_ordered_by_layout() {
    let vector = validate(&RawFeatures::Named(full_map())).unwrap();

    for (i, &v) in vector.as_slice().iter().enumerate() {
        assert_eq!(v, i as f64 * 0.5);
    }
}

#[test]
fn test_missing_field_is_reported() {
    let mut map = full_map();
    map.remove("soil_moisture");

    match validate(&RawFeatures::Named(map)) {
        Err(ContractError::MissingField { field }) => assert_eq!(field, "soil_moisture"),
        other => panic!("expected MissingField, got {:?}", other),
    }
}

#[test]
fn test_non_numeric_values_are_rejected() {
    for bad in [json!("12"), json!(true), json!(null), json!([1.0]), json!({"v": 1})] {
        let mut map = full_map();
        map.insert("humidity".to_string(), bad.clone());

        match validate(&RawFeatures::Named(map)) {
            Err(ContractError::InvalidValue { field, .. }) => assert_eq!(field, "humidity"),
            other => panic!("expected InvalidValue for {}, got {:?}", bad, other),
        }
    }
}

#[test]
fn test_integers_are_numeric() {
    let mut map = full_map();
    map.insert("month".to_string(), json!(7));

    let vector = validate(&RawFeatures::Named(map)).unwrap();
    assert_eq!(vector.get("month"), Some(7.0));
}

#[test]
fn test_extra_fields_are_ignored() {
    let mut map = full_map();
    map.insert("latitude".to_string(), json!(10.0));

    assert!(validate(&RawFeatures::Named(map)).is_ok());
}

#[test]
fn test_ordered_sequence() {
    let values: Vec<f64> = (0..FEATURE_COUNT).map(|i| i as f64).collect();
    let vector = validate(&RawFeatures::from_ordered(&values)).unwrap();
    assert_eq!(vector.get("avg_disaster_severity"), Some((FEATURE_COUNT - 1) as f64));
}

#[test]
fn test_ordered_sequence_shape_mismatch() {
    let values = vec![1.0; FEATURE_COUNT - 1];

    assert_eq!(
        validate(&RawFeatures::from_ordered(&values)),
        Err(ContractError::Shape { expected: FEATURE_COUNT, actual: FEATURE_COUNT - 1 })
    );
}

#[test]
fn test_non_finite_number_is_rejected() {
    let mut values = vec![0.0; FEATURE_COUNT];
    values[0] = f64::INFINITY;

    match validate(&RawFeatures::from_ordered(&values)) {
        Err(ContractError::InvalidValue { field, .. }) => assert_eq!(field, "temperature"),
        other => panic!("expected InvalidValue, got {:?}", other),
    }
}

#[test]
fn test_untagged_deserialization() {
    let named: RawFeatures = serde_json::from_value(json!({"temperature": 1.0})).unwrap();
    assert!(matches!(named, RawFeatures::Named(_)));

    let ordered: RawFeatures = serde_json::from_value(json!([1.0, 2.0])).unwrap();
    assert!(matches!(ordered, RawFeatures::Ordered(_)));
}
