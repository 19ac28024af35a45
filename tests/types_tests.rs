//! Tests for data types, values and aliases

use sparkplug_sim::{DataType, MetricAlias, MetricValue};

#[test]
fn test_datatype_codes() {
    assert_eq!(DataType::Int8 as u32, 1);
    assert_eq!(DataType::Int32 as u32, 3);
    assert_eq!(DataType::UInt64 as u32, 8);
    assert_eq!(DataType::Float as u32, 9);
    assert_eq!(DataType::Double as u32, 10);
    assert_eq!(DataType::Boolean as u32, 11);
    assert_eq!(DataType::String as u32, 12);
}

#[test]
fn test_datatype_from_code() {
    for datatype in [
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::UInt8,
        DataType::UInt16,
        DataType::UInt32,
        DataType::UInt64,
        DataType::Float,
        DataType::Double,
        DataType::Boolean,
    ] {
        assert_eq!(DataType::from(datatype as u32), datatype);
        assert!(datatype.is_simulated(), "{} should be simulated", datatype);
    }
    assert_eq!(DataType::from(999), DataType::Unknown);
}

#[test]
fn test_simulated_types() {
    assert!(!DataType::String.is_simulated());
    assert!(!DataType::Unknown.is_simulated());
    assert!(DataType::Int32.is_integer());
    assert!(!DataType::Float.is_integer());
}

#[test]
fn test_value_datatype() {
    assert_eq!(MetricValue::Float(1.5).datatype(), DataType::Float);
    assert_eq!(MetricValue::Int32(-70).datatype(), DataType::Int32);
    assert_eq!(MetricValue::Boolean(false).datatype(), DataType::Boolean);
}

#[test]
fn test_value_as_f64() {
    assert_eq!(MetricValue::Int32(-70).as_f64(), -70.0);
    assert_eq!(MetricValue::UInt64(42).as_f64(), 42.0);
    assert_eq!(MetricValue::Boolean(true).as_f64(), 1.0);
    assert_eq!(MetricValue::Float(0.5).as_f64(), 0.5);
}

#[test]
fn test_alias_range() {
    assert!(MetricAlias::new(0).is_none());
    assert_eq!(MetricAlias::new(1).unwrap().get(), 1);
    assert_eq!(MetricAlias::new(255).unwrap().get(), 255);

    assert!(MetricAlias::try_from(0u64).is_err());
    assert_eq!(MetricAlias::try_from(256u64), Err(256));
    assert_eq!(u64::from(MetricAlias::try_from(17u64).unwrap()), 17);
}

#[test]
fn test_datatype_serde_names() {
    assert_eq!(serde_json::to_string(&DataType::Int32).unwrap(), "\"Int32\"");
    let parsed: DataType = serde_json::from_str("\"Float\"").unwrap();
    assert_eq!(parsed, DataType::Float);
}
