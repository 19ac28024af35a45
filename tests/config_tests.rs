//! Tests for simulator configuration

use sparkplug_sim::{
    BrokerConfig, DataType, DeviceConfig, Encoding, Error, MetricRegistry, RunLimit,
    SimulatorConfig,
};
use std::time::Duration;

const FLEET_JSON: &str = r#"{
    "broker": { "host": "mqtt.example.net", "port": 8883, "qos": 0, "max_reconnect_attempts": null },
    "encoding": "json",
    "run": { "duration_secs": 120 },
    "devices": [
        {
            "device_id": "9d3e50ea-e160-4e59-a98e-6b13f51e5e1f",
            "client_id": "client_9d3e50ea",
            "username": "sensor",
            "password": "secret",
            "group_id": "2",
            "edge_node_id": "9d3e50ea",
            "publish_interval_ms": 5000,
            "seed": 17,
            "location": "Reservoir Monitoring Point A",
            "metrics": [
                {
                    "name": "WaterLevel",
                    "alias": 1,
                    "dataType": "Float",
                    "unit": "CENTIMETER",
                    "profile": { "min": 0.0, "max": 500.0, "base": 150.0, "amplitude": 16.0, "noise": 2.0 }
                },
                {
                    "name": "SignalStrength",
                    "dataType": "Int32",
                    "unit": "DBM",
                    "description": "Received Signal Strength Indicator in dBm",
                    "profile": { "min": -100.0, "max": -30.0 }
                }
            ]
        }
    ]
}"#;

#[test]
fn test_full_config_parses() {
    let config = SimulatorConfig::from_json(FLEET_JSON).unwrap();

    assert_eq!(config.broker.host, "mqtt.example.net");
    assert_eq!(config.broker.port, 8883);
    assert_eq!(config.broker.qos, 0);
    assert_eq!(config.broker.keep_alive(), Duration::from_secs(60));
    assert_eq!(config.broker.max_reconnect_attempts, None);
    assert_eq!(config.encoding, Encoding::Json);
    assert_eq!(config.run.duration(), Some(Duration::from_secs(120)));
    assert_eq!(config.run.max_data_messages, None);

    let device = &config.devices[0];
    assert_eq!(device.client_id(), "client_9d3e50ea");
    assert_eq!(device.username.as_deref(), Some("sensor"));
    assert_eq!(device.seed, Some(17));
    assert!(device.rebirth_on_reconnect);
    assert_eq!(device.metrics.len(), 2);
    assert_eq!(device.metrics[1].data_type, DataType::Int32);
    assert_eq!(device.metrics[0].profile.period_secs, 60.0);
}

#[test]
fn test_config_catalogue_builds_registry() {
    let config = SimulatorConfig::from_json(FLEET_JSON).unwrap();
    let registry = MetricRegistry::new(&config.devices[0].metrics).unwrap();

    let level = registry.by_name("WaterLevel").unwrap();
    let signal = registry.by_name("SignalStrength").unwrap();
    assert_eq!(level.alias.get(), 1);
    assert_eq!(signal.alias.get(), 2);
    assert_eq!(level.description, "WaterLevel in CENTIMETER");
    assert_eq!(signal.profile.base(), -65.0);
}

#[test]
fn test_broker_defaults() {
    let broker = BrokerConfig::default();
    assert_eq!(broker.host, "localhost");
    assert_eq!(broker.port, 1883);
    assert_eq!(broker.keep_alive_secs, 60);
    assert_eq!(broker.qos, 1);
    assert!(broker.validate().is_ok());

    let mut invalid = BrokerConfig::new("localhost", 1883);
    invalid.qos = 3;
    assert!(invalid.validate().is_err());
}

#[test]
fn test_run_limits() {
    assert!(RunLimit::unbounded().is_unbounded());
    assert!(!RunLimit::messages(10).is_unbounded());
    assert_eq!(
        RunLimit::for_duration(Duration::from_secs(30)).duration(),
        Some(Duration::from_secs(30))
    );
}

#[test]
fn test_device_builder() {
    let device = DeviceConfig::new("d1", "Water", "Node1")
        .with_client_id("client_d1")
        .with_credentials("user", "pass")
        .with_interval(Duration::from_millis(250))
        .with_seed(3)
        .with_phase(1.0)
        .with_location("Tank 3");

    assert_eq!(device.client_id(), "client_d1");
    assert_eq!(device.password.as_deref(), Some("pass"));
    assert_eq!(device.publish_interval(), Duration::from_millis(250));
    assert_eq!(device.seed, Some(3));
    assert_eq!(device.location.as_deref(), Some("Tank 3"));
    assert!(device.validate().is_ok());
}

#[test]
fn test_demo_fleet() {
    let config = SimulatorConfig::water_level_demo();
    assert!(config.validate().is_ok());
    assert!(config.run.is_unbounded());

    let ids: Vec<&str> = config.devices.iter().map(|d| d.edge_node_id.as_str()).collect();
    assert_eq!(ids, vec!["9d3e50ea", "0cabc4cb"]);

    for device in &config.devices {
        let registry = MetricRegistry::new(&device.metrics).unwrap();
        let aliases: Vec<u8> = registry.iter().map(|m| m.alias.get()).collect();
        assert_eq!(aliases, vec![1, 3, 4]);
    }
}

#[test]
fn test_invalid_configs() {
    let no_devices = r#"{ "devices": [] }"#;
    assert!(matches!(SimulatorConfig::from_json(no_devices), Err(Error::Config(_))));

    let zero_interval = r#"{ "devices": [
        { "device_id": "d1", "group_id": "G", "edge_node_id": "N", "publish_interval_ms": 0 }
    ] }"#;
    assert!(SimulatorConfig::from_json(zero_interval).is_err());

    let shared_client = r#"{ "devices": [
        { "device_id": "d1", "client_id": "c", "group_id": "G", "edge_node_id": "N1" },
        { "device_id": "d2", "client_id": "c", "group_id": "G", "edge_node_id": "N2" }
    ] }"#;
    assert!(SimulatorConfig::from_json(shared_client).is_err());

    assert!(matches!(SimulatorConfig::from_json("{"), Err(Error::Json(_))));
}

#[test]
fn test_missing_file() {
    let result = SimulatorConfig::from_file("/nonexistent/simulator.json");
    assert!(matches!(result, Err(Error::Io(_))));
}
