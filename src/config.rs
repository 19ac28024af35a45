//! Simulator configuration.
//!
//! Configuration is plain data: it is loaded once (from JSON or built in
//! code) and handed to each component at construction. Nothing in the crate
//! reads configuration from global state.

use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::generator::SimulationProfile;
use crate::registry::MetricConfig;
use crate::topic::{MessageType, NodeTopic, DEFAULT_NAMESPACE};
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::{PI, TAU};
use std::path::Path;
use std::time::Duration;

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_metrics() -> Vec<MetricConfig> {
    water_level_catalogue(150.0, 20.0, 2.0 * PI * 75.0)
}

/// MQTT broker connection settings shared by all devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// MQTT keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// QoS for published messages (0, 1 or 2).
    pub qos: u8,
    /// Consecutive failed connection attempts before a device gives up;
    /// `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Pause after a failed connection attempt or publish, in milliseconds.
    pub reconnect_backoff_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            keep_alive_secs: 60,
            qos: 1,
            max_reconnect_attempts: Some(10),
            reconnect_backoff_ms: 1_000,
        }
    }
}

impl BrokerConfig {
    /// Creates broker settings with default keep-alive, QoS and reconnect policy.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Keep-alive interval.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Pause after a failure.
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    /// Checks the settings.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config("broker host is empty".to_string()));
        }
        if self.qos > 2 {
            return Err(Error::Config(format!("invalid QoS {}", self.qos)));
        }
        if self.keep_alive_secs == 0 {
            return Err(Error::Config("keep-alive must be positive".to_string()));
        }
        Ok(())
    }
}

/// Identity, addressing and simulation settings of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Opaque device identifier.
    pub device_id: String,
    /// MQTT client identifier; the device id when absent.
    #[serde(default)]
    pub client_id: Option<String>,
    /// MQTT user name.
    #[serde(default)]
    pub username: Option<String>,
    /// MQTT password.
    #[serde(default)]
    pub password: Option<String>,
    /// Topic namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Sparkplug group (tenant) identifier.
    pub group_id: String,
    /// Sparkplug edge node identifier.
    pub edge_node_id: String,
    /// Explicit NBIRTH topic, overriding the Sparkplug layout.
    #[serde(default)]
    pub birth_topic: Option<String>,
    /// Explicit NDATA topic, overriding the Sparkplug layout.
    #[serde(default)]
    pub data_topic: Option<String>,
    /// Interval between NDATA messages in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub publish_interval_ms: u64,
    /// Seed for the value generator; OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Waveform phase offset in radians.
    #[serde(default)]
    pub phase: f64,
    /// Free-form deployment location, used in logs.
    #[serde(default)]
    pub location: Option<String>,
    /// Re-publish NBIRTH with a fresh sequence after the transport reconnects.
    #[serde(default = "default_true")]
    pub rebirth_on_reconnect: bool,
    /// Metric catalogue, in declaration order.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricConfig>,
}

impl DeviceConfig {
    /// Creates a device with the water-level catalogue and a 5 second interval.
    pub fn new(
        device_id: impl Into<String>,
        group_id: impl Into<String>,
        edge_node_id: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            client_id: None,
            username: None,
            password: None,
            namespace: default_namespace(),
            group_id: group_id.into(),
            edge_node_id: edge_node_id.into(),
            birth_topic: None,
            data_topic: None,
            publish_interval_ms: default_interval_ms(),
            seed: None,
            phase: 0.0,
            location: None,
            rebirth_on_reconnect: true,
            metrics: default_metrics(),
        }
    }

    /// Sets the MQTT client identifier.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets MQTT credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Overrides the birth and data topics.
    pub fn with_topics(mut self, birth: impl Into<String>, data: impl Into<String>) -> Self {
        self.birth_topic = Some(birth.into());
        self.data_topic = Some(data.into());
        self
    }

    /// Sets the publish interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.publish_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Fixes the value generator seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the waveform phase offset.
    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    /// Sets the deployment location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Replaces the metric catalogue.
    pub fn with_metrics(mut self, metrics: Vec<MetricConfig>) -> Self {
        self.metrics = metrics;
        self
    }

    /// MQTT client identifier.
    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(&self.device_id)
    }

    /// Interval between NDATA messages.
    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    /// Sparkplug topic of the given node message type.
    pub fn node_topic(&self, message_type: MessageType) -> NodeTopic {
        NodeTopic::new(&self.namespace, &self.group_id, message_type, &self.edge_node_id)
    }

    /// Topic NBIRTH is published on.
    pub fn birth_topic(&self) -> String {
        self.birth_topic
            .clone()
            .unwrap_or_else(|| self.node_topic(MessageType::NBirth).to_topic_string())
    }

    /// Topic NDATA is published on.
    pub fn data_topic(&self) -> String {
        self.data_topic
            .clone()
            .unwrap_or_else(|| self.node_topic(MessageType::NData).to_topic_string())
    }

    /// Checks identity and addressing. The metric catalogue is checked when
    /// the device's registry is built.
    pub fn validate(&self) -> Result<()> {
        if self.device_id.is_empty() {
            return Err(Error::Config("device id is empty".to_string()));
        }
        for (field, value) in [
            ("namespace", &self.namespace),
            ("group_id", &self.group_id),
            ("edge_node_id", &self.edge_node_id),
        ] {
            if value.is_empty() || value.contains(|c: char| matches!(c, '/' | '+' | '#')) {
                return Err(Error::Config(format!(
                    "device '{}': invalid {} '{}'",
                    self.device_id, field, value
                )));
            }
        }
        if self.publish_interval_ms == 0 {
            return Err(Error::Config(format!(
                "device '{}': publish interval must be positive",
                self.device_id
            )));
        }
        Ok(())
    }
}

/// How long a simulation runs. Both limits absent means until stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLimit {
    /// Wall-clock duration per device, in seconds.
    pub duration_secs: Option<u64>,
    /// Number of NDATA messages per device.
    pub max_data_messages: Option<u64>,
}

impl RunLimit {
    /// Runs until stopped.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Stops each device after `duration`.
    pub fn for_duration(duration: Duration) -> Self {
        Self {
            duration_secs: Some(duration.as_secs()),
            max_data_messages: None,
        }
    }

    /// Stops each device after `count` NDATA messages.
    pub fn messages(count: u64) -> Self {
        Self {
            duration_secs: None,
            max_data_messages: Some(count),
        }
    }

    /// Wall-clock limit.
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    /// Returns true if neither limit is set.
    pub fn is_unbounded(&self) -> bool {
        self.duration_secs.is_none() && self.max_data_messages.is_none()
    }
}

/// Complete simulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Broker connection settings.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Payload wire format.
    #[serde(default)]
    pub encoding: Encoding,
    /// Run length.
    #[serde(default)]
    pub run: RunLimit,
    /// Simulated devices.
    pub devices: Vec<DeviceConfig>,
}

impl SimulatorConfig {
    /// Loads configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the broker and every device, and that devices do not collide.
    pub fn validate(&self) -> Result<()> {
        self.broker.validate()?;
        if self.devices.is_empty() {
            return Err(Error::Config("no devices configured".to_string()));
        }

        let mut device_ids = HashSet::new();
        let mut client_ids = HashSet::new();
        for device in &self.devices {
            device.validate()?;
            if !device_ids.insert(device.device_id.as_str()) {
                return Err(Error::Config(format!("duplicate device id '{}'", device.device_id)));
            }
            if !client_ids.insert(device.client_id()) {
                return Err(Error::Config(format!(
                    "duplicate MQTT client id '{}'",
                    device.client_id()
                )));
            }
        }
        Ok(())
    }

    /// Two reservoir water-level devices with distinct waveforms and intervals.
    pub fn water_level_demo() -> Self {
        let sites = [
            ("9d3e50ea-e160-4e59-a98e-6b13f51e5e1f", "9d3e50ea", "Reservoir Monitoring Point A", 150.0, 5),
            ("0cabc4cb-9092-48ec-80bf-63392a3b73b9", "0cabc4cb", "Reservoir Monitoring Point B", 200.0, 7),
        ];

        let devices = sites
            .iter()
            .enumerate()
            .map(|(i, &(device_id, short_id, location, base_level_cm, interval_secs))| {
                let index = (i + 1) as f64;
                let variation_cm = (20.0 + 5.0 * index) * 0.8;
                let period_secs = TAU * (60.0 + 15.0 * index);
                let mut metrics = water_level_catalogue(base_level_cm, variation_cm, period_secs);
                // Each site sees a slightly different battery and radio environment.
                metrics[1].profile = metrics[1].profile.clone().with_base(3.65 + 0.1 * index);
                metrics[2].profile = metrics[2].profile.clone().with_base(-72.5 + 5.0 * index);

                DeviceConfig::new(device_id, "2", short_id)
                    .with_client_id(format!("client_{}", short_id))
                    .with_location(location)
                    .with_interval(Duration::from_secs(interval_secs))
                    .with_phase(index * PI / 3.0)
                    .with_metrics(metrics)
            })
            .collect();

        Self {
            broker: BrokerConfig::default(),
            encoding: Encoding::default(),
            run: RunLimit::unbounded(),
            devices,
        }
    }
}

/// The water-level sensor catalogue: level, battery voltage and signal strength.
///
/// Catalogue ids, aliases, units and types match the `iot_metric_definitions`
/// table the simulated devices report into.
pub fn water_level_catalogue(base_level_cm: f64, variation_cm: f64, period_secs: f64) -> Vec<MetricConfig> {
    vec![
        MetricConfig::new(
            "WaterLevel",
            DataType::Float,
            "CENTIMETER",
            SimulationProfile::new(0.0, 500.0)
                .with_base(base_level_cm)
                .with_wave(variation_cm, period_secs)
                .with_noise(2.0),
        )
        .with_id(1)
        .with_alias(1)
        .with_description("Water level measurement in centimeters"),
        MetricConfig::new(
            "BatteryVoltage",
            DataType::Float,
            "VOLT",
            SimulationProfile::new(3.0, 4.2).with_base(3.65).with_noise(0.45),
        )
        .with_id(3)
        .with_alias(3)
        .with_description("Battery voltage in volts"),
        MetricConfig::new(
            "SignalStrength",
            DataType::Int32,
            "DBM",
            SimulationProfile::new(-100.0, -30.0).with_base(-67.5).with_noise(12.5),
        )
        .with_id(4)
        .with_alias(4)
        .with_description("Received Signal Strength Indicator in dBm"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_config_is_valid() {
        let config = SimulatorConfig::water_level_demo();
        assert!(config.validate().is_ok());
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[1].publish_interval(), Duration::from_secs(7));
        assert_eq!(config.devices[0].client_id(), "client_9d3e50ea");
    }

    #[test]
    fn test_minimal_json_gets_defaults() {
        let config = SimulatorConfig::from_json(
            r#"{ "devices": [ { "device_id": "d1", "group_id": "Water", "edge_node_id": "Node1" } ] }"#,
        )
        .unwrap();

        assert_eq!(config.broker, BrokerConfig::default());
        assert_eq!(config.encoding, Encoding::Protobuf);
        assert!(config.run.is_unbounded());

        let device = &config.devices[0];
        assert_eq!(device.client_id(), "d1");
        assert_eq!(device.metrics.len(), 3);
        assert_eq!(device.birth_topic(), "spBv1.0/Water/NBIRTH/Node1");
        assert_eq!(device.data_topic(), "spBv1.0/Water/NDATA/Node1");
    }

    #[test]
    fn test_duplicate_device_ids_rejected() {
        let mut config = SimulatorConfig::water_level_demo();
        config.devices[1].device_id = config.devices[0].device_id.clone();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_wildcards_in_group_rejected() {
        let device = DeviceConfig::new("d1", "Water/+", "Node1");
        assert!(device.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let device = DeviceConfig::new("d1", "Water", "Node1").with_interval(Duration::ZERO);
        assert!(device.validate().is_err());
    }
}
