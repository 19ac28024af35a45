//! Sparkplug B 2.2 edge node simulator.
//!
//! This library simulates fleets of battery-powered water-level sensors that
//! report over MQTT as Sparkplug B edge nodes. Every simulated device runs
//! its own protocol session: one NBIRTH declaring the metric catalogue, then
//! a steady stream of alias-keyed NDATA updates with a strictly increasing
//! (mod 256) sequence number.
//!
//! # Features
//!
//! - **Protocol-correct sessions**: birth-before-data and sequence continuity
//!   are enforced by [`DeviceSession`], violations are returned as errors
//! - **Deterministic aliases**: [`MetricRegistry`] assigns stable 1-255 aliases
//! - **Realistic values**: sine waveform plus bounded noise, clamped to range
//! - **Two wire formats**: Sparkplug B protobuf or the equivalent JSON
//! - **Isolated devices**: one thread per device, failures stay local
//!
//! # Architecture
//!
//! - [`MetricRegistry`]: metric catalogue with alias assignment
//! - [`ValueGenerator`]: simulated readings per [`SimulationProfile`]
//! - [`DeviceSession`]: the NBIRTH/NDATA state machine, no I/O
//! - [`Encoder`]: payload serialization
//! - [`Transport`] / [`Connector`]: the broker connection, [`MqttConnector`] in production
//! - [`Orchestrator`]: runs many devices concurrently
//!
//! # Example: single session
//!
//! ```
//! use sparkplug_sim::{DeviceSession, Encoder, Encoding, MetricRegistry, water_level_catalogue};
//!
//! # fn main() -> Result<(), sparkplug_sim::Error> {
//! let registry = MetricRegistry::new(&water_level_catalogue(150.0, 20.0, 300.0))?;
//! let mut session = DeviceSession::new("9d3e50ea", registry, Some(7), 0.0);
//! let encoder = Encoder::new(Encoding::Protobuf);
//!
//! let birth = session.birth()?;
//! let bytes = encoder.encode(&birth)?;
//! assert!(!bytes.is_empty());
//!
//! let data = session.data()?;
//! assert_eq!(data.seq(), 1);
//! assert_eq!(data.metric_count(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! # Example: device fleet
//!
//! ```no_run
//! use sparkplug_sim::{MqttConnector, Orchestrator, SimulatorConfig};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), sparkplug_sim::Error> {
//! let config = SimulatorConfig::from_file("simulator.json")?;
//!
//! let mut orchestrator = Orchestrator::from_config(&config, MqttConnector::new());
//! orchestrator.start(config.devices.clone())?;
//!
//! std::thread::sleep(Duration::from_secs(60));
//!
//! for report in orchestrator.stop() {
//!     println!("{} {} published={}", report.device_id, report.state, report.published);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod encoding;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod payload;
#[allow(missing_docs)]
pub mod proto;
pub mod publisher;
pub mod registry;
pub mod sequence;
pub mod session;
pub mod topic;
pub mod types;

pub use config::{water_level_catalogue, BrokerConfig, DeviceConfig, RunLimit, SimulatorConfig};
pub use encoding::{Encoder, Encoding};
pub use error::{Error, Result};
pub use generator::{SimulationProfile, ValueGenerator};
pub use orchestrator::{DeviceReport, DeviceState, Orchestrator, Shutdown};
pub use payload::{
    BirthMetric, BirthPayload, DataMetric, DataPayload, MetricProperties, Payload, PayloadKind,
};
pub use publisher::{Connector, LinkEvent, MqttConnector, MqttPublisher, Transport};
pub use registry::{MetricConfig, MetricDefinition, MetricRegistry};
pub use sequence::SequenceCounter;
pub use session::DeviceSession;
pub use topic::{MessageType, NodeTopic, DEFAULT_NAMESPACE};
pub use types::{DataType, MetricAlias, MetricValue};
