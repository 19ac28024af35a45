//! Sparkplug edge node session.
//!
//! A [`DeviceSession`] is the protocol state machine of one simulated edge
//! node. It starts unborn; [`birth`](DeviceSession::birth) declares every
//! metric and moves it to born, after which [`data`](DeviceSession::data)
//! produces alias-keyed updates. Both consume one sequence number.
//!
//! The session performs no I/O. Violations of the birth/data ordering are
//! returned as errors and leave the session untouched.

use crate::error::{Error, Result};
use crate::generator::ValueGenerator;
use crate::payload::{
    now_millis, BirthMetric, BirthPayload, DataMetric, DataPayload, MetricProperties, Payload,
};
use crate::registry::MetricRegistry;
use crate::sequence::SequenceCounter;
use std::time::Instant;

/// Protocol state of one simulated edge node.
///
/// # Example
///
/// ```
/// use sparkplug_sim::{DataType, DeviceSession, MetricConfig, MetricRegistry, SimulationProfile};
///
/// let registry = MetricRegistry::new(&[MetricConfig::new(
///     "WaterLevel",
///     DataType::Float,
///     "CENTIMETER",
///     SimulationProfile::new(0.0, 300.0),
/// )])?;
/// let mut session = DeviceSession::new("Reservoir01", registry, Some(1), 0.0);
///
/// let birth = session.birth()?;
/// assert_eq!(birth.seq(), 0);
/// let data = session.data()?;
/// assert_eq!(data.seq(), 1);
/// # Ok::<(), sparkplug_sim::Error>(())
/// ```
pub struct DeviceSession {
    device_id: String,
    registry: MetricRegistry,
    sequence: SequenceCounter,
    generator: ValueGenerator,
    born: bool,
    start: Instant,
}

impl DeviceSession {
    /// Creates an unborn session.
    ///
    /// `seed` fixes the random perturbation for reproducible runs; `phase`
    /// shifts every waveform of this device.
    pub fn new(
        device_id: impl Into<String>,
        registry: MetricRegistry,
        seed: Option<u64>,
        phase: f64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            registry,
            sequence: SequenceCounter::new(),
            generator: ValueGenerator::new(seed, phase),
            born: false,
            start: Instant::now(),
        }
    }

    /// Returns the device identifier.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the metric registry.
    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Returns true once NBIRTH has been produced.
    pub fn is_born(&self) -> bool {
        self.born
    }

    /// Returns the sequence number the next message will carry.
    pub fn next_seq(&self) -> u8 {
        self.sequence.peek()
    }

    /// Produces the NBIRTH payload declaring every metric.
    ///
    /// Fails with [`Error::AlreadyBorn`] if the session is already born.
    pub fn birth(&mut self) -> Result<Payload> {
        if self.born {
            return Err(Error::AlreadyBorn {
                device_id: self.device_id.clone(),
            });
        }

        let elapsed = self.start.elapsed().as_secs_f64();
        let metrics = self
            .registry
            .iter()
            .map(|metric| BirthMetric {
                name: metric.name.clone(),
                alias: metric.alias,
                value: self.generator.sample_value(metric, elapsed),
                properties: MetricProperties {
                    unit: metric.unit.clone(),
                    description: metric.description.clone(),
                },
            })
            .collect();

        let payload = BirthPayload {
            timestamp: now_millis(),
            seq: self.sequence.next(),
            metrics,
        };
        self.born = true;
        Ok(Payload::Birth(payload))
    }

    /// Produces an NDATA payload with the current value of every metric.
    ///
    /// Fails with [`Error::NotBorn`] before [`birth`](Self::birth).
    pub fn data(&mut self) -> Result<Payload> {
        if !self.born {
            return Err(Error::NotBorn {
                device_id: self.device_id.clone(),
            });
        }

        let elapsed = self.start.elapsed().as_secs_f64();
        let metrics = self
            .registry
            .iter()
            .map(|metric| DataMetric {
                alias: metric.alias,
                value: self.generator.sample_value(metric, elapsed),
            })
            .collect();

        Ok(Payload::Data(DataPayload {
            timestamp: now_millis(),
            seq: self.sequence.next(),
            metrics,
        }))
    }

    /// Returns the session to unborn with a fresh sequence, starting a new epoch.
    ///
    /// The metric registry and waveform start time are kept.
    pub fn reset(&mut self) {
        self.born = false;
        self.sequence = SequenceCounter::new();
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("device_id", &self.device_id)
            .field("metrics", &self.registry.len())
            .field("born", &self.born)
            .field("next_seq", &self.sequence.peek())
            .finish()
    }
}
