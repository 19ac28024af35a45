//! Sparkplug payloads produced by a device session.
//!
//! A payload is either an NBIRTH, which declares every metric with its name,
//! alias and metadata, or an NDATA, which only carries alias-keyed values.
//! The two shapes are separate types so a data metric cannot carry a name or
//! properties by construction.

use crate::topic::MessageType;
use crate::types::{DataType, MetricAlias, MetricValue};

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Which kind of message a payload is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// NBIRTH: full metric declaration.
    Birth,
    /// NDATA: alias-keyed values.
    Data,
}

impl PayloadKind {
    /// The node-level message type this kind is published as.
    pub fn message_type(&self) -> MessageType {
        match self {
            PayloadKind::Birth => MessageType::NBirth,
            PayloadKind::Data => MessageType::NData,
        }
    }
}

/// Descriptive properties attached to every metric in a birth.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricProperties {
    /// Engineering unit.
    pub unit: String,
    /// Human-readable description.
    pub description: String,
}

/// A metric as declared in NBIRTH.
#[derive(Debug, Clone, PartialEq)]
pub struct BirthMetric {
    /// Metric name
    pub name: String,
    /// Alias used by subsequent NDATA messages
    pub alias: MetricAlias,
    /// Current value; its variant fixes the declared data type
    pub value: MetricValue,
    /// Unit and description
    pub properties: MetricProperties,
}

impl BirthMetric {
    /// Declared data type.
    pub fn datatype(&self) -> DataType {
        self.value.datatype()
    }
}

/// A metric update in NDATA.
#[derive(Debug, Clone, PartialEq)]
pub struct DataMetric {
    /// Alias declared in the preceding NBIRTH
    pub alias: MetricAlias,
    /// Current value
    pub value: MetricValue,
}

impl DataMetric {
    /// Declared data type.
    pub fn datatype(&self) -> DataType {
        self.value.datatype()
    }
}

/// NBIRTH contents.
#[derive(Debug, Clone, PartialEq)]
pub struct BirthPayload {
    /// Milliseconds since the Unix epoch at construction
    pub timestamp: u64,
    /// Sequence number
    pub seq: u8,
    /// Every metric of the device, in declaration order
    pub metrics: Vec<BirthMetric>,
}

/// NDATA contents.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPayload {
    /// Milliseconds since the Unix epoch at construction
    pub timestamp: u64,
    /// Sequence number
    pub seq: u8,
    /// Metric updates, in declaration order
    pub metrics: Vec<DataMetric>,
}

/// One outgoing Sparkplug message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// NBIRTH
    Birth(BirthPayload),
    /// NDATA
    Data(DataPayload),
}

impl Payload {
    /// Returns the payload kind.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Birth(_) => PayloadKind::Birth,
            Payload::Data(_) => PayloadKind::Data,
        }
    }

    /// Returns the sequence number.
    pub fn seq(&self) -> u8 {
        match self {
            Payload::Birth(p) => p.seq,
            Payload::Data(p) => p.seq,
        }
    }

    /// Returns the payload timestamp in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        match self {
            Payload::Birth(p) => p.timestamp,
            Payload::Data(p) => p.timestamp,
        }
    }

    /// Returns the number of metrics in the payload.
    pub fn metric_count(&self) -> usize {
        match self {
            Payload::Birth(p) => p.metrics.len(),
            Payload::Data(p) => p.metrics.len(),
        }
    }

    /// Returns `(alias, value)` pairs in payload order.
    pub fn values(&self) -> Vec<(MetricAlias, &MetricValue)> {
        match self {
            Payload::Birth(p) => p.metrics.iter().map(|m| (m.alias, &m.value)).collect(),
            Payload::Data(p) => p.metrics.iter().map(|m| (m.alias, &m.value)).collect(),
        }
    }

    /// Returns the birth contents, if this is an NBIRTH.
    pub fn as_birth(&self) -> Option<&BirthPayload> {
        match self {
            Payload::Birth(p) => Some(p),
            Payload::Data(_) => None,
        }
    }

    /// Returns the data contents, if this is an NDATA.
    pub fn as_data(&self) -> Option<&DataPayload> {
        match self {
            Payload::Data(p) => Some(p),
            Payload::Birth(_) => None,
        }
    }
}
