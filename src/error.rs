//! Error types for the Sparkplug simulator.

use crate::types::DataType;
use thiserror::Error;

/// Result type alias for simulator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while building, running or encoding device sessions.
#[derive(Error, Debug)]
pub enum Error {
    /// Two metrics of one device were configured with the same alias.
    #[error("Duplicate alias {alias}: claimed by '{first}' and '{second}'")]
    DuplicateAlias {
        /// The contested alias
        alias: u64,
        /// Metric that claimed the alias first
        first: String,
        /// Metric that attempted to claim it again
        second: String,
    },

    /// Two metrics of one device share a name.
    #[error("Duplicate metric name: {0}")]
    DuplicateName(String),

    /// An alias outside the 1-255 range, or no alias left to assign.
    #[error("Invalid alias {alias} for metric '{name}' (must be 1-255)")]
    InvalidAlias {
        /// The metric being registered
        name: String,
        /// The offending alias
        alias: u64,
    },

    /// A simulation range that cannot be sampled.
    #[error("Invalid range for metric '{name}': [{min}, {max}]")]
    InvalidRange {
        /// The metric being registered
        name: String,
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },

    /// The data type cannot be produced by the value generator.
    #[error("Metric '{name}' has unsupported data type {datatype:?}")]
    UnsupportedDataType {
        /// The metric being registered
        name: String,
        /// The declared data type
        datatype: DataType,
    },

    /// `data()` was called before `birth()`.
    #[error("Device '{device_id}' has not published NBIRTH yet")]
    NotBorn {
        /// The device session
        device_id: String,
    },

    /// `birth()` was called twice without a reset.
    #[error("Device '{device_id}' has already published NBIRTH")]
    AlreadyBorn {
        /// The device session
        device_id: String,
    },

    /// Failed to connect to MQTT broker.
    #[error("Failed to connect to broker: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message.
    #[error("Failed to publish {message_type}: {details}")]
    PublishFailed {
        /// The type of message that failed to publish
        message_type: &'static str,
        /// Additional details about the failure
        details: String,
    },

    /// Failed to serialize a payload to protobuf.
    #[error("Failed to serialize payload: {0}")]
    Encode(#[from] prost::EncodeError),

    /// Failed to parse a protobuf payload.
    #[error("Failed to parse payload: {0}")]
    Decode(#[from] prost::DecodeError),

    /// JSON serialization or parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A decoded payload violates the birth/data structure.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// A topic string could not be parsed.
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// Configuration is incomplete or inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `start()` was called on an orchestrator that is already running devices.
    #[error("Orchestrator is already running")]
    AlreadyRunning,
}
