//! Common types for the Sparkplug API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sparkplug data types.
///
/// Discriminants are the datatype codes carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum DataType {
    /// Unknown or unsupported type
    Unknown = 0,
    /// Signed 8-bit integer
    Int8 = 1,
    /// Signed 16-bit integer
    Int16 = 2,
    /// Signed 32-bit integer
    Int32 = 3,
    /// Signed 64-bit integer
    Int64 = 4,
    /// Unsigned 8-bit integer
    UInt8 = 5,
    /// Unsigned 16-bit integer
    UInt16 = 6,
    /// Unsigned 32-bit integer
    UInt32 = 7,
    /// Unsigned 64-bit integer
    UInt64 = 8,
    /// 32-bit floating point
    Float = 9,
    /// 64-bit floating point
    Double = 10,
    /// Boolean value
    Boolean = 11,
    /// String value
    String = 12,
    /// DateTime value
    DateTime = 13,
    /// Text value
    Text = 14,
}

impl DataType {
    /// Returns the name used for this type in JSON payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Unknown => "Unknown",
            DataType::Int8 => "Int8",
            DataType::Int16 => "Int16",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::UInt8 => "UInt8",
            DataType::UInt16 => "UInt16",
            DataType::UInt32 => "UInt32",
            DataType::UInt64 => "UInt64",
            DataType::Float => "Float",
            DataType::Double => "Double",
            DataType::Boolean => "Boolean",
            DataType::String => "String",
            DataType::DateTime => "DateTime",
            DataType::Text => "Text",
        }
    }

    /// Returns true if values of this type are whole numbers.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    /// Returns true if the value generator can produce values of this type.
    pub fn is_simulated(&self) -> bool {
        self.is_integer() || matches!(self, DataType::Float | DataType::Double | DataType::Boolean)
    }

    /// The representable range of an integer type, as floats.
    pub(crate) fn integer_bounds(&self) -> Option<(f64, f64)> {
        let bounds = match self {
            DataType::Int8 => (i8::MIN as f64, i8::MAX as f64),
            DataType::Int16 => (i16::MIN as f64, i16::MAX as f64),
            DataType::Int32 => (i32::MIN as f64, i32::MAX as f64),
            DataType::Int64 => (i64::MIN as f64, i64::MAX as f64),
            DataType::UInt8 => (0.0, u8::MAX as f64),
            DataType::UInt16 => (0.0, u16::MAX as f64),
            DataType::UInt32 => (0.0, u32::MAX as f64),
            DataType::UInt64 => (0.0, u64::MAX as f64),
            _ => return None,
        };
        Some(bounds)
    }
}

impl From<u32> for DataType {
    fn from(code: u32) -> Self {
        match code {
            1 => DataType::Int8,
            2 => DataType::Int16,
            3 => DataType::Int32,
            4 => DataType::Int64,
            5 => DataType::UInt8,
            6 => DataType::UInt16,
            7 => DataType::UInt32,
            8 => DataType::UInt64,
            9 => DataType::Float,
            10 => DataType::Double,
            11 => DataType::Boolean,
            12 => DataType::String,
            13 => DataType::DateTime,
            14 => DataType::Text,
            _ => DataType::Unknown,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric value type.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Signed 8-bit integer value
    Int8(i8),
    /// Signed 16-bit integer value
    Int16(i16),
    /// Signed 32-bit integer value
    Int32(i32),
    /// Signed 64-bit integer value
    Int64(i64),
    /// Unsigned 8-bit integer value
    UInt8(u8),
    /// Unsigned 16-bit integer value
    UInt16(u16),
    /// Unsigned 32-bit integer value
    UInt32(u32),
    /// Unsigned 64-bit integer value
    UInt64(u64),
    /// 32-bit floating point value
    Float(f32),
    /// 64-bit floating point value
    Double(f64),
    /// Boolean value
    Boolean(bool),
}

impl MetricValue {
    /// Returns the Sparkplug data type matching this value.
    pub fn datatype(&self) -> DataType {
        match self {
            MetricValue::Int8(_) => DataType::Int8,
            MetricValue::Int16(_) => DataType::Int16,
            MetricValue::Int32(_) => DataType::Int32,
            MetricValue::Int64(_) => DataType::Int64,
            MetricValue::UInt8(_) => DataType::UInt8,
            MetricValue::UInt16(_) => DataType::UInt16,
            MetricValue::UInt32(_) => DataType::UInt32,
            MetricValue::UInt64(_) => DataType::UInt64,
            MetricValue::Float(_) => DataType::Float,
            MetricValue::Double(_) => DataType::Double,
            MetricValue::Boolean(_) => DataType::Boolean,
        }
    }

    /// Returns the value widened to `f64` (booleans map to 0 and 1).
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Int8(v) => v as f64,
            MetricValue::Int16(v) => v as f64,
            MetricValue::Int32(v) => v as f64,
            MetricValue::Int64(v) => v as f64,
            MetricValue::UInt8(v) => v as f64,
            MetricValue::UInt16(v) => v as f64,
            MetricValue::UInt32(v) => v as f64,
            MetricValue::UInt64(v) => v as f64,
            MetricValue::Float(v) => v as f64,
            MetricValue::Double(v) => v,
            MetricValue::Boolean(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Numeric alias standing in for a metric name in NDATA messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricAlias(u8);

impl MetricAlias {
    /// Creates an alias, rejecting 0 (reserved as "no alias").
    pub fn new(alias: u8) -> Option<Self> {
        if alias == 0 {
            None
        } else {
            Some(Self(alias))
        }
    }

    /// Returns the raw alias.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<MetricAlias> for u64 {
    fn from(alias: MetricAlias) -> u64 {
        alias.0 as u64
    }
}

impl TryFrom<u64> for MetricAlias {
    type Error = u64;

    fn try_from(raw: u64) -> std::result::Result<Self, u64> {
        u8::try_from(raw)
            .ok()
            .and_then(MetricAlias::new)
            .ok_or(raw)
    }
}

impl fmt::Display for MetricAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
