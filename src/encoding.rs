//! Payload serialization.
//!
//! Two renderings of the same Sparkplug structure are supported:
//!
//! - [`Encoding::Protobuf`]: the standard Sparkplug B binary form.
//! - [`Encoding::Json`]: the JSON form consumed by water-level dashboards,
//!   with `dataType` names and `properties` keyed by
//!   `"Engineering Units"` and `"Description"`.
//!
//! Birth metrics are rendered with name and properties, data metrics with
//! alias, timestamp, type and value only. Encoding is deterministic.

use crate::error::{Error, Result};
use crate::payload::{
    BirthMetric, BirthPayload, DataMetric, DataPayload, MetricProperties, Payload, PayloadKind,
};
use crate::proto;
use crate::types::{DataType, MetricAlias, MetricValue};
use prost::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Property key carrying the engineering unit.
pub const PROPERTY_UNIT: &str = "Engineering Units";
/// Property key carrying the description.
pub const PROPERTY_DESCRIPTION: &str = "Description";

/// Wire format for payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Sparkplug B protobuf
    #[default]
    Protobuf,
    /// JSON rendering of the Sparkplug structure
    Json,
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "protobuf" | "proto" => Ok(Encoding::Protobuf),
            "json" => Ok(Encoding::Json),
            other => Err(Error::Config(format!("unknown encoding: {}", other))),
        }
    }
}

/// Serializes payloads to bytes and back.
#[derive(Debug, Clone, Copy, Default)]
pub struct Encoder {
    encoding: Encoding,
}

impl Encoder {
    /// Creates an encoder for the given wire format.
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    /// Returns the wire format.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Serializes a payload.
    pub fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        match self.encoding {
            Encoding::Protobuf => {
                let message = to_proto(payload);
                let mut buf = Vec::with_capacity(message.encoded_len());
                message.encode(&mut buf)?;
                Ok(buf)
            }
            Encoding::Json => Ok(serde_json::to_vec(&to_json(payload))?),
        }
    }

    /// Parses bytes produced by [`encode`](Self::encode).
    ///
    /// The kind comes from the topic the message arrived on.
    pub fn decode(&self, kind: PayloadKind, bytes: &[u8]) -> Result<Payload> {
        match self.encoding {
            Encoding::Protobuf => from_proto(kind, proto::Payload::decode(bytes)?),
            Encoding::Json => from_json(kind, serde_json::from_slice(bytes)?),
        }
    }
}

fn malformed(details: impl Into<String>) -> Error {
    Error::MalformedPayload(details.into())
}

fn parse_alias(raw: u64) -> Result<MetricAlias> {
    MetricAlias::try_from(raw).map_err(|alias| malformed(format!("invalid alias {}", alias)))
}

fn parse_seq(raw: u64) -> Result<u8> {
    u8::try_from(raw).map_err(|_| malformed(format!("sequence number {} exceeds 255", raw)))
}

// ===== Protobuf =====

fn to_proto(payload: &Payload) -> proto::Payload {
    let timestamp = payload.timestamp();
    let metrics = match payload {
        Payload::Birth(birth) => birth
            .metrics
            .iter()
            .map(|m| proto::Metric {
                name: Some(m.name.clone()),
                alias: Some(m.alias.into()),
                timestamp: Some(timestamp),
                datatype: Some(m.datatype() as u32),
                is_null: None,
                properties: Some(proto_properties(&m.properties)),
                value: Some(wire_value(&m.value)),
            })
            .collect(),
        Payload::Data(data) => data
            .metrics
            .iter()
            .map(|m| proto::Metric {
                name: None,
                alias: Some(m.alias.into()),
                timestamp: Some(timestamp),
                datatype: Some(m.datatype() as u32),
                is_null: None,
                properties: None,
                value: Some(wire_value(&m.value)),
            })
            .collect(),
    };

    proto::Payload {
        timestamp: Some(timestamp),
        metrics,
        seq: Some(payload.seq() as u64),
        uuid: None,
    }
}

fn proto_properties(properties: &MetricProperties) -> proto::PropertySet {
    let string = |s: &str| proto::PropertyValue {
        r#type: Some(DataType::String as u32),
        is_null: None,
        value: Some(proto::property_value::Value::StringValue(s.to_string())),
    };
    proto::PropertySet {
        keys: vec![PROPERTY_UNIT.to_string(), PROPERTY_DESCRIPTION.to_string()],
        values: vec![string(&properties.unit), string(&properties.description)],
    }
}

// Signed types narrower than 64 bits travel sign-extended in `int_value`.
fn wire_value(value: &MetricValue) -> proto::metric::Value {
    use proto::metric::Value;
    match *value {
        MetricValue::Int8(v) => Value::IntValue(v as i32 as u32),
        MetricValue::Int16(v) => Value::IntValue(v as i32 as u32),
        MetricValue::Int32(v) => Value::IntValue(v as u32),
        MetricValue::Int64(v) => Value::LongValue(v as u64),
        MetricValue::UInt8(v) => Value::IntValue(v as u32),
        MetricValue::UInt16(v) => Value::IntValue(v as u32),
        MetricValue::UInt32(v) => Value::IntValue(v),
        MetricValue::UInt64(v) => Value::LongValue(v),
        MetricValue::Float(v) => Value::FloatValue(v),
        MetricValue::Double(v) => Value::DoubleValue(v),
        MetricValue::Boolean(v) => Value::BooleanValue(v),
    }
}

fn value_from_wire(datatype: DataType, value: Option<&proto::metric::Value>) -> Result<MetricValue> {
    use proto::metric::Value;
    let typed = match (datatype, value) {
        (DataType::Int8, Some(Value::IntValue(v))) => MetricValue::Int8(*v as i32 as i8),
        (DataType::Int16, Some(Value::IntValue(v))) => MetricValue::Int16(*v as i32 as i16),
        (DataType::Int32, Some(Value::IntValue(v))) => MetricValue::Int32(*v as i32),
        (DataType::Int64, Some(Value::LongValue(v))) => MetricValue::Int64(*v as i64),
        (DataType::UInt8, Some(Value::IntValue(v))) => MetricValue::UInt8(*v as u8),
        (DataType::UInt16, Some(Value::IntValue(v))) => MetricValue::UInt16(*v as u16),
        (DataType::UInt32, Some(Value::IntValue(v))) => MetricValue::UInt32(*v),
        (DataType::UInt64, Some(Value::LongValue(v))) => MetricValue::UInt64(*v),
        (DataType::Float, Some(Value::FloatValue(v))) => MetricValue::Float(*v),
        (DataType::Double, Some(Value::DoubleValue(v))) => MetricValue::Double(*v),
        (DataType::Boolean, Some(Value::BooleanValue(v))) => MetricValue::Boolean(*v),
        (datatype, value) => {
            return Err(malformed(format!(
                "value {:?} does not match datatype {}",
                value, datatype
            )))
        }
    };
    Ok(typed)
}

fn properties_from_proto(name: &str, set: Option<&proto::PropertySet>) -> Result<MetricProperties> {
    let set = set.ok_or_else(|| malformed(format!("birth metric '{}' has no properties", name)))?;
    let lookup = |key: &str| -> Result<String> {
        let index = set
            .keys
            .iter()
            .position(|k| k == key)
            .ok_or_else(|| malformed(format!("metric '{}' is missing property '{}'", name, key)))?;
        match set.values.get(index).and_then(|v| v.value.as_ref()) {
            Some(proto::property_value::Value::StringValue(s)) => Ok(s.clone()),
            _ => Err(malformed(format!(
                "property '{}' of metric '{}' is not a string",
                key, name
            ))),
        }
    };

    Ok(MetricProperties {
        unit: lookup(PROPERTY_UNIT)?,
        description: lookup(PROPERTY_DESCRIPTION)?,
    })
}

fn from_proto(kind: PayloadKind, message: proto::Payload) -> Result<Payload> {
    let timestamp = message
        .timestamp
        .ok_or_else(|| malformed("payload has no timestamp"))?;
    let seq = parse_seq(message.seq.ok_or_else(|| malformed("payload has no seq"))?)?;

    let mut decoded = Vec::with_capacity(message.metrics.len());
    for metric in &message.metrics {
        let alias = parse_alias(
            metric
                .alias
                .ok_or_else(|| malformed("metric has no alias"))?,
        )?;
        let datatype = DataType::from(
            metric
                .datatype
                .ok_or_else(|| malformed(format!("metric {} has no datatype", alias)))?,
        );
        let value = value_from_wire(datatype, metric.value.as_ref())?;
        decoded.push((alias, metric, value));
    }

    let payload = match kind {
        PayloadKind::Birth => {
            let metrics = decoded
                .into_iter()
                .map(|(alias, metric, value)| {
                    let name = metric
                        .name
                        .clone()
                        .ok_or_else(|| malformed(format!("birth metric {} has no name", alias)))?;
                    let properties = properties_from_proto(&name, metric.properties.as_ref())?;
                    Ok(BirthMetric {
                        name,
                        alias,
                        value,
                        properties,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Payload::Birth(BirthPayload {
                timestamp,
                seq,
                metrics,
            })
        }
        PayloadKind::Data => {
            let metrics = decoded
                .into_iter()
                .map(|(alias, metric, value)| {
                    if metric.name.is_some() || metric.properties.is_some() {
                        return Err(malformed(format!(
                            "data metric {} carries a name or properties",
                            alias
                        )));
                    }
                    Ok(DataMetric { alias, value })
                })
                .collect::<Result<Vec<_>>>()?;
            Payload::Data(DataPayload {
                timestamp,
                seq,
                metrics,
            })
        }
    };
    Ok(payload)
}

// ===== JSON =====

#[derive(Debug, Serialize, Deserialize)]
struct JsonPayload {
    timestamp: u64,
    metrics: Vec<JsonMetric>,
    seq: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonMetric {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    alias: u64,
    timestamp: u64,
    data_type: DataType,
    value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<BTreeMap<String, JsonProperty>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonProperty {
    #[serde(rename = "type")]
    kind: DataType,
    value: String,
}

fn to_json(payload: &Payload) -> JsonPayload {
    let timestamp = payload.timestamp();
    let metrics = match payload {
        Payload::Birth(birth) => birth
            .metrics
            .iter()
            .map(|m| {
                let mut properties = BTreeMap::new();
                properties.insert(
                    PROPERTY_UNIT.to_string(),
                    JsonProperty {
                        kind: DataType::String,
                        value: m.properties.unit.clone(),
                    },
                );
                properties.insert(
                    PROPERTY_DESCRIPTION.to_string(),
                    JsonProperty {
                        kind: DataType::String,
                        value: m.properties.description.clone(),
                    },
                );
                JsonMetric {
                    name: Some(m.name.clone()),
                    alias: m.alias.into(),
                    timestamp,
                    data_type: m.datatype(),
                    value: json_value(&m.value),
                    properties: Some(properties),
                }
            })
            .collect(),
        Payload::Data(data) => data
            .metrics
            .iter()
            .map(|m| JsonMetric {
                name: None,
                alias: m.alias.into(),
                timestamp,
                data_type: m.datatype(),
                value: json_value(&m.value),
                properties: None,
            })
            .collect(),
    };

    JsonPayload {
        timestamp,
        metrics,
        seq: payload.seq() as u64,
    }
}

fn json_value(value: &MetricValue) -> serde_json::Value {
    use serde_json::Value;
    match *value {
        MetricValue::Int8(v) => Value::from(v),
        MetricValue::Int16(v) => Value::from(v),
        MetricValue::Int32(v) => Value::from(v),
        MetricValue::Int64(v) => Value::from(v),
        MetricValue::UInt8(v) => Value::from(v),
        MetricValue::UInt16(v) => Value::from(v),
        MetricValue::UInt32(v) => Value::from(v),
        MetricValue::UInt64(v) => Value::from(v),
        // Shortest decimal form, so 3.7f32 renders as 3.7 rather than 3.700000047683716.
        MetricValue::Float(v) => v
            .to_string()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        MetricValue::Double(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        MetricValue::Boolean(v) => Value::Bool(v),
    }
}

fn value_from_json(datatype: DataType, value: &serde_json::Value) -> Result<MetricValue> {
    let mismatch = || malformed(format!("value {} does not match datatype {}", value, datatype));
    let signed = || value.as_i64().ok_or_else(mismatch);
    let unsigned = || value.as_u64().ok_or_else(mismatch);

    let typed = match datatype {
        DataType::Int8 => MetricValue::Int8(i8::try_from(signed()?).map_err(|_| mismatch())?),
        DataType::Int16 => MetricValue::Int16(i16::try_from(signed()?).map_err(|_| mismatch())?),
        DataType::Int32 => MetricValue::Int32(i32::try_from(signed()?).map_err(|_| mismatch())?),
        DataType::Int64 => MetricValue::Int64(signed()?),
        DataType::UInt8 => MetricValue::UInt8(u8::try_from(unsigned()?).map_err(|_| mismatch())?),
        DataType::UInt16 => {
            MetricValue::UInt16(u16::try_from(unsigned()?).map_err(|_| mismatch())?)
        }
        DataType::UInt32 => {
            MetricValue::UInt32(u32::try_from(unsigned()?).map_err(|_| mismatch())?)
        }
        DataType::UInt64 => MetricValue::UInt64(unsigned()?),
        DataType::Float => MetricValue::Float(value.as_f64().ok_or_else(mismatch)? as f32),
        DataType::Double => MetricValue::Double(value.as_f64().ok_or_else(mismatch)?),
        DataType::Boolean => MetricValue::Boolean(value.as_bool().ok_or_else(mismatch)?),
        _ => return Err(mismatch()),
    };
    Ok(typed)
}

fn from_json(kind: PayloadKind, message: JsonPayload) -> Result<Payload> {
    let timestamp = message.timestamp;
    let seq = parse_seq(message.seq)?;

    let payload = match kind {
        PayloadKind::Birth => {
            let metrics = message
                .metrics
                .into_iter()
                .map(|m| {
                    let alias = parse_alias(m.alias)?;
                    let value = value_from_json(m.data_type, &m.value)?;
                    let name = m
                        .name
                        .ok_or_else(|| malformed(format!("birth metric {} has no name", alias)))?;
                    let mut properties = m.properties.ok_or_else(|| {
                        malformed(format!("birth metric '{}' has no properties", name))
                    })?;
                    let mut take = |key: &str| {
                        properties.remove(key).map(|p| p.value).ok_or_else(|| {
                            malformed(format!("metric '{}' is missing property '{}'", name, key))
                        })
                    };
                    let unit = take(PROPERTY_UNIT)?;
                    let description = take(PROPERTY_DESCRIPTION)?;
                    Ok(BirthMetric {
                        name,
                        alias,
                        value,
                        properties: MetricProperties { unit, description },
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Payload::Birth(BirthPayload {
                timestamp,
                seq,
                metrics,
            })
        }
        PayloadKind::Data => {
            let metrics = message
                .metrics
                .into_iter()
                .map(|m| {
                    let alias = parse_alias(m.alias)?;
                    if m.name.is_some() || m.properties.is_some() {
                        return Err(malformed(format!(
                            "data metric {} carries a name or properties",
                            alias
                        )));
                    }
                    let value = value_from_json(m.data_type, &m.value)?;
                    Ok(DataMetric { alias, value })
                })
                .collect::<Result<Vec<_>>>()?;
            Payload::Data(DataPayload {
                timestamp,
                seq,
                metrics,
            })
        }
    };
    Ok(payload)
}
