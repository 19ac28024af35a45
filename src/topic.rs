//! Sparkplug topic parsing and construction.
//!
//! Edge node topics follow the format
//! `{namespace}/{group_id}/{message_type}/{edge_node_id}`, where the namespace
//! is `spBv1.0` unless a deployment overrides it.

use crate::error::{Error, Result};

/// The standard Sparkplug B topic namespace.
pub const DEFAULT_NAMESPACE: &str = "spBv1.0";

/// Node-level Sparkplug message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Node Birth - published when a node comes online
    NBirth,
    /// Node Data - published when node metrics change
    NData,
}

impl MessageType {
    /// Returns the string representation used in MQTT topics.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::NBirth => "NBIRTH",
            MessageType::NData => "NDATA",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NBIRTH" => Ok(MessageType::NBirth),
            "NDATA" => Ok(MessageType::NData),
            _ => Err(Error::InvalidTopic(format!("unknown message type: {}", s))),
        }
    }
}

/// An edge node topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTopic {
    /// The topic namespace.
    pub namespace: String,
    /// The group ID.
    pub group_id: String,
    /// The message type.
    pub message_type: MessageType,
    /// The edge node ID.
    pub edge_node_id: String,
}

impl NodeTopic {
    /// Creates a topic in the given namespace.
    pub fn new(
        namespace: impl Into<String>,
        group_id: impl Into<String>,
        message_type: MessageType,
        edge_node_id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            group_id: group_id.into(),
            message_type,
            edge_node_id: edge_node_id.into(),
        }
    }

    /// Parses an edge node topic string.
    ///
    /// # Examples
    ///
    /// ```
    /// use sparkplug_sim::{MessageType, NodeTopic};
    ///
    /// let topic = NodeTopic::parse("spBv1.0/Water/NDATA/Reservoir01")?;
    /// assert_eq!(topic.message_type, MessageType::NData);
    /// assert_eq!(topic.edge_node_id, "Reservoir01");
    /// # Ok::<(), sparkplug_sim::Error>(())
    /// ```
    pub fn parse(topic: &str) -> Result<Self> {
        let parts: Vec<&str> = topic.split('/').collect();

        if parts.len() != 4 {
            return Err(Error::InvalidTopic(format!(
                "node topic must have 4 parts, got {}",
                parts.len()
            )));
        }

        if let Some(empty) = parts.iter().position(|p| p.is_empty()) {
            return Err(Error::InvalidTopic(format!("topic part {} is empty", empty)));
        }

        Ok(NodeTopic {
            namespace: parts[0].to_string(),
            group_id: parts[1].to_string(),
            message_type: parts[2].parse()?,
            edge_node_id: parts[3].to_string(),
        })
    }

    /// Converts the topic back to a topic string.
    pub fn to_topic_string(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.namespace,
            self.group_id,
            self.message_type.as_str(),
            self.edge_node_id
        )
    }
}

impl std::fmt::Display for NodeTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_topic_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nbirth() {
        let topic = NodeTopic::parse("spBv1.0/Energy/NBIRTH/Gateway01").unwrap();
        assert_eq!(topic.message_type, MessageType::NBirth);
        assert_eq!(topic.namespace, DEFAULT_NAMESPACE);
        assert_eq!(topic.group_id, "Energy");
        assert_eq!(topic.edge_node_id, "Gateway01");
    }

    #[test]
    fn test_parse_custom_namespace() {
        let topic = NodeTopic::parse("tenants2/Water/NDATA/Node1").unwrap();
        assert_eq!(topic.namespace, "tenants2");
        assert_eq!(topic.message_type, MessageType::NData);
    }

    #[test]
    fn test_device_level_topic_rejected() {
        assert!(NodeTopic::parse("spBv1.0/Energy/DDATA/Node1/Sensor01").is_err());
    }

    #[test]
    fn test_unknown_message_type() {
        assert!(NodeTopic::parse("spBv1.0/Energy/STATE/Node1").is_err());
    }

    #[test]
    fn test_to_topic_string() {
        let topic = NodeTopic::new(DEFAULT_NAMESPACE, "Energy", MessageType::NData, "Gateway01");
        assert_eq!(topic.to_topic_string(), "spBv1.0/Energy/NDATA/Gateway01");
    }
}
