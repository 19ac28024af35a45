//! Metric catalogue of a simulated device.
//!
//! The registry fixes, once and for all, which metrics a device reports and
//! which alias each of them travels under. Aliases either come pinned from the
//! catalogue (to line up with an external schema) or are handed out in
//! declaration order, taking the lowest number not already claimed.

use crate::error::{Error, Result};
use crate::generator::SimulationProfile;
use crate::types::{DataType, MetricAlias};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One entry of a metric catalogue, as supplied by configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricConfig {
    /// Identifier of the metric in the external catalogue, if any.
    #[serde(default)]
    pub id: Option<u32>,
    /// Metric name, unique within a device.
    pub name: String,
    /// Pinned alias; assigned automatically when absent.
    #[serde(default)]
    pub alias: Option<u64>,
    /// Declared Sparkplug data type.
    pub data_type: DataType,
    /// Engineering unit.
    pub unit: String,
    /// Human-readable description; derived from name and unit when absent.
    #[serde(default)]
    pub description: Option<String>,
    /// Simulation range and waveform.
    pub profile: SimulationProfile,
}

impl MetricConfig {
    /// Creates a catalogue entry without a pinned alias.
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        unit: impl Into<String>,
        profile: SimulationProfile,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            alias: None,
            data_type,
            unit: unit.into(),
            description: None,
            profile,
        }
    }

    /// Pins the alias.
    pub fn with_alias(mut self, alias: u64) -> Self {
        self.alias = Some(alias);
        self
    }

    /// Sets the catalogue identifier.
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A registered metric with its final alias.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    /// Identifier in the external catalogue, if any.
    pub id: Option<u32>,
    /// Metric name.
    pub name: String,
    /// Alias declared in NBIRTH and used by every NDATA.
    pub alias: MetricAlias,
    /// Declared data type.
    pub datatype: DataType,
    /// Engineering unit.
    pub unit: String,
    /// Human-readable description.
    pub description: String,
    /// Simulation range and waveform.
    pub profile: SimulationProfile,
}

/// Immutable, ordered set of metric definitions for one device.
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    metrics: Vec<MetricDefinition>,
    by_alias: BTreeMap<MetricAlias, usize>,
    by_name: HashMap<String, usize>,
}

impl MetricRegistry {
    /// Builds a registry from catalogue entries in declaration order.
    pub fn new(catalogue: &[MetricConfig]) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(catalogue.len());
        for (index, entry) in catalogue.iter().enumerate() {
            if !entry.data_type.is_simulated() {
                return Err(Error::UnsupportedDataType {
                    name: entry.name.clone(),
                    datatype: entry.data_type,
                });
            }
            entry.profile.validate(&entry.name, entry.data_type)?;
            if by_name.insert(entry.name.clone(), index).is_some() {
                return Err(Error::DuplicateName(entry.name.clone()));
            }
        }

        let aliases = assign_aliases(catalogue)?;

        let mut metrics = Vec::with_capacity(catalogue.len());
        let mut by_alias = BTreeMap::new();
        for (index, (entry, alias)) in catalogue.iter().zip(aliases).enumerate() {
            by_alias.insert(alias, index);
            metrics.push(MetricDefinition {
                id: entry.id,
                name: entry.name.clone(),
                alias,
                datatype: entry.data_type,
                unit: entry.unit.clone(),
                description: entry
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("{} in {}", entry.name, entry.unit)),
                profile: entry.profile.clone(),
            });
        }

        Ok(Self {
            metrics,
            by_alias,
            by_name,
        })
    }

    /// Returns the number of metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Returns true if the registry holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Iterates over the definitions in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, MetricDefinition> {
        self.metrics.iter()
    }

    /// Looks up a metric by alias.
    pub fn by_alias(&self, alias: MetricAlias) -> Option<&MetricDefinition> {
        self.by_alias.get(&alias).map(|&i| &self.metrics[i])
    }

    /// Looks up a metric by name.
    pub fn by_name(&self, name: &str) -> Option<&MetricDefinition> {
        self.by_name.get(name).map(|&i| &self.metrics[i])
    }
}

impl<'a> IntoIterator for &'a MetricRegistry {
    type Item = &'a MetricDefinition;
    type IntoIter = std::slice::Iter<'a, MetricDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.metrics.iter()
    }
}

fn assign_aliases(catalogue: &[MetricConfig]) -> Result<Vec<MetricAlias>> {
    let mut claimed: BTreeMap<MetricAlias, &str> = BTreeMap::new();
    let mut pinned = Vec::with_capacity(catalogue.len());

    for entry in catalogue {
        let Some(raw) = entry.alias else {
            pinned.push(None);
            continue;
        };
        let alias = MetricAlias::try_from(raw).map_err(|alias| Error::InvalidAlias {
            name: entry.name.clone(),
            alias,
        })?;
        if let Some(first) = claimed.insert(alias, &entry.name) {
            return Err(Error::DuplicateAlias {
                alias: raw,
                first: first.to_string(),
                second: entry.name.clone(),
            });
        }
        pinned.push(Some(alias));
    }

    let mut next_free: u64 = 1;
    let mut aliases = Vec::with_capacity(catalogue.len());
    for (entry, pinned) in catalogue.iter().zip(pinned) {
        if let Some(alias) = pinned {
            aliases.push(alias);
            continue;
        }

        let alias = loop {
            let candidate = MetricAlias::try_from(next_free).map_err(|alias| {
                Error::InvalidAlias {
                    name: entry.name.clone(),
                    alias,
                }
            })?;
            next_free += 1;
            if !claimed.contains_key(&candidate) {
                break candidate;
            }
        };
        claimed.insert(alias, &entry.name);
        aliases.push(alias);
    }

    Ok(aliases)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(name: &str) -> MetricConfig {
        MetricConfig::new(name, DataType::Float, "UNIT", SimulationProfile::new(0.0, 1.0))
    }

    #[test]
    fn test_aliases_follow_declaration_order() {
        let registry = MetricRegistry::new(&[metric("A"), metric("B"), metric("C")]).unwrap();
        let aliases: Vec<u8> = registry.iter().map(|m| m.alias.get()).collect();
        assert_eq!(aliases, vec![1, 2, 3]);
    }

    #[test]
    fn test_pinned_aliases_take_precedence() {
        let registry = MetricRegistry::new(&[
            metric("A"),
            metric("B").with_alias(1),
            metric("C"),
            metric("D").with_alias(3),
        ])
        .unwrap();
        let aliases: Vec<u8> = registry.iter().map(|m| m.alias.get()).collect();
        assert_eq!(aliases, vec![2, 1, 4, 3]);
    }

    #[test]
    fn test_duplicate_pinned_alias() {
        let result = MetricRegistry::new(&[metric("A").with_alias(7), metric("B").with_alias(7)]);
        match result {
            Err(Error::DuplicateAlias { alias, first, second }) => {
                assert_eq!(alias, 7);
                assert_eq!(first, "A");
                assert_eq!(second, "B");
            }
            other => panic!("expected DuplicateAlias, got {:?}", other),
        }
    }

    #[test]
    fn test_alias_out_of_range() {
        assert!(matches!(
            MetricRegistry::new(&[metric("A").with_alias(0)]),
            Err(Error::InvalidAlias { alias: 0, .. })
        ));
        assert!(matches!(
            MetricRegistry::new(&[metric("A").with_alias(256)]),
            Err(Error::InvalidAlias { alias: 256, .. })
        ));
    }

    #[test]
    fn test_alias_exhaustion() {
        let catalogue: Vec<MetricConfig> = (0..256).map(|i| metric(&format!("M{}", i))).collect();
        assert!(matches!(
            MetricRegistry::new(&catalogue),
            Err(Error::InvalidAlias { alias: 256, .. })
        ));
        assert!(MetricRegistry::new(&catalogue[..255]).is_ok());
    }

    #[test]
    fn test_duplicate_name() {
        assert!(matches!(
            MetricRegistry::new(&[metric("A"), metric("A")]),
            Err(Error::DuplicateName(name)) if name == "A"
        ));
    }

    #[test]
    fn test_string_metrics_rejected() {
        let entry = MetricConfig::new("Label", DataType::String, "", SimulationProfile::new(0.0, 1.0));
        assert!(matches!(
            MetricRegistry::new(&[entry]),
            Err(Error::UnsupportedDataType { .. })
        ));
    }

    #[test]
    fn test_lookup_and_default_description() {
        let registry = MetricRegistry::new(&[metric("Level").with_alias(9).with_id(1)]).unwrap();
        let by_alias = registry.by_alias(MetricAlias::new(9).unwrap()).unwrap();
        assert_eq!(by_alias.name, "Level");
        assert_eq!(by_alias.id, Some(1));
        assert_eq!(by_alias.description, "Level in UNIT");
        assert!(registry.by_name("Level").is_some());
        assert!(registry.by_name("Missing").is_none());
    }
}
