//! Mapping configuration models.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::{ConfigError, ConfigResult};

/// Node type holding the parent entity of each roots row.
pub const UNIT_NODE: &str = "unit";
/// Node type of the self-referencing hierarchy members.
pub const DEVICE_NODE: &str = "device";
/// Relationship from a unit to the devices listed on its roots row.
pub const CONTAINS_REL: &str = "contains";
/// Relationship from a device to each of its children.
pub const HIERARCHY_REL: &str = "hierarchy";

/// Parsed mapping configuration for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSpec {
    pub nodes: BTreeMap<String, NodeType>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipType>,
    pub roots: RootsLayout,
    pub hierarchy: HierarchyLinks,
}

/// How rows of one table become nodes of one label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    pub label: String,
    /// Output property used as the MERGE key.
    pub primary_key: String,
    pub source: String,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub dynamic_label: Option<DynamicLabelRule>,
}

impl NodeType {
    /// Source column feeding the primary-key property.
    pub fn primary_key_field(&self) -> Option<&str> {
        self.properties.field_for(&self.primary_key)
    }
}

/// Extra label looked up per row: `row[key_field]` is matched against
/// `lookup_table.lookup_key_field` and `lookup_label_field` is the label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DynamicLabelRule {
    pub key_field: String,
    pub lookup_table: String,
    pub lookup_key_field: String,
    pub lookup_label_field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationshipType {
    #[serde(rename = "type")]
    pub type_name: String,
    pub from: String,
    pub to: String,
}

/// Layout of the roots source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootsLayout {
    pub source: String,
    /// Raw SQL replacing the plain table scan.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub slots: Vec<RootSlot>,
}

/// One child position on a roots row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootSlot {
    pub name: String,
    pub key_field: String,
    /// Device properties taken straight from the roots row.
    #[serde(default)]
    pub properties: PropertyMap,
}

/// Self-referencing link columns of the detail table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HierarchyLinks {
    pub link_field: String,
    pub parent_link_field: String,
}

/// Everything a run needs, resolved from a validated [`MappingSpec`].
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub unit: NodeType,
    pub unit_key_field: String,
    pub device: NodeType,
    pub device_key_field: String,
    pub contains_type: String,
    pub hierarchy_type: String,
    pub roots: RootsLayout,
    pub links: HierarchyLinks,
}

impl MappingSpec {
    pub fn node(&self, name: &str) -> ConfigResult<&NodeType> {
        self.nodes
            .get(name)
            .ok_or_else(|| ConfigError::MissingNodeType(name.to_string()))
    }

    pub fn relationship(&self, name: &str) -> ConfigResult<&RelationshipType> {
        self.relationships
            .get(name)
            .ok_or_else(|| ConfigError::MissingRelationship(name.to_string()))
    }

    /// Resolve the node and relationship types a run works with.
    pub fn plan(&self) -> ConfigResult<SyncPlan> {
        let unit = self.node(UNIT_NODE)?;
        let device = self.node(DEVICE_NODE)?;
        let unit_key_field = key_field(UNIT_NODE, unit)?;
        let device_key_field = key_field(DEVICE_NODE, device)?;

        Ok(SyncPlan {
            unit: unit.clone(),
            unit_key_field,
            device: device.clone(),
            device_key_field,
            contains_type: self.relationship(CONTAINS_REL)?.type_name.clone(),
            hierarchy_type: self.relationship(HIERARCHY_REL)?.type_name.clone(),
            roots: self.roots.clone(),
            links: self.hierarchy.clone(),
        })
    }
}

fn key_field(name: &str, node: &NodeType) -> ConfigResult<String> {
    node.primary_key_field()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingPrimaryKey {
            node: name.to_string(),
            property: node.primary_key.clone(),
        })
}

/// Ordered mapping of output property name to source field name.
///
/// Keeps document order so node properties are written in the order the
/// mapping lists them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap(Vec<(String, String)>);

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping. Returns `false` if the property was already mapped.
    pub fn insert(&mut self, property: impl Into<String>, field: impl Into<String>) -> bool {
        let property = property.into();
        if self.0.iter().any(|(p, _)| *p == property) {
            return false;
        }
        self.0.push((property, field.into()));
        true
    }

    pub fn field_for(&self, property: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, f)| f.as_str())
    }

    /// Whether any property reads from `field` (ASCII case-insensitive).
    pub fn maps_field(&self, field: &str) -> bool {
        self.0.iter().any(|(_, f)| f.eq_ignore_ascii_case(field))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, f)| (p.as_str(), f.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<P: Into<String>, F: Into<String>> FromIterator<(P, F)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (P, F)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (property, field) in iter {
            map.insert(property, field);
        }
        map
    }
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (property, field) in &self.0 {
            map.serialize_entry(property, field)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PropertyMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PropertyMapVisitor;

        impl<'de> Visitor<'de> for PropertyMapVisitor {
            type Value = PropertyMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of property = \"SOURCE_FIELD\" entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PropertyMap, A::Error> {
                let mut map = PropertyMap::new();
                let mut seen = HashSet::new();
                while let Some((property, field)) = access.next_entry::<String, String>()? {
                    if !seen.insert(property.clone()) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate property '{}'",
                            property
                        )));
                    }
                    map.insert(property, field);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(PropertyMapVisitor)
    }
}
