//! Mapping configuration loading and validation.

pub mod model;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use model::{MappingSpec, CONTAINS_REL, DEVICE_NODE, HIERARCHY_REL, UNIT_NODE};

/// Template returned for sources that have no saved mapping yet.
pub const DEFAULT_MAPPING: &str = include_str!("default_mapping.toml");

/// Parse and validate a mapping configuration.
pub fn parse(text: &str) -> ConfigResult<MappingSpec> {
    if text.trim().is_empty() {
        return Err(ConfigError::Empty);
    }

    let spec: MappingSpec =
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.message().to_string()))?;
    validate(&spec)?;

    debug!(
        nodes = spec.nodes.len(),
        relationships = spec.relationships.len(),
        slots = spec.roots.slots.len(),
        "Mapping configuration parsed"
    );
    Ok(spec)
}

/// Check the structural requirements a run depends on.
pub fn validate(spec: &MappingSpec) -> ConfigResult<()> {
    for required in [UNIT_NODE, DEVICE_NODE] {
        spec.node(required)?;
    }
    for required in [CONTAINS_REL, HIERARCHY_REL] {
        spec.relationship(required)?;
    }

    for (name, rel) in &spec.relationships {
        if rel.type_name.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "relationship '{}' has an empty type",
                name
            )));
        }
        for end in [&rel.from, &rel.to] {
            if !spec.nodes.contains_key(end) {
                return Err(ConfigError::UnknownNodeReference {
                    relationship: name.clone(),
                    node: end.clone(),
                });
            }
        }
    }

    for (name, node) in &spec.nodes {
        if node.label.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "node type '{}' has an empty label",
                name
            )));
        }
        if node.primary_key_field().is_none() {
            return Err(ConfigError::MissingPrimaryKey {
                node: name.clone(),
                property: node.primary_key.clone(),
            });
        }
        if let Some(rule) = &node.dynamic_label {
            if !node.properties.maps_field(&rule.key_field) {
                return Err(ConfigError::DynamicLabelField {
                    node: name.clone(),
                    field: rule.key_field.clone(),
                });
            }
        }
    }

    if spec.roots.slots.is_empty() {
        return Err(ConfigError::invalid("roots layout defines no slots"));
    }
    for slot in &spec.roots.slots {
        if slot.key_field.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "roots slot '{}' has no key field",
                slot.name
            )));
        }
    }

    if spec.hierarchy.link_field.trim().is_empty()
        || spec.hierarchy.parent_link_field.trim().is_empty()
    {
        return Err(ConfigError::invalid(
            "hierarchy link_field and parent_link_field must both be set",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[nodes.unit]
label = "Unit"
primary_key = "unitId"
source = "UNITS"
[nodes.unit.properties]
unitId = "UNIT_ID"

[nodes.device]
label = "Device"
primary_key = "deviceCode"
source = "DEVICES"
[nodes.device.properties]
deviceCode = "CODE"
typeCode = "TYPE_CODE"
[nodes.device.dynamic_label]
key_field = "TYPE_CODE"
lookup_table = "TYPES"
lookup_key_field = "CODE"
lookup_label_field = "NAME"

[relationships.contains]
type = "CONTAINS"
from = "unit"
to = "device"

[relationships.hierarchy]
type = "CHILD"
from = "device"
to = "device"

[roots]
source = "UNITS"
[[roots.slots]]
name = "a"
key_field = "DEVICE_A"

[hierarchy]
link_field = "ID"
parent_link_field = "PARENT_ID"
"#;

    #[test]
    fn test_default_template_is_valid() {
        let spec = parse(DEFAULT_MAPPING).unwrap();
        let plan = spec.plan().unwrap();
        assert_eq!(plan.unit.label, "Unit");
        assert_eq!(plan.unit_key_field, "UNIT_ID");
        assert_eq!(plan.device_key_field, "CODE");
        assert_eq!(plan.contains_type, "CONTAINS");
        assert_eq!(plan.hierarchy_type, "CHILD");
        assert_eq!(plan.roots.slots.len(), 2);
    }

    #[test]
    fn test_property_order_is_preserved() {
        let spec = parse(DEFAULT_MAPPING).unwrap();
        let device = spec.node("device").unwrap();
        let props: Vec<&str> = device.properties.iter().map(|(p, _)| p).collect();
        assert_eq!(&props[..3], &["deviceCode", "name", "assetNumber"]);
    }

    #[test]
    fn test_missing_node_type() {
        let text = MINIMAL.replace("[nodes.unit]", "[nodes.plant]").replace(
            "[nodes.unit.properties]",
            "[nodes.plant.properties]",
        );
        assert_eq!(
            parse(&text).unwrap_err(),
            ConfigError::MissingNodeType("unit".to_string())
        );
    }

    #[test]
    fn test_missing_relationship() {
        let text = MINIMAL.replace("[relationships.hierarchy]", "[relationships.parent]");
        assert_eq!(
            parse(&text).unwrap_err(),
            ConfigError::MissingRelationship("hierarchy".to_string())
        );
    }

    #[test]
    fn test_dynamic_label_field_must_be_mapped() {
        let text = MINIMAL.replace("key_field = \"TYPE_CODE\"", "key_field = \"KIND\"");
        assert_eq!(
            parse(&text).unwrap_err(),
            ConfigError::DynamicLabelField {
                node: "device".to_string(),
                field: "KIND".to_string(),
            }
        );
    }

    #[test]
    fn test_relationship_must_reference_known_nodes() {
        let text = MINIMAL.replace("to = \"device\"\n\n[relationships.hierarchy]", "to = \"machine\"\n\n[relationships.hierarchy]");
        assert!(matches!(
            parse(&text).unwrap_err(),
            ConfigError::UnknownNodeReference { .. }
        ));
    }

    #[test]
    fn test_primary_key_must_be_mapped() {
        let text = MINIMAL.replace("primary_key = \"unitId\"", "primary_key = \"id\"");
        assert!(matches!(
            parse(&text).unwrap_err(),
            ConfigError::MissingPrimaryKey { .. }
        ));
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert_eq!(parse("  \n").unwrap_err(), ConfigError::Empty);
        assert!(matches!(parse("nodes = 3").unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_roots_need_slots() {
        let text = MINIMAL.replace(
            "[[roots.slots]]\nname = \"a\"\nkey_field = \"DEVICE_A\"\n",
            "",
        );
        assert!(matches!(parse(&text).unwrap_err(), ConfigError::Invalid(_)));
    }
}
