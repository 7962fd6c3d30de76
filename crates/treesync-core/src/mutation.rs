//! Typed graph mutation operations.
//!
//! Both variants have MERGE semantics keyed on `(label, pk_property,
//! pk_value)`, so applying the same operation twice is a no-op.

use serde::Serialize;

use crate::value::PropertyValue;

/// One idempotent graph write, generated by the extractor or walker and
/// consumed once by the batcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op")]
pub enum MutationOp {
    /// Create the node if absent, then add `extra_labels` and overwrite
    /// `properties` (a null value removes the property).
    MergeNode {
        label: String,
        extra_labels: Vec<String>,
        pk_property: String,
        pk_value: String,
        properties: Vec<(String, PropertyValue)>,
    },
    /// Create the relationship if absent. Missing endpoints are merged with
    /// only their primary key set.
    MergeEdge {
        from_label: String,
        from_pk_property: String,
        from_pk_value: String,
        to_label: String,
        to_pk_property: String,
        to_pk_value: String,
        rel_type: String,
    },
}

impl MutationOp {
    pub fn is_node(&self) -> bool {
        matches!(self, MutationOp::MergeNode { .. })
    }

    pub fn is_edge(&self) -> bool {
        matches!(self, MutationOp::MergeEdge { .. })
    }

    /// Short human-readable description for log lines.
    pub fn describe(&self) -> String {
        match self {
            MutationOp::MergeNode {
                label,
                extra_labels,
                pk_property,
                pk_value,
                ..
            } => {
                let mut labels = label.clone();
                for extra in extra_labels {
                    labels.push(':');
                    labels.push_str(extra);
                }
                format!("MERGE (:{} {{{}: {}}})", labels, pk_property, pk_value)
            }
            MutationOp::MergeEdge {
                from_label,
                from_pk_value,
                to_label,
                to_pk_value,
                rel_type,
                ..
            } => format!(
                "MERGE (:{} {{{}}})-[:{}]->(:{} {{{}}})",
                from_label, from_pk_value, rel_type, to_label, to_pk_value
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_node_and_edge() {
        let node = MutationOp::MergeNode {
            label: "Device".into(),
            extra_labels: vec!["Pump".into()],
            pk_property: "deviceCode".into(),
            pk_value: "D1".into(),
            properties: vec![],
        };
        assert!(node.is_node());
        assert_eq!(node.describe(), "MERGE (:Device:Pump {deviceCode: D1})");

        let edge = MutationOp::MergeEdge {
            from_label: "Unit".into(),
            from_pk_property: "unitId".into(),
            from_pk_value: "U1".into(),
            to_label: "Device".into(),
            to_pk_property: "deviceCode".into(),
            to_pk_value: "D1".into(),
            rel_type: "CONTAINS".into(),
        };
        assert!(edge.is_edge());
        assert_eq!(edge.describe(), "MERGE (:Unit {U1})-[:CONTAINS]->(:Device {D1})");
    }
}
