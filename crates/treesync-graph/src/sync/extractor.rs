//! First layer of the graph: units and the devices attached to them.
//!
//! Each roots row holds one unit and, per configured slot, the natural key
//! of a directly attached device plus a few of its columns. The devices
//! found here seed the hierarchy walk.

use futures::StreamExt;
use std::collections::HashSet;
use treesync_core::{MutationOp, NodeType, PropertyMap, PropertyValue, Row, SyncPlan};
use treesync_source::RelationalReader;

use super::batcher::MutationBatcher;
use super::error::SyncError;
use super::logger::RunLogger;

/// Device keys discovered from the roots, in first-seen order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Frontier {
    keys: Vec<String>,
    seen: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the key was already present.
    pub fn insert(&mut self, key: String) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.keys.push(key);
        true
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn into_keys(self) -> Vec<String> {
        self.keys
    }
}

/// Result of the roots stage.
#[derive(Debug, Default)]
pub struct RootsExtraction {
    pub rows: usize,
    pub frontier: Frontier,
}

/// What one roots row produced.
#[derive(Debug, Default)]
pub struct RowExtraction {
    pub ops: Vec<MutationOp>,
    pub children: Vec<String>,
    pub warnings: Vec<String>,
}

/// Mapped properties present in `row`, primary key excluded.
///
/// The key is written by the MERGE itself as a string, so a numeric key
/// column cannot turn it into a different value on the next run.
pub fn mapped_properties(
    node: &NodeType,
    properties: &PropertyMap,
    row: &Row,
) -> Vec<(String, PropertyValue)> {
    properties
        .iter()
        .filter(|(property, _)| *property != node.primary_key)
        .filter_map(|(property, field)| {
            row.get(field)
                .map(|value| (property.to_string(), value.to_property()))
        })
        .collect()
}

/// Turn one roots row into mutation operations.
pub fn extract_row(row: &Row, plan: &SyncPlan) -> RowExtraction {
    let mut out = RowExtraction::default();

    let Some(unit_key) = row.key(&plan.unit_key_field) else {
        out.warnings.push(format!(
            "Skipping roots row with null {} ({})",
            plan.unit_key_field, plan.unit.label
        ));
        return out;
    };

    out.ops.push(MutationOp::MergeNode {
        label: plan.unit.label.clone(),
        extra_labels: Vec::new(),
        pk_property: plan.unit.primary_key.clone(),
        pk_value: unit_key.clone(),
        properties: mapped_properties(&plan.unit, &plan.unit.properties, row),
    });

    for slot in &plan.roots.slots {
        let Some(child_key) = row.key(&slot.key_field) else {
            out.warnings.push(format!(
                "{} {} has no {} ({} is null)",
                plan.unit.label, unit_key, slot.name, slot.key_field
            ));
            continue;
        };

        out.ops.push(MutationOp::MergeNode {
            label: plan.device.label.clone(),
            extra_labels: Vec::new(),
            pk_property: plan.device.primary_key.clone(),
            pk_value: child_key.clone(),
            properties: mapped_properties(&plan.device, &slot.properties, row),
        });
        out.ops.push(MutationOp::MergeEdge {
            from_label: plan.unit.label.clone(),
            from_pk_property: plan.unit.primary_key.clone(),
            from_pk_value: unit_key.clone(),
            to_label: plan.device.label.clone(),
            to_pk_property: plan.device.primary_key.clone(),
            to_pk_value: child_key.clone(),
            rel_type: plan.contains_type.clone(),
        });
        out.children.push(child_key);
    }

    out
}

/// Stream the roots source through [`extract_row`].
///
/// A row that cannot be read ends the stage with an error; rows with null
/// keys only produce warnings.
pub async fn extract_roots(
    reader: &dyn RelationalReader,
    plan: &SyncPlan,
    batcher: &mut MutationBatcher<'_>,
    log: &RunLogger,
) -> Result<RootsExtraction, SyncError> {
    let mut rows = match &plan.roots.query {
        Some(sql) => reader.query(sql).await?,
        None => reader.scan_table(&plan.roots.source, &[]).await?,
    };

    let mut frontier = Frontier::new();
    let mut row_count = 0usize;
    while let Some(row) = rows.next().await {
        let row = row?;
        row_count += 1;

        let extraction = extract_row(&row, plan);
        for warning in extraction.warnings {
            log.warn(warning);
        }
        for op in extraction.ops {
            batcher.push(op).await;
        }
        for key in extraction.children {
            frontier.insert(key);
        }
    }

    log.info(format!(
        "Read {} roots rows, {} distinct {} keys to walk",
        row_count,
        frontier.len(),
        plan.device.label
    ));
    Ok(RootsExtraction {
        rows: row_count,
        frontier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use treesync_core::SourceValue;

    fn plan() -> SyncPlan {
        treesync_core::mapping::parse(treesync_core::DEFAULT_MAPPING)
            .unwrap()
            .plan()
            .unwrap()
    }

    #[test]
    fn test_full_row() {
        let row = Row::new()
            .with("UNIT_ID", "U1")
            .with("UNIT_NAME", "Line 1")
            .with("DEVICE_A", "D1")
            .with("DEVICE_A_NAME", "Pump")
            .with("DEVICE_B", "D2")
            .with("DEVICE_B_NAME", "Fan");
        let out = extract_row(&row, &plan());

        assert!(out.warnings.is_empty());
        assert_eq!(out.children, vec!["D1", "D2"]);
        assert_eq!(out.ops.len(), 5);
        assert_eq!(
            out.ops[0],
            MutationOp::MergeNode {
                label: "Unit".into(),
                extra_labels: vec![],
                pk_property: "unitId".into(),
                pk_value: "U1".into(),
                properties: vec![("name".into(), PropertyValue::String("Line 1".into()))],
            }
        );
        assert_eq!(out.ops.iter().filter(|op| op.is_edge()).count(), 2);
    }

    #[test]
    fn test_null_slot_skips_only_that_slot() {
        let row = Row::new()
            .with("UNIT_ID", "U1")
            .with("DEVICE_A", SourceValue::Null)
            .with("DEVICE_B", "D2");
        let out = extract_row(&row, &plan());

        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("deviceA"));
        assert_eq!(out.children, vec!["D2"]);
        assert_eq!(out.ops.len(), 3);
    }

    #[test]
    fn test_null_parent_skips_row() {
        let row = Row::new()
            .with("UNIT_ID", SourceValue::Null)
            .with("DEVICE_A", "D1");
        let out = extract_row(&row, &plan());
        assert!(out.ops.is_empty());
        assert!(out.children.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_frontier_dedups_in_first_seen_order() {
        let mut frontier = Frontier::new();
        assert!(frontier.insert("D2".into()));
        assert!(frontier.insert("D1".into()));
        assert!(!frontier.insert("D2".into()));
        assert_eq!(frontier.keys(), ["D2".to_string(), "D1".to_string()]);
    }
}
