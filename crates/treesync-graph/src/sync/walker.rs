//! Depth-unbounded walk of the self-referencing device hierarchy.

use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use treesync_core::{ConfigError, DynamicLabelRule, MutationOp, Row, SourceValue, SyncPlan};
use treesync_source::{RelationalReader, SourceResult};

use super::batcher::MutationBatcher;
use super::error::SyncError;
use super::extractor::mapped_properties;
use super::logger::RunLogger;

/// Type code to label, read once per run from the lookup table.
#[derive(Debug, Default, Clone)]
pub struct LabelLookup {
    labels: HashMap<String, String>,
}

impl LabelLookup {
    pub async fn load(reader: &dyn RelationalReader, rule: &DynamicLabelRule) -> SourceResult<Self> {
        let columns = [rule.lookup_key_field.clone(), rule.lookup_label_field.clone()];
        let mut rows = reader.scan_table(&rule.lookup_table, &columns).await?;
        let mut labels = HashMap::new();
        while let Some(row) = rows.next().await {
            let row = row?;
            if let (Some(code), Some(label)) = (
                row.key(&rule.lookup_key_field),
                row.key(&rule.lookup_label_field),
            ) {
                if !label.is_empty() {
                    labels.insert(code, label);
                }
            }
        }
        Ok(Self { labels })
    }

    pub fn resolve(&self, code: &str) -> Option<&str> {
        self.labels.get(code.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<(String, String)> for LabelLookup {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

/// Fail unless the detail table has the key and link columns the walk reads.
pub async fn check_detail_schema(
    reader: &dyn RelationalReader,
    plan: &SyncPlan,
) -> Result<(), SyncError> {
    let table = &plan.device.source;
    let present = reader.columns(table).await?;
    let mut missing: Vec<&str> = Vec::new();
    for column in [
        &plan.device_key_field,
        &plan.links.link_field,
        &plan.links.parent_link_field,
    ] {
        let found = present.iter().any(|p| p.eq_ignore_ascii_case(column.as_str()));
        if !found && !missing.contains(&column.as_str()) {
            missing.push(column.as_str());
        }
    }
    if missing.is_empty() {
        return Ok(());
    }
    Err(ConfigError::MissingColumns {
        table: table.clone(),
        columns: missing.join(", "),
    }
    .into())
}

/// Explicit-stack traversal guarded by a visited set.
///
/// Failures stay local to the branch they happen on: they are logged and
/// the walk moves on to the next pending key.
pub struct HierarchyWalker<'a> {
    reader: &'a dyn RelationalReader,
    plan: &'a SyncPlan,
    lookup: &'a LabelLookup,
    log: &'a RunLogger,
    visited: HashSet<String>,
}

impl<'a> HierarchyWalker<'a> {
    pub fn new(
        reader: &'a dyn RelationalReader,
        plan: &'a SyncPlan,
        lookup: &'a LabelLookup,
        log: &'a RunLogger,
    ) -> Self {
        Self {
            reader,
            plan,
            lookup,
            log,
            visited: HashSet::new(),
        }
    }

    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    /// Walk from `roots` until no unvisited key is left.
    pub async fn walk(&mut self, roots: Vec<String>, batcher: &mut MutationBatcher<'_>) {
        let mut stack: Vec<String> = roots.into_iter().rev().collect();

        while let Some(key) = stack.pop() {
            if !self.visited.insert(key.clone()) {
                continue;
            }
            let children = self.visit(&key, batcher).await;
            stack.extend(children.into_iter().rev());
        }
    }

    /// Emit the node for `key` and the edges to its children. Returns the
    /// child keys to push.
    async fn visit(&self, key: &str, batcher: &mut MutationBatcher<'_>) -> Vec<String> {
        let device = &self.plan.device;
        let record = match self
            .reader
            .query_by_key(
                &device.source,
                &self.plan.device_key_field,
                &SourceValue::from(key),
            )
            .await
        {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.log.warn(format!(
                    "Missing detail record for {} {} in {}",
                    device.label, key, device.source
                ));
                return Vec::new();
            }
            Err(e) => {
                self.log.error(format!(
                    "SourceReadError: lookup of {} {} failed: {}",
                    device.label, key, e
                ));
                return Vec::new();
            }
        };

        batcher
            .push(MutationOp::MergeNode {
                label: device.label.clone(),
                extra_labels: self.extra_labels(key, &record),
                pk_property: device.primary_key.clone(),
                pk_value: key.to_string(),
                properties: mapped_properties(device, &device.properties, &record),
            })
            .await;

        let links = &self.plan.links;
        let link = record.value(&links.link_field);
        if link.is_null() {
            self.log.warn(format!(
                "{} {} has null {}, children not resolved",
                device.label, key, links.link_field
            ));
            return Vec::new();
        }

        let children = match self.children(link).await {
            Ok(rows) => rows,
            Err(e) => {
                self.log.error(format!(
                    "SourceReadError: children of {} {} could not be read: {}",
                    device.label, key, e
                ));
                return Vec::new();
            }
        };

        let mut keys = Vec::with_capacity(children.len());
        for child in children {
            let Some(child_key) = child.key(&self.plan.device_key_field) else {
                self.log.warn(format!(
                    "Skipping child of {} {} with null {}",
                    device.label, key, self.plan.device_key_field
                ));
                continue;
            };
            batcher
                .push(MutationOp::MergeEdge {
                    from_label: device.label.clone(),
                    from_pk_property: device.primary_key.clone(),
                    from_pk_value: key.to_string(),
                    to_label: device.label.clone(),
                    to_pk_property: device.primary_key.clone(),
                    to_pk_value: child_key.clone(),
                    rel_type: self.plan.hierarchy_type.clone(),
                })
                .await;
            keys.push(child_key);
        }
        keys
    }

    /// Children are drained before any is visited, which frees the source
    /// connection for the lookups that follow.
    async fn children(&self, link: &SourceValue) -> SourceResult<Vec<Row>> {
        let mut stream = self
            .reader
            .query_children(&self.plan.device.source, &self.plan.links.parent_link_field, link)
            .await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }

    fn extra_labels(&self, key: &str, record: &Row) -> Vec<String> {
        let device = &self.plan.device;
        let Some(rule) = &device.dynamic_label else {
            return Vec::new();
        };
        let Some(code) = record.key(&rule.key_field) else {
            return Vec::new();
        };
        match self.lookup.resolve(&code) {
            Some(label) if label != device.label => vec![label.to_string()],
            Some(_) => Vec::new(),
            None => {
                self.log.warn(format!(
                    "Unknown {} '{}' for {} {}, keeping base label",
                    rule.key_field, code, device.label, key
                ));
                Vec::new()
            }
        }
    }
}
