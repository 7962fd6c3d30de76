//! In-memory graph with MERGE semantics.
//!
//! Backs tests and `treesync sync --dry-run`. Operations run inside a
//! transaction are buffered and only applied on commit.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use treesync_core::{MutationOp, PropertyValue};

use crate::error::{GraphError, GraphResult};
use crate::writer::{GraphTransaction, GraphWriter};

/// Identity of a node: base label, key property and key value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct NodeKey {
    label: String,
    pk_property: String,
    pk_value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryNode {
    pub labels: BTreeSet<String>,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl MemoryNode {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

#[derive(Default)]
struct GraphState {
    nodes: BTreeMap<NodeKey, MemoryNode>,
    edges: BTreeSet<(NodeKey, String, NodeKey)>,
    constraints: BTreeSet<(String, String)>,
    commits: usize,
    rollbacks: usize,
}

impl GraphState {
    fn merge_node(&mut self, key: NodeKey) -> &mut MemoryNode {
        let pk_property = key.pk_property.clone();
        let pk_value = key.pk_value.clone();
        let label = key.label.clone();
        let node = self.nodes.entry(key).or_default();
        node.labels.insert(label);
        node.properties
            .insert(pk_property, PropertyValue::String(pk_value));
        node
    }

    fn apply(&mut self, op: &MutationOp) {
        match op {
            MutationOp::MergeNode {
                label,
                extra_labels,
                pk_property,
                pk_value,
                properties,
            } => {
                let node = self.merge_node(NodeKey {
                    label: label.clone(),
                    pk_property: pk_property.clone(),
                    pk_value: pk_value.clone(),
                });
                for (name, value) in properties {
                    if value.is_null() {
                        node.properties.remove(name);
                    } else {
                        node.properties.insert(name.clone(), value.clone());
                    }
                }
                node.labels.extend(extra_labels.iter().cloned());
            }
            MutationOp::MergeEdge {
                from_label,
                from_pk_property,
                from_pk_value,
                to_label,
                to_pk_property,
                to_pk_value,
                rel_type,
            } => {
                let from = NodeKey {
                    label: from_label.clone(),
                    pk_property: from_pk_property.clone(),
                    pk_value: from_pk_value.clone(),
                };
                let to = NodeKey {
                    label: to_label.clone(),
                    pk_property: to_pk_property.clone(),
                    pk_value: to_pk_value.clone(),
                };
                self.merge_node(from.clone());
                self.merge_node(to.clone());
                self.edges.insert((from, rel_type.clone(), to));
            }
        }
    }
}

#[derive(Default)]
struct Faults {
    unavailable: bool,
    failing_keys: HashSet<String>,
    fail_commits: bool,
    abort_on_error: bool,
}

/// Shared handle; clones see the same graph.
#[derive(Clone, Default)]
pub struct MemoryGraph {
    state: Arc<Mutex<GraphState>>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `check` and `begin` fail as if the store were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults().unavailable = unavailable;
    }

    /// Make every operation touching `pk_value` fail.
    pub fn fail_on_key(&self, pk_value: impl Into<String>) {
        self.faults().failing_keys.insert(pk_value.into());
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.faults().fail_commits = fail;
    }

    /// Behave like a Neo4j transaction: after one failed statement every
    /// later statement and the commit are refused.
    pub fn set_abort_on_error(&self, abort: bool) {
        self.faults().abort_on_error = abort;
    }

    pub fn node_count(&self) -> usize {
        self.state().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state().edges.len()
    }

    pub fn edge_count_of(&self, rel_type: &str) -> usize {
        self.state()
            .edges
            .iter()
            .filter(|(_, rel, _)| rel == rel_type)
            .count()
    }

    pub fn commit_count(&self) -> usize {
        self.state().commits
    }

    pub fn rollback_count(&self) -> usize {
        self.state().rollbacks
    }

    /// Node with base label `label` and key value `pk_value`.
    pub fn node(&self, label: &str, pk_value: &str) -> Option<MemoryNode> {
        self.state()
            .nodes
            .iter()
            .find(|(key, _)| key.label == label && key.pk_value == pk_value)
            .map(|(_, node)| node.clone())
    }

    pub fn has_edge(&self, from_pk: &str, rel_type: &str, to_pk: &str) -> bool {
        self.state()
            .edges
            .iter()
            .any(|(from, rel, to)| from.pk_value == from_pk && rel == rel_type && to.pk_value == to_pk)
    }

    pub fn constraints(&self) -> Vec<(String, String)> {
        self.state().constraints.iter().cloned().collect()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, GraphState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> GraphResult<()> {
        if self.faults().unavailable {
            return Err(GraphError::Connection("in-memory graph marked unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphWriter for MemoryGraph {
    async fn check(&self) -> GraphResult<()> {
        self.check_available()
    }

    async fn ensure_constraint(&self, label: &str, property: &str) -> GraphResult<()> {
        self.check_available()?;
        self.state()
            .constraints
            .insert((label.to_string(), property.to_string()));
        Ok(())
    }

    async fn begin(&self) -> GraphResult<Box<dyn GraphTransaction>> {
        self.check_available()?;
        Ok(Box::new(MemoryTransaction {
            graph: self.clone(),
            pending: Vec::new(),
            terminated: false,
        }))
    }
}

struct MemoryTransaction {
    graph: MemoryGraph,
    pending: Vec<MutationOp>,
    terminated: bool,
}

fn touches(op: &MutationOp, keys: &HashSet<String>) -> bool {
    match op {
        MutationOp::MergeNode { pk_value, .. } => keys.contains(pk_value),
        MutationOp::MergeEdge {
            from_pk_value,
            to_pk_value,
            ..
        } => keys.contains(from_pk_value) || keys.contains(to_pk_value),
    }
}

#[async_trait]
impl GraphTransaction for MemoryTransaction {
    async fn run(&mut self, op: &MutationOp) -> GraphResult<()> {
        if self.terminated {
            return Err(GraphError::Transaction(
                "transaction terminated by an earlier failure".into(),
            ));
        }
        let faults = self.graph.faults();
        if touches(op, &faults.failing_keys) {
            self.terminated = faults.abort_on_error;
            return Err(GraphError::Statement(format!("rejected: {}", op.describe())));
        }
        drop(faults);
        self.pending.push(op.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> GraphResult<()> {
        if self.terminated {
            return Err(GraphError::Transaction(
                "transaction terminated by an earlier failure".into(),
            ));
        }
        if self.graph.faults().fail_commits {
            return Err(GraphError::Transaction("commit rejected".into()));
        }
        let mut state = self.graph.state();
        for op in &self.pending {
            state.apply(op);
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> GraphResult<()> {
        self.graph.state().rollbacks += 1;
        Ok(())
    }
}
