//! Batched, best-effort graph writes.

use std::collections::HashSet;
use tracing::debug;
use treesync_core::MutationOp;

use super::logger::RunLogger;
use crate::error::GraphError;
use crate::writer::GraphWriter;

/// Counters kept across every flush of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub nodes_emitted: usize,
    pub edges_emitted: usize,
    pub applied: usize,
    pub failed: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

/// Queues mutation operations and commits them one transaction per batch.
///
/// A failing operation is logged and skipped; the rest of its batch is
/// still committed. The queue is emptied by every flush whatever the outcome.
pub struct MutationBatcher<'a> {
    writer: &'a dyn GraphWriter,
    log: &'a RunLogger,
    threshold: usize,
    queue: Vec<MutationOp>,
    stats: BatchStats,
}

impl<'a> MutationBatcher<'a> {
    pub fn new(writer: &'a dyn GraphWriter, log: &'a RunLogger, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            writer,
            log,
            threshold,
            queue: Vec::with_capacity(threshold),
            stats: BatchStats::default(),
        }
    }

    pub async fn push(&mut self, op: MutationOp) {
        if op.is_node() {
            self.stats.nodes_emitted += 1;
        } else {
            self.stats.edges_emitted += 1;
        }
        self.queue.push(op);
        if self.queue.len() >= self.threshold {
            self.flush("batch size reached").await;
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    /// Commit everything queued. `reason` only appears in the log line.
    ///
    /// A statement failure ends the attempt: the transaction is rolled
    /// back and the batch replayed without the failing op.
    pub async fn flush(&mut self, reason: &str) {
        if self.queue.is_empty() {
            return;
        }
        let ops = std::mem::take(&mut self.queue);
        let size = ops.len();
        self.stats.batches += 1;

        let mut rejected: HashSet<usize> = HashSet::new();
        loop {
            match self.attempt(&ops, &rejected).await {
                Attempt::Committed(applied) => {
                    self.stats.applied += applied;
                    self.log.info(format!(
                        "Committed batch of {} ops ({}, {} failed)",
                        size,
                        reason,
                        rejected.len()
                    ));
                    return;
                }
                Attempt::Rejected(idx, e) => {
                    self.stats.failed += 1;
                    self.log.error(format!(
                        "GraphWriteError: {} failed: {}",
                        ops[idx].describe(),
                        e
                    ));
                    rejected.insert(idx);
                    if rejected.len() == size {
                        return;
                    }
                }
                Attempt::Aborted(e) => {
                    self.stats.failed += size - rejected.len();
                    self.stats.failed_batches += 1;
                    self.log.error(format!("GraphWriteError: batch of {} ops: {}", size, e));
                    return;
                }
            }
        }
    }

    /// Run every op not yet rejected in one fresh transaction.
    async fn attempt(&self, ops: &[MutationOp], rejected: &HashSet<usize>) -> Attempt {
        let mut txn = match self.writer.begin().await {
            Ok(txn) => txn,
            Err(e) => return Attempt::Aborted(format!("could not open transaction: {}", e)),
        };

        let mut applied = 0;
        for (idx, op) in ops.iter().enumerate() {
            if rejected.contains(&idx) {
                continue;
            }
            if let Err(e) = txn.run(op).await {
                if let Err(rb) = txn.rollback().await {
                    debug!(error = %rb, "Rollback after failed statement failed");
                }
                return Attempt::Rejected(idx, e);
            }
            applied += 1;
        }

        match txn.commit().await {
            Ok(()) => Attempt::Committed(applied),
            Err(e) => Attempt::Aborted(format!("commit failed: {}", e)),
        }
    }
}

enum Attempt {
    Committed(usize),
    /// Index of the op that failed; the transaction was rolled back.
    Rejected(usize, GraphError),
    Aborted(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use treesync_core::SyncLogHub;
    use uuid::Uuid;

    fn node(pk: &str) -> MutationOp {
        MutationOp::MergeNode {
            label: "Device".into(),
            extra_labels: vec![],
            pk_property: "deviceCode".into(),
            pk_value: pk.into(),
            properties: vec![],
        }
    }

    fn logger() -> RunLogger {
        RunLogger::new("plant", Uuid::new_v4(), SyncLogHub::new())
    }

    #[tokio::test]
    async fn test_threshold_triggers_flush() {
        let graph = MemoryGraph::new();
        let log = logger();
        let mut batcher = MutationBatcher::new(&graph, &log, 2);

        batcher.push(node("a")).await;
        assert_eq!(batcher.pending(), 1);
        assert_eq!(graph.node_count(), 0);

        batcher.push(node("b")).await;
        assert_eq!(batcher.pending(), 0);
        assert_eq!(graph.node_count(), 2);

        batcher.push(node("c")).await;
        batcher.flush("stage complete").await;
        assert_eq!(graph.node_count(), 3);
        assert_eq!(batcher.stats().batches, 2);
        assert_eq!(batcher.stats().applied, 3);
    }

    #[tokio::test]
    async fn test_failed_op_does_not_stop_batch() {
        let graph = MemoryGraph::new();
        graph.fail_on_key("b");
        let log = logger();
        let mut batcher = MutationBatcher::new(&graph, &log, 10);

        for pk in ["a", "b", "c"] {
            batcher.push(node(pk)).await;
        }
        batcher.flush("stage complete").await;

        assert_eq!(graph.node_count(), 2);
        assert_eq!(batcher.stats().failed, 1);
        assert_eq!(batcher.stats().applied, 2);
        assert_eq!(log.errors(), 1);
    }

    #[tokio::test]
    async fn test_failed_op_in_aborting_transaction_is_replayed_around() {
        let graph = MemoryGraph::new();
        graph.fail_on_key("b");
        graph.set_abort_on_error(true);
        let log = logger();
        let mut batcher = MutationBatcher::new(&graph, &log, 10);

        for pk in ["a", "b", "c"] {
            batcher.push(node(pk)).await;
        }
        batcher.flush("stage complete").await;

        assert!(graph.node("Device", "a").is_some());
        assert!(graph.node("Device", "c").is_some());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.commit_count(), 1);
        assert_eq!(graph.rollback_count(), 1);
        let stats = batcher.stats();
        assert_eq!((stats.applied, stats.failed, stats.batches), (2, 1, 1));
        assert_eq!(stats.failed_batches, 0);
        assert_eq!(log.errors(), 1);
    }

    #[tokio::test]
    async fn test_batch_of_only_failing_ops_ends() {
        let graph = MemoryGraph::new();
        graph.fail_on_key("x");
        graph.fail_on_key("y");
        graph.set_abort_on_error(true);
        let log = logger();
        let mut batcher = MutationBatcher::new(&graph, &log, 10);

        batcher.push(node("x")).await;
        batcher.push(node("y")).await;
        batcher.flush("stage complete").await;

        assert_eq!(batcher.pending(), 0);
        assert_eq!(batcher.stats().failed, 2);
        assert_eq!(batcher.stats().applied, 0);
        assert_eq!(graph.commit_count(), 0);
        assert_eq!(log.errors(), 2);
    }

    #[tokio::test]
    async fn test_failed_commit_clears_queue() {
        let graph = MemoryGraph::new();
        graph.set_fail_commits(true);
        let log = logger();
        let mut batcher = MutationBatcher::new(&graph, &log, 10);

        batcher.push(node("a")).await;
        batcher.flush("stage complete").await;
        assert_eq!(batcher.pending(), 0);
        assert_eq!(batcher.stats().failed_batches, 1);
        assert_eq!(log.errors(), 1);

        graph.set_fail_commits(false);
        batcher.push(node("b")).await;
        batcher.flush("stage complete").await;
        assert_eq!(graph.node_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let graph = MemoryGraph::new();
        let log = logger();
        let mut batcher = MutationBatcher::new(&graph, &log, 10);
        batcher.flush("stage complete").await;
        assert_eq!(batcher.stats().batches, 0);
        assert_eq!(graph.commit_count(), 0);
    }
}
