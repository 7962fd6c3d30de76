//! Relational to graph synchronization runs.
//!
//! A run loads the source's mapping, opens the source and the graph, creates
//! constraints, then extracts the roots and walks the hierarchy, writing
//! through one [`batcher::MutationBatcher`]. Each stage name is recorded on
//! failure so the status history says where a run stopped.

pub mod batcher;
pub mod error;
pub mod extractor;
pub mod logger;
pub mod scheduler;
pub mod walker;

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use treesync_core::config_store::check_source_id;
use treesync_core::settings::DEFAULT_BATCH_SIZE;
use treesync_core::{
    mapping, ConfigStore, InMemoryStatusStore, LogLevel, LogReceiver, RunOutcome, StatusStore,
    SyncLogHub, SyncRun,
};
use treesync_source::SourceConnector;

use crate::schema::initialize_schema;
use crate::writer::GraphWriter;
use batcher::MutationBatcher;
use extractor::extract_roots;
use logger::RunLogger;
use walker::{check_detail_schema, HierarchyWalker, LabelLookup};

pub use error::SyncError;

/// Steps of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    LoadingMapping,
    ConnectingSource,
    CheckingDetailSchema,
    ConnectingGraph,
    InitializingSchema,
    LoadingLookup,
    ExtractingRoots,
    WalkingHierarchy,
    Finalizing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::LoadingMapping => "Loading mapping config",
            Stage::ConnectingSource => "Connecting to source",
            Stage::CheckingDetailSchema => "Checking detail schema",
            Stage::ConnectingGraph => "Connecting to graph",
            Stage::InitializingSchema => "Initializing schema",
            Stage::LoadingLookup => "Loading label lookup",
            Stage::ExtractingRoots => "Extracting root entities",
            Stage::WalkingHierarchy => "Walking hierarchy",
            Stage::Finalizing => "Finalizing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters of a completed run. `nodes` and `edges` count emitted merge
/// operations, not distinct graph elements.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub roots: usize,
    pub nodes: usize,
    pub edges: usize,
    pub ops_applied: usize,
    pub ops_failed: usize,
    pub batches: usize,
    pub warnings: usize,
    pub errors: usize,
    pub visited: usize,
    pub duration_ms: u64,
}

impl RunReport {
    /// One-line summary, used as the success history message.
    pub fn summary(&self) -> String {
        format!(
            "{} roots rows, {} devices visited, {} node merges, {} relationship merges ({} ops applied, {} failed, {} batches, {} warnings, {} errors)",
            self.roots,
            self.visited,
            self.nodes,
            self.edges,
            self.ops_applied,
            self.ops_failed,
            self.batches,
            self.warnings,
            self.errors
        )
    }
}

struct EngineInner {
    config_store: Arc<dyn ConfigStore>,
    connector: Arc<dyn SourceConnector>,
    graph: Arc<dyn GraphWriter>,
    status: Arc<dyn StatusStore>,
    logs: SyncLogHub,
    batch_size: usize,
    running: Mutex<HashSet<String>>,
}

/// Entry point for triggering runs and reading their state.
///
/// Cheap to clone; clones share the status store, log hub and the
/// per-source single-flight guard.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

/// Held for the lifetime of a run; frees the source on drop.
///
/// Also tracks the active stage, so a run that dies without reaching its
/// own error handling still leaves a `Fail` entry naming where it stopped.
struct RunGuard {
    inner: Arc<EngineInner>,
    source_id: String,
    started: Instant,
    stage: Mutex<Stage>,
}

impl RunGuard {
    fn enter(&self, stage: Stage) {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner) = stage;
    }

    fn stage(&self) -> Stage {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn duration_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Record a failure for a run that ended outside `execute`.
    fn interrupted(&self, reason: &str) {
        let stage = self.stage();
        error!(source_id = %self.source_id, %stage, reason, "Sync run aborted");
        self.inner.logs.publish(
            &self.source_id,
            LogLevel::Error,
            format!("Failed during step: {}. Error: {}", stage, reason),
        );
        self.inner.status.complete(
            &self.source_id,
            RunOutcome::Fail {
                stage: stage.to_string(),
                error: reason.to_string(),
                duration_ms: self.duration_ms(),
            },
        );
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.interrupted("sync run panicked");
        }
        self.inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.source_id);
    }
}

pub struct SyncEngineBuilder {
    config_store: Arc<dyn ConfigStore>,
    connector: Arc<dyn SourceConnector>,
    graph: Arc<dyn GraphWriter>,
    status: Option<Arc<dyn StatusStore>>,
    logs: Option<SyncLogHub>,
    batch_size: usize,
}

impl SyncEngineBuilder {
    pub fn status_store(mut self, status: Arc<dyn StatusStore>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn log_hub(mut self, logs: SyncLogHub) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn build(self) -> SyncEngine {
        SyncEngine {
            inner: Arc::new(EngineInner {
                config_store: self.config_store,
                connector: self.connector,
                graph: self.graph,
                status: self
                    .status
                    .unwrap_or_else(|| Arc::new(InMemoryStatusStore::new())),
                logs: self.logs.unwrap_or_default(),
                batch_size: self.batch_size,
                running: Mutex::new(HashSet::new()),
            }),
        }
    }
}

impl SyncEngine {
    pub fn builder(
        config_store: Arc<dyn ConfigStore>,
        connector: Arc<dyn SourceConnector>,
        graph: Arc<dyn GraphWriter>,
    ) -> SyncEngineBuilder {
        SyncEngineBuilder {
            config_store,
            connector,
            graph,
            status: None,
            logs: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Start a run in the background and return its id.
    ///
    /// The status switches to in-progress before this returns. Fails with
    /// [`SyncError::AlreadyRunning`] while a run for the source is active.
    pub fn trigger(&self, source_id: &str) -> Result<Uuid, SyncError> {
        let guard = Arc::new(self.acquire(source_id)?);
        let run_id = Uuid::new_v4();
        self.inner.status.begin(source_id, run_id);

        let engine = self.clone();
        tokio::spawn(async move {
            let task = tokio::spawn({
                let guard = Arc::clone(&guard);
                async move {
                    let _ = engine.execute(&guard, run_id).await;
                }
            });
            // The source stays claimed until the outcome is recorded.
            if let Err(e) = task.await {
                guard.interrupted(&e.to_string());
            }
        });
        Ok(run_id)
    }

    /// Run to completion on the current task.
    pub async fn run(&self, source_id: &str) -> Result<RunReport, SyncError> {
        let guard = self.acquire(source_id)?;
        let run_id = Uuid::new_v4();
        self.inner.status.begin(source_id, run_id);
        self.execute(&guard, run_id).await
    }

    pub fn status(&self, source_id: &str) -> SyncRun {
        self.inner.status.get(source_id)
    }

    pub fn is_running(&self, source_id: &str) -> bool {
        self.inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(source_id)
    }

    pub fn subscribe_logs(&self, source_id: &str) -> LogReceiver {
        self.inner.logs.subscribe(source_id)
    }

    pub fn log_hub(&self) -> &SyncLogHub {
        &self.inner.logs
    }

    /// Raw mapping text of a source, the built-in template if none is saved.
    pub async fn mapping(&self, source_id: &str) -> Result<String, SyncError> {
        check_source_id(source_id)?;
        Ok(self.inner.config_store.load(source_id).await?)
    }

    /// Validate and store a mapping. Invalid text is never saved.
    pub async fn save_mapping(&self, source_id: &str, text: &str) -> Result<(), SyncError> {
        check_source_id(source_id)?;
        mapping::parse(text)?;
        self.inner.config_store.save(source_id, text).await?;
        info!(source_id, "Mapping config updated");
        Ok(())
    }

    fn acquire(&self, source_id: &str) -> Result<RunGuard, SyncError> {
        let mut running = self
            .inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !running.insert(source_id.to_string()) {
            warn!(source_id, "Sync already in progress");
            return Err(SyncError::AlreadyRunning(source_id.to_string()));
        }
        Ok(RunGuard {
            inner: Arc::clone(&self.inner),
            source_id: source_id.to_string(),
            started: Instant::now(),
            stage: Mutex::new(Stage::LoadingMapping),
        })
    }

    async fn execute(&self, run: &RunGuard, run_id: Uuid) -> Result<RunReport, SyncError> {
        let source_id = run.source_id.as_str();
        let log = RunLogger::new(source_id, run_id, self.inner.logs.clone());
        log.info(format!("Sync started for source {} (run {})", source_id, run_id));

        let result = self.run_stages(&log, run).await;
        let duration_ms = run.duration_ms();

        match result {
            Ok(mut report) => {
                report.run_id = run_id;
                report.duration_ms = duration_ms;
                report.warnings = log.warnings();
                report.errors = log.errors();
                let summary = report.summary();
                log.info(format!("Sync completed in {} ms: {}", duration_ms, summary));
                self.inner.status.complete(
                    source_id,
                    RunOutcome::Success {
                        message: summary,
                        duration_ms,
                    },
                );
                Ok(report)
            }
            Err(e) => {
                let stage = run.stage();
                log.error(format!("Failed during step: {}. Error: {}", stage, e));
                self.inner.status.complete(
                    source_id,
                    RunOutcome::Fail {
                        stage: stage.to_string(),
                        error: e.to_string(),
                        duration_ms,
                    },
                );
                Err(e)
            }
        }
    }

    async fn run_stages(&self, log: &RunLogger, run: &RunGuard) -> Result<RunReport, SyncError> {
        let inner = &self.inner;
        let source_id = log.source_id();

        run.enter(Stage::LoadingMapping);
        let text = inner.config_store.load(source_id).await?;
        let plan = mapping::parse(&text)?.plan()?;

        run.enter(Stage::ConnectingSource);
        let reader = inner
            .connector
            .connect(source_id)
            .await
            .map_err(|e| SyncError::FatalConnection(e.to_string()))?;

        run.enter(Stage::CheckingDetailSchema);
        check_detail_schema(reader.as_ref(), &plan).await?;

        run.enter(Stage::ConnectingGraph);
        inner
            .graph
            .check()
            .await
            .map_err(|e| SyncError::FatalConnection(e.to_string()))?;

        run.enter(Stage::InitializingSchema);
        initialize_schema(inner.graph.as_ref(), &plan).await?;

        run.enter(Stage::LoadingLookup);
        let lookup = match &plan.device.dynamic_label {
            Some(rule) => {
                let lookup = LabelLookup::load(reader.as_ref(), rule).await?;
                log.info(format!(
                    "Loaded {} labels from {}",
                    lookup.len(),
                    rule.lookup_table
                ));
                lookup
            }
            None => LabelLookup::default(),
        };

        run.enter(Stage::ExtractingRoots);
        let mut batcher = MutationBatcher::new(inner.graph.as_ref(), log, inner.batch_size);
        let roots = extract_roots(reader.as_ref(), &plan, &mut batcher, log).await?;
        batcher.flush(Stage::ExtractingRoots.as_str()).await;

        run.enter(Stage::WalkingHierarchy);
        let mut walker = HierarchyWalker::new(reader.as_ref(), &plan, &lookup, log);
        walker.walk(roots.frontier.into_keys(), &mut batcher).await;
        batcher.flush(Stage::WalkingHierarchy.as_str()).await;

        run.enter(Stage::Finalizing);
        let stats = batcher.stats();
        Ok(RunReport {
            roots: roots.rows,
            nodes: stats.nodes_emitted,
            edges: stats.edges_emitted,
            ops_applied: stats.applied,
            ops_failed: stats.failed,
            batches: stats.batches,
            visited: walker.visited(),
            ..RunReport::default()
        })
    }
}
