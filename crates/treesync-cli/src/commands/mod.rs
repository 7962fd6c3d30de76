//! CLI command definitions and handlers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use treesync_core::settings::DEFAULT_SETTINGS_FILE;
use treesync_core::{FileConfigStore, Settings};
use treesync_graph::{GraphWriter, SyncEngine};
use treesync_source::SourceRegistry;

pub mod mapping;
pub mod serve;
pub mod sources;
pub mod sync;

/// Synchronize a hierarchical relational source into a labeled-property graph
#[derive(Parser)]
#[command(name = "treesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file
    #[arg(short, long, global = true, env = "TREESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API and the sync scheduler
    Serve(serve::ServeArgs),

    /// Run one sync for a source and wait for it
    Sync(sync::SyncArgs),

    /// Show, save or check mapping configurations
    #[command(subcommand)]
    Mapping(mapping::MappingCommands),

    /// List configured sources
    Sources,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let settings_path = self
            .config
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
        let settings = Settings::load(&settings_path)
            .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

        match self.command {
            Commands::Serve(args) => serve::execute(args, settings).await,
            Commands::Sync(args) => sync::execute(args, settings).await,
            Commands::Mapping(cmd) => mapping::execute(cmd, &settings).await,
            Commands::Sources => sources::execute(&settings),
        }
    }
}

/// Wire an engine over the configured sources and mapping directory.
pub(crate) fn build_engine(
    settings: &Settings,
    registry: Arc<SourceRegistry>,
    graph: Arc<dyn GraphWriter>,
) -> SyncEngine {
    SyncEngine::builder(
        Arc::new(FileConfigStore::new(&settings.sync.mapping_dir)),
        registry,
        graph,
    )
    .batch_size(settings.sync.batch_size)
    .build()
}
