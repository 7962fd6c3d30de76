//! Web server command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use treesync_core::Settings;
use treesync_graph::{spawn_scheduler, GraphConfig, Neo4jWriter};
use treesync_source::SourceRegistry;
use treesync_web::AppState;

use super::build_engine;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides the settings file)
    #[arg(long)]
    pub port: Option<u16>,

    /// Host to bind to (overrides the settings file)
    #[arg(long)]
    pub host: Option<String>,

    /// Do not start the scheduled sync
    #[arg(long)]
    pub no_scheduler: bool,

    /// Also write logs to a file
    #[arg(long)]
    pub log: bool,

    /// Log file used with --log
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

pub async fn execute(args: ServeArgs, settings: Settings) -> Result<()> {
    let host = args.host.unwrap_or_else(|| settings.server.host.clone());
    let port = args.port.unwrap_or(settings.server.port);

    let registry = Arc::new(SourceRegistry::new(settings.sources.clone()));
    let graph = Arc::new(Neo4jWriter::new(GraphConfig::from(&settings.graph)));
    let engine = build_engine(&settings, Arc::clone(&registry), graph);

    let scheduler = if !args.no_scheduler && settings.sync.schedule_secs > 0 {
        Some(spawn_scheduler(
            engine.clone(),
            Arc::clone(&registry),
            Duration::from_secs(settings.sync.schedule_secs),
        ))
    } else {
        None
    };

    println!();
    println!("  {} {}", "treesync".cyan().bold(), "Server".bold());
    println!();
    println!("  {}        http://{}:{}/api", "API".green(), host, port);
    println!("  {}  ws://{}:{}/ws/logs/{{source}}", "Log stream".green(), host, port);
    println!("  {}      {}", "Neo4j".green(), settings.graph.uri);
    match &scheduler {
        Some(_) => println!(
            "  {}  every {}s for enabled sources",
            "Scheduler".green(),
            settings.sync.schedule_secs
        ),
        None => println!("  {}  {}", "Scheduler".green(), "off".dimmed()),
    }
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    let result = treesync_web::run_server(AppState::new(engine, registry), &host, port)
        .await
        .context("Web server stopped");

    if let Some(handle) = scheduler {
        handle.abort();
    }
    result
}
