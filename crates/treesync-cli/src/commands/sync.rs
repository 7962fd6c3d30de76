//! One-shot sync command.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::sync::Arc;

use treesync_core::Settings;
use treesync_graph::{GraphConfig, MemoryGraph, Neo4jWriter};
use treesync_source::SourceRegistry;

use super::build_engine;
use crate::output;

#[derive(Args)]
pub struct SyncArgs {
    /// Source identifier from the settings file
    pub source_id: String,

    /// Write to an in-memory graph instead of Neo4j
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: SyncArgs, settings: Settings) -> Result<()> {
    if settings.source(&args.source_id).is_none() {
        bail!(
            "Unknown source '{}'. Run 'treesync sources' to list configured sources.",
            args.source_id
        );
    }
    let registry = Arc::new(SourceRegistry::new(settings.sources.clone()));

    if !args.json {
        let target = if args.dry_run {
            "in-memory graph (dry run)".to_string()
        } else {
            settings.graph.uri.clone()
        };
        println!(
            "{} {} {} {}",
            "Syncing".bold(),
            args.source_id.cyan(),
            "into".bold(),
            target
        );
    }

    if args.dry_run {
        let graph = MemoryGraph::new();
        let engine = build_engine(&settings, registry, Arc::new(graph.clone()));
        let report = engine.run(&args.source_id).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            output::print_report(&report);
            output::print_graph_totals(graph.node_count(), graph.edge_count());
        }
        return Ok(());
    }

    let graph = Arc::new(Neo4jWriter::new(GraphConfig::from(&settings.graph)));
    let engine = build_engine(&settings, registry, graph.clone());
    let report = engine.run(&args.source_id).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_report(&report);
        match graph.counts().await {
            Ok(counts) => output::print_graph_totals(counts.nodes, counts.relationships),
            Err(e) => println!("  {} {}", "Graph totals unavailable:".dimmed(), e),
        }
    }
    Ok(())
}
