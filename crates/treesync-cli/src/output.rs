//! Terminal output formatting.

use colored::{ColoredString, Colorize};
use treesync_core::{MappingSpec, SourceSettings};
use treesync_graph::RunReport;

fn count(n: usize) -> ColoredString {
    if n == 0 {
        n.to_string().dimmed()
    } else {
        n.to_string().normal()
    }
}

fn alert(n: usize, colorize: fn(ColoredString) -> ColoredString) -> ColoredString {
    if n == 0 {
        n.to_string().dimmed()
    } else {
        colorize(n.to_string().bold())
    }
}

/// Print the counters of a finished run.
pub fn print_report(report: &RunReport) {
    println!();
    println!("{} {}", "Sync complete".green().bold(), format!("({} ms)", report.duration_ms).dimmed());
    println!("  Roots rows:            {}", count(report.roots));
    println!("  Devices visited:       {}", count(report.visited));
    println!("  Node merges:           {}", count(report.nodes));
    println!("  Relationship merges:   {}", count(report.edges));
    println!("  Ops applied:           {}", count(report.ops_applied));
    println!("  Ops failed:            {}", alert(report.ops_failed, |s| s.red()));
    println!("  Batches:               {}", count(report.batches));
    println!("  Warnings:              {}", alert(report.warnings, |s| s.yellow()));
    println!("  Errors:                {}", alert(report.errors, |s| s.red()));
}

pub fn print_graph_totals(nodes: usize, relationships: usize) {
    println!();
    println!(
        "{} {} nodes, {} relationships",
        "Graph now holds".bold(),
        nodes,
        relationships
    );
}

/// Print configured sources as a table.
pub fn print_sources(sources: &[SourceSettings]) {
    if sources.is_empty() {
        println!("{}", "No sources configured.".dimmed());
        return;
    }

    println!("{:<20} {:<24} {:<10} {}", "ID", "Name", "Scheduled", "Database");
    println!("{}", "-".repeat(80));

    for source in sources {
        let scheduled = if source.sync_enabled {
            "yes".green()
        } else {
            "no".dimmed()
        };
        let path = source.path.display().to_string();
        let path = if source.path.exists() {
            path.normal()
        } else {
            format!("{} (missing)", path).red()
        };
        println!(
            "{:<20} {:<24} {:<10} {}",
            truncate(&source.id, 18),
            truncate(&source.name, 22),
            scheduled,
            path
        );
    }
}

/// Print node types and relationships of a parsed mapping.
pub fn print_mapping_summary(spec: &MappingSpec) {
    println!();
    println!("{}", "Node types".bold());
    for (name, node) in &spec.nodes {
        let dynamic = match &node.dynamic_label {
            Some(rule) => format!(" +label from {}.{}", rule.lookup_table, rule.lookup_label_field),
            None => String::new(),
        };
        println!(
            "  {:<10} :{} key {} from {} ({} properties){}",
            name,
            node.label.cyan(),
            node.primary_key,
            node.source,
            node.properties.len(),
            dynamic.dimmed()
        );
    }

    println!("{}", "Relationships".bold());
    for (name, rel) in &spec.relationships {
        println!(
            "  {:<10} ({})-[:{}]->({})",
            name,
            rel.from,
            rel.type_name.cyan(),
            rel.to
        );
    }

    let slots: Vec<&str> = spec.roots.slots.iter().map(|s| s.name.as_str()).collect();
    println!(
        "{} {} with slots {}",
        "Roots".bold(),
        spec.roots.source,
        slots.join(", ")
    );
    println!(
        "{} {} <- {}",
        "Hierarchy".bold(),
        spec.hierarchy.link_field,
        spec.hierarchy.parent_link_field
    );
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
