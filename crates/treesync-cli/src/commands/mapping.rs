//! Mapping configuration commands.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use treesync_core::{mapping, ConfigStore, FileConfigStore, Settings};

use crate::output;

#[derive(Subcommand)]
pub enum MappingCommands {
    /// Print the mapping of a source (the default template if none is saved)
    Show {
        source_id: String,
    },

    /// Validate a TOML file and store it as the mapping of a source
    Save {
        source_id: String,
        /// Mapping file to store
        file: PathBuf,
    },

    /// Validate the stored mapping of a source, or a file with --file
    Check {
        source_id: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

pub async fn execute(cmd: MappingCommands, settings: &Settings) -> Result<()> {
    let store = FileConfigStore::new(&settings.sync.mapping_dir);

    match cmd {
        MappingCommands::Show { source_id } => {
            let text = store.load(&source_id).await?;
            print!("{}", text);
        }
        MappingCommands::Save { source_id, file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let spec = mapping::parse(&text)
                .with_context(|| format!("{} is not a valid mapping", file.display()))?;
            store.save(&source_id, &text).await?;
            println!(
                "{} mapping for {}",
                "Saved".green().bold(),
                source_id.cyan()
            );
            output::print_mapping_summary(&spec);
        }
        MappingCommands::Check { source_id, file } => {
            let text = match &file {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => store.load(&source_id).await?,
            };
            let spec = mapping::parse(&text).context("Mapping is invalid")?;
            println!("{} mapping for {}", "Valid".green().bold(), source_id.cyan());
            output::print_mapping_summary(&spec);
        }
    }
    Ok(())
}
