//! Source listing command.

use anyhow::Result;

use treesync_core::Settings;

use crate::output;

pub fn execute(settings: &Settings) -> Result<()> {
    output::print_sources(&settings.sources);
    Ok(())
}
