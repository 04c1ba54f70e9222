//! Factory command - prints the factory dump of a tag type

use anyhow::{Context, Result};
use console::style;
use mfwrite_core::{synthesize, TagGeometry};
use std::path::Path;

/// Execute the factory command
pub fn execute(sectors: u8, output: Option<&Path>, silent: bool) -> Result<()> {
    let geometry = TagGeometry::new(sectors)?;
    let json = factory_json(geometry)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println_if!(
                silent,
                "{} Factory dump of {} written to {}",
                style("✓").green(),
                geometry,
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn factory_json(geometry: TagGeometry) -> Result<String> {
    synthesize(&geometry)
        .to_json_pretty()
        .context("Failed to serialize factory dump")
}
