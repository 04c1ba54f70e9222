//! Write command - writes a dump to the tag
//!
//! It handles:
//! - Loading the dump and keys
//! - Checking the tag and planning the write
//! - Showing skipped blocks and asking for confirmation
//! - Writing with progress display

use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use mfwrite_core::{Settings, TagWriter};
use std::path::PathBuf;

use super::tag;

/// Arguments for the write command
pub struct WriteArgs {
    pub dump: PathBuf,
    pub keys: Option<PathBuf>,
    pub card: Option<PathBuf>,
    pub allow_manufacturer: bool,
    pub static_ac: Option<String>,
    pub skip_confirm: bool,
    pub silent: bool,
    pub settings: Settings,
}

/// Execute the write command
pub fn execute(args: WriteArgs) -> Result<()> {
    let silent = args.silent;

    // Step 1: Load inputs
    println_if!(
        silent,
        "{} {}",
        style("Dump:").bold(),
        style(args.dump.display()).cyan()
    );
    let dump = tag::load_dump(&args.dump)?;
    let keys = tag::load_keys(args.keys.as_deref())?;
    println_if!(
        silent,
        "  {} {} block(s) in {} sector(s), keys for {} sector(s)",
        style("✓").green(),
        dump.block_count(),
        dump.sectors().count(),
        keys.len()
    );

    // Step 2: Check the tag
    let config = tag::build_config(
        &args.settings,
        args.allow_manufacturer,
        args.static_ac.as_deref(),
    )?;
    if config.allow_manufacturer_write {
        eprintln!(
            "{} The manufacturer block is part of this write",
            style("Warning:").yellow().bold()
        );
    }

    let writer = TagWriter::with_config(tag::connector(args.card.as_deref())?, config);
    let prepared = writer
        .prepare_dump(dump, &keys)
        .context("Failed to check tag")?;
    println_if!(silent);
    tag::print_prepared(&prepared, silent);

    if prepared.is_empty() {
        println_if!(silent, "\n{}", style("Nothing to write.").yellow());
        return Ok(());
    }

    // Step 3: Confirmation
    if !args.skip_confirm {
        println!();
        let prompt = if prepared.report.is_empty() {
            format!("Write {} block(s) to the tag?", prepared.plan.len())
        } else {
            format!(
                "Write {} block(s) to the tag, skipping {}?",
                prepared.plan.len(),
                prepared.report.len()
            )
        };
        let proceed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;

        if !proceed {
            println!("{}", style("Aborted.").yellow());
            return Ok(());
        }
    }

    // Step 4: Write
    println_if!(silent, "\n{}", style("Writing dump...").bold());
    let outcome = tag::run_write(&writer, prepared, keys, silent).context("Write failed")?;
    tag::print_outcome(&outcome, silent);

    Ok(())
}
