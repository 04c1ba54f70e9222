//! Format command - restores the tag to its factory state

use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use mfwrite_core::TagWriter;
use std::path::PathBuf;

use super::tag;

/// Arguments for the format command
pub struct FormatArgs {
    pub keys: Option<PathBuf>,
    pub card: Option<PathBuf>,
    pub skip_confirm: bool,
    pub silent: bool,
}

/// Execute the format command
pub fn execute(args: FormatArgs) -> Result<()> {
    let silent = args.silent;
    let keys = tag::load_keys(args.keys.as_deref())?;

    let writer = TagWriter::new(tag::connector(args.card.as_deref())?);
    let prepared = writer
        .prepare_factory_format(&keys)
        .context("Failed to check tag")?;
    tag::print_prepared(&prepared, silent);

    if prepared.is_empty() {
        println_if!(silent, "\n{}", style("Nothing to write.").yellow());
        return Ok(());
    }

    if !args.skip_confirm {
        println!();
        println!(
            "{}",
            style("ALL DATA AND KEYS ON THE TAG WILL BE RESET!")
                .red()
                .bold()
        );
        let proceed = Confirm::new()
            .with_prompt(format!("Format {}?", prepared.geometry))
            .default(false)
            .interact()?;

        if !proceed {
            println!("{}", style("Aborted.").yellow());
            return Ok(());
        }
    }

    println_if!(silent, "\n{}", style("Formatting tag...").bold());
    let outcome = tag::run_write(&writer, prepared, keys, silent).context("Format failed")?;
    tag::print_outcome(&outcome, silent);

    Ok(())
}
