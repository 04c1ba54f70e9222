//! Write-block command - writes one block with explicit keys

use anyhow::{bail, Context, Result};
use console::style;
use dialoguer::Confirm;
use mfwrite_core::geometry::trailer_of;
use mfwrite_core::{parse_block, parse_key, AccessConditions, BlockTarget, KeyPair, TagWriter};
use std::path::PathBuf;

use super::tag;

/// Arguments for the write-block command
pub struct WriteBlockArgs {
    pub sector: u8,
    pub block: u8,
    pub data: String,
    pub key_a: Option<String>,
    pub key_b: Option<String>,
    pub card: Option<PathBuf>,
    pub skip_confirm: bool,
    pub silent: bool,
}

/// Execute the write-block command
pub fn execute(args: WriteBlockArgs) -> Result<()> {
    let silent = args.silent;
    let target = BlockTarget::new(args.sector, args.block)?;
    let data = parse_block(&args.data).context("Invalid block data")?;
    let keys = parse_keys(args.key_a.as_deref(), args.key_b.as_deref())?;

    if is_definite_trailer(target) && AccessConditions::from_trailer(&data).is_none() {
        bail!(
            "Block data has invalid access conditions ({}).\n\
             Writing it would make sector {} unusable.",
            mfwrite_core::to_hex(&data[6..9]),
            target.sector()
        );
    }

    if let Some(warning) = warning_for(target) {
        eprintln!("{} {}", style("Warning:").yellow().bold(), warning);
        if !args.skip_confirm {
            let proceed = Confirm::new()
                .with_prompt("Write this block anyway?")
                .default(false)
                .interact()?;
            if !proceed {
                println!("{}", style("Aborted.").yellow());
                return Ok(());
            }
        }
    }

    let writer = TagWriter::new(tag::connector(args.card.as_deref())?);
    writer
        .write_block(target, &data, &keys)
        .with_context(|| {
            format!(
                "Failed to write sector {}, block {}",
                target.sector(),
                target.block()
            )
        })?;

    println_if!(
        silent,
        "{} Wrote sector {}, block {}",
        style("✓").green().bold(),
        target.sector(),
        target.block()
    );
    Ok(())
}

fn parse_keys(key_a: Option<&str>, key_b: Option<&str>) -> Result<KeyPair> {
    let keys = KeyPair {
        a: key_a.map(parse_key).transpose().context("Invalid key A")?,
        b: key_b.map(parse_key).transpose().context("Invalid key B")?,
    };
    if keys.is_empty() {
        bail!("At least one of --key-a or --key-b is required");
    }
    Ok(keys)
}

/// Trailer position for the sector's layout, regardless of tag size
fn is_definite_trailer(target: BlockTarget) -> bool {
    target.block() == trailer_of(target.sector())
}

fn warning_for(target: BlockTarget) -> Option<String> {
    if target.is_manufacturer_block() {
        Some(
            "Sector 0, block 0 is the manufacturer block. \
             Only special (magic) tags accept writes to it."
                .to_string(),
        )
    } else if target.is_sector_trailer() {
        Some(format!(
            "Block {} of sector {} is a sector trailer. \
             Wrong keys or access conditions lock the sector for good.",
            target.block(),
            target.sector()
        ))
    } else {
        None
    }
}
