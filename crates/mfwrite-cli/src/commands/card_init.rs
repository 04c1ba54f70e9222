//! Card-init command - creates a factory-fresh virtual card image

use anyhow::{bail, Context, Result};
use console::style;
use mfwrite_core::hexfmt::parse_hex;
use mfwrite_core::TagGeometry;
use mfwrite_emulator::CardImage;
use std::path::PathBuf;

/// Arguments for the card-init command
pub struct CardInitArgs {
    pub path: PathBuf,
    pub sectors: u8,
    pub uid: String,
    pub magic: bool,
    pub force: bool,
    pub silent: bool,
}

/// Execute the card-init command
pub fn execute(args: CardInitArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!(
            "Card image already exists: {}\n\
             Use --force to overwrite it.",
            args.path.display()
        );
    }

    let geometry = TagGeometry::new(args.sectors)?;
    let uid: [u8; 4] = parse_hex(&args.uid, "UID").context("Invalid --uid")?;
    let image = CardImage::blank(geometry, uid).with_magic(args.magic);
    image
        .save(&args.path)
        .context("Failed to save card image")?;

    println_if!(
        args.silent,
        "{} Created {}{} at {}",
        style("✓").green(),
        geometry,
        if args.magic { " (magic)" } else { "" },
        args.path.display()
    );
    Ok(())
}
