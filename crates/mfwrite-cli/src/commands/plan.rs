//! Plan command - shows what writing a dump would do, without writing

use anyhow::{Context, Result};
use console::style;
use mfwrite_core::{KeyType, PreparedWrite, Settings, TagWriter};
use std::path::PathBuf;

use super::tag;

/// Arguments for the plan command
pub struct PlanArgs {
    pub dump: PathBuf,
    pub keys: Option<PathBuf>,
    pub card: Option<PathBuf>,
    pub allow_manufacturer: bool,
    pub static_ac: Option<String>,
    pub json: bool,
    pub silent: bool,
    pub settings: Settings,
}

/// Execute the plan command
pub fn execute(args: PlanArgs) -> Result<()> {
    let dump = tag::load_dump(&args.dump)?;
    let keys = tag::load_keys(args.keys.as_deref())?;
    let config = tag::build_config(
        &args.settings,
        args.allow_manufacturer,
        args.static_ac.as_deref(),
    )?;

    let writer = TagWriter::with_config(tag::connector(args.card.as_deref())?, config);
    let prepared = writer
        .prepare_dump(dump, &keys)
        .context("Failed to check tag")?;

    if args.silent {
        return Ok(());
    }

    if args.json {
        println!("{}", to_json(&prepared)?);
    } else {
        tag::print_prepared(&prepared, false);
        print_plan(&prepared);
    }

    Ok(())
}

/// JSON form of a prepared write for scripting
fn to_json(prepared: &PreparedWrite) -> Result<String> {
    let output = serde_json::json!({
        "sector_count": prepared.geometry.sector_count(),
        "plan": &prepared.plan,
        "conflicts": &prepared.report,
    });
    serde_json::to_string_pretty(&output).context("Failed to serialize plan to JSON")
}

fn print_plan(prepared: &PreparedWrite) {
    if prepared.is_empty() {
        return;
    }
    println!("\n{}", style("Plan:").bold());
    for sector in prepared.plan.sectors() {
        let blocks: Vec<String> = prepared
            .plan
            .iter()
            .filter(|(s, _, _)| *s == sector)
            .map(|(_, block, key)| format!("{} ({})", block, key_label(key)))
            .collect();
        println!("  Sector {:>2}: {}", sector, blocks.join(", "));
    }
}

fn key_label(key: KeyType) -> &'static str {
    match key {
        KeyType::A => "key A",
        KeyType::B => "key B",
    }
}
