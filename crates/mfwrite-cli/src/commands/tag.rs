//! Shared helpers for commands that talk to a tag

use anyhow::{bail, Context, Result};
use console::style;
use mfwrite_core::{
    parse_access_conditions, Config, Dump, ExecutionOutcome, KeyMap, KeyPair, PreparedWrite,
    Settings, TagWriter, MAX_SECTOR_COUNT,
};
use mfwrite_emulator::VirtualCardConnector;
use std::path::Path;

use crate::progress::{create_write_progress_bar, progress_callback};

/// Transport key of factory-fresh tags
pub const TRANSPORT_KEY: [u8; 6] = [0xFF; 6];

/// Connector for the tag selected on the command line
pub fn connector(card: Option<&Path>) -> Result<VirtualCardConnector> {
    match card {
        Some(path) => {
            tracing::debug!("Using virtual card {:?}", path);
            Ok(VirtualCardConnector::file(path))
        }
        None => bail!(
            "No tag selected.\n\
             Pass --card <IMAGE> (or set MFWRITE_CARD) to use a virtual card; \
             create one with 'mfwrite card-init'."
        ),
    }
}

/// Load a dump file
pub fn load_dump(path: &Path) -> Result<Dump> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dump: {}", path.display()))?;
    Dump::from_json(&json).with_context(|| format!("Invalid dump: {}", path.display()))
}

/// Load a key file, or the transport keys for every sector if none is given
pub fn load_keys(path: Option<&Path>) -> Result<KeyMap> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read keys: {}", path.display()))?;
            KeyMap::from_json(&json).with_context(|| format!("Invalid keys: {}", path.display()))
        }
        None => {
            tracing::debug!("No key file given, using transport keys");
            Ok(transport_keys())
        }
    }
}

/// Transport key pair for every sector of the largest tag
pub fn transport_keys() -> KeyMap {
    KeyMap::uniform(
        0..MAX_SECTOR_COUNT,
        KeyPair::new(TRANSPORT_KEY, TRANSPORT_KEY),
    )
}

/// Runtime config from settings, overridden by command-line flags
pub fn build_config(
    settings: &Settings,
    allow_manufacturer: bool,
    static_ac: Option<&str>,
) -> Result<Config> {
    let mut config = Config::from_settings(settings);
    if allow_manufacturer {
        config = config.allow_manufacturer_write(true);
    }
    if let Some(ac) = static_ac {
        let ac = parse_access_conditions(ac).context("Invalid --static-ac")?;
        config = config.static_access_conditions(Some(ac));
    }
    Ok(config)
}

/// Print the plan summary and every skipped position
pub fn print_prepared(prepared: &PreparedWrite, silent: bool) {
    println_if!(
        silent,
        "{} {}",
        style("Tag:").bold(),
        style(prepared.geometry).cyan()
    );
    println_if!(
        silent,
        "  {} {} of {} block(s) will be written",
        style("✓").green(),
        prepared.plan.len(),
        prepared.dump.block_count()
    );

    if !prepared.report.is_empty() {
        println_if!(
            silent,
            "\n{} {}",
            style("Skipped:").bold().yellow(),
            prepared.report.len()
        );
        for conflict in prepared.report.entries() {
            println_if!(
                silent,
                "  {} {}: {}",
                style("⚠").yellow(),
                conflict.position,
                conflict.reason
            );
        }
    }
}

/// Run a prepared write on a worker thread while showing progress
pub fn run_write(
    writer: &TagWriter<VirtualCardConnector>,
    prepared: PreparedWrite,
    keys: KeyMap,
    silent: bool,
) -> Result<ExecutionOutcome> {
    let pb = create_write_progress_bar(prepared.plan.len(), silent);
    let handle = writer.spawn_write(prepared, keys, Some(progress_callback(&pb)));
    let result = handle.wait();
    pb.finish_and_clear();
    Ok(result?)
}

/// Print the result of a finished write
pub fn print_outcome(outcome: &ExecutionOutcome, silent: bool) {
    match outcome {
        ExecutionOutcome::NothingToWrite => {
            println_if!(silent, "{}", style("Nothing to write.").yellow())
        }
        ExecutionOutcome::Completed { blocks_written } => println_if!(
            silent,
            "{} Wrote {} block(s)",
            style("✓").green().bold(),
            blocks_written
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // -------------------------------------------------------------------------
    // Input loading
    // -------------------------------------------------------------------------

    #[test]
    fn test_connector_requires_card() {
        assert!(connector(None).is_err());
        assert!(connector(Some(Path::new("card.json"))).is_ok());
    }

    #[test]
    fn test_default_keys() {
        let keys = load_keys(None).unwrap();
        assert_eq!(keys.len(), MAX_SECTOR_COUNT as usize);
        assert_eq!(keys.get(39).unwrap().a, Some(TRANSPORT_KEY));
    }

    #[test]
    fn test_load_keys_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"2": {{"b": "A0A1A2A3A4A5"}}}}"#).unwrap();
        let keys = load_keys(Some(file.path())).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys.get(2).unwrap().a, None);
        assert_eq!(
            keys.get(2).unwrap().b,
            Some([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5])
        );
    }

    #[test]
    fn test_load_dump_missing_file() {
        let err = load_dump(Path::new("/nonexistent/dump.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read dump"));
    }

    // -------------------------------------------------------------------------
    // Config
    // -------------------------------------------------------------------------

    #[test]
    fn test_build_config_flags_override_settings() {
        let config = build_config(&Settings::default(), true, Some("787788")).unwrap();
        assert!(config.allow_manufacturer_write);
        assert_eq!(config.static_access_conditions, Some([0x78, 0x77, 0x88]));
    }

    #[test]
    fn test_build_config_rejects_bad_ac() {
        assert!(build_config(&Settings::default(), false, Some("XYZ")).is_err());
        assert!(build_config(&Settings::default(), false, Some("FF07")).is_err());
    }
}
