//! mfwrite - Safely write dumps to MIFARE Classic tags
//!
//! # Usage
//!
//! ```bash
//! # Create a virtual 1K card to work against
//! mfwrite card-init card.json --sectors 16
//!
//! # Show what a dump write would do
//! mfwrite --card card.json plan dump.json --keys keys.json
//!
//! # Write it
//! mfwrite --card card.json write dump.json --keys keys.json
//!
//! # Write a single block
//! mfwrite --card card.json write-block 1 2 00112233445566778899AABBCCDDEEFF --key-a FFFFFFFFFFFF
//!
//! # Restore the tag to its factory state
//! mfwrite --card card.json format --keys keys.json
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use console::style;
use mfwrite_core::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod progress;

/// mfwrite - Safely write dumps to MIFARE Classic tags
#[derive(Parser)]
#[command(name = "mfwrite")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Suppress ALL output (implies --quiet and --yes)
    #[arg(long, global = true)]
    silent: bool,

    /// Virtual card image to use as the tag
    #[arg(long, global = true, env = "MFWRITE_CARD", value_name = "IMAGE")]
    card: Option<PathBuf>,

    /// Configuration file (overrides the default location)
    #[arg(long, global = true, value_name = "FILE")]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the tag and show which blocks of a dump can be written
    Plan {
        /// Dump file (JSON)
        dump: PathBuf,

        /// Key file (JSON); default transport keys are used if omitted
        #[arg(short, long)]
        keys: Option<PathBuf>,

        /// Include the manufacturer block (sector 0, block 0)
        #[arg(long)]
        allow_manufacturer: bool,

        /// Replace the access conditions of every trailer (3 bytes hex)
        #[arg(long, value_name = "HEX")]
        static_ac: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Write a dump to the tag
    Write {
        /// Dump file (JSON)
        dump: PathBuf,

        /// Key file (JSON); default transport keys are used if omitted
        #[arg(short, long)]
        keys: Option<PathBuf>,

        /// Include the manufacturer block (sector 0, block 0)
        #[arg(long)]
        allow_manufacturer: bool,

        /// Replace the access conditions of every trailer (3 bytes hex)
        #[arg(long, value_name = "HEX")]
        static_ac: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Restore the tag to its factory state
    Format {
        /// Key file (JSON); default transport keys are used if omitted
        #[arg(short, long)]
        keys: Option<PathBuf>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Write a single block
    WriteBlock {
        /// Sector (0-39)
        sector: u8,

        /// Block within the sector (0-15)
        block: u8,

        /// Block data (16 bytes hex)
        data: String,

        /// Key A (6 bytes hex)
        #[arg(long, value_name = "HEX")]
        key_a: Option<String>,

        /// Key B (6 bytes hex)
        #[arg(long, value_name = "HEX")]
        key_b: Option<String>,

        /// Skip confirmation prompt for trailers and the manufacturer block
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Print the factory dump of a tag type
    Factory {
        /// Sector count of the tag (5, 16, 32 or 40)
        #[arg(short, long, default_value_t = 16)]
        sectors: u8,

        /// Write the dump to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a factory-fresh virtual card image
    CardInit {
        /// Image file to create
        path: PathBuf,

        /// Sector count of the card (5, 16, 32 or 40)
        #[arg(short, long, default_value_t = 16)]
        sectors: u8,

        /// Card UID (4 bytes hex)
        #[arg(long, default_value = "01020304")]
        uid: String,

        /// Allow writing the manufacturer block
        #[arg(long)]
        magic: bool,

        /// Overwrite an existing image
        #[arg(short, long)]
        force: bool,
    },

    /// Manage the configuration file
    Config {
        /// Create a configuration file with default values
        #[arg(long)]
        init: bool,

        /// Show the path to the configuration file
        #[arg(long)]
        path: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    // Set up panic handler for nicer error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("{} {}", style("Error:").red().bold(), panic_info);
    }));

    if let Err(e) = run() {
        // "{:#}" keeps the cause on the same line: "context: cause"
        eprintln!("{} {:#}", style("Error:").red().bold(), e);

        // Show cause chain one per line with a backtrace
        if std::env::var("RUST_BACKTRACE").is_ok() {
            for cause in e.chain().skip(1) {
                eprintln!("  {} {}", style("Caused by:").yellow(), cause);
            }
        }

        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from_path(
        cli.config_file
            .clone()
            .or_else(Settings::config_path),
    );

    // --silent implies --quiet (no logs at all, not even errors to tracing)
    let quiet = cli.quiet || settings.behavior.quiet;
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if quiet || cli.silent {
        EnvFilter::new("off")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let silent = cli.silent;
    // --silent implies --yes (skip confirmations)
    let skip_confirm = |yes: bool| yes || silent || settings.behavior.skip_confirmation;

    match cli.command {
        Commands::Plan {
            dump,
            keys,
            allow_manufacturer,
            static_ac,
            json,
        } => commands::plan::execute(commands::plan::PlanArgs {
            dump,
            keys,
            card: cli.card,
            allow_manufacturer,
            static_ac,
            json,
            silent,
            settings: settings.clone(),
        }),
        Commands::Write {
            dump,
            keys,
            allow_manufacturer,
            static_ac,
            yes,
        } => commands::write::execute(commands::write::WriteArgs {
            dump,
            keys,
            card: cli.card,
            allow_manufacturer,
            static_ac,
            skip_confirm: skip_confirm(yes),
            silent,
            settings: settings.clone(),
        }),
        Commands::Format { keys, yes } => commands::format::execute(commands::format::FormatArgs {
            keys,
            card: cli.card,
            skip_confirm: skip_confirm(yes),
            silent,
        }),
        Commands::WriteBlock {
            sector,
            block,
            data,
            key_a,
            key_b,
            yes,
        } => commands::write_block::execute(commands::write_block::WriteBlockArgs {
            sector,
            block,
            data,
            key_a,
            key_b,
            card: cli.card,
            skip_confirm: skip_confirm(yes),
            silent,
        }),
        Commands::Factory { sectors, output } => {
            commands::factory::execute(sectors, output.as_deref(), silent)
        }
        Commands::CardInit {
            path,
            sectors,
            uid,
            magic,
            force,
        } => commands::card_init::execute(commands::card_init::CardInitArgs {
            path,
            sectors,
            uid,
            magic,
            force,
            silent,
        }),
        Commands::Config { init, path, json } => {
            commands::config::execute(commands::config::ConfigArgs {
                init,
                path,
                json,
                silent,
                config_file: cli.config_file,
            })
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}
