//! # mfwrite Core
//!
//! Write-authorization planning and execution for MIFARE Classic tags.
//!
//! ## Modules
//!
//! - `geometry`: Sector and block layout of Mini, 1K, 2K and 4K tags
//! - `dump`, `keys`: What to write and which keys are known
//! - `diagnostic`: Interpretation of per-block write diagnostics
//! - `plan`: Reconciliation into a write plan and a conflict report
//! - `executor`: Ordered, abort-on-failure execution of a plan
//! - `single`: Single block writes with key B to key A fallback
//! - `factory`: Factory-default dumps
//! - `access`: Access-condition decoding for classifiers
//! - `session`: The hardware seam (`TagSession`, `TagConnector`)
//! - `writer`: End-to-end orchestration
//! - `error`: Error types and result aliases
//! - `config`: Runtime configuration
//! - `settings`: Persistent user settings from configuration file
//!
//! ## Example
//!
//! ```ignore
//! use mfwrite_core::{Dump, KeyMap, TagWriter};
//!
//! let writer = TagWriter::new(connector);
//! let prepared = writer.prepare_dump(Dump::from_json(&dump_json)?, &keys)?;
//! for conflict in prepared.report.entries() {
//!     println!("{}: {}", conflict.position, conflict.reason);
//! }
//! let outcome = writer.write_dump(&prepared, &keys, None)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod config;
pub mod diagnostic;
pub mod dump;
pub mod error;
pub mod executor;
pub mod factory;
pub mod geometry;
pub mod hexfmt;
pub mod keys;
pub mod plan;
pub mod session;
pub mod settings;
pub mod single;
pub mod writer;

pub use access::{access_group, AccessConditions, Permission, TrailerPermissions};
pub use config::Config;
pub use diagnostic::{interpret, BlockReason, Diagnostics, EligibilityOutcome, WriteDiagnostic};
pub use dump::{Block, Dump, Positions};
pub use error::{Error, Result, WriteError};
pub use executor::{
    BackgroundWrite, DumpWriteExecutor, ExecutionOutcome, ProgressCallback, WriteProgress,
};
pub use factory::{synthesize, DEFAULT_TRAILER, EMPTY_BLOCK, LAST_SECTOR_TRAILER};
pub use geometry::{TagGeometry, BLOCK_SIZE, KEY_SIZE, MAX_SECTOR_COUNT};
pub use hexfmt::{parse_access_conditions, parse_block, parse_key, to_hex};
pub use keys::{Key, KeyMap, KeyPair, KeyType};
pub use plan::{Conflict, ConflictPosition, ConflictReport, WritePlan, WritePlanBuilder};
pub use session::{Session, TagConnector, TagSession, WriteStatus};
pub use settings::{BehaviorSettings, Settings, SettingsError, WriteSettings};
pub use single::{BlockTarget, SingleBlockWriter};
pub use writer::{PreparedWrite, TagWriter};
