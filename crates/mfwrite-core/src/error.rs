//! Error types for the mfwrite core library
//!
//! Planning problems never show up here: a block that cannot be written is
//! recorded in a [`ConflictReport`](crate::plan::ConflictReport) instead.
//! What remains are the failures that stop an operation outright.

use thiserror::Error;

/// Failure of a single hardware write
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// The block index is not part of the sector on this tag
    #[error("Block {block} is not part of sector {sector}")]
    NotInSector {
        /// Sector that was addressed
        sector: u8,
        /// Block that was addressed
        block: u8,
    },

    /// The tag rejected the write (authentication or transfer failure)
    #[error("Writing sector {sector}, block {block} failed")]
    Failed {
        /// Sector that was addressed
        sector: u8,
        /// Block that was addressed
        block: u8,
    },

    /// No key is known for the sector
    #[error("No key known for sector {sector}")]
    NoKey {
        /// Sector without keys
        sector: u8,
    },
}

/// Main error type for mfwrite operations
#[derive(Error, Debug)]
pub enum Error {
    /// The dump addresses a sector the present tag does not have
    #[error("Tag too small for dump: dump uses sector {sector}, tag has {sector_count} sectors")]
    GeometryMismatch {
        /// Highest sector referenced by the dump
        sector: u8,
        /// Sector count of the present tag
        sector_count: u8,
    },

    /// The dump addresses a block beyond the sector's block count
    #[error("Block {block} out of range for sector {sector} ({block_count} blocks)")]
    BlockOutOfRange {
        /// Sector of the offending block
        sector: u8,
        /// Offending block index
        block: u8,
        /// Number of blocks in that sector
        block_count: u8,
    },

    /// Unsupported sector count for a tag geometry
    #[error("Unsupported sector count: {0}")]
    InvalidGeometry(u8),

    /// Sector index out of range for any tag
    #[error("Sector out of range: {0}")]
    InvalidSector(u8),

    /// Block index out of range for any tag
    #[error("Block out of range: {0}")]
    InvalidBlock(u8),

    /// Input is not a hex string
    #[error("Not a hex string: {0}")]
    InvalidHex(String),

    /// Hex input decoded to the wrong number of bytes
    #[error("Invalid {what}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// What was being parsed
        what: &'static str,
        /// Expected byte count
        expected: usize,
        /// Actual byte count
        actual: usize,
    },

    /// Could not acquire or use the tag session
    #[error("Tag connection error: {0}")]
    Connection(String),

    /// A single-block write failed
    #[error(transparent)]
    Write(#[from] WriteError),

    /// A dump write stopped at the given position; earlier blocks stay written
    #[error("Write aborted at sector {sector}, block {block}: {source}")]
    WriteAborted {
        /// Sector of the failed block
        sector: u8,
        /// Failed block
        block: u8,
        /// Cause reported by the write service
        source: WriteError,
    },

    /// A planned block has no payload in the dump or no key in the key map
    #[error("Write plan does not match its inputs at sector {sector}, block {block}")]
    PlanMismatch {
        /// Sector of the planned block
        sector: u8,
        /// Planned block
        block: u8,
    },

    /// The background writer went away without reporting a result
    #[error("Background writer terminated without a result")]
    WorkerLost,

    /// IO error while reading or writing files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using the mfwrite error type
pub type Result<T> = std::result::Result<T, Error>;
