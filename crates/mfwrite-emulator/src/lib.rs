//! # mfwrite Emulator
//!
//! A file-backed virtual MIFARE Classic card. It implements the hardware
//! seam of `mfwrite-core` so that dumps can be planned and written end to end
//! without a reader attached.
//!
//! The card behaves like a real tag where it matters for writing:
//! - writes authenticate against the keys stored in the sector trailers
//! - access conditions are decoded and enforced, including the rule that a
//!   readable key B cannot authenticate
//! - sector trailers only change in the parts the key may write
//! - the manufacturer block is read-only unless the card is "magic"
//! - sectors can be marked dead to simulate unreachable sectors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod card;
pub mod connector;
pub mod image;

pub use card::VirtualCard;
pub use connector::VirtualCardConnector;
pub use image::CardImage;

use std::path::PathBuf;
use thiserror::Error;

/// Virtual card errors
#[derive(Error, Debug)]
pub enum EmulatorError {
    /// The image lacks a block its geometry requires
    #[error("Card image is missing sector {sector}, block {block}")]
    MissingBlock {
        /// Sector of the missing block
        sector: u8,
        /// Missing block
        block: u8,
    },

    /// Failed to read or write an image file
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path that caused the error
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },

    /// Malformed image JSON
    #[error("Invalid card image: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid block or sector in the image
    #[error(transparent)]
    Core(#[from] mfwrite_core::Error),

    /// A shared image lock was poisoned by a panicking session
    #[error("Card image lock poisoned")]
    Poisoned,
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;
