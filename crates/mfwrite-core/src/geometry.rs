//! Sector and block layout of MIFARE Classic tags
//!
//! Sectors 0-31 hold 4 blocks, sectors 32-39 (4K tags only) hold 16. The
//! last block of every sector is its trailer.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a block in bytes
pub const BLOCK_SIZE: usize = 16;

/// Size of a key in bytes
pub const KEY_SIZE: usize = 6;

/// Highest sector count of any supported tag (4K)
pub const MAX_SECTOR_COUNT: u8 = 40;

/// Highest block count of any sector
pub const MAX_BLOCK_COUNT_PER_SECTOR: u8 = 16;

/// Number of sectors with the small (4 block) layout
pub const SMALL_SECTOR_LIMIT: u8 = 32;

/// Sector counts of real tags: Mini, 1K, 2K, 4K
pub const SUPPORTED_SECTOR_COUNTS: [u8; 4] = [5, 16, 32, 40];

/// Geometry of a tag: how many sectors it has and how they are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TagGeometry {
    sector_count: u8,
}

impl TagGeometry {
    /// MIFARE Classic Mini (5 sectors)
    pub const MINI: Self = Self { sector_count: 5 };
    /// MIFARE Classic 1K (16 sectors)
    pub const CLASSIC_1K: Self = Self { sector_count: 16 };
    /// MIFARE Classic 2K (32 sectors)
    pub const CLASSIC_2K: Self = Self { sector_count: 32 };
    /// MIFARE Classic 4K (40 sectors)
    pub const CLASSIC_4K: Self = Self { sector_count: 40 };

    /// Create a geometry for a supported sector count
    pub fn new(sector_count: u8) -> Result<Self> {
        if SUPPORTED_SECTOR_COUNTS.contains(&sector_count) {
            Ok(Self { sector_count })
        } else {
            Err(Error::InvalidGeometry(sector_count))
        }
    }

    /// Total number of sectors
    pub fn sector_count(&self) -> u8 {
        self.sector_count
    }

    /// Whether the sector exists on this tag
    pub fn contains_sector(&self, sector: u8) -> bool {
        sector < self.sector_count
    }

    /// Number of blocks in `sector`, or `None` if the tag has no such sector
    pub fn block_count(&self, sector: u8) -> Option<u8> {
        self.contains_sector(sector).then(|| block_count_of(sector))
    }

    /// Index of the trailer block within `sector`
    pub fn trailer_block(&self, sector: u8) -> Option<u8> {
        self.block_count(sector).map(|count| count - 1)
    }

    /// Index of the last sector
    pub fn last_sector(&self) -> u8 {
        self.sector_count - 1
    }

    /// Total number of blocks on the tag
    pub fn total_blocks(&self) -> usize {
        (0..self.sector_count)
            .map(|s| block_count_of(s) as usize)
            .sum()
    }
}

/// Block count of a sector, independent of any particular tag
pub fn block_count_of(sector: u8) -> u8 {
    if sector < SMALL_SECTOR_LIMIT {
        4
    } else {
        MAX_BLOCK_COUNT_PER_SECTOR
    }
}

/// Trailer index of a sector, independent of any particular tag
pub fn trailer_of(sector: u8) -> u8 {
    block_count_of(sector) - 1
}

impl TryFrom<u8> for TagGeometry {
    type Error = Error;

    fn try_from(sector_count: u8) -> Result<Self> {
        Self::new(sector_count)
    }
}

impl From<TagGeometry> for u8 {
    fn from(geometry: TagGeometry) -> u8 {
        geometry.sector_count
    }
}

impl fmt::Display for TagGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.sector_count {
            5 => "Mini",
            16 => "1K",
            32 => "2K",
            40 => "4K",
            _ => "unknown",
        };
        write!(f, "MIFARE Classic {} ({} sectors)", name, self.sector_count)
    }
}
