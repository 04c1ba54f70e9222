//! Card images
//!
//! A card image is the full memory of a virtual tag as JSON:
//!
//! ```json
//! {
//!   "geometry": 16,
//!   "magic": false,
//!   "dead_sectors": [7],
//!   "blocks": { "0": { "0": "11223344...", "1": "0000...", ... }, ... }
//! }
//! ```
//!
//! Every block of every sector must be present.

use crate::{EmulatorError, Result};
use mfwrite_core::factory;
use mfwrite_core::{AccessConditions, Block, Dump, Key, KeyType, TagGeometry, KEY_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Full memory of a virtual tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardImage {
    /// Sector layout
    pub geometry: TagGeometry,

    /// Whether the manufacturer block is writable (a "magic" card)
    #[serde(default)]
    pub magic: bool,

    /// Sectors that never authenticate
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dead_sectors: BTreeSet<u8>,

    /// Block contents
    pub blocks: Dump,
}

impl CardImage {
    /// Image of a factory-fresh card with the given UID
    pub fn blank(geometry: TagGeometry, uid: [u8; 4]) -> Self {
        let mut blocks = factory::synthesize(&geometry);
        blocks.set_manufacturer_block(manufacturer_block(uid));
        Self {
            geometry,
            magic: false,
            dead_sectors: BTreeSet::new(),
            blocks,
        }
    }

    /// Mark the card as magic
    pub fn with_magic(mut self, magic: bool) -> Self {
        self.magic = magic;
        self
    }

    /// Check that every block of the geometry is present
    pub fn validate(&self) -> Result<()> {
        self.blocks.check_fits(&self.geometry)?;
        for sector in 0..self.geometry.sector_count() {
            let block_count = self.geometry.block_count(sector).unwrap_or(0);
            for block in 0..block_count {
                if self.blocks.get(sector, block).is_none() {
                    return Err(EmulatorError::MissingBlock { sector, block });
                }
            }
        }
        if let Some(sector) = self
            .dead_sectors
            .iter()
            .find(|s| !self.geometry.contains_sector(**s))
        {
            return Err(EmulatorError::Core(mfwrite_core::Error::InvalidSector(
                *sector,
            )));
        }
        Ok(())
    }

    /// Parse and validate an image
    pub fn from_json(json: &str) -> Result<Self> {
        let image: Self = serde_json::from_str(json)?;
        image.validate()?;
        Ok(image)
    }

    /// JSON form of the image
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load an image file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| EmulatorError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let image = Self::from_json(&json)?;
        tracing::debug!("Loaded card image {:?} ({})", path, image.geometry);
        Ok(image)
    }

    /// Write the image to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty()?;
        std::fs::write(path, json).map_err(|e| EmulatorError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!("Saved card image {:?}", path);
        Ok(())
    }

    /// Contents of a block
    pub fn block(&self, sector: u8, block: u8) -> Option<&Block> {
        self.blocks.get(sector, block)
    }

    /// Overwrite a block
    pub fn set_block(&mut self, sector: u8, block: u8, data: Block) -> Result<()> {
        self.blocks.insert(sector, block, data)?;
        Ok(())
    }

    /// Trailer block of a sector
    pub fn trailer(&self, sector: u8) -> Option<&Block> {
        let trailer = self.geometry.trailer_block(sector)?;
        self.block(sector, trailer)
    }

    /// Stored key of a sector
    pub fn key(&self, sector: u8, key_type: KeyType) -> Option<Key> {
        let trailer = self.trailer(sector)?;
        let offset = match key_type {
            KeyType::A => 0,
            KeyType::B => 10,
        };
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&trailer[offset..offset + KEY_SIZE]);
        Some(key)
    }

    /// Decoded access conditions of a sector, `None` if corrupted
    pub fn access_conditions(&self, sector: u8) -> Option<AccessConditions> {
        AccessConditions::from_trailer(self.trailer(sector)?)
    }

    /// Whether a sector refuses authentication
    pub fn is_dead(&self, sector: u8) -> bool {
        self.dead_sectors.contains(&sector)
    }
}

fn manufacturer_block(uid: [u8; 4]) -> Block {
    let bcc = uid.iter().fold(0u8, |acc, b| acc ^ b);
    let mut block = [0u8; 16];
    block[..4].copy_from_slice(&uid);
    block[4] = bcc;
    // SAK and ATQA of a 1K card
    block[5] = 0x08;
    block[6] = 0x04;
    block[7] = 0x00;
    block
}
