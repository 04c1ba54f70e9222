//! Virtual card session
//!
//! [`VirtualCard`] answers the engine's hardware calls from a [`CardImage`]
//! the way a real MIFARE Classic tag would: writes must authenticate against
//! the stored sector keys and are checked against the decoded access
//! conditions. A trailer write only changes the parts the key may write.
//! Accepted writes reach the backing store before the write reports success.

use crate::connector::Backing;
use crate::image::CardImage;
use mfwrite_core::access::TRAILER_GROUP;
use mfwrite_core::{
    access_group, Block, Diagnostics, Key, KeyMap, KeyType, Positions, TagGeometry, TagSession,
    WriteDiagnostic, WriteStatus,
};

/// An open session with a virtual card
pub struct VirtualCard {
    image: CardImage,
    backing: Option<Backing>,
}

impl VirtualCard {
    /// Session over an in-memory image without a backing store
    pub fn new(image: CardImage) -> Self {
        Self {
            image,
            backing: None,
        }
    }

    pub(crate) fn with_backing(image: CardImage, backing: Backing) -> Self {
        Self {
            image,
            backing: Some(backing),
        }
    }

    /// Current card contents
    pub fn image(&self) -> &CardImage {
        &self.image
    }

    /// Whether `key` authenticates `sector` as `key_type`
    fn authenticate(&self, sector: u8, key: &Key, key_type: KeyType) -> bool {
        if self.image.is_dead(sector) {
            return false;
        }
        self.image.key(sector, key_type).as_ref() == Some(key)
    }

    fn write_trailer(
        &mut self,
        sector: u8,
        block: u8,
        data: &Block,
        key_type: KeyType,
    ) -> WriteStatus {
        let Some(access) = self.image.access_conditions(sector) else {
            return WriteStatus::Failure;
        };
        let Some(current) = self.image.trailer(sector).copied() else {
            return WriteStatus::Failure;
        };

        let permissions = access.trailer_write();
        let mut updated = current;
        let parts = [
            (permissions.key_a, 0..6),
            (permissions.access_bits, 6..10),
            (permissions.key_b, 10..16),
        ];
        let mut any = false;
        for (permission, range) in parts {
            if permission.allows(key_type) {
                updated[range.clone()].copy_from_slice(&data[range]);
                any = true;
            }
        }
        if !any {
            tracing::debug!("Sector {}: trailer not writable with key {}", sector, key_type);
            return WriteStatus::Failure;
        }
        self.store(sector, block, updated)
    }

    /// Commit one block, writing the image through to its backing
    ///
    /// The session image only changes once the backing accepted it.
    fn store(&mut self, sector: u8, block: u8, data: Block) -> WriteStatus {
        let mut updated = self.image.clone();
        if let Err(e) = updated.set_block(sector, block, data) {
            tracing::warn!("Sector {}, block {}: {}", sector, block, e);
            return WriteStatus::Failure;
        }
        if let Some(backing) = &self.backing {
            if let Err(e) = backing.persist(&updated) {
                tracing::warn!(
                    "Sector {}, block {}: failed to persist card image: {}",
                    sector,
                    block,
                    e
                );
                return WriteStatus::Failure;
            }
        }
        self.image = updated;
        WriteStatus::Success
    }

    fn classify_sector(
        &self,
        sector: u8,
        blocks: &[u8],
        keys: &KeyMap,
    ) -> Option<Vec<(u8, WriteDiagnostic)>> {
        let block_count = self.image.geometry.block_count(sector)?;
        let pair = keys.get(sector)?;
        let authenticated = [KeyType::A, KeyType::B].into_iter().any(|key_type| {
            pair.get(key_type)
                .is_some_and(|key| self.authenticate(sector, key, key_type))
        });
        if !authenticated {
            tracing::debug!("Sector {}: no known key authenticates", sector);
            return None;
        }
        let access = self.image.access_conditions(sector)?;

        let diagnostics = blocks
            .iter()
            .map(|&block| {
                let diagnostic = if block >= block_count {
                    WriteDiagnostic::Invalid
                } else if sector == 0 && block == 0 && self.image.magic {
                    access.data_diagnostic(0)
                } else {
                    access.diagnostic(sector, block)
                };
                (block, diagnostic)
            })
            .collect();
        Some(diagnostics)
    }
}

impl TagSession for VirtualCard {
    fn tag_geometry(&self) -> TagGeometry {
        self.image.geometry
    }

    fn classify_writability(
        &mut self,
        positions: &Positions,
        keys: &KeyMap,
    ) -> mfwrite_core::Result<Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        for (sector, blocks) in positions {
            if let Some(entries) = self.classify_sector(*sector, blocks, keys) {
                diagnostics.insert(*sector, entries.into_iter().collect());
            }
        }
        Ok(diagnostics)
    }

    fn write_block(
        &mut self,
        sector: u8,
        block: u8,
        data: &Block,
        key: &Key,
        use_as_key_b: bool,
    ) -> WriteStatus {
        let key_type = if use_as_key_b { KeyType::B } else { KeyType::A };
        let Some(block_count) = self.image.geometry.block_count(sector) else {
            return WriteStatus::Failure;
        };
        if !self.authenticate(sector, key, key_type) {
            tracing::debug!("Sector {}: authentication with key {} failed", sector, key_type);
            return WriteStatus::Failure;
        }
        if block >= block_count {
            return WriteStatus::NotInSector;
        }
        let Some(access) = self.image.access_conditions(sector) else {
            return WriteStatus::Failure;
        };

        let group = access_group(sector, block);
        if group == TRAILER_GROUP {
            return self.write_trailer(sector, block, data, key_type);
        }
        if sector == 0 && block == 0 && !self.image.magic {
            return WriteStatus::Failure;
        }
        if !access.data_write(group).allows(key_type) {
            tracing::debug!(
                "Sector {}, block {}: key {} may not write",
                sector,
                block,
                key_type
            );
            return WriteStatus::Failure;
        }
        self.store(sector, block, *data)
    }

    fn close(&mut self) {
        tracing::debug!("Virtual card released: {}", self.image.geometry);
    }
}
