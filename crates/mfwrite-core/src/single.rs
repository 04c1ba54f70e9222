//! Single block writes
//!
//! Unlike a dump write, a single block write is not planned ahead: the
//! operator names the position and the data, and [`SingleBlockWriter`] tries
//! key B first, then key A if key B was rejected.

use crate::dump::Block;
use crate::error::{Error, Result, WriteError};
use crate::geometry::{MAX_BLOCK_COUNT_PER_SECTOR, MAX_SECTOR_COUNT};
use crate::keys::{KeyPair, KeyType};
use crate::session::{TagSession, WriteStatus};

/// A validated single block position
///
/// Only checked against the largest tag layout; whether the block exists on
/// the present tag is reported by the write itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTarget {
    sector: u8,
    block: u8,
}

impl BlockTarget {
    /// Validate a position (sector 0..=39, block 0..=15)
    pub fn new(sector: u8, block: u8) -> Result<Self> {
        if sector >= MAX_SECTOR_COUNT {
            return Err(Error::InvalidSector(sector));
        }
        if block >= MAX_BLOCK_COUNT_PER_SECTOR {
            return Err(Error::InvalidBlock(block));
        }
        Ok(Self { sector, block })
    }

    /// Sector index
    pub fn sector(&self) -> u8 {
        self.sector
    }

    /// Block index within the sector
    pub fn block(&self) -> u8 {
        self.block
    }

    /// Whether the block is a sector trailer on a tag that has it
    ///
    /// Block 3 is the trailer of small sectors, block 15 of large ones.
    pub fn is_sector_trailer(&self) -> bool {
        self.block == 3 || self.block == 15
    }

    /// Whether the block is the manufacturer block (sector 0, block 0)
    pub fn is_manufacturer_block(&self) -> bool {
        self.sector == 0 && self.block == 0
    }
}

/// Writes one block over an open session
pub struct SingleBlockWriter<'s> {
    session: &'s mut (dyn TagSession + Send),
}

impl<'s> SingleBlockWriter<'s> {
    /// Create a writer over `session`
    pub fn new(session: &'s mut (dyn TagSession + Send)) -> Self {
        Self { session }
    }

    /// Write `data` to `target`
    ///
    /// Key B is tried first if known. Key A is tried if key B is unknown or
    /// was rejected. A block outside the sector is reported immediately
    /// without a second attempt.
    pub fn write_one(
        &mut self,
        target: BlockTarget,
        data: &Block,
        keys: &KeyPair,
    ) -> std::result::Result<(), WriteError> {
        let BlockTarget { sector, block } = target;
        if keys.is_empty() {
            return Err(WriteError::NoKey { sector });
        }

        let mut status = WriteStatus::Failure;
        for key_type in [KeyType::B, KeyType::A] {
            let Some(key) = keys.get(key_type) else {
                continue;
            };
            tracing::debug!(
                "Sector {}, block {}: trying key {}",
                sector,
                block,
                key_type
            );
            status = self
                .session
                .write_block(sector, block, data, key, key_type.use_as_key_b());
            if status != WriteStatus::Failure {
                break;
            }
        }

        match status {
            WriteStatus::Success => {
                tracing::info!("Sector {}, block {}: written", sector, block);
                Ok(())
            }
            WriteStatus::NotInSector => Err(WriteError::NotInSector { sector, block }),
            WriteStatus::Failure => Err(WriteError::Failed { sector, block }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockTagSession;
    use mockall::predicate::{always, eq};
    use mockall::Sequence;

    const KEY_A: [u8; 6] = [0xA0; 6];
    const KEY_B: [u8; 6] = [0xB0; 6];
    const DATA: Block = [0x42; 16];

    fn target(sector: u8, block: u8) -> BlockTarget {
        BlockTarget::new(sector, block).unwrap()
    }

    // ------------------------------------------------------------------------
    // Target validation
    // ------------------------------------------------------------------------

    #[test]
    fn test_target_validation() {
        assert!(BlockTarget::new(39, 15).is_ok());
        assert!(matches!(BlockTarget::new(40, 0), Err(Error::InvalidSector(40))));
        assert!(matches!(BlockTarget::new(0, 16), Err(Error::InvalidBlock(16))));
    }

    #[test]
    fn test_target_flags() {
        assert!(target(0, 0).is_manufacturer_block());
        assert!(!target(1, 0).is_manufacturer_block());
        assert!(target(5, 3).is_sector_trailer());
        assert!(target(35, 15).is_sector_trailer());
        assert!(!target(5, 2).is_sector_trailer());
    }

    // ------------------------------------------------------------------------
    // Key fallback
    // ------------------------------------------------------------------------

    #[test]
    fn test_key_b_first() {
        let mut session = MockTagSession::new();
        session
            .expect_write_block()
            .with(eq(2), eq(1), eq(DATA), eq(KEY_B), eq(true))
            .times(1)
            .return_const(WriteStatus::Success);

        let mut writer = SingleBlockWriter::new(&mut session);
        assert!(writer
            .write_one(target(2, 1), &DATA, &KeyPair::new(KEY_A, KEY_B))
            .is_ok());
    }

    #[test]
    fn test_falls_back_to_key_a() {
        let mut seq = Sequence::new();
        let mut session = MockTagSession::new();
        session
            .expect_write_block()
            .with(eq(2), eq(1), eq(DATA), eq(KEY_B), eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(WriteStatus::Failure);
        session
            .expect_write_block()
            .with(eq(2), eq(1), eq(DATA), eq(KEY_A), eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(WriteStatus::Success);

        let mut writer = SingleBlockWriter::new(&mut session);
        assert!(writer
            .write_one(target(2, 1), &DATA, &KeyPair::new(KEY_A, KEY_B))
            .is_ok());
    }

    #[test]
    fn test_both_keys_fail() {
        let mut session = MockTagSession::new();
        session
            .expect_write_block()
            .times(2)
            .return_const(WriteStatus::Failure);

        let mut writer = SingleBlockWriter::new(&mut session);
        assert_eq!(
            writer.write_one(target(2, 1), &DATA, &KeyPair::new(KEY_A, KEY_B)),
            Err(WriteError::Failed {
                sector: 2,
                block: 1
            })
        );
    }

    #[test]
    fn test_only_key_a_known() {
        let mut session = MockTagSession::new();
        session
            .expect_write_block()
            .with(always(), always(), always(), eq(KEY_A), eq(false))
            .times(1)
            .return_const(WriteStatus::Success);

        let mut writer = SingleBlockWriter::new(&mut session);
        assert!(writer
            .write_one(target(4, 0), &DATA, &KeyPair::only_a(KEY_A))
            .is_ok());
    }

    #[test]
    fn test_not_in_sector_is_not_retried() {
        let mut session = MockTagSession::new();
        session
            .expect_write_block()
            .times(1)
            .return_const(WriteStatus::NotInSector);

        let mut writer = SingleBlockWriter::new(&mut session);
        assert_eq!(
            writer.write_one(target(4, 7), &DATA, &KeyPair::new(KEY_A, KEY_B)),
            Err(WriteError::NotInSector {
                sector: 4,
                block: 7
            })
        );
    }

    #[test]
    fn test_no_keys() {
        let mut session = MockTagSession::new();
        session.expect_write_block().never();

        let mut writer = SingleBlockWriter::new(&mut session);
        assert_eq!(
            writer.write_one(target(4, 0), &DATA, &KeyPair::default()),
            Err(WriteError::NoKey { sector: 4 })
        );
    }
}
