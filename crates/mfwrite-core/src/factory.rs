//! Factory-default dumps
//!
//! A factory-formatted tag has all data blocks zeroed and every trailer set to
//! the transport configuration: both keys `FFFFFFFFFFFF`, access bits
//! `FF0780`. The last sector's trailer carries `BC` as general purpose byte.
//! The manufacturer block is never part of the result.

use crate::dump::{Block, Dump};
use crate::geometry::{trailer_of, TagGeometry};

/// Zeroed data block
pub const EMPTY_BLOCK: Block = [0x00; 16];

/// Transport-configuration trailer
pub const DEFAULT_TRAILER: Block = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x80, 0x69, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF,
];

/// Trailer of the last sector
pub const LAST_SECTOR_TRAILER: Block = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x80, 0xBC, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF,
];

/// Build the factory-default dump for a tag with `geometry`
///
/// Every sector contains every block except sector 0, block 0.
pub fn synthesize(geometry: &TagGeometry) -> Dump {
    let last_sector = geometry.last_sector();

    let dump = Dump::from_geometry(geometry, |sector, block| {
        if sector == 0 && block == 0 {
            None
        } else if block != trailer_of(sector) {
            Some(EMPTY_BLOCK)
        } else if sector == last_sector {
            Some(LAST_SECTOR_TRAILER)
        } else {
            Some(DEFAULT_TRAILER)
        }
    });

    tracing::debug!(
        "Synthesized factory dump for {}: {} block(s)",
        geometry,
        dump.block_count()
    );
    dump
}
