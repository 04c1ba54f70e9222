//! In-memory tag dumps
//!
//! A [`Dump`] maps sector → block → 16 byte payload. Only blocks with known
//! content are present; unknown blocks are absent rather than zero-filled.
//! Trailer blocks are ordinary payload here and are never decoded.

use crate::error::{Error, Result};
use crate::geometry::{block_count_of, trailer_of, TagGeometry, BLOCK_SIZE, MAX_SECTOR_COUNT};
use crate::hexfmt::{parse_block, to_hex, ACCESS_CONDITIONS_SIZE};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// A 16 byte block payload
pub type Block = [u8; BLOCK_SIZE];

/// Sector → block indices, as handed to the writability classifier
pub type Positions = BTreeMap<u8, Vec<u8>>;

/// Known blocks of a tag, grouped by sector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dump {
    sectors: BTreeMap<u8, BTreeMap<u8, Block>>,
}

impl Dump {
    /// Create an empty dump
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a block
    ///
    /// Fails if the position does not exist on any tag.
    pub fn insert(&mut self, sector: u8, block: u8, data: Block) -> Result<()> {
        if sector >= MAX_SECTOR_COUNT {
            return Err(Error::InvalidSector(sector));
        }
        let block_count = block_count_of(sector);
        if block >= block_count {
            return Err(Error::BlockOutOfRange {
                sector,
                block,
                block_count,
            });
        }
        self.sectors.entry(sector).or_default().insert(block, data);
        Ok(())
    }

    /// Build a dump covering every position of `geometry`
    ///
    /// `fill` returns the payload of a position, or `None` to leave it out.
    pub fn from_geometry(
        geometry: &TagGeometry,
        mut fill: impl FnMut(u8, u8) -> Option<Block>,
    ) -> Self {
        let mut dump = Self::new();
        for sector in 0..geometry.sector_count() {
            let blocks = dump.sectors.entry(sector).or_default();
            for block in 0..block_count_of(sector) {
                if let Some(data) = fill(sector, block) {
                    blocks.insert(block, data);
                }
            }
        }
        dump
    }

    /// Store the manufacturer block (sector 0, block 0)
    pub fn set_manufacturer_block(&mut self, data: Block) {
        self.sectors.entry(0).or_default().insert(0, data);
    }

    /// Register a sector without any known blocks
    pub fn insert_empty_sector(&mut self, sector: u8) -> Result<()> {
        if sector >= MAX_SECTOR_COUNT {
            return Err(Error::InvalidSector(sector));
        }
        self.sectors.entry(sector).or_default();
        Ok(())
    }

    /// Payload of a block, if known
    pub fn get(&self, sector: u8, block: u8) -> Option<&Block> {
        self.sectors.get(&sector)?.get(&block)
    }

    /// Known blocks of one sector
    pub fn sector(&self, sector: u8) -> Option<&BTreeMap<u8, Block>> {
        self.sectors.get(&sector)
    }

    /// Iterate sectors in ascending order
    pub fn sectors(&self) -> impl Iterator<Item = (u8, &BTreeMap<u8, Block>)> {
        self.sectors.iter().map(|(s, blocks)| (*s, blocks))
    }

    /// Highest sector index present
    pub fn max_sector(&self) -> Option<u8> {
        self.sectors.keys().next_back().copied()
    }

    /// Lowest sector index present
    pub fn min_sector(&self) -> Option<u8> {
        self.sectors.keys().next().copied()
    }

    /// Whether the dump holds no sectors
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    /// Total number of known blocks
    pub fn block_count(&self) -> usize {
        self.sectors.values().map(BTreeMap::len).sum()
    }

    /// All known positions, for writability classification
    pub fn positions(&self) -> Positions {
        self.sectors
            .iter()
            .map(|(sector, blocks)| (*sector, blocks.keys().copied().collect()))
            .collect()
    }

    /// Check that every position of the dump exists on a tag with `geometry`
    pub fn check_fits(&self, geometry: &TagGeometry) -> Result<()> {
        if let Some(max) = self.max_sector() {
            if !geometry.contains_sector(max) {
                return Err(Error::GeometryMismatch {
                    sector: max,
                    sector_count: geometry.sector_count(),
                });
            }
        }
        for (sector, blocks) in &self.sectors {
            let block_count = geometry.block_count(*sector).unwrap_or(0);
            if let Some(block) = blocks.keys().find(|b| **b >= block_count) {
                return Err(Error::BlockOutOfRange {
                    sector: *sector,
                    block: *block,
                    block_count,
                });
            }
        }
        Ok(())
    }

    /// Replace the access conditions (trailer bytes 6..9) of every trailer
    /// present in the dump
    pub fn with_static_access_conditions(mut self, ac: [u8; ACCESS_CONDITIONS_SIZE]) -> Self {
        for (sector, blocks) in self.sectors.iter_mut() {
            if let Some(trailer) = blocks.get_mut(&trailer_of(*sector)) {
                trailer[6..9].copy_from_slice(&ac);
            }
        }
        self
    }

    /// Load a dump from its JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// JSON form of the dump
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct HexBlocks<'a>(&'a BTreeMap<u8, Block>);

impl Serialize for HexBlocks<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (block, data) in self.0 {
            map.serialize_entry(block, &to_hex(data))?;
        }
        map.end()
    }
}

impl Serialize for Dump {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.sectors
                .iter()
                .map(|(sector, blocks)| (sector, HexBlocks(blocks))),
        )
    }
}

impl<'de> Deserialize<'de> for Dump {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<u8, BTreeMap<u8, String>>::deserialize(deserializer)?;
        let mut dump = Dump::new();
        for (sector, blocks) in raw {
            dump.insert_empty_sector(sector).map_err(D::Error::custom)?;
            for (block, data) in blocks {
                let data = parse_block(&data).map_err(D::Error::custom)?;
                dump.insert(sector, block, data).map_err(D::Error::custom)?;
            }
        }
        Ok(dump)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trailer() -> Block {
        parse_block("FFFFFFFFFFFFFF078069FFFFFFFFFFFF").unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let mut dump = Dump::new();
        dump.insert(1, 2, [0xAB; 16]).unwrap();
        assert_eq!(dump.get(1, 2), Some(&[0xAB; 16]));
        assert_eq!(dump.get(1, 1), None);
        assert_eq!(dump.block_count(), 1);
        assert_eq!(dump.max_sector(), Some(1));
    }

    #[test]
    fn test_insert_rejects_out_of_range() {
        let mut dump = Dump::new();
        assert!(matches!(
            dump.insert(3, 4, [0; 16]),
            Err(Error::BlockOutOfRange {
                sector: 3,
                block: 4,
                block_count: 4
            })
        ));
        assert!(dump.insert(33, 15, [0; 16]).is_ok());
        assert!(matches!(
            dump.insert(40, 0, [0; 16]),
            Err(Error::InvalidSector(40))
        ));
    }

    #[test]
    fn test_positions_sorted() {
        let mut dump = Dump::new();
        dump.insert(2, 3, [0; 16]).unwrap();
        dump.insert(2, 0, [0; 16]).unwrap();
        dump.insert(0, 1, [0; 16]).unwrap();
        let positions = dump.positions();
        assert_eq!(positions[&0], vec![1]);
        assert_eq!(positions[&2], vec![0, 3]);
    }

    #[test]
    fn test_check_fits() {
        let mut dump = Dump::new();
        dump.insert(15, 3, trailer()).unwrap();
        assert!(dump.check_fits(&TagGeometry::CLASSIC_1K).is_ok());
        assert!(matches!(
            dump.check_fits(&TagGeometry::MINI),
            Err(Error::GeometryMismatch {
                sector: 15,
                sector_count: 5
            })
        ));
    }

    #[test]
    fn test_static_access_conditions() {
        let mut dump = Dump::new();
        dump.insert(0, 3, trailer()).unwrap();
        dump.insert(0, 1, [0; 16]).unwrap();
        dump.insert(32, 15, trailer()).unwrap();
        dump.insert(32, 3, [0; 16]).unwrap();

        let dump = dump.with_static_access_conditions([0x7F, 0x07, 0x88]);
        assert_eq!(dump.get(0, 3).unwrap()[6..10], [0x7F, 0x07, 0x88, 0x69]);
        assert_eq!(dump.get(32, 15).unwrap()[6..10], [0x7F, 0x07, 0x88, 0x69]);
        // Block 3 of a 16 block sector is data
        assert_eq!(dump.get(32, 3), Some(&[0; 16]));
        assert_eq!(dump.get(0, 1), Some(&[0; 16]));
    }

    #[test]
    fn test_from_geometry() {
        let dump = Dump::from_geometry(&TagGeometry::CLASSIC_4K, |sector, block| {
            (block == 0).then_some([sector; 16])
        });
        assert_eq!(dump.sectors().count(), 40);
        assert_eq!(dump.block_count(), 40);
        assert_eq!(dump.get(39, 0), Some(&[39; 16]));
        assert!(dump.check_fits(&TagGeometry::CLASSIC_4K).is_ok());

        let mut dump = Dump::from_geometry(&TagGeometry::MINI, |_, _| None);
        assert_eq!(dump.sectors().count(), 5);
        assert_eq!(dump.block_count(), 0);
        dump.set_manufacturer_block([0x42; 16]);
        assert_eq!(dump.get(0, 0), Some(&[0x42; 16]));
    }

    #[test]
    fn test_json_form() {
        let mut dump = Dump::new();
        dump.insert(1, 0, [0x01; 16]).unwrap();
        dump.insert_empty_sector(4).unwrap();
        let json = serde_json::to_string(&dump).unwrap();
        assert_eq!(json, r#"{"1":{"0":"01010101010101010101010101010101"},"4":{}}"#);
        assert_eq!(Dump::from_json(&json).unwrap(), dump);
    }

    #[test]
    fn test_json_rejects_invalid_positions() {
        assert!(Dump::from_json(r#"{"1":{"4":"00000000000000000000000000000000"}}"#).is_err());
        assert!(Dump::from_json(r#"{"1":{"0":"0000"}}"#).is_err());
    }
}
