//! Write planning
//!
//! [`WritePlanBuilder`] reconciles a dump, the known keys and the per-block
//! diagnostics of the present tag into:
//! - a [`WritePlan`]: every block that is safe to write, bound to its key
//! - a [`ConflictReport`]: every block or sector that must be skipped, with
//!   a reason for the operator
//!
//! Planning never touches the tag. Given the same inputs it always produces
//! the same plan and report.

use crate::diagnostic::{interpret, BlockReason, Diagnostics, EligibilityOutcome, WriteDiagnostic};
use crate::dump::Dump;
use crate::error::Result;
use crate::geometry::TagGeometry;
use crate::keys::{KeyMap, KeyType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a conflict applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConflictPosition {
    /// One block
    Block {
        /// Sector index
        sector: u8,
        /// Block index within the sector
        block: u8,
    },
    /// The whole sector
    Sector {
        /// Sector index
        sector: u8,
    },
}

impl fmt::Display for ConflictPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPosition::Sector { sector } => write!(f, "Sector: {}", sector),
            ConflictPosition::Block { sector, block } => {
                write!(f, "Sector: {}, Block: {}", sector, block)
            }
        }
    }
}

/// One skipped position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conflict {
    /// Skipped block or sector
    pub position: ConflictPosition,
    /// Why it is skipped
    pub reason: BlockReason,
}

/// Ordered list of everything a plan leaves out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictReport {
    entries: Vec<Conflict>,
}

impl ConflictReport {
    fn push(&mut self, position: ConflictPosition, reason: BlockReason) {
        self.entries.push(Conflict { position, reason });
    }

    /// Conflicts in report order (ascending sector, then block)
    pub fn entries(&self) -> &[Conflict] {
        &self.entries
    }

    /// Whether nothing was skipped
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of conflicts
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Blocks that are safe to write, each bound to the key to write it with
///
/// This is the only input the executor acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WritePlan {
    sectors: BTreeMap<u8, BTreeMap<u8, KeyType>>,
}

impl WritePlan {
    /// Schedule a block to be written with `key`
    pub fn insert(&mut self, sector: u8, block: u8, key: KeyType) {
        self.sectors.entry(sector).or_default().insert(block, key);
    }

    /// Key chosen for a block, if the block is planned
    pub fn get(&self, sector: u8, block: u8) -> Option<KeyType> {
        self.sectors.get(&sector)?.get(&block).copied()
    }

    /// Planned writes in execution order: ascending sector, then block
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8, KeyType)> + '_ {
        self.sectors.iter().flat_map(|(sector, blocks)| {
            blocks.iter().map(move |(block, key)| (*sector, *block, *key))
        })
    }

    /// Sectors with at least one planned block
    pub fn sectors(&self) -> impl Iterator<Item = u8> + '_ {
        self.sectors.keys().copied()
    }

    /// Whether the plan contains the sector
    pub fn contains_sector(&self, sector: u8) -> bool {
        self.sectors.contains_key(&sector)
    }

    /// Whether there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    /// Number of planned blocks
    pub fn len(&self) -> usize {
        self.sectors.values().map(BTreeMap::len).sum()
    }
}

impl FromIterator<(u8, u8, KeyType)> for WritePlan {
    fn from_iter<I: IntoIterator<Item = (u8, u8, KeyType)>>(iter: I) -> Self {
        let mut plan = WritePlan::default();
        for (sector, block, key) in iter {
            plan.insert(sector, block, key);
        }
        plan
    }
}

/// Builds a [`WritePlan`] and [`ConflictReport`] from a dump
#[derive(Debug, Clone, Copy, Default)]
pub struct WritePlanBuilder {
    allow_manufacturer_write: bool,
}

impl WritePlanBuilder {
    /// Create a builder that leaves the manufacturer block alone
    pub fn new() -> Self {
        Self::default()
    }

    /// Opt in to writing sector 0, block 0
    pub fn allow_manufacturer_write(mut self, allow: bool) -> Self {
        self.allow_manufacturer_write = allow;
        self
    }

    /// Plan a dump write
    ///
    /// Fails only if the dump does not fit `geometry`; every other problem is
    /// recorded in the returned report.
    pub fn build(
        &self,
        dump: &Dump,
        keys: &KeyMap,
        geometry: &TagGeometry,
        diagnostics: &Diagnostics,
    ) -> Result<(WritePlan, ConflictReport)> {
        dump.check_fits(geometry)?;

        let mut plan = WritePlan::default();
        let mut report = ConflictReport::default();

        for (sector, blocks) in dump.sectors() {
            let Some(sector_keys) = keys.get(sector) else {
                tracing::debug!("Sector {}: no keys known", sector);
                report.push(ConflictPosition::Sector { sector }, BlockReason::KeysNotKnown);
                continue;
            };

            let Some(sector_diagnostics) = diagnostics.get(&sector) else {
                tracing::debug!("Sector {}: no diagnostics, sector dead or invalid", sector);
                report.push(
                    ConflictPosition::Sector { sector },
                    BlockReason::InvalidAccessConditionsOrSectorDead,
                );
                continue;
            };

            for block in blocks.keys().copied() {
                let diagnostic = sector_diagnostics
                    .get(&block)
                    .copied()
                    .unwrap_or(WriteDiagnostic::Invalid);
                let is_manufacturer_block = sector == 0 && block == 0;

                match interpret(
                    diagnostic,
                    sector_keys,
                    is_manufacturer_block,
                    self.allow_manufacturer_write,
                ) {
                    Some(EligibilityOutcome::Safe(key)) => {
                        tracing::debug!(
                            "Sector {}, block {}: {:?} -> write with key {}",
                            sector,
                            block,
                            diagnostic,
                            key
                        );
                        plan.insert(sector, block, key);
                    }
                    Some(EligibilityOutcome::Blocked(reason)) => {
                        tracing::debug!(
                            "Sector {}, block {}: {:?} -> skip ({})",
                            sector,
                            block,
                            diagnostic,
                            reason
                        );
                        report.push(ConflictPosition::Block { sector, block }, reason);
                    }
                    None => {
                        tracing::debug!("Sector 0, block 0: manufacturer block left untouched");
                    }
                }
            }
        }

        tracing::info!(
            "Planned {} block(s) for writing, {} conflict(s)",
            plan.len(),
            report.len()
        );
        Ok((plan, report))
    }
}
