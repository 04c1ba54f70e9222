//! Interpretation of per-block write diagnostics
//!
//! The classifier (see [`TagSession::classify_writability`]) reports for each
//! block *how* it could be written, ignoring which keys the operator actually
//! has. [`interpret`] combines that report with the known keys and decides
//! whether the block is safe to write and with which key.
//!
//! [`TagSession::classify_writability`]: crate::session::TagSession::classify_writability

use crate::keys::{KeyPair, KeyType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a block may be written, before key availability is considered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteDiagnostic {
    /// No key may write the block
    ReadOnly,
    /// Only key A may write
    WritableWithKeyA,
    /// Only key B may write
    WritableWithKeyB,
    /// Both keys may write
    WritableWithEitherKey,
    /// Trailer: key A may write the keys, access bits are read-only
    AcReadOnlyNeedsKeyA,
    /// Trailer: key B may write the keys, access bits are read-only
    AcReadOnlyNeedsKeyB,
    /// Trailer: key B may write the access bits, keys are read-only
    KeysReadOnlyNeedsKeyB,
    /// The access conditions do not describe a known state
    Invalid,
}

/// Per sector, per block diagnostics. A missing sector means the classifier
/// could not evaluate it (dead sector or corrupted access bytes).
pub type Diagnostics = BTreeMap<u8, BTreeMap<u8, WriteDiagnostic>>;

/// Why a block or sector is excluded from a write plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockReason {
    /// No key of the sector is known
    KeysNotKnown,
    /// The classifier returned nothing for the sector
    InvalidAccessConditionsOrSectorDead,
    /// No key may write the block
    BlockReadOnly,
    /// Key A would be needed but is unknown
    WriteKeyANotKnown,
    /// Key B would be needed but is unknown
    WriteKeyBNotKnown,
    /// Trailer write would leave the access bits unchanged
    AccessConditionsReadOnly,
    /// Trailer write would leave the keys unchanged
    KeysReadOnly,
    /// The diagnostic was [`WriteDiagnostic::Invalid`]
    UnexpectedAuthorizationState,
}

impl BlockReason {
    /// Operator-facing reason text
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::KeysNotKnown => "keys not known",
            BlockReason::InvalidAccessConditionsOrSectorDead => {
                "invalid access conditions or sector dead"
            }
            BlockReason::BlockReadOnly => "block is read-only",
            BlockReason::WriteKeyANotKnown => "write key A not known",
            BlockReason::WriteKeyBNotKnown => "write key B not known",
            BlockReason::AccessConditionsReadOnly => "access conditions are read-only",
            BlockReason::KeysReadOnly => "keys are read-only",
            BlockReason::UnexpectedAuthorizationState => "unexpected authorization state",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision for one block of a dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EligibilityOutcome {
    /// The block may be written with the given key
    Safe(KeyType),
    /// The block must be skipped
    Blocked(BlockReason),
}

/// Decide whether a block may be written
///
/// Returns `None` for the manufacturer block when writing it was not
/// requested: it is dropped from consideration without being reported.
pub fn interpret(
    diagnostic: WriteDiagnostic,
    keys: &KeyPair,
    is_manufacturer_block: bool,
    allow_manufacturer_write: bool,
) -> Option<EligibilityOutcome> {
    use EligibilityOutcome::{Blocked, Safe};

    if is_manufacturer_block && !allow_manufacturer_write {
        return None;
    }

    let has_a = keys.a.is_some();
    let has_b = keys.b.is_some();

    let outcome = match diagnostic {
        WriteDiagnostic::ReadOnly => Blocked(BlockReason::BlockReadOnly),
        WriteDiagnostic::WritableWithKeyA if has_a => Safe(KeyType::A),
        WriteDiagnostic::WritableWithKeyA => Blocked(BlockReason::WriteKeyANotKnown),
        WriteDiagnostic::WritableWithKeyB if has_b => Safe(KeyType::B),
        WriteDiagnostic::WritableWithKeyB => Blocked(BlockReason::WriteKeyBNotKnown),
        WriteDiagnostic::WritableWithEitherKey if has_a => Safe(KeyType::A),
        WriteDiagnostic::WritableWithEitherKey if has_b => Safe(KeyType::B),
        WriteDiagnostic::WritableWithEitherKey => Blocked(BlockReason::WriteKeyANotKnown),
        WriteDiagnostic::AcReadOnlyNeedsKeyA if has_a => {
            Blocked(BlockReason::AccessConditionsReadOnly)
        }
        WriteDiagnostic::AcReadOnlyNeedsKeyA => Blocked(BlockReason::WriteKeyANotKnown),
        WriteDiagnostic::AcReadOnlyNeedsKeyB if has_b => {
            Blocked(BlockReason::AccessConditionsReadOnly)
        }
        WriteDiagnostic::AcReadOnlyNeedsKeyB => Blocked(BlockReason::WriteKeyBNotKnown),
        WriteDiagnostic::KeysReadOnlyNeedsKeyB if has_b => Blocked(BlockReason::KeysReadOnly),
        WriteDiagnostic::KeysReadOnlyNeedsKeyB => Blocked(BlockReason::WriteKeyBNotKnown),
        WriteDiagnostic::Invalid => Blocked(BlockReason::UnexpectedAuthorizationState),
    };
    Some(outcome)
}
