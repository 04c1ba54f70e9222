//! Access-condition decoding
//!
//! Trailer bytes 6..9 hold three bits (C1, C2, C3) for each of four access
//! groups, once inverted and once plain:
//!
//! ```text
//! byte 6: ~C2 ~C2 ~C2 ~C2 | ~C1 ~C1 ~C1 ~C1
//! byte 7:  C1  C1  C1  C1 | ~C3 ~C3 ~C3 ~C3
//! byte 8:  C3  C3  C3  C3 |  C2  C2  C2  C2
//! ```
//!
//! Bit *n* of each nibble belongs to group *n*. Groups 0-2 govern data
//! blocks (one block each in small sectors, five in large ones), group 3 the
//! trailer.
//!
//! [`AccessConditions::diagnostic`] turns the decoded bits into the
//! [`WriteDiagnostic`] a writability classifier reports for a block.

use crate::diagnostic::WriteDiagnostic;
use crate::dump::Block;
use crate::geometry::block_count_of;
use crate::hexfmt::ACCESS_CONDITIONS_SIZE;
use crate::keys::KeyType;

/// Access group of sector trailers
pub const TRAILER_GROUP: usize = 3;

/// Access group governing `block` of `sector`
///
/// Large sectors share one group between five data blocks.
pub fn access_group(sector: u8, block: u8) -> usize {
    let block_count = block_count_of(sector);
    if block >= block_count - 1 {
        TRAILER_GROUP
    } else if block_count == 4 {
        block as usize
    } else {
        (block / 5) as usize
    }
}

/// Which keys may perform an operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permission {
    /// Key A may
    pub key_a: bool,
    /// Key B may
    pub key_b: bool,
}

impl Permission {
    const NEVER: Self = Self {
        key_a: false,
        key_b: false,
    };
    const A: Self = Self {
        key_a: true,
        key_b: false,
    };
    const B: Self = Self {
        key_a: false,
        key_b: true,
    };
    const EITHER: Self = Self {
        key_a: true,
        key_b: true,
    };

    /// Whether the given key may
    pub fn allows(&self, key_type: KeyType) -> bool {
        match key_type {
            KeyType::A => self.key_a,
            KeyType::B => self.key_b,
        }
    }

    /// Whether no key may
    pub fn is_never(&self) -> bool {
        !self.key_a && !self.key_b
    }

    fn without_key_b(self) -> Self {
        Self {
            key_b: false,
            ..self
        }
    }
}

/// Write permissions of the three parts of a sector trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailerPermissions {
    /// Writing key A (bytes 0..6)
    pub key_a: Permission,
    /// Writing the access bits (bytes 6..10)
    pub access_bits: Permission,
    /// Writing key B (bytes 10..16)
    pub key_b: Permission,
}

/// Decoded access conditions of one sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessConditions {
    groups: [u8; 4],
}

impl AccessConditions {
    /// Transport configuration (`FF0780`): everything open with key A
    pub const TRANSPORT: Self = Self {
        groups: [0b000, 0b000, 0b000, 0b001],
    };

    /// Build from C1C2C3 bit triples, one per group
    ///
    /// Only the lowest three bits of each value are used.
    pub fn from_groups(groups: [u8; 4]) -> Self {
        Self {
            groups: groups.map(|bits| bits & 0b111),
        }
    }

    /// Decode access bytes 6..9 of a trailer
    ///
    /// Returns `None` if the inverted copies do not match.
    pub fn decode(bytes: &[u8; ACCESS_CONDITIONS_SIZE]) -> Option<Self> {
        let [b6, b7, b8] = *bytes;
        let c1 = b7 >> 4;
        let c2 = b8 & 0x0F;
        let c3 = b8 >> 4;
        let inverted_c1 = b6 & 0x0F;
        let inverted_c2 = b6 >> 4;
        let inverted_c3 = b7 & 0x0F;

        if inverted_c1 != !c1 & 0x0F || inverted_c2 != !c2 & 0x0F || inverted_c3 != !c3 & 0x0F {
            return None;
        }

        let mut groups = [0u8; 4];
        for (group, bits) in groups.iter_mut().enumerate() {
            let bit = |nibble: u8| (nibble >> group) & 1;
            *bits = (bit(c1) << 2) | (bit(c2) << 1) | bit(c3);
        }
        Some(Self { groups })
    }

    /// Decode the access bytes of a full trailer block
    pub fn from_trailer(trailer: &Block) -> Option<Self> {
        let mut bytes = [0u8; ACCESS_CONDITIONS_SIZE];
        bytes.copy_from_slice(&trailer[6..9]);
        Self::decode(&bytes)
    }

    /// Encode into access bytes 6..9
    pub fn encode(&self) -> [u8; ACCESS_CONDITIONS_SIZE] {
        let (mut c1, mut c2, mut c3) = (0u8, 0u8, 0u8);
        for (group, bits) in self.groups.iter().enumerate() {
            c1 |= ((bits >> 2) & 1) << group;
            c2 |= ((bits >> 1) & 1) << group;
            c3 |= (bits & 1) << group;
        }
        [
            ((!c2 & 0x0F) << 4) | (!c1 & 0x0F),
            (c1 << 4) | (!c3 & 0x0F),
            (c3 << 4) | c2,
        ]
    }

    /// C1C2C3 bits of a group
    pub fn group_bits(&self, group: usize) -> u8 {
        self.groups[group & 0b11]
    }

    /// Whether key B can be read, and therefore cannot authenticate
    pub fn key_b_readable(&self) -> bool {
        matches!(self.groups[TRAILER_GROUP], 0b000 | 0b010 | 0b001)
    }

    /// Who may write a data block of `group`
    pub fn data_write(&self, group: usize) -> Permission {
        let permission = match self.group_bits(group) {
            0b000 => Permission::EITHER,
            0b100 | 0b110 | 0b011 => Permission::B,
            _ => Permission::NEVER,
        };
        self.effective(permission)
    }

    /// Who may write each part of the trailer
    pub fn trailer_write(&self) -> TrailerPermissions {
        let (key_a, access_bits, key_b) = match self.groups[TRAILER_GROUP] {
            0b000 => (Permission::A, Permission::NEVER, Permission::A),
            0b100 => (Permission::B, Permission::NEVER, Permission::B),
            0b001 => (Permission::A, Permission::A, Permission::A),
            0b011 => (Permission::B, Permission::B, Permission::B),
            0b101 => (Permission::NEVER, Permission::B, Permission::NEVER),
            _ => (Permission::NEVER, Permission::NEVER, Permission::NEVER),
        };
        TrailerPermissions {
            key_a: self.effective(key_a),
            access_bits: self.effective(access_bits),
            key_b: self.effective(key_b),
        }
    }

    fn effective(&self, permission: Permission) -> Permission {
        if self.key_b_readable() {
            permission.without_key_b()
        } else {
            permission
        }
    }

    /// Write diagnostic of `block` in `sector`
    ///
    /// The manufacturer block is always [`WriteDiagnostic::ReadOnly`].
    pub fn diagnostic(&self, sector: u8, block: u8) -> WriteDiagnostic {
        if sector == 0 && block == 0 {
            return WriteDiagnostic::ReadOnly;
        }
        match access_group(sector, block) {
            TRAILER_GROUP => self.trailer_diagnostic(),
            group => self.data_diagnostic(group),
        }
    }

    /// Write diagnostic of a data block in `group`
    pub fn data_diagnostic(&self, group: usize) -> WriteDiagnostic {
        match self.data_write(group) {
            Permission::EITHER => WriteDiagnostic::WritableWithEitherKey,
            Permission::A => WriteDiagnostic::WritableWithKeyA,
            Permission::B => WriteDiagnostic::WritableWithKeyB,
            _ => WriteDiagnostic::ReadOnly,
        }
    }

    fn trailer_diagnostic(&self) -> WriteDiagnostic {
        let TrailerPermissions {
            key_a,
            access_bits,
            key_b,
        } = self.trailer_write();

        use Permission as P;
        match (key_a, access_bits, key_b) {
            (P::NEVER, P::NEVER, P::NEVER) => WriteDiagnostic::ReadOnly,
            (P::A, P::A, P::A) => WriteDiagnostic::WritableWithKeyA,
            (P::B, P::B, P::B) => WriteDiagnostic::WritableWithKeyB,
            (P::A, P::NEVER, P::A) => WriteDiagnostic::AcReadOnlyNeedsKeyA,
            (P::B, P::NEVER, P::B) => WriteDiagnostic::AcReadOnlyNeedsKeyB,
            (P::NEVER, P::B, P::NEVER) => WriteDiagnostic::KeysReadOnlyNeedsKeyB,
            _ => WriteDiagnostic::Invalid,
        }
    }
}
