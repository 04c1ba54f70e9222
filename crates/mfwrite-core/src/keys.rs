//! Keys known to the operator
//!
//! A [`KeyMap`] is produced by key discovery outside this crate. It is sparse:
//! only sectors with at least one known key appear.

use crate::error::Result;
use crate::geometry::KEY_SIZE;
use crate::hexfmt::{parse_key, to_hex};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A 6 byte sector key
pub type Key = [u8; KEY_SIZE];

/// Which of the two sector keys is meant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Key A
    A,
    /// Key B
    B,
}

impl KeyType {
    /// Whether the write service must authenticate with this key as key B
    pub fn use_as_key_b(self) -> bool {
        self == KeyType::B
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::A => write!(f, "A"),
            KeyType::B => write!(f, "B"),
        }
    }
}

/// Known keys of one sector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyPair {
    /// Key A, if known
    pub a: Option<Key>,
    /// Key B, if known
    pub b: Option<Key>,
}

impl KeyPair {
    /// Both keys known
    pub fn new(a: Key, b: Key) -> Self {
        Self {
            a: Some(a),
            b: Some(b),
        }
    }

    /// Only key A known
    pub fn only_a(a: Key) -> Self {
        Self {
            a: Some(a),
            b: None,
        }
    }

    /// Only key B known
    pub fn only_b(b: Key) -> Self {
        Self {
            a: None,
            b: Some(b),
        }
    }

    /// Look up one of the two keys
    pub fn get(&self, key_type: KeyType) -> Option<&Key> {
        match key_type {
            KeyType::A => self.a.as_ref(),
            KeyType::B => self.b.as_ref(),
        }
    }

    /// Whether neither key is known
    pub fn is_empty(&self) -> bool {
        self.a.is_none() && self.b.is_none()
    }
}

/// Sector index to known keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    sectors: BTreeMap<u8, KeyPair>,
}

impl KeyMap {
    /// Create an empty key map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the keys of a sector. Pairs without any key are not stored.
    pub fn insert(&mut self, sector: u8, keys: KeyPair) {
        if keys.is_empty() {
            self.sectors.remove(&sector);
        } else {
            self.sectors.insert(sector, keys);
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, sector: u8, keys: KeyPair) -> Self {
        self.insert(sector, keys);
        self
    }

    /// Keys of a sector, if any are known
    pub fn get(&self, sector: u8) -> Option<&KeyPair> {
        self.sectors.get(&sector)
    }

    /// Whether at least one key of the sector is known
    pub fn contains(&self, sector: u8) -> bool {
        self.sectors.contains_key(&sector)
    }

    /// Sectors with known keys, ascending
    pub fn sectors(&self) -> impl Iterator<Item = u8> + '_ {
        self.sectors.keys().copied()
    }

    /// Number of sectors with known keys
    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    /// Whether no keys are known at all
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    /// Key map using the same key pair for each of `sectors`
    pub fn uniform(sectors: impl IntoIterator<Item = u8>, keys: KeyPair) -> Self {
        let mut map = Self::new();
        for sector in sectors {
            map.insert(sector, keys);
        }
        map
    }

    /// Load a key map from its JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Serialize, Deserialize)]
struct HexKeyPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    a: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    b: Option<String>,
}

impl Serialize for KeyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.sectors.iter().map(|(sector, keys)| {
            (
                sector,
                HexKeyPair {
                    a: keys.a.as_ref().map(|k| to_hex(k)),
                    b: keys.b.as_ref().map(|k| to_hex(k)),
                },
            )
        }))
    }
}

impl<'de> Deserialize<'de> for KeyMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<u8, HexKeyPair>::deserialize(deserializer)?;
        let mut map = KeyMap::new();
        for (sector, pair) in raw {
            let parse = |s: Option<String>| -> std::result::Result<Option<Key>, D::Error> {
                s.map(|s| parse_key(&s).map_err(D::Error::custom))
                    .transpose()
            };
            map.insert(
                sector,
                KeyPair {
                    a: parse(pair.a)?,
                    b: parse(pair.b)?,
                },
            );
        }
        Ok(map)
    }
}
