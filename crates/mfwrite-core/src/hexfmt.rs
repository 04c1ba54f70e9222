//! Hex parsing for blocks, keys and access conditions

use crate::error::{Error, Result};
use crate::geometry::{BLOCK_SIZE, KEY_SIZE};

/// Number of access-condition bytes in a sector trailer (bytes 6..9)
pub const ACCESS_CONDITIONS_SIZE: usize = 3;

/// Parse a hex string into a fixed-size byte array
///
/// Whitespace is ignored so that `"FF FF FF FF FF FF"` parses like
/// `"FFFFFFFFFFFF"`.
pub fn parse_hex<const N: usize>(input: &str, what: &'static str) -> Result<[u8; N]> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidHex(input.to_string()));
    }
    if compact.len() % 2 != 0 {
        return Err(Error::InvalidLength {
            what,
            expected: N,
            actual: compact.len() / 2,
        });
    }

    let bytes = hex::decode(&compact).map_err(|_| Error::InvalidHex(input.to_string()))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| Error::InvalidLength {
        what,
        expected: N,
        actual,
    })
}

/// Parse 16 bytes of block data
pub fn parse_block(input: &str) -> Result<[u8; BLOCK_SIZE]> {
    parse_hex(input, "block data")
}

/// Parse a 6 byte key
pub fn parse_key(input: &str) -> Result<[u8; KEY_SIZE]> {
    parse_hex(input, "key")
}

/// Parse 3 bytes of access conditions (e.g. `"FF0780"`)
pub fn parse_access_conditions(input: &str) -> Result<[u8; ACCESS_CONDITIONS_SIZE]> {
    parse_hex(input, "access conditions")
}

/// Upper-case hex encoding
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("FFFFFFFFFFFF").unwrap(), [0xFF; 6]);
        assert_eq!(
            parse_key("a0a1a2a3a4a5").unwrap(),
            [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]
        );
        assert_eq!(parse_key("FF FF FF FF FF FF").unwrap(), [0xFF; 6]);
    }

    #[test]
    fn test_parse_not_hex() {
        assert!(matches!(parse_key("FFFFFFFFFFFG"), Err(Error::InvalidHex(_))));
        assert!(matches!(parse_key(""), Err(Error::InvalidHex(_))));
        assert!(matches!(parse_block("-"), Err(Error::InvalidHex(_))));
    }

    #[test]
    fn test_parse_wrong_length() {
        let err = parse_access_conditions("FF078069").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidLength {
                expected: 3,
                actual: 4,
                ..
            }
        ));
        assert!(matches!(
            parse_block("00"),
            Err(Error::InvalidLength { expected: 16, .. })
        ));
        assert!(matches!(
            parse_key("FFF"),
            Err(Error::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_parse_block() {
        let block = parse_block("FFFFFFFFFFFFFF078069FFFFFFFFFFFF").unwrap();
        assert_eq!(block[6..10], [0xFF, 0x07, 0x80, 0x69]);
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0xab, 0x01]), "AB01");
    }
}
