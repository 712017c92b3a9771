//! Row identity (ROWID)
//!
//! Sensitive cursors re-fetch rows by identity and LOB locators remember the
//! row they belong to, so the identity must be hashable and stable.
//!
//! Physical ROWID layout:
//! - RBA (data object number): u32
//! - Partition ID (relative file number): u16
//! - Block Number: u32
//! - Slot Number: u16
//!
//! The encoded form is 18 characters of a base64-like alphabet:
//! 6 for RBA, 3 for partition, 6 for block, 3 for slot.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Base64 alphabet used for ROWID encoding
const BASE64_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Length of an encoded ROWID string
pub const MAX_ROWID_LENGTH: usize = 18;

/// Stable identity of a server row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RowId {
    /// Relative Block Address (data object number)
    pub rba: u32,
    /// Partition ID (relative file number)
    pub partition_id: u16,
    /// Block number within the data file
    pub block_num: u32,
    /// Slot number (row number within the block)
    pub slot_num: u16,
}

impl RowId {
    /// Create a new ROWID
    pub fn new(rba: u32, partition_id: u16, block_num: u32, slot_num: u16) -> Self {
        Self {
            rba,
            partition_id,
            block_num,
            slot_num,
        }
    }

    /// Check if the ROWID is valid (non-zero)
    pub fn is_valid(&self) -> bool {
        self.rba != 0 || self.partition_id != 0 || self.block_num != 0 || self.slot_num != 0
    }

    /// Encode to the 18 character ROWID form, `None` for the null identity
    pub fn encode(&self) -> Option<String> {
        if !self.is_valid() {
            return None;
        }

        let mut buf = [0u8; MAX_ROWID_LENGTH];
        let mut offset = encode_base64(&mut buf, self.rba as u64, 6, 0);
        offset = encode_base64(&mut buf, self.partition_id as u64, 3, offset);
        offset = encode_base64(&mut buf, self.block_num as u64, 6, offset);
        encode_base64(&mut buf, self.slot_num as u64, 3, offset);

        Some(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Some(s) => f.write_str(&s),
            None => f.write_str("NULL"),
        }
    }
}

impl FromStr for RowId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != MAX_ROWID_LENGTH {
            return Err(Error::DataConversionError(format!(
                "invalid ROWID string length: {}, expected {}",
                s.len(),
                MAX_ROWID_LENGTH
            )));
        }

        let bytes = s.as_bytes();
        Ok(RowId {
            rba: decode_base64(&bytes[0..6])? as u32,
            partition_id: decode_base64(&bytes[6..9])? as u16,
            block_num: decode_base64(&bytes[9..15])? as u32,
            slot_num: decode_base64(&bytes[15..18])? as u16,
        })
    }
}

fn encode_base64(buf: &mut [u8], value: u64, num_chars: usize, offset: usize) -> usize {
    let mut val = value;
    for i in (0..num_chars).rev() {
        buf[offset + i] = BASE64_ALPHABET[(val & 0x3f) as usize];
        val >>= 6;
    }
    offset + num_chars
}

fn decode_base64(chars: &[u8]) -> Result<u64> {
    chars.iter().try_fold(0u64, |acc, &c| {
        let idx = match c {
            b'A'..=b'Z' => c - b'A',
            b'a'..=b'z' => c - b'a' + 26,
            b'0'..=b'9' => c - b'0' + 52,
            b'+' => 62,
            b'/' => 63,
            _ => {
                return Err(Error::DataConversionError(format!(
                    "invalid base64 character in ROWID: {}",
                    char::from(c)
                )))
            }
        };
        Ok((acc << 6) | idx as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rowid_roundtrip() {
        let rowid = RowId::new(12345, 67, 89012, 345);
        let s = rowid.encode().unwrap();
        assert_eq!(s.len(), MAX_ROWID_LENGTH);
        assert_eq!(s.parse::<RowId>().unwrap(), rowid);
    }

    #[test]
    fn test_null_rowid() {
        let rowid = RowId::default();
        assert!(!rowid.is_valid());
        assert!(rowid.encode().is_none());
        assert_eq!(rowid.to_string(), "NULL");
    }

    #[test]
    fn test_parse_invalid_rowid_string() {
        assert!("short".parse::<RowId>().is_err());
        assert!("AAAAAAAAAAAAAAAAA*".parse::<RowId>().is_err());
    }

    #[test]
    fn test_rowid_hash_identity() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(RowId::new(1, 0, 0, 7));
        assert!(set.contains(&RowId::new(1, 0, 0, 7)));
        assert!(!set.contains(&RowId::new(1, 0, 0, 8)));
    }
}
