//! Wire-level LOB representations
//!
//! A LOB column arrives from the session layer either as inline bytes (the
//! whole value travelled in the row) or as a locator: a server-side
//! reference that is only valid inside the transaction that produced it.

use std::fmt;

use bytes::Bytes;

use crate::constants::OracleType;
use crate::error::{Error, Result};
use crate::types::RowId;

/// Result of reading a whole LOB
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobData {
    /// String data (from CLOB)
    String(String),
    /// Binary data (from BLOB)
    Bytes(Bytes),
}

impl LobData {
    /// Get as string (for CLOB)
    pub fn as_string(&self) -> Option<&str> {
        match self {
            LobData::String(s) => Some(s),
            LobData::Bytes(_) => None,
        }
    }

    /// Get as bytes (for BLOB)
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            LobData::Bytes(b) => Some(b),
            LobData::String(_) => None,
        }
    }

    /// Length of the data in bytes
    pub fn len(&self) -> usize {
        match self {
            LobData::String(s) => s.len(),
            LobData::Bytes(b) => b.len(),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// LOB locator - holds the reference to a LOB stored in the database
#[derive(Clone)]
pub struct LobLocator {
    /// The raw locator bytes from the server
    pub(crate) locator: Bytes,
    /// Size of the LOB in bytes (for BLOB) or UTF-16 units (for CLOB)
    pub(crate) size: u64,
    /// Chunk size for piece reads and writes
    pub(crate) chunk_size: u32,
    /// LOB type (CLOB or BLOB)
    pub(crate) oracle_type: OracleType,
    /// Row that owns this LOB value
    pub(crate) row_id: Option<RowId>,
    /// Transaction epoch the locator was produced in
    pub(crate) transaction: u64,
    /// Writes to this content the connection had seen when `size` and
    /// `prefetched` were taken
    pub(crate) write_epoch: u64,
    /// Whole content, when it was small enough to travel with the locator
    pub(crate) prefetched: Option<Bytes>,
}

impl LobLocator {
    /// Create a new LOB locator from raw data
    pub fn new(locator: Bytes, size: u64, chunk_size: u32, oracle_type: OracleType) -> Self {
        Self {
            locator,
            size,
            chunk_size,
            oracle_type,
            row_id: None,
            transaction: 0,
            write_epoch: 0,
            prefetched: None,
        }
    }

    /// Attach the owning row identity
    pub fn with_row_id(mut self, row_id: RowId) -> Self {
        self.row_id = Some(row_id);
        self
    }

    /// Attach content that was prefetched together with the locator
    pub fn with_prefetched(mut self, data: Bytes) -> Self {
        self.prefetched = Some(data);
        self
    }

    /// Get the size of the LOB
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the chunk size for read/write operations
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Get the LOB type
    pub fn oracle_type(&self) -> OracleType {
        self.oracle_type
    }

    /// Check if this is a BLOB
    pub fn is_blob(&self) -> bool {
        self.oracle_type == OracleType::Blob
    }

    /// Check if this is a CLOB
    pub fn is_clob(&self) -> bool {
        self.oracle_type == OracleType::Clob
    }

    /// Get the raw locator bytes (for sending back to the server)
    pub fn locator_bytes(&self) -> &[u8] {
        &self.locator
    }

    /// Identity of the row that owns this LOB
    pub fn row_id(&self) -> Option<&RowId> {
        self.row_id.as_ref()
    }

    /// Transaction epoch the locator belongs to
    pub fn transaction(&self) -> u64 {
        self.transaction
    }

    /// Content prefetched with the locator, if any
    pub fn prefetched(&self) -> Option<&Bytes> {
        self.prefetched.as_ref()
    }

    /// Hex form of the locator id, for logs
    pub fn id_hex(&self) -> String {
        hex::encode(&self.locator)
    }
}

impl fmt::Debug for LobLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobLocator")
            .field("id", &self.id_hex())
            .field("type", &self.oracle_type)
            .field("size", &self.size)
            .field("row_id", &self.row_id)
            .field("transaction", &self.transaction)
            .field("write_epoch", &self.write_epoch)
            .field("prefetched", &self.prefetched.as_ref().map(|b| b.len()))
            .finish()
    }
}

/// Represents a LOB value that can be either inline data or a locator
#[derive(Debug, Clone)]
pub enum LobValue {
    /// LOB data that travelled inside the row
    Inline(Bytes),
    /// LOB locator for data that lives on the server
    Locator(LobLocator),
    /// Empty LOB
    Empty,
    /// NULL LOB
    Null,
}

impl LobValue {
    /// Create an inline LOB value
    pub fn inline(data: Bytes) -> Self {
        if data.is_empty() {
            Self::Empty
        } else {
            Self::Inline(data)
        }
    }

    /// Create a LOB value from a locator
    pub fn locator(locator: LobLocator) -> Self {
        Self::Locator(locator)
    }

    /// Check if the LOB is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if the LOB is empty
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty | Self::Null => true,
            Self::Inline(data) => data.is_empty(),
            Self::Locator(loc) => loc.size == 0,
        }
    }

    /// Get the locator if this is a locator-based LOB
    pub fn as_locator(&self) -> Option<&LobLocator> {
        match self {
            Self::Locator(loc) => Some(loc),
            _ => None,
        }
    }

    /// Get inline bytes without a round trip
    pub fn as_bytes(&self) -> Result<Option<Bytes>> {
        match self {
            Self::Null => Ok(None),
            Self::Empty => Ok(Some(Bytes::new())),
            Self::Inline(data) => Ok(Some(data.clone())),
            Self::Locator(loc) => match &loc.prefetched {
                Some(data) => Ok(Some(data.clone())),
                None => Err(Error::UnsupportedOperation(
                    "LOB data requires explicit read operation".to_string(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(oracle_type: OracleType) -> LobLocator {
        LobLocator::new(Bytes::from_static(&[0x01, 0x02, 0x03, 0x04]), 100, 8132, oracle_type)
    }

    #[test]
    fn test_lob_locator_accessors() {
        let loc = locator(OracleType::Clob).with_row_id(RowId::new(1, 0, 0, 3));
        assert!(loc.is_clob());
        assert!(!loc.is_blob());
        assert_eq!(loc.size(), 100);
        assert_eq!(loc.chunk_size(), 8132);
        assert_eq!(loc.row_id(), Some(&RowId::new(1, 0, 0, 3)));
        assert_eq!(loc.id_hex(), "01020304");
    }

    #[test]
    fn test_lob_value_inline() {
        let lob = LobValue::inline(Bytes::from("Hello, World!"));
        assert!(!lob.is_null());
        assert!(!lob.is_empty());
        assert_eq!(lob.as_bytes().unwrap(), Some(Bytes::from("Hello, World!")));
    }

    #[test]
    fn test_lob_value_empty() {
        assert!(LobValue::inline(Bytes::new()).is_empty());
        assert!(LobValue::Null.is_null());
        assert_eq!(LobValue::Null.as_bytes().unwrap(), None);
    }

    #[test]
    fn test_locator_without_prefetch_requires_read() {
        let lob = LobValue::locator(locator(OracleType::Blob));
        assert!(lob.as_bytes().is_err());

        let lob = LobValue::locator(locator(OracleType::Blob).with_prefetched(Bytes::from("ab")));
        assert_eq!(lob.as_bytes().unwrap(), Some(Bytes::from("ab")));
    }
}
