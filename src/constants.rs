//! Driver constants
//!
//! This module contains the type codes, cursor modes, error codes and
//! defaults shared by the LOB and cursor engines.

// =============================================================================
// Data Types
// =============================================================================

/// Oracle internal data type numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OracleType {
    /// VARCHAR2 string type
    Varchar = 1,
    /// NUMBER type
    Number = 2,
    /// ROWID
    Rowid = 11,
    /// RAW binary type
    Raw = 23,
    /// CLOB
    Clob = 112,
    /// BLOB
    Blob = 113,
}

impl OracleType {
    /// Check if this type is a LOB type
    pub fn is_lob(&self) -> bool {
        matches!(self, OracleType::Clob | OracleType::Blob)
    }
}

impl TryFrom<u8> for OracleType {
    type Error = crate::error::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OracleType::Varchar),
            2 => Ok(OracleType::Number),
            11 => Ok(OracleType::Rowid),
            23 => Ok(OracleType::Raw),
            112 => Ok(OracleType::Clob),
            113 => Ok(OracleType::Blob),
            _ => Err(crate::error::Error::DataConversionError(format!(
                "unknown data type: {}",
                value
            ))),
        }
    }
}

// =============================================================================
// Fetch Orientation (for scrollable cursors)
// =============================================================================

/// Fetch orientation for scrollable cursor operations.
///
/// The row window only ever asks for the next batch, a batch starting at an
/// absolute row number, or the final batch; moves like `previous` or
/// `relative` resolve to one of these on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum FetchOrientation {
    /// Fetch next row (default)
    #[default]
    Next = 0x02,
    /// Fetch last row
    Last = 0x08,
    /// Fetch absolute position
    Absolute = 0x20,
}

// =============================================================================
// Cursor Modes
// =============================================================================

/// Scroll mode of a result cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultSetType {
    /// Single pass, rows fetched on demand
    #[default]
    ForwardOnly,
    /// Client-cached snapshot, fully materialized when opened
    ScrollInsensitive,
    /// Server-backed, rows can be re-fetched by identity
    ScrollSensitive,
}

impl ResultSetType {
    /// Check if backward navigation is allowed
    pub fn is_scrollable(&self) -> bool {
        !matches!(self, ResultSetType::ForwardOnly)
    }

    /// Name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            ResultSetType::ForwardOnly => "FORWARD_ONLY",
            ResultSetType::ScrollInsensitive => "SCROLL_INSENSITIVE",
            ResultSetType::ScrollSensitive => "SCROLL_SENSITIVE",
        }
    }
}

/// Concurrency of a result cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// Rows cannot be changed through the cursor
    #[default]
    ReadOnly,
    /// Rows can be updated, deleted and inserted through the cursor
    Updatable,
}

// =============================================================================
// Defaults
// =============================================================================

/// Default number of rows per fetch round trip
pub const DEFAULT_FETCH_SIZE: u32 = 100;

/// LOBs up to this many bytes are prefetched together with their locator
pub const DEFAULT_LOB_PREFETCH_SIZE: u32 = 4000;

/// Default piece size for LOB reads and writes
pub const DEFAULT_LOB_CHUNK_SIZE: u32 = 8132;

/// Character used to pad CLOB gaps
pub const CLOB_PAD: char = ' ';

/// Byte used to pad BLOB gaps
pub const BLOB_PAD: u8 = 0;

/// Largest LOB, in bytes (BLOB) or UTF-16 units (CLOB), a write may produce
pub const MAX_LOB_SIZE: usize = u32::MAX as usize;

// =============================================================================
// Error Codes
// =============================================================================

/// Database error codes
#[allow(missing_docs)]
pub mod error_code {
    pub const TABLE_NOT_FOUND: u32 = 942;
    pub const NO_DATA_FOUND: u32 = 1403;
    pub const FETCH_OUT_OF_SEQUENCE: u32 = 1002;
    pub const INVALID_LOB_LOCATOR: u32 = 22275;
    pub const LOB_ROW_NOT_LOCKED: u32 = 22920;
}
