//! Large Object (LOB) engine
//!
//! LOB content either lives client-side in a [`LobBuffer`] or on the server
//! behind a locator, read and written in pieces through a
//! [`LobStreamBridge`]. [`LobHandle`] is the caller-facing object that hides
//! which of the two backs a given value.
//!
//! All positions are 1-based. BLOB positions and lengths count bytes; CLOB
//! positions and lengths count UTF-16 code units, so a character outside the
//! Basic Multilingual Plane occupies two positions.

mod bridge;
mod buffer;
mod handle;
mod stream;

pub use bridge::{LobPiece, LobStreamBridge, PieceCursor, PieceReader, PieceWriter};
pub use buffer::LobBuffer;
pub use handle::{LobContent, LobHandle, LobSink, LobStream};
pub use stream::{ClobWriter, LobReader, LobWriter};

use serde::{Deserialize, Serialize};

use crate::constants::{OracleType, MAX_LOB_SIZE};
use crate::error::{Error, Result};

/// Binary or character LOB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobKind {
    /// Binary large object
    Blob,
    /// Character large object (UTF-8 content)
    Clob,
}

impl LobKind {
    /// Name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            LobKind::Blob => "BLOB",
            LobKind::Clob => "CLOB",
        }
    }
}

impl TryFrom<OracleType> for LobKind {
    type Error = Error;

    fn try_from(value: OracleType) -> Result<Self> {
        match value {
            OracleType::Blob => Ok(LobKind::Blob),
            OracleType::Clob => Ok(LobKind::Clob),
            other => Err(Error::DataConversionError(format!(
                "{:?} is not a LOB type",
                other
            ))),
        }
    }
}

impl From<LobKind> for OracleType {
    fn from(kind: LobKind) -> Self {
        match kind {
            LobKind::Blob => OracleType::Blob,
            LobKind::Clob => OracleType::Clob,
        }
    }
}

/// Validate a 1-based position and return the 0-based index
pub(crate) fn check_position(pos: i64) -> Result<usize> {
    if pos < 1 {
        return Err(Error::InvalidPosition(format!(
            "position should be > 0, but is {}",
            pos
        )));
    }
    Ok((pos - 1) as usize)
}

/// Validate that content reaching `start + len` (0-based) stays within the
/// largest LOB the driver handles
pub(crate) fn check_extent(start: usize, len: usize) -> Result<usize> {
    match start.checked_add(len) {
        Some(end) if end <= MAX_LOB_SIZE => Ok(end),
        _ => Err(Error::InvalidPosition(format!(
            "writing {} units at position {} exceeds the maximum LOB size of {}",
            len,
            start as u64 + 1,
            MAX_LOB_SIZE
        ))),
    }
}

/// Validate a requested length
pub(crate) fn check_length(len: i64) -> Result<usize> {
    if len < 0 {
        return Err(Error::InvalidPosition(format!(
            "length should be >= 0, but is {}",
            len
        )));
    }
    Ok(len as usize)
}
