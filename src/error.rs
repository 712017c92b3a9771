//! Error types for the driver core
//!
//! This module defines all error types that can occur while working with
//! LOBs and cursors, from argument validation up to errors passed through
//! from the session layer.

use std::io;
use thiserror::Error;

use crate::constants::error_code;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the driver core
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // LOB Errors
    // =========================================================================
    /// Position or length argument out of bounds
    #[error("invalid position: {0}")]
    InvalidPosition(String),

    /// Operation on a LOB after `free()`
    #[error("Invalid operation on closed LOB")]
    ClosedLob,

    /// LOB mutation without an active row lock
    #[error("ORA-22920: row containing the LOB value is not locked")]
    RowNotLocked,

    // =========================================================================
    // Cursor Errors
    // =========================================================================
    /// Cursor is closed
    #[error("cursor is closed")]
    CursorClosed,

    /// Invalid cursor state
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Invalid argument for the current cursor configuration
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation not supported in the current mode
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    // =========================================================================
    // Connection Errors
    // =========================================================================
    /// Another statement is in progress on this connection
    #[error("connection busy: {0}")]
    ConnectionBusy(String),

    /// Connection closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Invalid option string
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Database error with error code, passed through from the session layer
    #[error("ORA-{code:05}: {message}")]
    OracleError { code: u32, message: String },

    /// Opaque transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// Data conversion error
    #[error("data conversion error: {0}")]
    DataConversionError(String),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new database error
    pub fn oracle(code: u32, message: impl Into<String>) -> Self {
        Error::OracleError {
            code,
            message: message.into(),
        }
    }

    /// Check if this error was raised because a LOB or cursor was already closed
    pub fn is_closed_error(&self) -> bool {
        matches!(
            self,
            Error::ClosedLob | Error::CursorClosed | Error::ConnectionClosed
        )
    }

    /// Check if this error came from the session layer
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Error::OracleError { .. } | Error::Transport(_) | Error::Io(_)
        )
    }

    /// Check if this is a "table or view does not exist" error
    pub fn is_table_not_found(&self) -> bool {
        matches!(self, Error::OracleError { code, .. } if *code == error_code::TABLE_NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_error_display() {
        let err = Error::oracle(942, "table or view does not exist");
        assert_eq!(err.to_string(), "ORA-00942: table or view does not exist");
        assert!(err.is_table_not_found());
        assert!(err.is_transport_error());
    }

    #[test]
    fn test_closed_lob_message() {
        assert_eq!(Error::ClosedLob.to_string(), "Invalid operation on closed LOB");
        assert!(Error::ClosedLob.is_closed_error());
        assert!(Error::CursorClosed.is_closed_error());
        assert!(!Error::RowNotLocked.is_closed_error());
    }

    #[test]
    fn test_row_not_locked_message() {
        assert!(Error::RowNotLocked.to_string().contains("not locked"));
        assert!(!Error::RowNotLocked.is_transport_error());
    }
}
