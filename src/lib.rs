#![warn(missing_docs)]

//! # ob-client
//!
//! Core of a database client driver: the large-object engine and the
//! scrollable result-cursor engine.
//!
//! The wire protocol, handshake and authentication live below the
//! [`Session`] trait. Everything in this crate talks to the server through
//! that trait, so the engines run unchanged over a real transport or over
//! the in-process [`MemorySession`].
//!
//! ## Features
//!
//! - **LOBs** - Client-side BLOB/CLOB buffers with 1-based positions, search,
//!   gap-filling writes, truncation and streams
//! - **Locators** - Server LOBs read and written piece by piece, with
//!   mutation bound to the row lock of the current transaction
//! - **Cursors** - `FORWARD_ONLY`, `SCROLL_INSENSITIVE` and `SCROLL_SENSITIVE`
//!   navigation, row refresh and updatable cursors
//! - **Async/await** - Built on Tokio
//!
//! ## Quick Start
//!
//! ```rust
//! use ob_client::{ColumnInfo, Config, Connection, CursorOptions, MemorySession, OracleType, Value};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> ob_client::Result<()> {
//!     let session = MemorySession::new();
//!     session.create_table(
//!         "docs",
//!         vec![
//!             ColumnInfo::new("ID", OracleType::Number),
//!             ColumnInfo::new("BODY", OracleType::Clob),
//!         ],
//!     );
//!     session.insert("docs", vec![Value::Integer(1), Value::from("hello")])?;
//!
//!     let conn = Connection::new(session, Config::default());
//!     let mut cursor = conn
//!         .open_cursor("SELECT * FROM docs FOR UPDATE", CursorOptions::new())
//!         .await?;
//!
//!     while cursor.next().await? {
//!         let mut body = cursor.get_lob(1)?.expect("not null");
//!         body.set_string(6, " world").await?;
//!         assert_eq!(body.get_sub_string(1, 100).await?, "hello world");
//!     }
//!     cursor.close().await?;
//!     conn.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Client-side LOBs
//!
//! ```rust
//! use ob_client::LobBuffer;
//!
//! # fn main() -> ob_client::Result<()> {
//! let mut clob = LobBuffer::clob("abc");
//! clob.set_string(6, "xyz")?;
//! assert_eq!(clob.get_sub_string(1, 10)?, "abc  xyz");
//!
//! let blob = LobBuffer::blob((1u8..=12).collect::<Vec<_>>());
//! assert_eq!(blob.position(&[11, 12], 1)?, 11);
//! assert_eq!(blob.position(&[12, 13], 1)?, -1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate logs through [`tracing`]: fetch and LOB piece round trips at
//! `trace`, cursor lifecycle and transaction boundaries at `debug`. No
//! subscriber is installed.

pub mod config;
pub mod connection;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod lob;
pub mod row;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use connection::Connection;
pub use constants::{Concurrency, FetchOrientation, OracleType, ResultSetType};
pub use cursor::{CursorEngine, CursorOptions, CursorPosition, RowWindow};
pub use error::{Error, Result};
pub use lob::{
    ClobWriter, LobBuffer, LobContent, LobHandle, LobKind, LobPiece, LobReader, LobSink, LobStream,
    LobStreamBridge, LobWriter, PieceCursor, PieceReader, PieceWriter,
};
pub use row::{ColumnInfo, Row, Value};
pub use session::{
    CursorDescription, CursorId, CursorRequest, FetchBatch, FetchRequest, MemorySession,
    RefreshOutcome, Session, SessionStats,
};
pub use types::{LobData, LobLocator, LobValue, RowId};
