//! Result cursors
//!
//! A cursor walks the rows of a query in one of three modes:
//!
//! - `FORWARD_ONLY`: a single forward pass. With a fetch size the rows are
//!   streamed one batch at a time and the cursor holds the connection until
//!   it is drained or closed; without one every row is fetched at open.
//! - `SCROLL_INSENSITIVE`: every row is fetched at open and navigation runs
//!   over that snapshot.
//! - `SCROLL_SENSITIVE`: rows are fetched on demand around the current
//!   position and can be re-read from the server with `refresh_row`.
//!
//! # Example
//!
//! ```rust
//! use ob_client::{ColumnInfo, Config, Connection, CursorOptions, MemorySession, OracleType, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ob_client::Result<()> {
//! let session = MemorySession::new();
//! session.create_table("nums", vec![ColumnInfo::new("N", OracleType::Number)]);
//! for n in 1..=5 {
//!     session.insert("nums", vec![Value::Integer(n)])?;
//! }
//!
//! let conn = Connection::new(session, Config::default());
//! let mut cursor = conn
//!     .open_cursor("SELECT * FROM nums", CursorOptions::scroll_insensitive())
//!     .await?;
//!
//! assert!(cursor.last().await?);
//! assert_eq!(cursor.get(0)?.as_i64(), Some(5));
//! assert!(cursor.relative(-2).await?);
//! assert_eq!(cursor.row_number(), 3);
//! # Ok(())
//! # }
//! ```

mod engine;
mod options;
mod window;

pub use engine::{CursorEngine, CursorPosition};
pub use options::CursorOptions;
pub use window::RowWindow;
