//! Session layer consumed by the LOB and cursor engines
//!
//! A [`Session`] is one authenticated server session. It executes opaque
//! requests (open a cursor, fetch a batch, read a LOB piece) and reports
//! server errors as [`Error::OracleError`](crate::Error::OracleError).
//! Handshake, authentication and the wire protocol live below this trait.
//!
//! [`MemorySession`] is an in-process implementation backed by plain
//! tables, used to run the engines without a server.

mod memory;

pub use memory::{MemorySession, SessionStats};

use crate::constants::{Concurrency, FetchOrientation, ResultSetType};
use crate::error::Result;
use crate::lob::{LobPiece, PieceCursor};
use crate::row::{ColumnInfo, Row, Value};
use crate::types::{LobLocator, RowId};

/// Server-side cursor identifier
pub type CursorId = u32;

/// Request to open a server cursor for a query
#[derive(Debug, Clone)]
pub struct CursorRequest {
    /// SQL text
    pub sql: String,
    /// Scroll mode
    pub result_set_type: ResultSetType,
    /// Concurrency mode
    pub concurrency: Concurrency,
    /// Rows per fetch
    pub fetch_size: u32,
    /// LOBs up to this many bytes travel with their locator
    pub lob_prefetch_size: u32,
    /// Piece size to advertise on LOB locators
    pub lob_chunk_size: u32,
}

/// Opened server cursor
#[derive(Debug, Clone)]
pub struct CursorDescription {
    /// Server cursor id
    pub cursor_id: CursorId,
    /// Column metadata
    pub columns: Vec<ColumnInfo>,
}

/// Fetch request for an open cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// Maximum rows to return
    pub num_rows: u32,
    /// Where to fetch from
    pub orientation: FetchOrientation,
    /// Row number for absolute fetches (1-based)
    pub offset: i64,
}

impl FetchRequest {
    /// Fetch the next `num_rows` rows after the last one delivered
    pub fn next(num_rows: u32) -> Self {
        Self {
            num_rows,
            orientation: FetchOrientation::Next,
            offset: 0,
        }
    }

    /// Fetch up to `num_rows` rows starting at row `row`
    pub fn absolute(row: u64, num_rows: u32) -> Self {
        Self {
            num_rows,
            orientation: FetchOrientation::Absolute,
            offset: row as i64,
        }
    }

    /// Fetch the last `num_rows` rows
    pub fn last(num_rows: u32) -> Self {
        Self {
            num_rows,
            orientation: FetchOrientation::Last,
            offset: 0,
        }
    }
}

/// Rows returned for one fetch
#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
    /// Absolute 1-based row number of the first row in `rows`
    pub start_row: u64,
    /// Fetched rows
    pub rows: Vec<Row>,
    /// No rows remain after this batch
    pub exhausted: bool,
    /// Total row count, when the server reports it
    pub row_count: Option<u64>,
}

/// Result of re-reading a row by identity
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Current committed values
    Row(Row),
    /// The row no longer exists
    NotFound,
}

/// Trait for session implementations
#[async_trait::async_trait]
pub trait Session: Send {
    /// Open a cursor for a query
    async fn open_cursor(&mut self, request: &CursorRequest) -> Result<CursorDescription>;

    /// Fetch a batch of rows
    async fn fetch_rows(&mut self, cursor_id: CursorId, request: &FetchRequest) -> Result<FetchBatch>;

    /// Close a cursor
    async fn close_cursor(&mut self, cursor_id: CursorId) -> Result<()>;

    /// Re-read a row by identity
    async fn refresh_row(&mut self, cursor_id: CursorId, row_id: &RowId) -> Result<RefreshOutcome>;

    /// Update columns of a row; `changes` holds (column index, new value)
    async fn update_row(
        &mut self,
        cursor_id: CursorId,
        row_id: &RowId,
        changes: &[(usize, Value)],
    ) -> Result<()>;

    /// Delete a row
    async fn delete_row(&mut self, cursor_id: CursorId, row_id: &RowId) -> Result<()>;

    /// Insert a row into the cursor's table, returning its identity
    async fn insert_row(&mut self, cursor_id: CursorId, values: &[Value]) -> Result<Option<RowId>>;

    /// Lock a row for the current transaction
    async fn lock_row(&mut self, row_id: &RowId) -> Result<()>;

    /// Current length of LOB content, in bytes (BLOB) or UTF-16 units (CLOB)
    async fn lob_length(&mut self, locator: &LobLocator) -> Result<u64>;

    /// Read one piece of LOB content
    async fn fetch_lob_piece(&mut self, locator: &LobLocator, cursor: PieceCursor) -> Result<LobPiece>;

    /// Write one piece of LOB content at a 1-based byte offset
    async fn write_lob_piece(
        &mut self,
        locator: &LobLocator,
        offset: u64,
        data: &[u8],
        is_final: bool,
    ) -> Result<()>;

    /// Cut LOB content to `new_len` bytes
    async fn trim_lob(&mut self, locator: &LobLocator, new_len: u64) -> Result<()>;

    /// Execute a statement, returning the affected row count
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Commit the current transaction
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction
    async fn rollback(&mut self) -> Result<()>;

    /// End the session
    async fn close(&mut self) -> Result<()>;
}
