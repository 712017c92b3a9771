//! Database connection
//!
//! This module provides the `Connection` type that owns a [`Session`] and
//! the transaction state the LOB and cursor engines depend on: the current
//! transaction epoch, the rows locked in it, and the streaming cursor (if
//! any) that holds the session.
//!
//! # Example
//!
//! ```rust
//! use ob_client::{ColumnInfo, Config, Connection, CursorOptions, MemorySession, OracleType, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ob_client::Result<()> {
//! let session = MemorySession::new();
//! session.create_table("t", vec![ColumnInfo::new("ID", OracleType::Number)]);
//! session.insert("t", vec![Value::Integer(1)])?;
//!
//! let conn = Connection::new(session, Config::default());
//! let mut cursor = conn
//!     .open_cursor("SELECT * FROM t", CursorOptions::scroll_insensitive())
//!     .await?;
//! assert!(cursor.next().await?);
//! assert_eq!(cursor.get(0)?.as_i64(), Some(1));
//! cursor.close().await?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::config::Config;
use crate::cursor::{CursorEngine, CursorOptions};
use crate::error::{Error, Result};
use crate::lob::LobHandle;
use crate::row::{Row, Value};
use crate::session::{CursorId, Session};
use crate::types::{LobLocator, LobValue, RowId};

/// Internal connection state shared across async operations
pub(crate) struct ConnectionInner {
    session: Box<dyn Session>,
    /// Transaction epoch; bumped by commit and rollback
    pub(crate) transaction: u64,
    /// Rows locked in the current transaction
    pub(crate) locked_rows: HashSet<RowId>,
    /// Forward-only streaming cursor that still has rows pending
    pub(crate) streaming_cursor: Option<CursorId>,
    /// Write count per LOB locator id; a locator stamped with an older
    /// count holds a stale size and prefetched copy
    lob_epochs: HashMap<Bytes, u64>,
    closed: bool,
}

impl ConnectionInner {
    pub(crate) fn session(&mut self) -> Result<&mut (dyn Session + 'static)> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        Ok(self.session.as_mut())
    }

    /// Fail while a streaming cursor holds the session
    pub(crate) fn ensure_idle(&self) -> Result<()> {
        match self.streaming_cursor {
            Some(cursor_id) => Err(Error::ConnectionBusy(format!(
                "streaming cursor {} is still open; fetch all its rows or close it first",
                cursor_id
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn release_streaming(&mut self, cursor_id: CursorId) {
        if self.streaming_cursor == Some(cursor_id) {
            self.streaming_cursor = None;
            debug!(cursor_id, "streaming cursor released the connection");
        }
    }

    /// Tag the locators in a fetched row with the current transaction and
    /// write epoch
    pub(crate) fn stamp_locators(&self, row: &mut Row) {
        for value in row.values_mut() {
            if let Value::Lob(LobValue::Locator(locator)) = value {
                locator.transaction = self.transaction;
                locator.write_epoch = self.lob_epoch(locator);
            }
        }
    }

    pub(crate) fn lob_epoch(&self, locator: &LobLocator) -> u64 {
        self.lob_epochs.get(locator.locator_bytes()).copied().unwrap_or(0)
    }

    pub(crate) fn record_lob_write(&mut self, locator: &LobLocator) {
        *self
            .lob_epochs
            .entry(Bytes::copy_from_slice(locator.locator_bytes()))
            .or_insert(0) += 1;
    }

    fn end_transaction(&mut self, invalidate: bool) {
        if invalidate {
            self.transaction += 1;
            self.locked_rows.clear();
        }
    }
}

/// A connection over one session.
///
/// `Connection` is cheap to clone; clones share the session, and operations
/// are serialized internally via a mutex.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Mutex<ConnectionInner>>,
    config: Arc<Config>,
    closed: Arc<AtomicBool>,
    id: u32,
}

// Connection ID counter
static CONNECTION_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

impl Connection {
    /// Create a connection over an established session
    pub fn new(session: impl Session + 'static, config: Config) -> Self {
        let id = CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        debug!(id, config = %config, "connection created");
        Self {
            inner: Arc::new(Mutex::new(ConnectionInner {
                session: Box::new(session),
                transaction: 0,
                locked_rows: HashSet::new(),
                streaming_cursor: None,
                lob_epochs: HashMap::new(),
                closed: false,
            })),
            config: Arc::new(config),
            closed: Arc::new(AtomicBool::new(false)),
            id,
        }
    }

    /// Get the connection ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Driver configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if the connection is closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, ConnectionInner> {
        self.inner.lock().await
    }

    /// Release the streaming guard without waiting, for use from `Drop`
    pub(crate) fn try_release_streaming(&self, cursor_id: CursorId) {
        if let Ok(mut inner) = self.inner.try_lock() {
            inner.release_streaming(cursor_id);
        }
    }

    /// Current transaction epoch
    pub async fn transaction(&self) -> u64 {
        self.lock().await.transaction
    }

    /// Open a cursor for `sql`
    pub async fn open_cursor(&self, sql: &str, options: CursorOptions) -> Result<CursorEngine> {
        CursorEngine::open(self.clone(), sql, options).await
    }

    /// Open a forward-only, read-only cursor with default options
    pub async fn query(&self, sql: &str) -> Result<CursorEngine> {
        self.open_cursor(sql, CursorOptions::default()).await
    }

    /// Execute a statement, returning the affected row count
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let mut inner = self.lock().await;
        inner.ensure_idle()?;
        let affected = inner.session()?.execute(sql).await?;
        debug!(id = self.id, affected, "statement executed");
        Ok(affected)
    }

    /// Commit the current transaction.
    ///
    /// Row locks end with the transaction, and so does the right to mutate
    /// through locators fetched in it.
    pub async fn commit(&self) -> Result<()> {
        let mut inner = self.lock().await;
        inner.ensure_idle()?;
        inner.session()?.commit().await?;
        inner.end_transaction(self.config.invalidate_locators_on_commit);
        debug!(id = self.id, transaction = inner.transaction, "committed");
        Ok(())
    }

    /// Roll back the current transaction
    pub async fn rollback(&self) -> Result<()> {
        let mut inner = self.lock().await;
        inner.ensure_idle()?;
        inner.session()?.rollback().await?;
        // rolled-back LOB writes change content again
        for epoch in inner.lob_epochs.values_mut() {
            *epoch += 1;
        }
        inner.end_transaction(self.config.invalidate_locators_on_commit);
        debug!(id = self.id, transaction = inner.transaction, "rolled back");
        Ok(())
    }

    /// Lock a row for the current transaction
    pub async fn lock_row(&self, row_id: &RowId) -> Result<()> {
        let mut inner = self.lock().await;
        inner.session()?.lock_row(row_id).await?;
        inner.locked_rows.insert(*row_id);
        Ok(())
    }

    /// Whether `row_id` is locked in the current transaction
    pub async fn is_row_locked(&self, row_id: &RowId) -> bool {
        self.lock().await.locked_rows.contains(row_id)
    }

    /// Check that content behind `locator` may be modified now
    pub(crate) async fn check_locator(&self, locator: &LobLocator) -> Result<()> {
        let inner = self.lock().await;
        if inner.closed {
            return Err(Error::ConnectionClosed);
        }
        let locked = locator
            .row_id()
            .map_or(false, |id| inner.locked_rows.contains(id));
        let current = !self.config.invalidate_locators_on_commit
            || locator.transaction() == inner.transaction;
        if locked && current {
            Ok(())
        } else {
            Err(Error::RowNotLocked)
        }
    }

    /// Create an empty client-side BLOB
    pub fn create_blob(&self) -> LobHandle {
        LobHandle::new_blob()
    }

    /// Create an empty client-side CLOB
    pub fn create_clob(&self) -> LobHandle {
        LobHandle::new_clob()
    }

    /// Close the connection; closing again is a no-op
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        let mut inner = self.lock().await;
        inner.streaming_cursor = None;
        let result = inner.session.close().await;
        inner.closed = true;
        debug!(id = self.id, "connection closed");
        result
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::OracleType;
    use crate::row::{ColumnInfo, Value};
    use crate::session::MemorySession;

    fn connection() -> (MemorySession, Connection) {
        let session = MemorySession::new();
        session.create_table("t", vec![ColumnInfo::new("ID", OracleType::Number)]);
        session.insert("t", vec![Value::Integer(1)]).unwrap();
        (session.clone(), Connection::new(session, Config::default()))
    }

    #[tokio::test]
    async fn test_commit_bumps_transaction_and_clears_locks() {
        let (session, conn) = connection();
        let id = session.row_ids("t")[0];
        conn.lock_row(&id).await.unwrap();
        assert!(conn.is_row_locked(&id).await);
        assert_eq!(conn.transaction().await, 0);

        conn.commit().await.unwrap();
        assert_eq!(conn.transaction().await, 1);
        assert!(!conn.is_row_locked(&id).await);

        conn.rollback().await.unwrap();
        assert_eq!(conn.transaction().await, 2);
        assert_eq!(session.stats().commits, 1);
        assert_eq!(session.stats().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_locks_survive_commit_when_configured() {
        let session = MemorySession::new();
        let conn = Connection::new(
            session,
            Config::default().invalidate_locators_on_commit(false),
        );
        let id = RowId::new(1, 0, 1, 1);
        conn.lock_row(&id).await.unwrap();
        conn.commit().await.unwrap();
        assert_eq!(conn.transaction().await, 0);
        assert!(conn.is_row_locked(&id).await);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_session, conn) = connection();
        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert!(conn.is_closed());
        assert!(matches!(conn.execute("SELECT 1").await, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_execute_records_statement() {
        let (session, conn) = connection();
        assert_eq!(conn.execute("DELETE FROM t").await.unwrap(), 1);
        assert_eq!(session.executed(), vec!["DELETE FROM t".to_string()]);
    }
}
