//! Cursor navigation and row operations

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use super::options::CursorOptions;
use super::window::{RowWindow, WindowUpdate};
use crate::connection::Connection;
use crate::constants::{Concurrency, ResultSetType};
use crate::error::{Error, Result};
use crate::lob::{LobBuffer, LobHandle, LobKind};
use crate::row::{ColumnInfo, Row, Value};
use crate::session::{CursorId, CursorRequest, FetchRequest, RefreshOutcome};
use crate::types::RowId;

/// Where a cursor stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPosition {
    /// Before the first row
    BeforeFirst,
    /// On a row (absolute, 1-based)
    OnRow(u64),
    /// After the last row
    AfterLast,
    /// Cursor closed
    Closed,
}

/// An open cursor over a query result.
///
/// Navigation methods return `Ok(true)` when they land on a row. On an empty
/// result every navigation method returns `Ok(false)` and the cursor is
/// neither before the first nor after the last row.
pub struct CursorEngine {
    conn: Connection,
    cursor_id: CursorId,
    columns: Vec<ColumnInfo>,
    options: CursorOptions,
    window: RowWindow,
    position: CursorPosition,
    /// Rows fetched by this cursor are locked (SELECT ... FOR UPDATE)
    for_update: bool,
    /// Column updates not yet sent with `update_row`
    pending: BTreeMap<usize, Value>,
    /// Staged values while on the insert row
    insert_row: Option<Vec<Value>>,
}

impl CursorEngine {
    pub(crate) async fn open(conn: Connection, sql: &str, options: CursorOptions) -> Result<Self> {
        let config = conn.config();
        let fetch_size = if options.fetch_size == 0 {
            config.default_fetch_size
        } else {
            options.fetch_size
        };
        let request = CursorRequest {
            sql: sql.to_string(),
            result_set_type: options.result_set_type,
            concurrency: options.concurrency,
            fetch_size,
            lob_prefetch_size: options.lob_prefetch_size.unwrap_or(config.lob_prefetch_size),
            lob_chunk_size: config.lob_chunk_size,
        };

        let description = {
            let mut inner = conn.lock().await;
            inner.ensure_idle()?;
            let description = inner.session()?.open_cursor(&request).await?;
            if options.is_streaming() {
                inner.streaming_cursor = Some(description.cursor_id);
            }
            description
        };

        let mut engine = Self {
            conn,
            cursor_id: description.cursor_id,
            columns: description.columns,
            options,
            window: RowWindow::new(fetch_size),
            position: CursorPosition::BeforeFirst,
            for_update: is_for_update(sql),
            pending: BTreeMap::new(),
            insert_row: None,
        };

        if let Err(e) = engine.prime().await {
            let _ = engine.close().await;
            return Err(e);
        }

        debug!(
            cursor_id = engine.cursor_id,
            mode = engine.options.result_set_type.name(),
            fetch_size,
            cached = engine.window.len(),
            row_count = ?engine.window.row_count(),
            "cursor opened"
        );
        Ok(engine)
    }

    /// Initial fetch: everything for buffered modes, one batch otherwise
    async fn prime(&mut self) -> Result<()> {
        if self.options.buffers_everything() {
            while !self.window.is_exhausted() {
                self.fetch(self.window.next_request(), WindowUpdate::Append).await?;
            }
        } else if self.options.result_set_type == ResultSetType::ScrollSensitive {
            self.fetch(self.window.absolute_request(1), WindowUpdate::Replace).await?;
        } else {
            self.fetch(self.window.next_request(), WindowUpdate::Replace).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Server cursor id
    pub fn cursor_id(&self) -> CursorId {
        self.cursor_id
    }

    /// Column metadata
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Options the cursor was opened with
    pub fn options(&self) -> &CursorOptions {
        &self.options
    }

    /// Scroll mode
    pub fn result_set_type(&self) -> ResultSetType {
        self.options.result_set_type
    }

    /// Concurrency mode
    pub fn concurrency(&self) -> Concurrency {
        self.options.concurrency
    }

    /// Cached rows
    pub fn window(&self) -> &RowWindow {
        &self.window
    }

    /// Current position
    pub fn position(&self) -> CursorPosition {
        self.position
    }

    /// Current row number, 0 when not on a row
    pub fn row_number(&self) -> u64 {
        match self.position {
            CursorPosition::OnRow(n) => n,
            _ => 0,
        }
    }

    /// Check if the cursor is closed
    pub fn is_closed(&self) -> bool {
        self.position == CursorPosition::Closed
    }

    /// Whether the result is known to have no rows
    pub fn is_empty(&self) -> bool {
        self.window.is_empty_result()
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Move to the next row
    pub async fn next(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.is_empty() {
            return Ok(false);
        }
        match self.position {
            CursorPosition::BeforeFirst => self.move_to(1, "next").await,
            CursorPosition::OnRow(n) => self.move_to(n as i64 + 1, "next").await,
            _ => Ok(false),
        }
    }

    /// Move to the previous row
    pub async fn previous(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.is_empty() {
            return Ok(false);
        }
        self.require_scrollable("previous")?;
        match self.position {
            CursorPosition::OnRow(n) => self.move_to(n as i64 - 1, "previous").await,
            CursorPosition::AfterLast => {
                let count = self.resolve_count().await?;
                self.move_to(count as i64, "previous").await
            }
            _ => Ok(false),
        }
    }

    /// Move to the first row
    pub async fn first(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.is_empty() {
            return Ok(false);
        }
        self.require_scrollable("first")?;
        self.move_to(1, "first").await
    }

    /// Move to the last row
    pub async fn last(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.is_empty() {
            return Ok(false);
        }
        let count = self.resolve_count().await?;
        self.move_to(count as i64, "last").await
    }

    /// Move to row `row`. Negative values count back from the end (-1 is
    /// the last row); 0 moves before the first row.
    ///
    /// Targets past either end leave the cursor before the first or after
    /// the last row and return `Ok(false)`.
    pub async fn absolute(&mut self, row: i64) -> Result<bool> {
        self.ensure_open()?;
        if row == 0 {
            if !self.options.result_set_type.is_scrollable() {
                return Err(Error::InvalidParameter(
                    "absolute(0) is not allowed on a FORWARD_ONLY cursor".to_string(),
                ));
            }
            if !self.is_empty() {
                self.leave_row();
                self.position = CursorPosition::BeforeFirst;
            }
            return Ok(false);
        }
        if self.is_empty() {
            return Ok(false);
        }
        if row > 0 {
            self.move_to(row, "absolute").await
        } else {
            let count = self.resolve_count().await? as i64;
            self.move_to(count + row + 1, "absolute").await
        }
    }

    /// Move `offset` rows from the current position, stopping before the
    /// first or after the last row
    pub async fn relative(&mut self, offset: i64) -> Result<bool> {
        self.ensure_open()?;
        if self.is_empty() {
            return Ok(false);
        }
        let current = match self.position {
            CursorPosition::OnRow(n) => n as i64,
            CursorPosition::AfterLast => self.resolve_count().await? as i64 + 1,
            _ => 0,
        };
        if offset == 0 {
            return Ok(matches!(self.position, CursorPosition::OnRow(_)));
        }
        self.move_to(current.saturating_add(offset), "relative").await
    }

    /// Move before the first row
    pub async fn before_first(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.is_empty() {
            return Ok(false);
        }
        self.require_scrollable("before_first")?;
        self.leave_row();
        self.position = CursorPosition::BeforeFirst;
        Ok(true)
    }

    /// Move after the last row.
    ///
    /// A streaming cursor drains its remaining rows, which releases the
    /// connection.
    pub async fn after_last(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.is_empty() {
            return Ok(false);
        }
        if self.options.is_streaming() {
            while !self.window.is_exhausted() {
                self.fetch(self.window.next_request(), WindowUpdate::Replace).await?;
            }
        }
        self.leave_row();
        self.position = CursorPosition::AfterLast;
        Ok(true)
    }

    /// Check if the cursor is before the first row of a non-empty result
    pub fn is_before_first(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(!self.is_empty() && self.position == CursorPosition::BeforeFirst)
    }

    /// Check if the cursor is after the last row of a non-empty result
    pub fn is_after_last(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(!self.is_empty() && self.position == CursorPosition::AfterLast)
    }

    /// Check if the cursor is on the first row
    pub fn is_first(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.position == CursorPosition::OnRow(1))
    }

    /// Check if the cursor is on the last row.
    ///
    /// May fetch ahead to find out; the current row stays readable.
    pub async fn is_last(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let n = match self.position {
            CursorPosition::OnRow(n) => n,
            _ => return Ok(false),
        };
        if let Some(count) = self.window.row_count() {
            return Ok(n == count);
        }
        if self.window.contains(n + 1) {
            return Ok(false);
        }
        match self.options.result_set_type {
            ResultSetType::ScrollSensitive => Ok(self.resolve_count().await? == n),
            _ => {
                if !self.window.is_exhausted() {
                    self.fetch(self.window.next_request(), WindowUpdate::Append).await?;
                }
                Ok(!self.window.contains(n + 1))
            }
        }
    }

    // =========================================================================
    // Row access
    // =========================================================================

    /// The current row
    pub fn row(&self) -> Result<&Row> {
        self.ensure_open()?;
        match self.position {
            CursorPosition::OnRow(n) => self
                .window
                .get(n)
                .ok_or_else(|| Error::InvalidCursor(format!("row {} is no longer cached", n))),
            _ => Err(Error::InvalidCursor("no current row".to_string())),
        }
    }

    /// Value of a column (0-based) in the current row.
    ///
    /// Reflects pending updates, and the staged values while on the insert
    /// row.
    pub fn get(&self, column: usize) -> Result<&Value> {
        self.ensure_open()?;
        self.check_column(column)?;
        if let Some(staged) = &self.insert_row {
            return Ok(&staged[column]);
        }
        if let Some(value) = self.pending.get(&column) {
            return Ok(value);
        }
        self.row()?
            .get(column)
            .ok_or_else(|| Error::InvalidParameter(format!("column index {} out of range", column)))
    }

    /// LOB in a column of the current row; `None` for NULL
    pub fn get_lob(&self, column: usize) -> Result<Option<LobHandle>> {
        let value = self.get(column)?;
        let kind = LobKind::try_from(self.columns[column].oracle_type)?;
        match value {
            Value::Lob(lob) => LobHandle::from_lob_value(lob, kind, &self.conn),
            Value::Null => Ok(None),
            Value::Bytes(bytes) => Ok(Some(LobHandle::buffered(LobBuffer::new(kind, bytes.clone())))),
            Value::String(text) => Ok(Some(LobHandle::buffered(LobBuffer::new(
                kind,
                text.as_bytes().to_vec(),
            )))),
            other => Err(Error::DataConversionError(format!(
                "column {} holds {}, not a LOB",
                column, other
            ))),
        }
    }

    /// Re-read the current row from the server (SCROLL_SENSITIVE only).
    ///
    /// If the row no longer exists the cached values are kept. Server errors,
    /// such as a dropped table, are returned.
    pub async fn refresh_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.options.result_set_type != ResultSetType::ScrollSensitive {
            return Err(Error::UnsupportedOperation(format!(
                "refresh_row on a {} cursor",
                self.options.result_set_type.name()
            )));
        }
        if self.insert_row.is_some() {
            return Err(Error::InvalidCursor("cannot refresh the insert row".to_string()));
        }
        let n = self.current_row_number()?;
        let row_id = self.current_row_id()?;

        let outcome = {
            let mut inner = self.conn.lock().await;
            let outcome = inner.session()?.refresh_row(self.cursor_id, &row_id).await?;
            match outcome {
                RefreshOutcome::Row(mut row) => {
                    inner.stamp_locators(&mut row);
                    RefreshOutcome::Row(row)
                }
                other => other,
            }
        };

        match outcome {
            RefreshOutcome::Row(row) => {
                if let Some(slot) = self.window.get_mut(n) {
                    *slot = row;
                }
                trace!(cursor_id = self.cursor_id, row = n, "row refreshed");
            }
            RefreshOutcome::NotFound => {
                warn!(
                    cursor_id = self.cursor_id,
                    row = n,
                    row_id = %row_id,
                    "row no longer exists; keeping last fetched values"
                );
            }
        }
        self.pending.clear();
        Ok(())
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Stage a new value for a column of the current (or insert) row
    pub fn update_value(&mut self, column: usize, value: impl Into<Value>) -> Result<()> {
        self.ensure_open()?;
        self.require_updatable("update_value")?;
        self.check_column(column)?;
        let value = value.into();
        if let Some(staged) = self.insert_row.as_mut() {
            staged[column] = value;
            return Ok(());
        }
        self.current_row_number()?;
        self.pending.insert(column, value);
        Ok(())
    }

    /// Send staged column values for the current row
    pub async fn update_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.require_updatable("update_row")?;
        if self.insert_row.is_some() {
            return Err(Error::InvalidCursor("cannot update the insert row".to_string()));
        }
        let n = self.current_row_number()?;
        if self.row_deleted()? {
            return Err(Error::InvalidCursor(format!("row {} has been deleted", n)));
        }
        let row_id = self.current_row_id()?;
        if self.pending.is_empty() {
            return Ok(());
        }

        let changes: Vec<(usize, Value)> = std::mem::take(&mut self.pending).into_iter().collect();
        {
            let mut inner = self.conn.lock().await;
            inner
                .session()?
                .update_row(self.cursor_id, &row_id, &changes)
                .await?;
            inner.locked_rows.insert(row_id);
        }
        if let Some(row) = self.window.get_mut(n) {
            for (column, value) in changes {
                row.set(column, value);
            }
        }
        debug!(cursor_id = self.cursor_id, row = n, "row updated");
        Ok(())
    }

    /// Discard staged column values
    pub fn cancel_row_updates(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.require_updatable("cancel_row_updates")?;
        self.pending.clear();
        Ok(())
    }

    /// Delete the current row. Its cached values stay readable.
    pub async fn delete_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.require_updatable("delete_row")?;
        if self.insert_row.is_some() {
            return Err(Error::InvalidCursor("cannot delete the insert row".to_string()));
        }
        let n = self.current_row_number()?;
        if self.row_deleted()? {
            return Err(Error::InvalidCursor(format!("row {} has been deleted", n)));
        }
        let row_id = self.current_row_id()?;
        {
            let mut inner = self.conn.lock().await;
            inner.session()?.delete_row(self.cursor_id, &row_id).await?;
            inner.locked_rows.insert(row_id);
        }
        if let Some(row) = self.window.get_mut(n) {
            row.deleted = true;
        }
        self.pending.clear();
        debug!(cursor_id = self.cursor_id, row = n, "row deleted");
        Ok(())
    }

    /// Whether the current row was deleted through this cursor
    pub fn row_deleted(&self) -> Result<bool> {
        Ok(self.row()?.deleted)
    }

    /// Move to the insert row, staging NULL for every column
    pub fn move_to_insert_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.require_updatable("move_to_insert_row")?;
        self.pending.clear();
        self.insert_row = Some(vec![Value::Null; self.columns.len()]);
        Ok(())
    }

    /// Insert the staged row. The new row is not added to the cached rows.
    pub async fn insert_row(&mut self) -> Result<Option<RowId>> {
        self.ensure_open()?;
        self.require_updatable("insert_row")?;
        let values = self
            .insert_row
            .as_ref()
            .ok_or_else(|| Error::InvalidCursor("not on the insert row".to_string()))?
            .clone();

        let row_id = {
            let mut inner = self.conn.lock().await;
            let row_id = inner.session()?.insert_row(self.cursor_id, &values).await?;
            if let Some(id) = row_id {
                inner.locked_rows.insert(id);
            }
            row_id
        };
        self.insert_row = Some(vec![Value::Null; self.columns.len()]);
        debug!(cursor_id = self.cursor_id, row_id = ?row_id, "row inserted");
        Ok(row_id)
    }

    /// Leave the insert row and return to the current row
    pub fn move_to_current_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.require_updatable("move_to_current_row")?;
        self.insert_row = None;
        Ok(())
    }

    /// Lock the current row for the current transaction
    pub async fn lock_current_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        let row_id = self.current_row_id()?;
        self.conn.lock_row(&row_id).await
    }

    /// Close the cursor; closing again is a no-op
    pub async fn close(&mut self) -> Result<()> {
        if self.position == CursorPosition::Closed {
            return Ok(());
        }
        self.position = CursorPosition::Closed;
        self.pending.clear();
        self.insert_row = None;
        self.window.clear();

        let mut inner = self.conn.lock().await;
        inner.release_streaming(self.cursor_id);
        if let Ok(session) = inner.session() {
            session.close_cursor(self.cursor_id).await?;
        }
        debug!(cursor_id = self.cursor_id, "cursor closed");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.position == CursorPosition::Closed {
            return Err(Error::CursorClosed);
        }
        Ok(())
    }

    fn require_scrollable(&self, op: &str) -> Result<()> {
        if !self.options.result_set_type.is_scrollable() {
            return Err(Error::UnsupportedOperation(format!(
                "{} on a FORWARD_ONLY cursor",
                op
            )));
        }
        Ok(())
    }

    fn require_updatable(&self, op: &str) -> Result<()> {
        if self.options.concurrency != Concurrency::Updatable {
            return Err(Error::UnsupportedOperation(format!(
                "{} on a read-only cursor",
                op
            )));
        }
        Ok(())
    }

    fn check_column(&self, column: usize) -> Result<()> {
        if column >= self.columns.len() {
            return Err(Error::InvalidParameter(format!(
                "column index {} out of range (0..{})",
                column,
                self.columns.len()
            )));
        }
        Ok(())
    }

    fn current_row_number(&self) -> Result<u64> {
        match self.position {
            CursorPosition::OnRow(n) => Ok(n),
            _ => Err(Error::InvalidCursor("no current row".to_string())),
        }
    }

    fn current_row_id(&self) -> Result<RowId> {
        self.row()?
            .row_id()
            .copied()
            .ok_or_else(|| Error::InvalidCursor("current row has no ROWID".to_string()))
    }

    fn leave_row(&mut self) {
        self.pending.clear();
        self.insert_row = None;
    }

    /// Position on absolute row `target`, fetching as the mode requires
    async fn move_to(&mut self, target: i64, op: &str) -> Result<bool> {
        if !self.options.result_set_type.is_scrollable() {
            let current = match self.position {
                CursorPosition::OnRow(n) => n as i64,
                CursorPosition::AfterLast => i64::MAX,
                _ => 0,
            };
            if target < current {
                return Err(Error::UnsupportedOperation(format!(
                    "{} backwards on a FORWARD_ONLY cursor",
                    op
                )));
            }
        }
        self.leave_row();

        if target < 1 {
            self.position = CursorPosition::BeforeFirst;
            return Ok(false);
        }
        if self.load_row(target as u64).await? {
            self.position = CursorPosition::OnRow(target as u64);
            Ok(true)
        } else {
            self.position = CursorPosition::AfterLast;
            Ok(false)
        }
    }

    /// Make row `target` cached; false if it does not exist
    async fn load_row(&mut self, target: u64) -> Result<bool> {
        if self.window.contains(target) {
            return Ok(true);
        }
        if let Some(count) = self.window.row_count() {
            if target > count {
                return Ok(false);
            }
        }
        if self.options.result_set_type == ResultSetType::ScrollSensitive {
            let start = if target < self.window.window_start() {
                target
                    .saturating_sub(self.window.fetch_size() as u64 - 1)
                    .max(1)
            } else {
                target
            };
            self.fetch(self.window.absolute_request(start), WindowUpdate::Replace)
                .await?;
        } else if self.options.is_streaming() {
            while !self.window.contains(target) && !self.window.is_exhausted() {
                self.fetch(self.window.next_request(), WindowUpdate::Replace)
                    .await?;
            }
        }
        Ok(self.window.contains(target))
    }

    /// Total row count, fetching what it takes to learn it
    async fn resolve_count(&mut self) -> Result<u64> {
        if let Some(count) = self.window.row_count() {
            return Ok(count);
        }
        if self.options.result_set_type == ResultSetType::ScrollSensitive {
            self.fetch(self.window.last_request(), WindowUpdate::Replace).await?;
            if let CursorPosition::OnRow(n) = self.position {
                if !self.window.contains(n) {
                    self.fetch(self.window.absolute_request(n), WindowUpdate::Replace)
                        .await?;
                }
            }
        } else {
            while !self.window.is_exhausted() {
                self.fetch(self.window.next_request(), WindowUpdate::Append).await?;
            }
        }
        Ok(self
            .window
            .row_count()
            .unwrap_or_else(|| self.window.window_end() - 1))
    }

    /// One fetch round trip, merged into the window
    async fn fetch(&mut self, request: FetchRequest, update: WindowUpdate) -> Result<usize> {
        let mut inner = self.conn.lock().await;
        let mut batch = inner.session()?.fetch_rows(self.cursor_id, &request).await?;
        for row in &mut batch.rows {
            inner.stamp_locators(row);
            if self.for_update {
                if let Some(id) = row.row_id() {
                    inner.locked_rows.insert(*id);
                }
            }
        }
        if batch.exhausted && self.options.is_streaming() {
            inner.release_streaming(self.cursor_id);
        }
        drop(inner);

        let n = self.window.apply(batch, request.orientation, update);
        trace!(
            cursor_id = self.cursor_id,
            orientation = ?request.orientation,
            offset = request.offset,
            rows = n,
            window_start = self.window.window_start(),
            "fetched rows"
        );
        Ok(n)
    }
}

impl Drop for CursorEngine {
    fn drop(&mut self) {
        if self.position != CursorPosition::Closed && self.options.is_streaming() {
            self.conn.try_release_streaming(self.cursor_id);
        }
    }
}

impl std::fmt::Debug for CursorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorEngine")
            .field("cursor_id", &self.cursor_id)
            .field("mode", &self.options.result_set_type)
            .field("position", &self.position)
            .field("cached", &self.window.len())
            .finish()
    }
}

fn is_for_update(sql: &str) -> bool {
    let upper = sql.to_ascii_uppercase();
    let words: Vec<&str> = upper
        .split_whitespace()
        .map(|w| w.trim_end_matches(';'))
        .collect();
    words.windows(2).any(|w| w[0] == "FOR" && w[1] == "UPDATE")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::constants::OracleType;
    use crate::session::MemorySession;

    async fn open(rows: i64, options: CursorOptions) -> (MemorySession, CursorEngine) {
        let session = MemorySession::new();
        session.create_table("t", vec![ColumnInfo::new("N", OracleType::Number)]);
        for n in 1..=rows {
            session.insert("t", vec![Value::Integer(n)]).unwrap();
        }
        let conn = Connection::new(session.clone(), Config::default());
        let cursor = conn.open_cursor("SELECT * FROM t", options).await.unwrap();
        (session, cursor)
    }

    fn current(cursor: &CursorEngine) -> Option<i64> {
        cursor.get(0).ok().and_then(Value::as_i64)
    }

    #[test]
    fn test_is_for_update() {
        assert!(is_for_update("select * from t for update"));
        assert!(is_for_update("SELECT * FROM t FOR UPDATE;"));
        assert!(!is_for_update("SELECT * FROM updates"));
    }

    #[tokio::test]
    async fn test_forward_only_buffered_reads_everything_at_open() {
        let (session, mut cursor) = open(5, CursorOptions::new()).await;
        let fetches = session.stats().fetches;
        let mut seen = Vec::new();
        while cursor.next().await.unwrap() {
            seen.push(current(&cursor).unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(session.stats().fetches, fetches);
        assert!(cursor.is_after_last().unwrap());
    }

    #[tokio::test]
    async fn test_forward_only_rejects_backward_moves() {
        let (_session, mut cursor) = open(5, CursorOptions::new()).await;
        assert!(cursor.next().await.unwrap());
        assert!(cursor.next().await.unwrap());
        assert!(matches!(cursor.previous().await, Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.first().await, Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.before_first().await, Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.absolute(1).await, Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.relative(-1).await, Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.absolute(0).await, Err(Error::InvalidParameter(_))));
        // forward jumps are fine
        assert!(cursor.absolute(4).await.unwrap());
        assert_eq!(current(&cursor), Some(4));
    }

    #[tokio::test]
    async fn test_is_last_peeks_without_losing_current_row() {
        let (_session, mut cursor) = open(4, CursorOptions::streaming(2)).await;
        assert!(cursor.next().await.unwrap());
        assert!(cursor.next().await.unwrap());
        assert!(!cursor.is_last().await.unwrap());
        assert_eq!(current(&cursor), Some(2));
        assert!(cursor.next().await.unwrap());
        assert!(cursor.next().await.unwrap());
        assert!(cursor.is_last().await.unwrap());
        assert_eq!(current(&cursor), Some(4));
    }

    #[tokio::test]
    async fn test_sensitive_backward_jump_fetches_window_ending_at_target() {
        let (session, mut cursor) = open(50, CursorOptions::scroll_sensitive().with_fetch_size(10)).await;
        assert!(cursor.absolute(45).await.unwrap());
        assert_eq!(cursor.window().window_start(), 45);
        let before = session.stats().fetches;

        assert!(cursor.absolute(30).await.unwrap());
        assert_eq!(cursor.window().window_start(), 21);
        assert_eq!(session.stats().fetches, before + 1);
        // rows 21..=30 are cached now
        assert!(cursor.previous().await.unwrap());
        assert_eq!(current(&cursor), Some(29));
        assert_eq!(session.stats().fetches, before + 1);
    }

    #[tokio::test]
    async fn test_updates_require_updatable_cursor() {
        let (_session, mut cursor) = open(2, CursorOptions::scroll_insensitive()).await;
        assert!(cursor.next().await.unwrap());
        assert!(matches!(
            cursor.update_value(0, 9),
            Err(Error::UnsupportedOperation(_))
        ));
        assert!(matches!(cursor.delete_row().await, Err(Error::UnsupportedOperation(_))));
    }

    #[tokio::test]
    async fn test_update_and_cancel() {
        let (session, mut cursor) = open(2, CursorOptions::scroll_insensitive().updatable()).await;
        assert!(cursor.next().await.unwrap());
        cursor.update_value(0, 10).unwrap();
        assert_eq!(current(&cursor), Some(10));
        cursor.cancel_row_updates().unwrap();
        assert_eq!(current(&cursor), Some(1));

        cursor.update_value(0, 11).unwrap();
        cursor.update_row().await.unwrap();
        assert_eq!(current(&cursor), Some(11));
        let id = session.row_ids("t")[0];
        assert_eq!(session.value("t", &id, 0).and_then(|v| v.as_i64()), Some(11));
    }

    #[tokio::test]
    async fn test_insert_row_is_not_cached() {
        let (session, mut cursor) = open(2, CursorOptions::scroll_insensitive().updatable()).await;
        cursor.move_to_insert_row().unwrap();
        cursor.update_value(0, 3).unwrap();
        assert_eq!(current(&cursor), Some(3));
        let id = cursor.insert_row().await.unwrap();
        assert!(id.is_some());
        cursor.move_to_current_row().unwrap();

        assert_eq!(session.row_ids("t").len(), 3);
        assert!(cursor.last().await.unwrap());
        assert_eq!(cursor.row_number(), 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (session, mut cursor) = open(2, CursorOptions::new()).await;
        cursor.close().await.unwrap();
        cursor.close().await.unwrap();
        assert!(cursor.is_closed());
        assert!(matches!(cursor.next().await, Err(Error::CursorClosed)));
        assert!(matches!(cursor.get(0), Err(Error::CursorClosed)));
        assert_eq!(session.open_cursors(), 0);
    }
}
