//! In-process session over plain tables
//!
//! `MemorySession` understands just enough SQL to drive the engines:
//! `SELECT ... FROM <table> [FOR UPDATE]` for cursors, plus `DROP TABLE`
//! and `DELETE FROM` through `execute`. Any other statement is recorded
//! and reports zero affected rows.
//!
//! The helper methods (`create_table`, `insert`, `remove_row`, ...) act like
//! a second session committing its own work: their changes are visible to
//! refreshes and survive a rollback of this session's transaction.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{
    CursorDescription, CursorId, CursorRequest, FetchBatch, FetchRequest, RefreshOutcome, Session,
};
use crate::constants::{error_code, FetchOrientation, OracleType, BLOB_PAD, DEFAULT_LOB_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::lob::{LobPiece, PieceCursor};
use crate::row::{ColumnInfo, Row, Value};
use crate::types::{LobLocator, LobValue, RowId};

/// Round-trip counters, for asserting on fetch and piece traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Cursors opened
    pub cursors_opened: u64,
    /// Row fetch round trips
    pub fetches: u64,
    /// LOB pieces read
    pub lob_reads: u64,
    /// LOB pieces written
    pub lob_writes: u64,
    /// Row refreshes
    pub refreshes: u64,
    /// Commits
    pub commits: u64,
    /// Rollbacks
    pub rollbacks: u64,
}

/// Session backed by in-memory tables.
///
/// Clones share the same state, so a test can keep one clone to inspect
/// and modify the data while a [`Connection`](crate::Connection) owns
/// another.
#[derive(Debug, Clone)]
pub struct MemorySession {
    db: Arc<Mutex<Database>>,
}

#[derive(Debug)]
struct Database {
    tables: Tables,
    /// State to restore on rollback, taken at the first write
    undo: Option<Tables>,
    cursors: HashMap<CursorId, OpenCursor>,
    next_cursor: CursorId,
    locks: HashSet<RowId>,
    stats: SessionStats,
    executed: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    by_name: BTreeMap<String, Table>,
    next_number: u32,
}

#[derive(Debug, Clone)]
struct Table {
    number: u32,
    columns: Vec<ColumnInfo>,
    rows: Vec<StoredRow>,
    next_slot: u16,
}

/// LOB cells hold raw bytes (UTF-8 for CLOBs)
#[derive(Debug, Clone)]
struct StoredRow {
    id: RowId,
    values: Vec<Value>,
}

#[derive(Debug)]
struct OpenCursor {
    table: String,
    columns: Vec<ColumnInfo>,
    /// Rows as of open
    rows: Vec<StoredRow>,
    next: usize,
    lob_prefetch_size: u32,
    lob_chunk_size: u32,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    /// Create an empty session
    pub fn new() -> Self {
        Self {
            db: Arc::new(Mutex::new(Database {
                tables: Tables::default(),
                undo: None,
                cursors: HashMap::new(),
                next_cursor: 0,
                locks: HashSet::new(),
                stats: SessionStats::default(),
                executed: Vec::new(),
            })),
        }
    }

    /// Create (or replace) a table
    pub fn create_table(&self, name: &str, columns: Vec<ColumnInfo>) {
        let key = table_key(name);
        self.db.lock().for_each_version(|tables| {
            tables.next_number += 1;
            let table = Table {
                number: tables.next_number,
                columns: columns.clone(),
                rows: Vec::new(),
                next_slot: 0,
            };
            tables.by_name.insert(key.clone(), table);
        });
    }

    /// Insert a committed row, returning its identity
    pub fn insert(&self, table: &str, values: Vec<Value>) -> Result<RowId> {
        let key = table_key(table);
        let mut guard = self.db.lock();
        let db = &mut *guard;
        let table = db.tables.by_name.get_mut(&key).ok_or_else(table_not_found)?;
        let id = table.push(values);
        let row = table.rows.last().cloned();
        if let (Some(undo), Some(row)) = (db.undo.as_mut(), row) {
            if let Some(table) = undo.by_name.get_mut(&key) {
                table.next_slot = table.next_slot.max(id.slot_num);
                table.rows.push(row);
            }
        }
        Ok(id)
    }

    /// Delete a row as a committed change; false if it did not exist
    pub fn remove_row(&self, table: &str, row_id: &RowId) -> bool {
        let key = table_key(table);
        let mut removed = false;
        self.db.lock().for_each_version(|tables| {
            if let Some(table) = tables.by_name.get_mut(&key) {
                let before = table.rows.len();
                table.rows.retain(|r| r.id != *row_id);
                removed |= table.rows.len() != before;
            }
        });
        removed
    }

    /// Change one cell as a committed change
    pub fn set_value(&self, table: &str, row_id: &RowId, column: usize, value: Value) -> bool {
        let key = table_key(table);
        let mut changed = false;
        self.db.lock().for_each_version(|tables| {
            if let Some(table) = tables.by_name.get_mut(&key) {
                let stored = table.columns.get(column).map(|c| store_value(c, value.clone()));
                if let (Some(stored), Some(row)) = (stored, table.find_mut(row_id)) {
                    row.values[column] = stored;
                    changed = true;
                }
            }
        });
        changed
    }

    /// Drop a table as a committed change
    pub fn drop_table(&self, table: &str) -> bool {
        let key = table_key(table);
        let mut dropped = false;
        self.db.lock().for_each_version(|tables| {
            dropped |= tables.by_name.remove(&key).is_some();
        });
        dropped
    }

    /// Current value of a cell; LOB cells come back as text or bytes
    pub fn value(&self, table: &str, row_id: &RowId, column: usize) -> Option<Value> {
        let db = self.db.lock();
        let table = db.tables.by_name.get(&table_key(table))?;
        let row = table.find(row_id)?;
        let value = row.values.get(column)?;
        match (table.columns.get(column).map(|c| c.oracle_type), value) {
            (Some(OracleType::Clob), Value::Bytes(b)) => {
                Some(Value::String(String::from_utf8_lossy(b).into_owned()))
            }
            _ => Some(value.clone()),
        }
    }

    /// Identities of the rows in a table, in storage order
    pub fn row_ids(&self, table: &str) -> Vec<RowId> {
        let db = self.db.lock();
        db.tables
            .by_name
            .get(&table_key(table))
            .map(|t| t.rows.iter().map(|r| r.id).collect())
            .unwrap_or_default()
    }

    /// Whether this session holds a lock on the row
    pub fn is_locked(&self, row_id: &RowId) -> bool {
        self.db.lock().locks.contains(row_id)
    }

    /// Number of cursors currently open
    pub fn open_cursors(&self) -> usize {
        self.db.lock().cursors.len()
    }

    /// Round-trip counters
    pub fn stats(&self) -> SessionStats {
        self.db.lock().stats
    }

    /// Statements passed to `execute`, in order
    pub fn executed(&self) -> Vec<String> {
        self.db.lock().executed.clone()
    }
}

impl Database {
    /// Apply a committed change to the live tables and the rollback image
    fn for_each_version(&mut self, mut f: impl FnMut(&mut Tables)) {
        f(&mut self.tables);
        if let Some(undo) = self.undo.as_mut() {
            f(undo);
        }
    }

    fn begin_write(&mut self) {
        if self.undo.is_none() {
            self.undo = Some(self.tables.clone());
        }
    }

    fn cursor(&self, cursor_id: CursorId) -> Result<&OpenCursor> {
        self.cursors.get(&cursor_id).ok_or_else(|| fetch_out_of_sequence(cursor_id))
    }

    fn cursor_table_mut(&mut self, cursor_id: CursorId) -> Result<&mut Table> {
        let name = self.cursor(cursor_id)?.table.clone();
        self.tables.by_name.get_mut(&name).ok_or_else(table_not_found)
    }

    fn lob_cell(&self, locator: &LobLocator) -> Result<(&ColumnInfo, &Value)> {
        let (table, row_id, column) = parse_locator(locator)?;
        let table = self.tables.by_name.get(&table).ok_or_else(table_not_found)?;
        let row = table.find(&row_id).ok_or_else(invalid_locator)?;
        match (table.columns.get(column), row.values.get(column)) {
            (Some(col), Some(value)) => Ok((col, value)),
            _ => Err(invalid_locator()),
        }
    }

    /// Bytes of a LOB cell, for writing; the caller must hold the row lock
    fn lob_bytes_mut(&mut self, locator: &LobLocator) -> Result<(OracleType, &mut Vec<u8>)> {
        let (table, row_id, column) = parse_locator(locator)?;
        if !self.locks.contains(&row_id) {
            return Err(Error::oracle(
                error_code::LOB_ROW_NOT_LOCKED,
                "row containing the LOB value is not locked",
            ));
        }
        self.begin_write();
        let table = self.tables.by_name.get_mut(&table).ok_or_else(table_not_found)?;
        let oracle_type = table
            .columns
            .get(column)
            .map(|c| c.oracle_type)
            .ok_or_else(invalid_locator)?;
        let cell = table
            .find_mut(&row_id)
            .and_then(|r| r.values.get_mut(column))
            .ok_or_else(invalid_locator)?;
        if !matches!(cell, Value::Bytes(_)) {
            *cell = Value::Bytes(Vec::new());
        }
        match cell {
            Value::Bytes(bytes) => Ok((oracle_type, bytes)),
            _ => Err(Error::Internal("LOB cell is not binary".to_string())),
        }
    }
}

impl Table {
    fn push(&mut self, values: Vec<Value>) -> RowId {
        self.next_slot += 1;
        let id = RowId::new(self.number, 0, 1, self.next_slot);
        let values = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| store_value(col, values.get(i).cloned().unwrap_or(Value::Null)))
            .collect();
        self.rows.push(StoredRow { id, values });
        id
    }

    fn find(&self, row_id: &RowId) -> Option<&StoredRow> {
        self.rows.iter().find(|r| r.id == *row_id)
    }

    fn find_mut(&mut self, row_id: &RowId) -> Option<&mut StoredRow> {
        self.rows.iter_mut().find(|r| r.id == *row_id)
    }
}

impl OpenCursor {
    fn to_row(&self, stored: &StoredRow) -> Row {
        let chunk_size = match self.lob_chunk_size {
            0 => DEFAULT_LOB_CHUNK_SIZE,
            n => n,
        };
        to_row(&self.table, &self.columns, stored, self.lob_prefetch_size, chunk_size)
    }
}

#[async_trait::async_trait]
impl Session for MemorySession {
    async fn open_cursor(&mut self, request: &CursorRequest) -> Result<CursorDescription> {
        let (table, for_update) = parse_select(&request.sql)?;
        let mut db = self.db.lock();
        let (columns, rows) = {
            let t = db.tables.by_name.get(&table).ok_or_else(table_not_found)?;
            (t.columns.clone(), t.rows.clone())
        };
        if for_update {
            db.locks.extend(rows.iter().map(|r| r.id));
        }

        db.next_cursor += 1;
        let cursor_id = db.next_cursor;
        db.stats.cursors_opened += 1;
        debug!(cursor_id, table = %table, rows = rows.len(), for_update, "memory cursor opened");

        db.cursors.insert(
            cursor_id,
            OpenCursor {
                table,
                columns: columns.clone(),
                rows,
                next: 0,
                lob_prefetch_size: request.lob_prefetch_size,
                lob_chunk_size: request.lob_chunk_size,
            },
        );
        Ok(CursorDescription { cursor_id, columns })
    }

    async fn fetch_rows(&mut self, cursor_id: CursorId, request: &FetchRequest) -> Result<FetchBatch> {
        let mut db = self.db.lock();
        db.stats.fetches += 1;
        let cursor = db
            .cursors
            .get_mut(&cursor_id)
            .ok_or_else(|| fetch_out_of_sequence(cursor_id))?;

        let total = cursor.rows.len();
        let n = request.num_rows.max(1) as usize;
        let (start, end, row_count) = match request.orientation {
            FetchOrientation::Next => {
                let start = cursor.next.min(total);
                let end = (start + n).min(total);
                cursor.next = end;
                (start, end, None)
            }
            FetchOrientation::Absolute => {
                let start = ((request.offset.max(1) - 1) as usize).min(total);
                (start, (start + n).min(total), Some(total as u64))
            }
            FetchOrientation::Last => (total.saturating_sub(n), total, Some(total as u64)),
        };

        let cursor = &*cursor;
        let rows = cursor.rows[start..end].iter().map(|r| cursor.to_row(r)).collect();
        trace!(cursor_id, start = start + 1, end, total, "memory fetch");
        Ok(FetchBatch {
            start_row: start as u64 + 1,
            rows,
            exhausted: end >= total,
            row_count,
        })
    }

    async fn close_cursor(&mut self, cursor_id: CursorId) -> Result<()> {
        self.db.lock().cursors.remove(&cursor_id);
        Ok(())
    }

    async fn refresh_row(&mut self, cursor_id: CursorId, row_id: &RowId) -> Result<RefreshOutcome> {
        let mut db = self.db.lock();
        db.stats.refreshes += 1;
        let cursor = db.cursor(cursor_id)?;
        let table = db.tables.by_name.get(&cursor.table).ok_or_else(table_not_found)?;
        Ok(match table.find(row_id) {
            Some(stored) => RefreshOutcome::Row(cursor.to_row(stored)),
            None => RefreshOutcome::NotFound,
        })
    }

    async fn update_row(
        &mut self,
        cursor_id: CursorId,
        row_id: &RowId,
        changes: &[(usize, Value)],
    ) -> Result<()> {
        let mut db = self.db.lock();
        db.cursor(cursor_id)?;
        db.begin_write();
        let table = db.cursor_table_mut(cursor_id)?;
        let columns = table.columns.clone();
        let row = table.find_mut(row_id).ok_or_else(no_data_found)?;
        for (index, value) in changes {
            let column = columns.get(*index).ok_or_else(|| {
                Error::InvalidParameter(format!("column index {} out of range", index))
            })?;
            row.values[*index] = store_value(column, value.clone());
        }
        db.locks.insert(*row_id);
        Ok(())
    }

    async fn delete_row(&mut self, cursor_id: CursorId, row_id: &RowId) -> Result<()> {
        let mut db = self.db.lock();
        db.cursor(cursor_id)?;
        db.begin_write();
        let table = db.cursor_table_mut(cursor_id)?;
        let before = table.rows.len();
        table.rows.retain(|r| r.id != *row_id);
        if table.rows.len() == before {
            return Err(no_data_found());
        }
        Ok(())
    }

    async fn insert_row(&mut self, cursor_id: CursorId, values: &[Value]) -> Result<Option<RowId>> {
        let mut db = self.db.lock();
        db.cursor(cursor_id)?;
        db.begin_write();
        let table = db.cursor_table_mut(cursor_id)?;
        let id = table.push(values.to_vec());
        db.locks.insert(id);
        Ok(Some(id))
    }

    async fn lock_row(&mut self, row_id: &RowId) -> Result<()> {
        self.db.lock().locks.insert(*row_id);
        Ok(())
    }

    async fn lob_length(&mut self, locator: &LobLocator) -> Result<u64> {
        let db = self.db.lock();
        let (column, value) = db.lob_cell(locator)?;
        Ok(match value {
            Value::Bytes(bytes) => lob_size(column.oracle_type, bytes),
            _ => 0,
        })
    }

    async fn fetch_lob_piece(&mut self, locator: &LobLocator, cursor: PieceCursor) -> Result<LobPiece> {
        let mut db = self.db.lock();
        db.stats.lob_reads += 1;
        let (_, value) = db.lob_cell(locator)?;
        let bytes = match value {
            Value::Bytes(b) => b.as_slice(),
            _ => return Ok(LobPiece::end()),
        };
        let start = (cursor.offset.max(1) - 1).min(bytes.len() as u64) as usize;
        let end = (start + cursor.amount as usize).min(bytes.len());
        Ok(LobPiece {
            data: Bytes::copy_from_slice(&bytes[start..end]),
            has_more: end < bytes.len(),
        })
    }

    async fn write_lob_piece(
        &mut self,
        locator: &LobLocator,
        offset: u64,
        data: &[u8],
        is_final: bool,
    ) -> Result<()> {
        let mut db = self.db.lock();
        db.stats.lob_writes += 1;
        let (oracle_type, bytes) = db.lob_bytes_mut(locator)?;
        let start = (offset.max(1) - 1) as usize;
        let pad = if oracle_type == OracleType::Clob { b' ' } else { BLOB_PAD };
        if start > bytes.len() {
            bytes.resize(start, pad);
        }
        let end = start + data.len();
        if end > bytes.len() {
            bytes.resize(end, pad);
        }
        bytes[start..end].copy_from_slice(data);
        trace!(offset, len = data.len(), is_final, "memory LOB write");
        Ok(())
    }

    async fn trim_lob(&mut self, locator: &LobLocator, new_len: u64) -> Result<()> {
        let mut db = self.db.lock();
        let (_, bytes) = db.lob_bytes_mut(locator)?;
        bytes.truncate(new_len as usize);
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let mut db = self.db.lock();
        db.executed.push(sql.to_string());
        let words = words(sql);
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        match words.as_slice() {
            ["DROP", "TABLE", name, ..] => {
                let key = table_key(name);
                // DDL commits implicitly
                db.undo = None;
                db.locks.clear();
                db.tables.by_name.remove(&key).ok_or_else(table_not_found)?;
                Ok(0)
            }
            ["DELETE", "FROM", name, ..] => {
                let key = table_key(name);
                db.begin_write();
                let table = db.tables.by_name.get_mut(&key).ok_or_else(table_not_found)?;
                let n = table.rows.len() as u64;
                table.rows.clear();
                Ok(n)
            }
            _ => Ok(0),
        }
    }

    async fn commit(&mut self) -> Result<()> {
        let mut db = self.db.lock();
        db.undo = None;
        db.locks.clear();
        db.stats.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let mut db = self.db.lock();
        if let Some(undo) = db.undo.take() {
            db.tables = undo;
        }
        db.locks.clear();
        db.stats.rollbacks += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.db.lock().cursors.clear();
        Ok(())
    }
}

fn table_key(name: &str) -> String {
    name.trim_end_matches(';').to_ascii_uppercase()
}

fn words(sql: &str) -> Vec<String> {
    sql.split_whitespace()
        .map(|w| w.trim_end_matches([';', ',']).to_ascii_uppercase())
        .collect()
}

/// Table name and FOR UPDATE flag of a SELECT
fn parse_select(sql: &str) -> Result<(String, bool)> {
    let words = words(sql);
    let unsupported = || {
        Error::UnsupportedOperation(format!("memory session cannot open a cursor for: {}", sql))
    };
    if words.first().map(String::as_str) != Some("SELECT") {
        return Err(unsupported());
    }
    let from = words.iter().position(|w| w == "FROM").ok_or_else(unsupported)?;
    let table = words.get(from + 1).ok_or_else(unsupported)?.clone();
    let for_update = words.windows(2).any(|w| w[0] == "FOR" && w[1] == "UPDATE");
    Ok((table, for_update))
}

/// Normalize a value for storage in `column`
fn store_value(column: &ColumnInfo, value: Value) -> Value {
    if !column.is_lob() {
        return value;
    }
    match value {
        Value::String(s) => Value::Bytes(s.into_bytes()),
        Value::Lob(LobValue::Inline(b)) => Value::Bytes(b.to_vec()),
        Value::Lob(LobValue::Empty) => Value::Bytes(Vec::new()),
        Value::Lob(_) | Value::Null => Value::Null,
        other => other,
    }
}

fn lob_size(oracle_type: OracleType, bytes: &[u8]) -> u64 {
    match oracle_type {
        OracleType::Clob => String::from_utf8_lossy(bytes).encode_utf16().count() as u64,
        _ => bytes.len() as u64,
    }
}

fn to_row(table: &str, columns: &[ColumnInfo], stored: &StoredRow, prefetch: u32, chunk_size: u32) -> Row {
    let values = stored
        .values
        .iter()
        .enumerate()
        .map(|(i, value)| match (columns.get(i), value) {
            (Some(col), Value::Bytes(bytes)) if col.is_lob() => {
                let size = lob_size(col.oracle_type, bytes);
                let id = format!("{}|{}|{}", table, stored.id, i);
                let mut locator = LobLocator::new(
                    Bytes::from(id.into_bytes()),
                    size,
                    chunk_size,
                    col.oracle_type,
                )
                .with_row_id(stored.id);
                if bytes.len() <= prefetch as usize {
                    locator = locator.with_prefetched(Bytes::copy_from_slice(bytes));
                }
                Value::Lob(LobValue::Locator(locator))
            }
            (Some(col), _) if col.is_lob() => Value::Lob(LobValue::Null),
            _ => value.clone(),
        })
        .collect();
    Row::with_row_id(values, stored.id)
}

fn parse_locator(locator: &LobLocator) -> Result<(String, RowId, usize)> {
    let id = std::str::from_utf8(locator.locator_bytes()).map_err(|_| invalid_locator())?;
    let mut parts = id.splitn(3, '|');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(table), Some(row_id), Some(column)) => Ok((
            table.to_string(),
            row_id.parse().map_err(|_| invalid_locator())?,
            column.parse().map_err(|_| invalid_locator())?,
        )),
        _ => Err(invalid_locator()),
    }
}

fn table_not_found() -> Error {
    Error::oracle(error_code::TABLE_NOT_FOUND, "table or view does not exist")
}

fn no_data_found() -> Error {
    Error::oracle(error_code::NO_DATA_FOUND, "no data found")
}

fn invalid_locator() -> Error {
    Error::oracle(error_code::INVALID_LOB_LOCATOR, "invalid LOB locator specified")
}

fn fetch_out_of_sequence(cursor_id: CursorId) -> Error {
    Error::oracle(
        error_code::FETCH_OUT_OF_SEQUENCE,
        format!("fetch out of sequence (cursor {})", cursor_id),
    )
}
