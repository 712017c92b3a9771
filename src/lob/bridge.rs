//! Piece protocol for server-resident LOBs
//!
//! Content behind a locator is read and written in pieces of at most the
//! locator's chunk size. Each request names a 1-based byte offset and an
//! amount; the server answers with the bytes and whether more remain.
//!
//! Every piece write or trim bumps the locator's write epoch on the
//! connection. A locator's size and prefetched bytes are only used while
//! its stamped epoch is still the current one.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use super::check_extent;
use crate::connection::Connection;
use crate::error::Result;
use crate::types::LobLocator;

/// Offset and amount of one piece request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceCursor {
    /// 1-based byte offset
    pub offset: u64,
    /// Maximum bytes to return
    pub amount: u32,
}

impl PieceCursor {
    /// Cursor at `offset` requesting `amount` bytes
    pub fn new(offset: u64, amount: u32) -> Self {
        Self { offset, amount }
    }

    /// Cursor following `n` consumed bytes
    pub fn advance(self, n: usize) -> Self {
        Self {
            offset: self.offset + n as u64,
            amount: self.amount,
        }
    }
}

/// One piece of LOB content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobPiece {
    /// Piece bytes
    pub data: Bytes,
    /// More content follows this piece
    pub has_more: bool,
}

impl LobPiece {
    /// Piece with no bytes and nothing after it
    pub fn end() -> Self {
        Self {
            data: Bytes::new(),
            has_more: false,
        }
    }
}

/// Reads and writes locator-backed content over a connection
#[derive(Clone)]
pub struct LobStreamBridge {
    conn: Connection,
}

impl LobStreamBridge {
    /// Bridge over `conn`
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Connection the pieces travel over
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Piece size for `locator`; the configured size when the server
    /// advertised none
    fn chunk_size(&self, locator: &LobLocator) -> u32 {
        match locator.chunk_size() {
            0 => self.conn.config().lob_chunk_size.max(1),
            n => n,
        }
    }

    /// Whether no write has touched the content since `locator` was stamped
    pub(crate) async fn is_current(&self, locator: &LobLocator) -> bool {
        self.conn.lock().await.lob_epoch(locator) == locator.write_epoch
    }

    /// Current write epoch of the content behind `locator`
    pub(crate) async fn epoch(&self, locator: &LobLocator) -> u64 {
        self.conn.lock().await.lob_epoch(locator)
    }

    /// Length in bytes (BLOB) or UTF-16 units (CLOB), asking the server
    /// when the locator's size may be stale
    pub async fn length(&self, locator: &LobLocator) -> Result<u64> {
        let mut inner = self.conn.lock().await;
        if inner.lob_epoch(locator) == locator.write_epoch {
            return Ok(locator.size());
        }
        inner.session()?.lob_length(locator).await
    }

    /// Fetch one piece
    pub async fn fetch_piece(&self, locator: &LobLocator, cursor: PieceCursor) -> Result<LobPiece> {
        let mut inner = self.conn.lock().await;
        let piece = inner.session()?.fetch_lob_piece(locator, cursor).await?;
        trace!(
            locator = %locator.id_hex(),
            offset = cursor.offset,
            len = piece.data.len(),
            has_more = piece.has_more,
            "fetched LOB piece"
        );
        Ok(piece)
    }

    /// Write one piece at a 1-based byte offset
    pub async fn write_piece(&self, locator: &LobLocator, offset: u64, data: &[u8], is_final: bool) -> Result<()> {
        let mut inner = self.conn.lock().await;
        inner
            .session()?
            .write_lob_piece(locator, offset, data, is_final)
            .await?;
        inner.record_lob_write(locator);
        trace!(
            locator = %locator.id_hex(),
            offset,
            len = data.len(),
            is_final,
            "wrote LOB piece"
        );
        Ok(())
    }

    /// Cut content to `new_len` bytes
    pub async fn trim(&self, locator: &LobLocator, new_len: u64) -> Result<()> {
        let mut inner = self.conn.lock().await;
        inner.session()?.trim_lob(locator, new_len).await?;
        inner.record_lob_write(locator);
        Ok(())
    }

    /// Read up to `len` bytes (or everything) starting at byte `offset`
    pub async fn read_range(&self, locator: &LobLocator, offset: u64, len: Option<u64>) -> Result<Vec<u8>> {
        let mut reader = self.reader(locator.clone(), offset, len);
        let mut out = Vec::new();
        while let Some(chunk) = reader.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Read the whole content
    pub async fn read_all(&self, locator: &LobLocator) -> Result<Vec<u8>> {
        self.read_range(locator, 1, None).await
    }

    /// Current content: the prefetched bytes while no write has touched
    /// the content since, otherwise a full read
    pub(crate) async fn materialize(&self, locator: &LobLocator) -> Result<Vec<u8>> {
        match locator.prefetched() {
            Some(data) if self.is_current(locator).await => Ok(data.to_vec()),
            _ => self.read_all(locator).await,
        }
    }

    /// Write `data` at `offset`, split into pieces
    pub async fn write_all(&self, locator: &LobLocator, offset: u64, data: &[u8]) -> Result<()> {
        let mut writer = self.writer(locator.clone(), offset);
        writer.write(data).await?;
        writer.finish().await?;
        Ok(())
    }

    /// Push the difference between `before` and `after`: bytes past the
    /// common prefix are rewritten and a shorter result is trimmed
    pub(crate) async fn push_changes(&self, locator: &LobLocator, before: &[u8], after: &[u8]) -> Result<()> {
        let prefix = before
            .iter()
            .zip(after)
            .take_while(|(a, b)| a == b)
            .count();
        if prefix < after.len() {
            self.write_all(locator, prefix as u64 + 1, &after[prefix..]).await?;
        }
        if after.len() < before.len() {
            self.trim(locator, after.len() as u64).await?;
        }
        Ok(())
    }

    /// Piece-by-piece reader
    pub fn reader(&self, locator: LobLocator, offset: u64, len: Option<u64>) -> PieceReader {
        let chunk_size = self.chunk_size(&locator);
        PieceReader {
            bridge: self.clone(),
            locator,
            cursor: PieceCursor::new(offset.max(1), chunk_size),
            remaining: len,
            done: false,
        }
    }

    /// Piece-by-piece writer
    pub fn writer(&self, locator: LobLocator, offset: u64) -> PieceWriter {
        PieceWriter {
            bridge: self.clone(),
            locator,
            offset: offset.max(1),
            pending: BytesMut::new(),
            written: 0,
            sent_any: false,
        }
    }
}

/// Reads locator content one piece at a time
pub struct PieceReader {
    bridge: LobStreamBridge,
    locator: LobLocator,
    cursor: PieceCursor,
    remaining: Option<u64>,
    done: bool,
}

impl PieceReader {
    /// Next piece, or `None` once the content (or the requested range) ends
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }
        let mut cursor = self.cursor;
        if let Some(remaining) = self.remaining {
            if remaining == 0 {
                self.done = true;
                return Ok(None);
            }
            cursor.amount = cursor.amount.min(remaining.min(u32::MAX as u64) as u32);
        }

        let piece = self.bridge.fetch_piece(&self.locator, cursor).await?;
        let n = piece.data.len();
        self.cursor = self.cursor.advance(n);
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(n as u64);
        }
        if !piece.has_more || n == 0 {
            self.done = true;
        }
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(piece.data))
    }

    /// Offset of the next byte to be read
    pub fn offset(&self) -> u64 {
        self.cursor.offset
    }
}

/// Writes locator content one piece at a time.
///
/// Bytes are buffered until a full piece is available; [`finish`](Self::finish)
/// sends the remainder flagged as the final piece.
pub struct PieceWriter {
    bridge: LobStreamBridge,
    locator: LobLocator,
    offset: u64,
    pending: BytesMut,
    written: u64,
    sent_any: bool,
}

impl PieceWriter {
    /// Queue `data`, sending every full piece
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let queued = self.offset - 1 + self.written + self.pending.len() as u64;
        check_extent(queued.min(usize::MAX as u64) as usize, data.len())?;
        self.pending.extend_from_slice(data);
        let chunk = self.bridge.chunk_size(&self.locator) as usize;
        while self.pending.len() > chunk {
            let piece = self.pending.split_to(chunk).freeze();
            self.send(piece, false).await?;
        }
        Ok(())
    }

    /// Send what is left as the final piece; returns the total bytes written
    pub async fn finish(mut self) -> Result<u64> {
        let rest = self.pending.split().freeze();
        if !rest.is_empty() || self.sent_any {
            self.send(rest, true).await?;
        }
        Ok(self.written)
    }

    /// Offset of the first byte this writer writes
    pub fn start_offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn bridge(&self) -> &LobStreamBridge {
        &self.bridge
    }

    async fn send(&mut self, piece: Bytes, is_final: bool) -> Result<()> {
        let at = self.offset + self.written;
        self.bridge.write_piece(&self.locator, at, &piece, is_final).await?;
        self.written += piece.len() as u64;
        self.sent_any = true;
        Ok(())
    }
}
