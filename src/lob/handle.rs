//! Caller-facing LOB objects
//!
//! A [`LobHandle`] presents one interface over two representations: content
//! buffered client-side in a [`LobBuffer`], or content that stays on the
//! server behind a locator. Locator-backed content is only read in full when
//! an operation needs it. Prefetched bytes stand in for a read until any
//! handle writes to the same content; mutations always diff against a fresh
//! read and push just the changed suffix back in pieces.

use std::io::Write as _;

use bytes::Bytes;
use tracing::debug;

use super::bridge::{LobStreamBridge, PieceReader, PieceWriter};
use super::stream::{ClobWriter, LobReader, LobWriter};
use super::{check_extent, check_length, check_position, LobBuffer, LobKind};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::row::Value;
use crate::types::{LobData, LobLocator, LobValue};

/// Where the content of a [`LobHandle`] lives
#[derive(Debug, Clone)]
pub enum LobContent {
    /// Client-side content
    Buffered(LobBuffer),
    /// Server-side content behind a locator
    Streamed(LobLocator),
}

/// A BLOB or CLOB value.
///
/// Obtained from a cursor column ([`CursorEngine::get_lob`](crate::CursorEngine::get_lob))
/// or created empty on a connection.
pub struct LobHandle {
    kind: LobKind,
    content: LobContent,
    bridge: Option<LobStreamBridge>,
    closed: bool,
}

impl LobHandle {
    /// Empty client-side BLOB
    pub fn new_blob() -> Self {
        Self::buffered(LobBuffer::empty_blob())
    }

    /// Empty client-side CLOB
    pub fn new_clob() -> Self {
        Self::buffered(LobBuffer::empty_clob())
    }

    /// Wrap a client-side buffer
    pub fn buffered(buffer: LobBuffer) -> Self {
        Self {
            kind: buffer.kind(),
            content: LobContent::Buffered(buffer),
            bridge: None,
            closed: false,
        }
    }

    /// Wrap a locator whose content is read and written over `conn`
    pub fn streamed(locator: LobLocator, conn: Connection) -> Result<Self> {
        let kind = LobKind::try_from(locator.oracle_type())?;
        Ok(Self {
            kind,
            content: LobContent::Streamed(locator),
            bridge: Some(LobStreamBridge::new(conn)),
            closed: false,
        })
    }

    /// Build a handle for a fetched column value; `None` for NULL
    pub(crate) fn from_lob_value(value: &LobValue, kind: LobKind, conn: &Connection) -> Result<Option<Self>> {
        Ok(match value {
            LobValue::Null => None,
            LobValue::Empty => Some(Self::buffered(LobBuffer::new(kind, Vec::new()))),
            LobValue::Inline(data) => Some(Self::buffered(LobBuffer::new(kind, data.to_vec()))),
            LobValue::Locator(locator) => Some(Self::streamed(locator.clone(), conn.clone())?),
        })
    }

    /// BLOB or CLOB
    pub fn kind(&self) -> LobKind {
        self.kind
    }

    /// Whether the content lives behind a locator
    pub fn is_streamed(&self) -> bool {
        matches!(self.content, LobContent::Streamed(_))
    }

    /// Underlying representation
    pub fn content(&self) -> &LobContent {
        &self.content
    }

    /// Locator, for server-side content
    pub fn locator(&self) -> Option<&LobLocator> {
        match &self.content {
            LobContent::Streamed(locator) => Some(locator),
            LobContent::Buffered(_) => None,
        }
    }

    /// Whether `free()` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the handle. Later operations fail; freeing again is a no-op.
    pub fn free(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let LobContent::Buffered(buffer) = &mut self.content {
            buffer.free();
        }
    }

    /// Length in bytes (BLOB) or UTF-16 units (CLOB)
    pub async fn length(&self) -> Result<u64> {
        self.ensure_open()?;
        match &self.content {
            LobContent::Buffered(buffer) => buffer.length(),
            LobContent::Streamed(locator) => self.bridge()?.length(locator).await,
        }
    }

    /// Read up to `len` bytes starting at `pos`
    pub async fn get_bytes(&self, pos: i64, len: i64) -> Result<Vec<u8>> {
        self.ensure_open()?;
        match &self.content {
            LobContent::Buffered(buffer) => buffer.get_bytes(pos, len),
            LobContent::Streamed(locator) if locator.prefetched().is_none() && self.kind == LobKind::Blob => {
                let start = check_position(pos)?;
                let len = check_length(len)?;
                let bridge = self.bridge()?;
                let size = bridge.length(locator).await?;
                if start as u64 > size {
                    return Err(Error::InvalidPosition(format!(
                        "position {} is beyond the end of the BLOB (length {})",
                        pos, size
                    )));
                }
                bridge.read_range(locator, start as u64 + 1, Some(len as u64)).await
            }
            LobContent::Streamed(_) => self.snapshot().await?.get_bytes(pos, len),
        }
    }

    /// Read up to `len` characters starting at `pos` (CLOB)
    pub async fn get_sub_string(&self, pos: i64, len: i64) -> Result<String> {
        self.with_snapshot(|buffer| buffer.get_sub_string(pos, len)).await
    }

    /// Find `pattern` starting at `start` (BLOB)
    pub async fn position(&self, pattern: &[u8], start: i64) -> Result<i64> {
        self.with_snapshot(|buffer| buffer.position(pattern, start)).await
    }

    /// Find `pattern` starting at `start` (CLOB)
    pub async fn position_str(&self, pattern: &str, start: i64) -> Result<i64> {
        self.with_snapshot(|buffer| buffer.position_str(pattern, start)).await
    }

    /// Find the content of another LOB in this one
    pub async fn position_of(&self, pattern: &LobHandle, start: i64) -> Result<i64> {
        let needle = pattern.snapshot().await?;
        self.with_snapshot(|buffer| buffer.position_of(&needle, start)).await
    }

    /// Read the whole content
    pub async fn read_all(&self) -> Result<LobData> {
        let bytes = self.snapshot().await?.as_bytes()?.to_vec();
        Ok(match self.kind {
            LobKind::Blob => LobData::Bytes(Bytes::from(bytes)),
            LobKind::Clob => LobData::String(String::from_utf8_lossy(&bytes).into_owned()),
        })
    }

    /// Write bytes at `pos`; returns the number written
    pub async fn set_bytes(&mut self, pos: i64, data: &[u8]) -> Result<usize> {
        self.mutate(|buffer| buffer.set_bytes(pos, data)).await
    }

    /// Write characters at `pos` (CLOB); returns the UTF-16 units written
    pub async fn set_string(&mut self, pos: i64, text: &str) -> Result<usize> {
        self.mutate(|buffer| buffer.set_string(pos, text)).await
    }

    /// Shorten the content
    pub async fn truncate(&mut self, len: i64) -> Result<()> {
        self.mutate(|buffer| buffer.truncate(len)).await
    }

    /// Stream content starting at `pos`, optionally bounded to `len`.
    ///
    /// BLOBs behind a locator are read piece by piece as the stream is
    /// consumed; CLOBs yield UTF-8 bytes.
    pub async fn stream(&self, pos: i64, len: Option<i64>) -> Result<LobStream> {
        self.ensure_open()?;
        match (&self.content, self.kind) {
            (LobContent::Streamed(locator), LobKind::Blob) if locator.prefetched().is_none() => {
                let start = check_position(pos)?;
                let len = len.map(check_length).transpose()?;
                Ok(LobStream::Pieces(self.bridge()?.reader(
                    locator.clone(),
                    start as u64 + 1,
                    len.map(|l| l as u64),
                )))
            }
            (_, LobKind::Blob) => {
                let reader = self.with_snapshot(|buffer| buffer.binary_stream(pos, len)).await?;
                Ok(LobStream::Buffered(reader))
            }
            (_, LobKind::Clob) => {
                let reader = self.with_snapshot(|buffer| buffer.character_stream(pos, len)).await?;
                Ok(LobStream::Buffered(reader))
            }
        }
    }

    /// Sink that overwrites and extends content starting at `pos`.
    ///
    /// BLOB positions count bytes. A client-side CLOB takes UTF-8 text and
    /// `pos` counts UTF-16 units, as in [`set_string`](Self::set_string).
    /// For locator-backed BLOBs the row lock is checked up front and bytes
    /// travel in pieces; call [`LobSink::finish`] to send the final piece.
    pub async fn set_stream(&mut self, pos: i64) -> Result<LobSink<'_>> {
        self.ensure_open()?;
        let start = check_position(pos)?;
        check_extent(start, 0)?;
        let kind = self.kind;
        match &mut self.content {
            LobContent::Buffered(buffer) => match kind {
                LobKind::Blob => Ok(LobSink::Buffered(buffer.set_binary_stream(pos)?)),
                LobKind::Clob => Ok(LobSink::Chars {
                    writer: buffer.set_character_stream(pos)?,
                    pending: Vec::new(),
                    written: 0,
                }),
            },
            LobContent::Streamed(locator) => {
                if kind != LobKind::Blob {
                    return Err(Error::UnsupportedOperation(
                        "byte streams into a CLOB locator; use set_string".to_string(),
                    ));
                }
                let bridge = self
                    .bridge
                    .as_ref()
                    .ok_or_else(|| Error::Internal("locator without a connection".to_string()))?;
                bridge.connection().check_locator(locator).await?;
                let writer = bridge.writer(locator.clone(), start as u64 + 1);
                Ok(LobSink::Pieces { writer, locator })
            }
        }
    }

    /// Value to bind when writing this LOB into a row
    pub fn to_value(&self) -> Result<Value> {
        self.ensure_open()?;
        Ok(match &self.content {
            LobContent::Buffered(buffer) => match self.kind {
                LobKind::Blob => Value::Bytes(buffer.as_bytes()?.to_vec()),
                LobKind::Clob => Value::String(String::from_utf8_lossy(buffer.as_bytes()?).into_owned()),
            },
            LobContent::Streamed(locator) => Value::Lob(LobValue::Locator(locator.clone())),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedLob);
        }
        Ok(())
    }

    fn bridge(&self) -> Result<&LobStreamBridge> {
        self.bridge
            .as_ref()
            .ok_or_else(|| Error::Internal("locator without a connection".to_string()))
    }

    /// Client-side copy of the content
    async fn snapshot(&self) -> Result<LobBuffer> {
        self.ensure_open()?;
        match &self.content {
            LobContent::Buffered(buffer) => Ok(buffer.clone()),
            LobContent::Streamed(locator) => {
                let bytes = self.bridge()?.materialize(locator).await?;
                Ok(LobBuffer::new(self.kind, bytes))
            }
        }
    }

    async fn with_snapshot<T>(&self, op: impl FnOnce(&LobBuffer) -> Result<T>) -> Result<T> {
        self.ensure_open()?;
        match &self.content {
            LobContent::Buffered(buffer) => op(buffer),
            LobContent::Streamed(_) => op(&self.snapshot().await?),
        }
    }

    async fn mutate<T>(&mut self, op: impl FnOnce(&mut LobBuffer) -> Result<T>) -> Result<T> {
        self.ensure_open()?;
        let kind = self.kind;
        let Self { content, bridge, .. } = self;
        match content {
            LobContent::Buffered(buffer) => op(buffer),
            LobContent::Streamed(locator) => {
                let bridge = bridge
                    .as_ref()
                    .ok_or_else(|| Error::Internal("locator without a connection".to_string()))?;
                bridge.connection().check_locator(locator).await?;

                // diff against the server's content, never a prefetched copy
                let before = bridge.read_all(locator).await?;
                let mut working = LobBuffer::new(kind, before.clone());
                let out = op(&mut working)?;
                let after = working.as_bytes()?;
                bridge.push_changes(locator, &before, after).await?;

                locator.size = working.length()?;
                locator.write_epoch = bridge.epoch(locator).await;
                let prefetch_limit = bridge.connection().config().lob_prefetch_size as usize;
                locator.prefetched = (after.len() <= prefetch_limit).then(|| Bytes::copy_from_slice(after));
                debug!(
                    locator = %locator.id_hex(),
                    size = locator.size,
                    "LOB content updated"
                );
                Ok(out)
            }
        }
    }
}

impl std::fmt::Debug for LobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobHandle")
            .field("kind", &self.kind)
            .field("content", &self.content)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Readable LOB content
pub enum LobStream {
    /// Content already in memory
    Buffered(LobReader),
    /// Content read from the server as it is consumed
    Pieces(PieceReader),
}

impl LobStream {
    /// Next chunk of bytes, `None` at the end
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        match self {
            LobStream::Buffered(reader) => {
                let rest = reader.take_remaining();
                Ok((!rest.is_empty()).then_some(rest))
            }
            LobStream::Pieces(reader) => reader.next_chunk().await,
        }
    }

    /// Read everything left
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

/// Writable LOB content
pub enum LobSink<'a> {
    /// Writes straight into a client-side buffer
    Buffered(LobWriter<'a>),
    /// UTF-8 text written into a client-side CLOB
    Chars {
        /// Character writer
        writer: ClobWriter<'a>,
        /// Trailing bytes of a character split across writes
        pending: Vec<u8>,
        /// UTF-16 units written so far
        written: u64,
    },
    /// Writes sent to the server in pieces
    Pieces {
        /// Piece writer
        writer: PieceWriter,
        /// Locator updated with the new size on finish
        locator: &'a mut LobLocator,
    },
}

impl LobSink<'_> {
    /// Write bytes; returns the number accepted
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        match self {
            LobSink::Buffered(writer) => {
                writer.write_all(data)?;
                Ok(data.len())
            }
            LobSink::Chars {
                writer,
                pending,
                written,
            } => {
                pending.extend_from_slice(data);
                let valid = match std::str::from_utf8(pending) {
                    Ok(text) => text.len(),
                    Err(e) if e.error_len().is_none() => e.valid_up_to(),
                    Err(e) => return Err(not_utf8(e)),
                };
                if valid > 0 {
                    let text = std::str::from_utf8(&pending[..valid]).map_err(not_utf8)?;
                    *written += writer.write_chars(text)? as u64;
                    pending.drain(..valid);
                }
                Ok(data.len())
            }
            LobSink::Pieces { writer, .. } => {
                writer.write(data).await?;
                Ok(data.len())
            }
        }
    }

    /// Flush remaining bytes; returns the total written through this sink
    pub async fn finish(self) -> Result<u64> {
        match self {
            LobSink::Buffered(writer) => Ok(writer.written() as u64),
            LobSink::Chars { pending, written, .. } => {
                if !pending.is_empty() {
                    return Err(Error::DataConversionError(
                        "CLOB stream ended inside a UTF-8 sequence".to_string(),
                    ));
                }
                Ok(written)
            }
            LobSink::Pieces { writer, locator } => {
                let bridge = writer.bridge().clone();
                let written = writer.finish().await?;
                locator.size = bridge.length(locator).await?;
                locator.write_epoch = bridge.epoch(locator).await;
                locator.prefetched = None;
                Ok(written)
            }
        }
    }
}

fn not_utf8(err: std::str::Utf8Error) -> Error {
    Error::DataConversionError(format!("CLOB stream data is not UTF-8: {}", err))
}
