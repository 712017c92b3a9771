//! Client-side LOB storage
//!
//! A [`LobBuffer`] owns the content of one BLOB or CLOB. It may start out as
//! a read-only window over a larger byte region (for instance a row buffer);
//! the first mutation compacts the window into an owned buffer so the
//! source is never written through.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::stream::{ClobWriter, LobReader, LobWriter};
use super::{check_extent, check_length, check_position, LobKind};
use crate::constants::{BLOB_PAD, CLOB_PAD};
use crate::error::{Error, Result};

/// In-memory BLOB or CLOB content.
///
/// Positions are 1-based. BLOB operations count bytes, CLOB operations count
/// UTF-16 code units of the decoded text.
///
/// # Example
///
/// ```rust
/// use ob_client::LobBuffer;
///
/// let mut clob = LobBuffer::clob("hello");
/// clob.set_string(7, "world").unwrap();
/// assert_eq!(clob.get_sub_string(1, 11).unwrap(), "hello world");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "LobSnapshot", into = "LobSnapshot")]
pub struct LobBuffer {
    kind: LobKind,
    data: Vec<u8>,
    offset: usize,
    length: usize,
    /// False while `data` is a window onto someone else's region
    mutable: bool,
    closed: bool,
}

/// Serialized form: the kind and the visible content only
#[derive(Serialize, Deserialize)]
struct LobSnapshot {
    kind: LobKind,
    data: Vec<u8>,
}

impl From<LobBuffer> for LobSnapshot {
    fn from(lob: LobBuffer) -> Self {
        let data = lob.content().to_vec();
        Self {
            kind: lob.kind,
            data,
        }
    }
}

impl From<LobSnapshot> for LobBuffer {
    fn from(snapshot: LobSnapshot) -> Self {
        LobBuffer::new(snapshot.kind, snapshot.data)
    }
}

impl LobBuffer {
    /// Create an owned buffer
    pub fn new(kind: LobKind, data: Vec<u8>) -> Self {
        let length = data.len();
        Self {
            kind,
            data,
            offset: 0,
            length,
            mutable: true,
            closed: false,
        }
    }

    /// Create an empty BLOB
    pub fn empty_blob() -> Self {
        Self::new(LobKind::Blob, Vec::new())
    }

    /// Create an empty CLOB
    pub fn empty_clob() -> Self {
        Self::new(LobKind::Clob, Vec::new())
    }

    /// Create a BLOB holding `data`
    pub fn blob(data: impl Into<Vec<u8>>) -> Self {
        Self::new(LobKind::Blob, data.into())
    }

    /// Create a CLOB holding `text`
    pub fn clob(text: &str) -> Self {
        Self::new(LobKind::Clob, text.as_bytes().to_vec())
    }

    /// Create a read-only window of `length` bytes starting at `offset`.
    ///
    /// The window is copied into an owned buffer on the first mutation.
    pub fn from_window(kind: LobKind, data: Vec<u8>, offset: usize, length: usize) -> Result<Self> {
        if offset.checked_add(length).map_or(true, |end| end > data.len()) {
            return Err(Error::InvalidPosition(format!(
                "window {}+{} exceeds region of {} bytes",
                offset,
                length,
                data.len()
            )));
        }
        Ok(Self {
            kind,
            data,
            offset,
            length,
            mutable: false,
            closed: false,
        })
    }

    /// BLOB or CLOB
    pub fn kind(&self) -> LobKind {
        self.kind
    }

    /// Whether `free()` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the buffer owns its storage
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Raw visible bytes (UTF-8 for CLOBs), regardless of kind
    pub fn as_bytes(&self) -> Result<&[u8]> {
        self.ensure_open()?;
        Ok(self.content())
    }

    /// Release the content. Every later operation fails with a closed-LOB
    /// error; calling `free` again is a no-op.
    pub fn free(&mut self) {
        if !self.closed {
            self.closed = true;
            self.data = Vec::new();
            self.offset = 0;
            self.length = 0;
        }
    }

    /// Length in bytes (BLOB) or UTF-16 code units (CLOB)
    pub fn length(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(match self.kind {
            LobKind::Blob => self.length as u64,
            LobKind::Clob => self.text().encode_utf16().count() as u64,
        })
    }

    // =========================================================================
    // Byte operations
    // =========================================================================

    /// Read up to `len` bytes starting at `pos`.
    ///
    /// Requests past the end are clamped to the available content; a start
    /// position beyond `length + 1` is an error.
    pub fn get_bytes(&self, pos: i64, len: i64) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let start = check_position(pos)?;
        let len = check_length(len)?;
        if start > self.length {
            return Err(self.beyond_end(pos, self.length));
        }
        let end = start.saturating_add(len).min(self.length);
        Ok(self.content()[start..end].to_vec())
    }

    /// Write `src` at `pos`, extending the content as needed (BLOB).
    ///
    /// Writing past the end fills the gap with zero bytes. Returns the number
    /// of bytes written.
    pub fn set_bytes(&mut self, pos: i64, src: &[u8]) -> Result<usize> {
        self.ensure_blob()?;
        let start = check_position(pos)?;
        let end = check_extent(start, src.len())?;
        self.make_owned();

        if start > self.data.len() {
            self.data.resize(start, BLOB_PAD);
        }
        if end > self.data.len() {
            self.data.resize(end, BLOB_PAD);
        }
        self.data[start..end].copy_from_slice(src);
        self.length = self.data.len();
        Ok(src.len())
    }

    /// Write `len` bytes of `src` starting at `src_offset` (0-based).
    ///
    /// The copy stops silently at the end of `src`.
    pub fn set_bytes_range(&mut self, pos: i64, src: &[u8], src_offset: usize, len: usize) -> Result<usize> {
        if src_offset > src.len() {
            return Err(Error::InvalidPosition(format!(
                "offset {} is beyond the source length {}",
                src_offset,
                src.len()
            )));
        }
        let end = src_offset.saturating_add(len).min(src.len());
        self.set_bytes(pos, &src[src_offset..end])
    }

    /// Find `pattern` starting the search at `start`.
    ///
    /// Returns the 1-based position of the first match or -1. An empty
    /// pattern matches at `start`.
    pub fn position(&self, pattern: &[u8], start: i64) -> Result<i64> {
        self.ensure_open()?;
        let from = self.check_search_start(start, self.length)?;
        Ok(find(&self.content()[from..], pattern).map_or(-1, |i| (from + i + 1) as i64))
    }

    /// Find the content of another LOB in this one
    pub fn position_of(&self, pattern: &LobBuffer, start: i64) -> Result<i64> {
        let needle = pattern.as_bytes()?;
        self.position(needle, start)
    }

    /// Byte stream over `len` bytes (or the rest) starting at `pos`
    pub fn binary_stream(&self, pos: i64, len: Option<i64>) -> Result<LobReader> {
        let bytes = self.get_bytes(pos, len.unwrap_or(i64::MAX))?;
        Ok(LobReader::new(bytes.into()))
    }

    /// Writer that overwrites and extends content starting at `pos`
    pub fn set_binary_stream(&mut self, pos: i64) -> Result<LobWriter<'_>> {
        self.ensure_blob()?;
        check_position(pos)?;
        Ok(LobWriter::new(self, pos))
    }

    // =========================================================================
    // Character operations (CLOB)
    // =========================================================================

    /// Read up to `len` UTF-16 units starting at `pos`.
    ///
    /// Requests past the end are clamped. A split surrogate pair decodes to
    /// U+FFFD.
    pub fn get_sub_string(&self, pos: i64, len: i64) -> Result<String> {
        self.ensure_clob()?;
        let start = check_position(pos)?;
        let len = check_length(len)?;
        let units = self.units();
        if start > units.len() {
            return Err(self.beyond_end(pos, units.len()));
        }
        let end = start.saturating_add(len).min(units.len());
        Ok(String::from_utf16_lossy(&units[start..end]))
    }

    /// Overwrite characters starting at `pos` with `text`.
    ///
    /// Writing past the end pads the gap with spaces. Returns the number of
    /// UTF-16 units written.
    pub fn set_string(&mut self, pos: i64, text: &str) -> Result<usize> {
        self.ensure_clob()?;
        let start = check_position(pos)?;
        let new_units: Vec<u16> = text.encode_utf16().collect();
        check_extent(start, new_units.len())?;
        let units = self.units();

        let mut merged = Vec::with_capacity(units.len().max(start + new_units.len()));
        if start > units.len() {
            merged.extend_from_slice(&units);
            merged.resize(start, CLOB_PAD as u16);
            merged.extend_from_slice(&new_units);
        } else {
            let tail = (start + new_units.len()).min(units.len());
            merged.extend_from_slice(&units[..start]);
            merged.extend_from_slice(&new_units);
            merged.extend_from_slice(&units[tail..]);
        }

        self.replace_content(String::from_utf16_lossy(&merged).into_bytes());
        Ok(new_units.len())
    }

    /// Find `pattern` in the text, counting in UTF-16 units
    pub fn position_str(&self, pattern: &str, start: i64) -> Result<i64> {
        self.ensure_clob()?;
        let units = self.units();
        let from = self.check_search_start(start, units.len())?;
        let needle: Vec<u16> = pattern.encode_utf16().collect();
        Ok(find(&units[from..], &needle).map_or(-1, |i| (from + i + 1) as i64))
    }

    /// Character stream starting at `pos`.
    ///
    /// With a bound, `pos + len` must not run past the content. The stream
    /// yields UTF-8 bytes.
    pub fn character_stream(&self, pos: i64, len: Option<i64>) -> Result<LobReader> {
        self.ensure_clob()?;
        let start = check_position(pos)?;
        let units = self.units();
        if start > units.len() {
            return Err(self.beyond_end(pos, units.len()));
        }
        let end = match len {
            Some(len) => {
                let len = check_length(len)?;
                if start + len > units.len() {
                    return Err(Error::InvalidPosition(
                        "pos + length is greater than the number of characters in the CLOB"
                            .to_string(),
                    ));
                }
                start + len
            }
            None => units.len(),
        };
        let text = String::from_utf16_lossy(&units[start..end]);
        Ok(LobReader::new(text.into_bytes().into()))
    }

    /// Writer that overwrites characters starting at `pos`
    pub fn set_character_stream(&mut self, pos: i64) -> Result<ClobWriter<'_>> {
        self.ensure_clob()?;
        check_position(pos)?;
        Ok(ClobWriter::new(self, pos))
    }

    // =========================================================================
    // Shared operations
    // =========================================================================

    /// Shorten the content to `len` bytes (BLOB) or UTF-16 units (CLOB).
    ///
    /// Cutting a CLOB through a surrogate pair leaves U+FFFD in its place.
    pub fn truncate(&mut self, len: i64) -> Result<()> {
        self.ensure_open()?;
        if len < 0 {
            return Err(Error::InvalidPosition(format!(
                "Invalid truncation length {}",
                len
            )));
        }
        let len = len as usize;
        match self.kind {
            LobKind::Blob => {
                if len > self.length {
                    return Err(self.truncate_error(self.length, len));
                }
                self.length = len;
                if self.mutable {
                    self.data.truncate(len);
                }
            }
            LobKind::Clob => {
                let units = self.units();
                if len > units.len() {
                    return Err(self.truncate_error(units.len(), len));
                }
                let kept = String::from_utf16_lossy(&units[..len]);
                self.replace_content(kept.into_bytes());
            }
        }
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedLob);
        }
        Ok(())
    }

    fn ensure_blob(&self) -> Result<()> {
        self.ensure_open()?;
        if self.kind != LobKind::Blob {
            return Err(Error::UnsupportedOperation(
                "byte writes into a CLOB; use set_string".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_clob(&self) -> Result<()> {
        self.ensure_open()?;
        if self.kind != LobKind::Clob {
            return Err(Error::UnsupportedOperation(
                "character access on a BLOB".to_string(),
            ));
        }
        Ok(())
    }

    fn content(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.length]
    }

    fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.content())
    }

    fn units(&self) -> Vec<u16> {
        self.text().encode_utf16().collect()
    }

    /// Compact a window into owned storage holding exactly the content
    fn make_owned(&mut self) {
        if !self.mutable || self.offset != 0 || self.data.len() != self.length {
            self.data = self.content().to_vec();
            self.offset = 0;
            self.mutable = true;
        }
    }

    fn replace_content(&mut self, data: Vec<u8>) {
        self.length = data.len();
        self.data = data;
        self.offset = 0;
        self.mutable = true;
    }

    fn check_search_start(&self, start: i64, length: usize) -> Result<usize> {
        if start < 1 || start as u64 > length as u64 + 1 {
            return Err(Error::InvalidPosition(format!(
                "search start {} is outside 1..={}",
                start,
                length + 1
            )));
        }
        Ok((start - 1) as usize)
    }

    fn beyond_end(&self, pos: i64, length: usize) -> Error {
        Error::InvalidPosition(format!(
            "position {} is beyond the end of the {} (length {})",
            pos,
            self.kind.name(),
            length
        ))
    }

    fn truncate_error(&self, length: usize, requested: usize) -> Error {
        Error::InvalidPosition(format!(
            "Cannot truncate {} of length {} to length of {}",
            self.kind.name(),
            length,
            requested
        ))
    }
}

impl PartialEq for LobBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.closed == other.closed && self.content() == other.content()
    }
}

fn find<T: PartialEq>(haystack: &[T], needle: &[T]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
