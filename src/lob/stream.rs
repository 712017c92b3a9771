//! Byte and character streams over a [`LobBuffer`]

use std::fmt;
use std::io;

use bytes::Bytes;

use super::LobBuffer;
use crate::error::{Error, Result};

/// Reader over a snapshot of LOB content
#[derive(Debug, Clone)]
pub struct LobReader {
    data: Bytes,
    pos: usize,
}

impl LobReader {
    pub(crate) fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Take the unread bytes in one piece
    pub fn take_remaining(&mut self) -> Bytes {
        let rest = self.data.slice(self.pos..);
        self.pos = self.data.len();
        rest
    }
}

impl io::Read for LobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Writer that overwrites and extends a LOB starting at a position.
///
/// Writes go through [`LobBuffer::set_bytes`], so writing past the end
/// grows the buffer the same way. With a limit, bytes beyond it are
/// accepted and discarded.
#[derive(Debug)]
pub struct LobWriter<'a> {
    lob: &'a mut LobBuffer,
    next: i64,
    limit: Option<usize>,
    written: usize,
}

impl<'a> LobWriter<'a> {
    pub(crate) fn new(lob: &'a mut LobBuffer, pos: i64) -> Self {
        Self {
            lob,
            next: pos,
            limit: None,
            written: 0,
        }
    }

    /// Stop storing bytes once `limit` bytes were written
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Bytes stored so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Position the next byte lands on
    pub fn position(&self) -> i64 {
        self.next
    }
}

impl io::Write for LobWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let take = match self.limit {
            Some(limit) => buf.len().min(limit.saturating_sub(self.written)),
            None => buf.len(),
        };
        if take > 0 {
            self.lob.set_bytes(self.next, &buf[..take]).map_err(to_io)?;
            self.next += take as i64;
            self.written += take;
        } else if self.lob.is_closed() {
            return Err(to_io(Error::ClosedLob));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Character writer over a CLOB, advancing by UTF-16 units
#[derive(Debug)]
pub struct ClobWriter<'a> {
    lob: &'a mut LobBuffer,
    next: i64,
}

impl<'a> ClobWriter<'a> {
    pub(crate) fn new(lob: &'a mut LobBuffer, pos: i64) -> Self {
        Self { lob, next: pos }
    }

    /// Write `text`, returning the number of UTF-16 units written
    pub fn write_chars(&mut self, text: &str) -> Result<usize> {
        let n = self.lob.set_string(self.next, text)?;
        self.next += n as i64;
        Ok(n)
    }

    /// Position the next character lands on
    pub fn position(&self) -> i64 {
        self.next
    }
}

impl fmt::Write for ClobWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_chars(s).map(|_| ()).map_err(|_| fmt::Error)
    }
}

fn to_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;
    use std::io::{Read, Write};

    #[test]
    fn test_reader_chunks() {
        let mut reader = LobReader::new(Bytes::from_static(b"abcdef"));
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(reader.remaining(), 2);
        assert_eq!(reader.take_remaining(), Bytes::from_static(b"ef"));
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_writer_limit_discards_excess() {
        let mut blob = LobBuffer::empty_blob();
        {
            let mut writer = blob.set_binary_stream(1).unwrap().with_limit(4);
            assert_eq!(writer.write(b"abc").unwrap(), 3);
            assert_eq!(writer.write(b"defg").unwrap(), 4);
            assert_eq!(writer.written(), 4);
            assert_eq!(writer.position(), 5);
        }
        assert_eq!(blob.as_bytes().unwrap(), b"abcd");
    }

    #[test]
    fn test_writer_past_end_pads() {
        let mut blob = LobBuffer::blob(b"a".to_vec());
        {
            let mut writer = blob.set_binary_stream(3).unwrap();
            writer.write_all(b"c").unwrap();
        }
        assert_eq!(blob.as_bytes().unwrap(), b"a\0c");
    }

    #[test]
    fn test_clob_writer() {
        let mut clob = LobBuffer::clob("0123456789");
        {
            let mut writer = clob.set_character_stream(3).unwrap();
            write!(writer, "ab{}", "\u{1F600}").unwrap();
            assert_eq!(writer.position(), 7);
        }
        assert_eq!(clob.get_sub_string(1, 20).unwrap(), "01ab\u{1F600}6789");
    }
}
