//! Append-only output stream.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::util::Result;

/// Default write buffer size.
pub const DEFAULT_BUFFER_CAPACITY: usize = 2 * 1024 * 1024;

enum Sink {
    File(BufWriter<File>),
    Memory(Cursor<Vec<u8>>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::File(w) => w.write(buf),
            Self::Memory(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::File(w) => w.flush(),
            Self::Memory(w) => w.flush(),
        }
    }
}

impl Seek for Sink {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            Self::File(w) => w.seek(pos),
            Self::Memory(w) => w.seek(pos),
        }
    }
}

/// Sequential writer tracking the current end offset.
///
/// Only [`patch`](Self::patch) ever writes behind the end, and only into
/// the fixed header.
pub struct OStream {
    sink: Sink,
    pos: u64,
}

impl OStream {
    /// Create or truncate a file.
    pub fn create(path: impl AsRef<Path>, buffer_capacity: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            sink: Sink::File(BufWriter::with_capacity(buffer_capacity, file)),
            pos: 0,
        })
    }

    /// Write into a growable in-memory buffer.
    pub fn memory() -> Self {
        Self {
            sink: Sink::Memory(Cursor::new(Vec::new())),
            pos: 0,
        }
    }

    /// Current end offset; the next append lands here.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.sink.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.sink.write_u64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.sink.write_u8(value)?;
        self.pos += 1;
        Ok(())
    }

    /// Append a length-prefixed blob assembled from `parts` and return its
    /// position.
    pub fn write_blob(&mut self, parts: &[&[u8]]) -> Result<u64> {
        let pos = self.pos;
        let len: usize = parts.iter().map(|p| p.len()).sum();
        self.write_u64(len as u64)?;
        for part in parts {
            self.write_bytes(part)?;
        }
        Ok(pos)
    }

    /// Overwrite bytes at `at`, then return to the end.
    pub fn patch(&mut self, at: u64, data: &[u8]) -> Result<()> {
        self.sink.flush()?;
        self.sink.seek(SeekFrom::Start(at))?;
        self.sink.write_all(data)?;
        self.sink.flush()?;
        self.sink.seek(SeekFrom::Start(self.pos))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Bytes written so far for in-memory streams; `None` for files.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self.sink {
            Sink::Memory(cursor) => Some(cursor.into_inner()),
            Sink::File(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_and_patch() {
        let mut stream = OStream::memory();
        stream.write_bytes(b"abcd").unwrap();
        let blob = stream.write_blob(&[b"xy", b"z"]).unwrap();
        assert_eq!(blob, 4);
        assert_eq!(stream.pos(), 4 + 8 + 3);

        stream.patch(1, b"B").unwrap();
        stream.write_u8(9).unwrap();

        let bytes = stream.into_bytes().unwrap();
        assert_eq!(&bytes[..4], b"aBcd");
        assert_eq!(&bytes[4..12], &3u64.to_le_bytes());
        assert_eq!(&bytes[12..15], b"xyz");
        assert_eq!(bytes[15], 9);
    }
}
