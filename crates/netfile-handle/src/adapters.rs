//! Sequential views over positioned I/O.
//!
//! [`ReadAtReader`] and [`WriteAtWriter`] keep their own offset and turn every
//! `read`/`write` into a positioned call. A single instance is not safe for
//! concurrent use; share the underlying `ReadAt`/`WriteAt` instead.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::Result;
use crate::info::FileInfo;
use crate::traits::Handle;

/// Positioned read that does not move any shared cursor.
pub trait ReadAt {
    /// Read into `buf` starting at `offset`. Returns `Ok(0)` at end of data.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

/// Positioned write that does not move any shared cursor.
pub trait WriteAt {
    /// Write `buf` starting at `offset`.
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize>;
}

#[cfg(unix)]
impl ReadAt for std::fs::File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

#[cfg(unix)]
impl WriteAt for std::fs::File {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::write_at(self, buf, offset)
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

impl<T: WriteAt + ?Sized> WriteAt for &T {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        (**self).write_at(buf, offset)
    }
}

/// A `Read + Seek` view over a [`ReadAt`].
///
/// `SeekFrom::End` needs a known length; without one it is unsupported.
#[derive(Debug)]
pub struct ReadAtReader<T> {
    inner: T,
    offset: u64,
    len: Option<u64>,
}

impl<T: ReadAt> ReadAtReader<T> {
    /// Start reading `inner` at offset zero.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            offset: 0,
            len: None,
        }
    }

    /// Declare the total length so `SeekFrom::End` works.
    pub fn with_len(mut self, len: u64) -> Self {
        self.len = Some(len);
        self
    }

    /// Current offset.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Borrow the wrapped source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the wrapped source.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: ReadAt> Read for ReadAtReader<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read_at(buf, self.offset)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl<T: ReadAt> Seek for ReadAtReader<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.offset = resolve_seek(self.offset, self.len, pos)?;
        Ok(self.offset)
    }
}

impl<T: ReadAt + Handle> Handle for ReadAtReader<T> {
    fn stat(&self) -> Result<FileInfo> {
        self.inner.stat()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// A `Write + Seek` view over a [`WriteAt`].
#[derive(Debug)]
pub struct WriteAtWriter<T> {
    inner: T,
    offset: u64,
    len: Option<u64>,
}

impl<T: WriteAt> WriteAtWriter<T> {
    /// Start writing `inner` at offset zero.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            offset: 0,
            len: None,
        }
    }

    /// Declare the current length so `SeekFrom::End` works.
    pub fn with_len(mut self, len: u64) -> Self {
        self.len = Some(len);
        self
    }

    /// Current offset.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Borrow the wrapped sink.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the wrapped sink.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: WriteAt> Write for WriteAtWriter<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write_at(buf, self.offset)?;
        self.offset += n as u64;
        if let Some(len) = self.len.as_mut() {
            *len = (*len).max(self.offset);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: WriteAt> Seek for WriteAtWriter<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.offset = resolve_seek(self.offset, self.len, pos)?;
        Ok(self.offset)
    }
}

impl<T: WriteAt + Handle> Handle for WriteAtWriter<T> {
    fn stat(&self) -> Result<FileInfo> {
        self.inner.stat()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Compute the absolute offset for `pos`, rejecting positions before zero.
pub(crate) fn resolve_seek(current: u64, len: Option<u64>, pos: SeekFrom) -> io::Result<u64> {
    let (base, delta) = match pos {
        SeekFrom::Start(offset) => return Ok(offset),
        SeekFrom::Current(delta) => (current, delta),
        SeekFrom::End(delta) => {
            let len = len.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::Unsupported,
                    "seek from end requires a known length",
                )
            })?;
            (len, delta)
        }
    };

    base.checked_add_signed(delta).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid seek to a negative or overflowing position",
        )
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Positioned access over a shared in-memory buffer.
    #[derive(Default)]
    struct MemoryAt(Mutex<Vec<u8>>);

    impl ReadAt for MemoryAt {
        fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
            let data = self.0.lock().unwrap();
            let start = (offset as usize).min(data.len());
            let n = buf.len().min(data.len() - start);
            buf[..n].copy_from_slice(&data[start..start + n]);
            Ok(n)
        }
    }

    impl WriteAt for MemoryAt {
        fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
            let mut data = self.0.lock().unwrap();
            let end = offset as usize + buf.len();
            if data.len() < end {
                data.resize(end, 0);
            }
            data[offset as usize..end].copy_from_slice(buf);
            Ok(buf.len())
        }
    }

    #[test]
    fn reader_advances_offset_between_reads() {
        let source = MemoryAt(Mutex::new(b"abcdefgh".to_vec()));
        let mut reader = ReadAtReader::new(&source);

        let mut buf = [0u8; 3];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"abc");
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"def");
        assert_eq!(reader.position(), 6);
    }

    #[test]
    fn reader_read_to_end_stops_at_zero() {
        let source = MemoryAt(Mutex::new(vec![9u8; 100]));
        let mut reader = ReadAtReader::new(&source);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![9u8; 100]);
    }

    #[test]
    fn writer_writes_sequentially_and_seeks() {
        let sink = MemoryAt::default();
        let mut writer = WriteAtWriter::new(&sink);
        writer.write_all(b"hello").unwrap();
        writer.seek(SeekFrom::Current(-2)).unwrap();
        writer.write_all(b"p!").unwrap();
        assert_eq!(sink.0.lock().unwrap().as_slice(), b"help!");
    }

    #[test]
    fn seek_end_requires_length() {
        let source = MemoryAt(Mutex::new(vec![0u8; 10]));
        let mut reader = ReadAtReader::new(&source);
        let err = reader.seek(SeekFrom::End(0)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        let mut reader = ReadAtReader::new(&source).with_len(10);
        assert_eq!(reader.seek(SeekFrom::End(-4)).unwrap(), 6);
    }

    #[test]
    fn seek_before_start_is_rejected() {
        assert!(resolve_seek(3, None, SeekFrom::Current(-4)).is_err());
        assert_eq!(resolve_seek(3, None, SeekFrom::Current(-3)).unwrap(), 0);
    }
}
