use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

#[cfg(unix)]
use crate::adapters::{ReadAt, WriteAt};
use crate::error::{HandleError, Result};
use crate::info::FileInfo;
use crate::traits::Handle;

/// A local file together with the path it was opened from.
///
/// `std::fs::File` does not remember its name, which stat responses need, so
/// this wrapper carries the path alongside the descriptor. After [`close`]
/// every I/O call fails with `BrokenPipe`.
///
/// [`close`]: Handle::close
#[derive(Debug)]
pub struct LocalFile {
    file: Option<File>,
    path: PathBuf,
}

impl LocalFile {
    /// Open an existing file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, OpenOptions::new().read(true))
    }

    /// Create (or truncate) a file for reading and writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(
            path,
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true),
        )
    }

    /// Open a file with explicit options.
    pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = options.open(&path)?;
        debug!(?path, "opened local file");
        Ok(Self {
            file: Some(file),
            path,
        })
    }

    /// Wrap an already-open file.
    pub fn from_file(file: File, path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file),
            path: path.into(),
        }
    }

    /// The path this file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name reported by stat.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    fn file(&self) -> io::Result<&File> {
        self.file.as_ref().ok_or_else(closed)
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(closed)
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "file already closed")
}

impl Read for LocalFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file_mut()?.read(buf)
    }
}

impl Write for LocalFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl Seek for LocalFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file_mut()?.seek(pos)
    }
}

impl Handle for LocalFile {
    fn stat(&self) -> Result<FileInfo> {
        let metadata = self.file()?.metadata()?;
        Ok(FileInfo::from_metadata(self.name(), &metadata))
    }

    fn close(&mut self) -> Result<()> {
        let file = self.file.take().ok_or_else(|| HandleError::Io(closed()))?;
        debug!(path = ?self.path, "closing local file");
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(unix)]
impl ReadAt for LocalFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.file()?.read_at(buf, offset)
    }
}

#[cfg(unix)]
impl WriteAt for LocalFile {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        self.file()?.write_at(buf, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_reports_base_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.bin");
        std::fs::write(&path, [1u8; 64]).unwrap();

        let file = LocalFile::open(&path).unwrap();
        let info = file.stat().unwrap();
        assert_eq!(info.name, "report.bin");
        assert_eq!(info.size, 64);
    }

    #[test]
    fn create_truncates_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"previous contents").unwrap();

        let mut file = LocalFile::create(&path).unwrap();
        file.write_all(b"new").unwrap();
        file.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn io_after_close_is_broken_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("closed.bin");
        let mut file = LocalFile::create(&path).unwrap();
        file.close().unwrap();

        let err = file.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(file.close().is_err());
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalFile::open(dir.path().join("missing"));
        assert!(matches!(result, Err(HandleError::Io(_))));
    }
}
