use std::io::{Read, Seek, Write};

use crate::error::{HandleError, Result};
use crate::info::FileInfo;

/// Optional capabilities shared by every exposed handle.
///
/// Both methods have defaults so a plain seekable stream only needs an empty
/// `impl Handle for T {}`: stat reports [`HandleError::Unsupported`] and close
/// does nothing.
pub trait Handle: Send {
    /// Produce a fresh metadata snapshot.
    fn stat(&self) -> Result<FileInfo> {
        Err(HandleError::Unsupported("stat"))
    }

    /// Release the underlying resource.
    ///
    /// Called at most once, when the handle is removed from service.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A handle that can be exposed for remote reading.
pub trait ReadHandle: Read + Seek + Handle {}

impl<T: Read + Seek + Handle> ReadHandle for T {}

/// A handle that can be exposed for remote writing.
pub trait WriteHandle: Write + Seek + Handle {}

impl<T: Write + Seek + Handle> WriteHandle for T {}

impl<T: Handle + ?Sized> Handle for Box<T> {
    fn stat(&self) -> Result<FileInfo> {
        (**self).stat()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// In-memory buffers report their length and an empty name.
impl<T> Handle for std::io::Cursor<T>
where
    T: AsRef<[u8]> + Send,
{
    fn stat(&self) -> Result<FileInfo> {
        Ok(FileInfo::anonymous(self.get_ref().as_ref().len() as u64))
    }
}
