use std::io;

/// Errors produced by storage handle capabilities.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    /// The handle does not provide the requested capability.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// An I/O error occurred in the underlying storage.
    #[error("handle I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<HandleError> for io::Error {
    fn from(err: HandleError) -> Self {
        match err {
            HandleError::Io(err) => err,
            HandleError::Unsupported(op) => io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported operation: {op}"),
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, HandleError>;
