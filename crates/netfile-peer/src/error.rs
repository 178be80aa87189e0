use std::io;

use netfile_handle::HandleError;
use netfile_wire::{ErrorCode, FileId, WireError};

/// Errors that can occur serving or accessing a remote file.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// A handle of the same kind is already exposed under this id.
    #[error("file id {0} is already registered")]
    AlreadyRegistered(FileId),

    /// No handle is exposed under this id.
    #[error("not found: unknown file {0}")]
    NotFound(FileId),

    /// The shared secret did not match.
    #[error("unauthorized: wrong shared secret")]
    Unauthorized,

    /// The handle lacks the capability, or policy disables it.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Bad range syntax, bad path, or an out-of-policy range.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A write body did not match its declared range.
    #[error("invalid body length: declared {declared}, received {received}")]
    BodyLengthMismatch { declared: u64, received: u64 },

    /// I/O error from the underlying handle.
    #[error("handle error: {0}")]
    Handle(#[from] io::Error),

    /// The server answered with a status from the shared error table.
    #[error("remote error ({status}): {code}")]
    Remote { code: ErrorCode, status: u16 },

    /// The server answered with a status outside the error table.
    #[error("{status}: an unknown error occurred: {message}")]
    UnknownRemote { status: u16, message: String },

    /// The server's response broke the protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Transport-level failure talking to the server.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The operation's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid server URL.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid wire value.
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl PeerError {
    /// The error-table code this error is reported with, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::NotFound(_) => Some(ErrorCode::NotFound),
            Self::Unauthorized => Some(ErrorCode::Unauthorized),
            Self::Unsupported(_) => Some(ErrorCode::Unsupported),
            Self::Handle(err) => ErrorCode::from_io(err),
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<HandleError> for PeerError {
    fn from(err: HandleError) -> Self {
        match err {
            HandleError::Unsupported(op) => Self::Unsupported(op),
            HandleError::Io(err) => Self::Handle(err),
        }
    }
}

impl From<PeerError> for io::Error {
    fn from(err: PeerError) -> Self {
        if let PeerError::Handle(inner) = err {
            return inner;
        }
        let kind = match &err {
            PeerError::Remote { code, .. } => code.io_kind(),
            PeerError::NotFound(_) => io::ErrorKind::NotFound,
            PeerError::Unauthorized => io::ErrorKind::PermissionDenied,
            PeerError::Unsupported(_) => io::ErrorKind::Unsupported,
            PeerError::Cancelled => io::ErrorKind::Interrupted,
            PeerError::Http(inner) if inner.is_timeout() => io::ErrorKind::TimedOut,
            PeerError::MalformedRequest(_) => io::ErrorKind::InvalidInput,
            PeerError::Protocol(_)
            | PeerError::BodyLengthMismatch { .. }
            | PeerError::Json(_) => io::ErrorKind::InvalidData,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_codes_become_io_kinds() {
        let err: io::Error = PeerError::Remote {
            code: ErrorCode::ClosedPipe,
            status: 484,
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn handle_errors_pass_through_unchanged() {
        let original = io::Error::new(io::ErrorKind::WriteZero, "disk full");
        let err: io::Error = PeerError::Handle(original).into();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn handle_unsupported_maps_to_table() {
        let err = PeerError::from(HandleError::Unsupported("stat"));
        assert_eq!(err.code(), Some(ErrorCode::Unsupported));
        assert_eq!(
            PeerError::Handle(io::Error::other("boom")).code(),
            None,
            "plain I/O errors have no agreed code"
        );
    }
}
