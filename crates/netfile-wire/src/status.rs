//! Error kinds carried as HTTP status codes.
//!
//! Both directions use the same table:
//!
//! | Code | Kind |
//! |------|------|
//! | 401 | wrong shared secret |
//! | 404 | unknown file id |
//! | 480 | end of file |
//! | 481 | unexpected end of file |
//! | 482 | short buffer |
//! | 483 | short write |
//! | 484 | closed pipe |
//! | 486 | no progress |
//! | 490 | unknown error, text in the body |
//! | 491 | unsupported operation |

use std::fmt;
use std::io;

use http::StatusCode;

/// Status for errors outside the table; the response body carries the text.
pub const STATUS_UNKNOWN_ERROR: u16 = 490;

/// A domain error kind with an agreed status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    Eof,
    UnexpectedEof,
    ShortBuffer,
    ShortWrite,
    ClosedPipe,
    NoProgress,
    Unsupported,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::Unauthorized,
        ErrorCode::NotFound,
        ErrorCode::Eof,
        ErrorCode::UnexpectedEof,
        ErrorCode::ShortBuffer,
        ErrorCode::ShortWrite,
        ErrorCode::ClosedPipe,
        ErrorCode::NoProgress,
        ErrorCode::Unsupported,
    ];

    /// Numeric status code.
    pub fn code(self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Eof => 480,
            Self::UnexpectedEof => 481,
            Self::ShortBuffer => 482,
            Self::ShortWrite => 483,
            Self::ClosedPipe => 484,
            Self::NoProgress => 486,
            Self::Unsupported => 491,
        }
    }

    /// Status code as an `http` value.
    pub fn status(self) -> StatusCode {
        status_from_u16(self.code())
    }

    /// Look up the kind for a response status. `None` for anything outside
    /// the table, including [`STATUS_UNKNOWN_ERROR`].
    pub fn from_status(status: StatusCode) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == status.as_u16())
    }

    /// Classify a local I/O error for the response. `None` means the error has
    /// no agreed code and must be sent as [`STATUS_UNKNOWN_ERROR`].
    pub fn from_io(err: &io::Error) -> Option<Self> {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Some(Self::UnexpectedEof),
            io::ErrorKind::WriteZero => Some(Self::ShortWrite),
            io::ErrorKind::BrokenPipe => Some(Self::ClosedPipe),
            io::ErrorKind::Unsupported => Some(Self::Unsupported),
            _ => None,
        }
    }

    /// The `io::ErrorKind` a client surfaces for this code.
    pub fn io_kind(self) -> io::ErrorKind {
        match self {
            Self::Unauthorized => io::ErrorKind::PermissionDenied,
            Self::NotFound => io::ErrorKind::NotFound,
            Self::Eof | Self::UnexpectedEof => io::ErrorKind::UnexpectedEof,
            Self::ShortBuffer => io::ErrorKind::InvalidInput,
            Self::ShortWrite => io::ErrorKind::WriteZero,
            Self::ClosedPipe => io::ErrorKind::BrokenPipe,
            Self::NoProgress => io::ErrorKind::Other,
            Self::Unsupported => io::ErrorKind::Unsupported,
        }
    }

    /// Human-readable description.
    pub fn message(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized: wrong shared secret",
            Self::NotFound => "not found: unknown file",
            Self::Eof => "end of file",
            Self::UnexpectedEof => "unexpected end of file",
            Self::ShortBuffer => "short buffer",
            Self::ShortWrite => "short write",
            Self::ClosedPipe => "read/write on closed pipe",
            Self::NoProgress => "multiple read calls returned no data",
            Self::Unsupported => "unsupported operation",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The status sent for errors without an agreed code.
pub fn unknown_error_status() -> StatusCode {
    status_from_u16(STATUS_UNKNOWN_ERROR)
}

fn status_from_u16(code: u16) -> StatusCode {
    // Every code in the table is within 100..=999.
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
