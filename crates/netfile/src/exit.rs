use std::fmt;
use std::io;

use netfile_handle::HandleError;
use netfile_peer::PeerError;
use netfile_wire::WireError;

// Process exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Errors surfacing through `Read`/`Write` on a remote file still carry the
/// [`PeerError`] inside and are classified by it.
pub fn io_error(context: &str, err: io::Error) -> CliError {
    if let Some(peer) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<PeerError>())
    {
        return CliError::new(peer_code(peer), format!("{context}: {peer}"));
    }
    CliError::new(io_code(&err), format!("{context}: {err}"))
}

pub fn handle_error(context: &str, err: HandleError) -> CliError {
    match err {
        HandleError::Io(source) => io_error(context, source),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    CliError::new(USAGE, format!("{context}: {err}"))
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    CliError::new(peer_code(&err), format!("{context}: {err}"))
}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    }
}

fn peer_code(err: &PeerError) -> i32 {
    match err {
        PeerError::Handle(source) => io_code(source),
        PeerError::Unauthorized => PERMISSION_DENIED,
        PeerError::Http(inner) if inner.is_timeout() => TIMEOUT,
        PeerError::Http(_) | PeerError::Bind { .. } => TRANSPORT_ERROR,
        PeerError::Cancelled => TIMEOUT,
        PeerError::Protocol(_)
        | PeerError::Json(_)
        | PeerError::BodyLengthMismatch { .. }
        | PeerError::MalformedRequest(_) => DATA_INVALID,
        PeerError::Url(_) | PeerError::Wire(_) | PeerError::AlreadyRegistered(_) => USAGE,
        PeerError::NotFound(_)
        | PeerError::Unsupported(_)
        | PeerError::Remote { .. }
        | PeerError::UnknownRemote { .. } => FAILURE,
    }
}
