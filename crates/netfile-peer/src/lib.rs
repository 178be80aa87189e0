//! Serve local files over HTTP and use them remotely as if they were local.
//!
//! This is the layer applications use directly:
//! - [`FileServer`] binds a listener and exposes handles registered under a
//!   [`FileId`](netfile_wire::FileId)
//! - [`Registry`] and [`FileHandler`] are the server's bookkeeping and
//!   per-request logic, usable without the bundled listener
//! - [`RemoteFile`] is the client: `Read`, `Write`, `Seek`, stat and close
//!   over HTTP
//! - [`CancelToken`] scopes registrations and client calls

pub mod cancel;
pub mod config;
pub mod error;
pub mod handler;
pub mod listener;
pub mod registry;
pub mod remote;

pub use cancel::{CancelReason, CancelToken};
pub use config::{
    ClientConfig, ServerConfig, DEFAULT_MAX_RANGE_LENGTH, DEFAULT_POLL_INTERVAL, DEFAULT_WORKERS,
};
pub use error::{PeerError, Result};
pub use handler::{Body, FileHandler, FileRequest, FileResponse};
pub use listener::FileServer;
pub use registry::{HandleKind, Registry, SharedReader, SharedWriter};
pub use remote::RemoteFile;
