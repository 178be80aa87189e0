//! Expose local files over HTTP and use them remotely as if they were local.
//!
//! A server registers open files under opaque identifiers; clients read,
//! write, seek, stat and close them with one HTTP request per call.
//!
//! # Crate Structure
//!
//! - [`handle`]: file-handle traits, local files, the offset-caching multiplexer
//! - [`wire`]: range header codec, error status table, identifiers and secrets
//! - [`peer`]: the HTTP server, exposure registry and remote file client
//!   (behind the `peer` feature)

/// Re-export handle types.
pub mod handle {
    pub use netfile_handle::*;
}

/// Re-export wire types.
pub mod wire {
    pub use netfile_wire::*;
}

/// Re-export server and client types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use netfile_peer::*;
}
