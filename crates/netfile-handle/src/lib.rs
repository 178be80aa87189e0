//! Storage handle capabilities for netfile.
//!
//! This is the lowest layer of netfile. It describes what the server needs
//! from a local byte store (positioned read or write, seek, stat, close) and
//! provides the [`Multiplexer`] that lets many logical cursors share one
//! seekable handle:
//! - [`Handle`], [`ReadHandle`], [`WriteHandle`]: capability traits
//! - [`LocalFile`]: a named local file implementing all capabilities
//! - [`Multiplexer`] / [`Cursor`]: offset-caching access serialization
//! - [`ReadAtReader`] / [`WriteAtWriter`]: sequential views over positioned I/O

pub mod adapters;
pub mod error;
pub mod info;
pub mod local;
pub mod mux;
pub mod traits;

pub use adapters::{ReadAt, ReadAtReader, WriteAt, WriteAtWriter};
pub use error::{HandleError, Result};
pub use info::FileInfo;
pub use local::LocalFile;
pub use mux::{Cursor, Multiplexer};
pub use traits::{Handle, ReadHandle, WriteHandle};
