//! Wire vocabulary shared by the netfile server and client.
//!
//! Every positioned operation is one HTTP request against `/<file-id>`:
//! - [`ByteRange`] is the `X-Range: <offset>-<length>` codec for ranged reads
//!   and writes
//! - [`ErrorCode`] maps I/O error kinds onto the 4xx status codes both sides
//!   agree on (480-491 plus 401 and 404)
//! - [`FileId`] and [`random_shared_secret`] produce URL-safe identifiers and
//!   secrets
//! - [`headers`] names the custom headers and query parameters

pub mod error;
pub mod headers;
pub mod id;
pub mod range;
pub mod status;

pub use error::{Result, WireError};
pub use id::{random_shared_secret, FileId, DEFAULT_SECRET_BYTES};
pub use range::{resolve_bytes_range, ByteRange, BytesRange, MIN_RANGE_LENGTH};
pub use status::{unknown_error_status, ErrorCode, STATUS_UNKNOWN_ERROR};
