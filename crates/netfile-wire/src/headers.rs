//! Custom header and query parameter names.
//!
//! Header names are lowercase so they can be built as `HeaderName` constants;
//! HTTP header matching is case-insensitive, so `X-Range` on the wire matches.

use http::HeaderName;

/// `<offset>-<length>` of a ranged read or write, on request and response.
pub const X_RANGE: HeaderName = HeaderName::from_static("x-range");

/// Shared secret authenticating every request.
pub const X_SHARED_SECRET: HeaderName = HeaderName::from_static("x-sharedsecret");

/// File size reported by a stat response.
///
/// The real `Content-Length` describes the JSON body, not the file.
pub const X_CONTENT_LENGTH: HeaderName = HeaderName::from_static("x-content-length");

/// Query parameter accepted in place of [`X_SHARED_SECRET`], for plain GET
/// and PUT links.
pub const SHARED_SECRET_PARAM: &str = "shared-secret";
