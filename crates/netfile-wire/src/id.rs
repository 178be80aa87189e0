use std::borrow::Borrow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WireError};

/// Bytes of entropy in a random file id.
const FILE_ID_BYTES: usize = 16;

/// Default entropy for [`random_shared_secret`].
pub const DEFAULT_SECRET_BYTES: usize = 32;

/// Characters escaped inside one URL path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Opaque identifier of an exposed handle, the single path segment of every
/// request URL.
///
/// Any non-empty string without `/` is accepted. Clients percent-encode the
/// id when building a URL and the server decodes it, so ids containing `%` or
/// spaces survive the trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Validate and wrap an identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.contains('/') {
            return Err(WireError::InvalidFileId(id));
        }
        Ok(Self(id))
    }

    /// 16 random bytes, URL-safe base64 without padding.
    pub fn random() -> Self {
        let mut buf = [0u8; FILE_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut buf);
        Self(URL_SAFE_NO_PAD.encode(buf))
    }

    /// Derive an identifier from a path by escaping it into one segment.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy();
        let escaped = utf8_percent_encode(&path, PATH_SEGMENT).to_string();
        if escaped.is_empty() {
            Self::random()
        } else {
            Self(escaped)
        }
    }

    /// Decode a raw request path segment.
    pub fn from_segment(segment: &str) -> Result<Self> {
        let decoded = percent_decode_str(segment)
            .decode_utf8()
            .map_err(|_| WireError::InvalidFileId(segment.to_string()))?;
        Self::new(decoded.into_owned())
    }

    /// Percent-encode for use as a URL path segment.
    pub fn to_segment(&self) -> String {
        utf8_percent_encode(&self.0, PATH_SEGMENT).to_string()
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FileId {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl Borrow<str> for FileId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `bytes` random bytes, URL-safe base64 without padding.
pub fn random_shared_secret(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids_are_url_safe_and_unique() {
        let a = FileId::random();
        let b = FileId::random();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 22);
        assert!(a
            .as_str()
            .bytes()
            .all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_'));
        assert_eq!(a.to_segment(), a.as_str());
    }

    #[test]
    fn test_from_path_escapes_separators() {
        let id = FileId::from_path("/tmp/some dir/data.bin");
        assert!(!id.as_str().contains('/'));
        assert_eq!(id.as_str(), "%2Ftmp%2Fsome%20dir%2Fdata.bin");
    }

    #[test]
    fn test_segment_roundtrip_preserves_percent() {
        let id = FileId::from_path("a/b");
        let segment = id.to_segment();
        assert_eq!(segment, "a%252Fb");
        assert_eq!(FileId::from_segment(&segment).unwrap(), id);
    }

    #[test]
    fn test_invalid_ids_rejected() {
        assert!(FileId::new("").is_err());
        assert!(FileId::new("a/b").is_err());
        assert!(FileId::from_segment("a%2Fb").is_err());
        assert!(FileId::from_segment("%FF").is_err());
    }

    #[test]
    fn test_secret_length_covers_entropy() {
        for bytes in [1, 2, 3, 16, 32, 33] {
            let secret = random_shared_secret(bytes);
            assert!(secret.len() >= bytes);
            assert_eq!(URL_SAFE_NO_PAD.decode(&secret).unwrap().len(), bytes);
        }
        assert!(random_shared_secret(0).is_empty());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = FileId::new("f1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"f1\"");
    }
}
