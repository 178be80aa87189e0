use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WireError};

/// Smallest transfer a ranged request may ask for.
pub const MIN_RANGE_LENGTH: u64 = 1;

/// Offset and length of one ranged read or write.
///
/// Wire format (`X-Range` header), both decimal:
/// ```text
/// <offset>-<length>
/// ```
/// Note the second number is a length, not an inclusive end as in the
/// standard `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// First byte of the transfer.
    pub offset: u64,
    /// Number of bytes requested (or transferred, on a response).
    pub length: u64,
}

impl ByteRange {
    /// Create a range.
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// One past the last byte covered.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// Parse a request header, enforcing a non-negative offset and a length of
    /// at least [`MIN_RANGE_LENGTH`].
    pub fn parse(value: &str) -> Result<Self> {
        let (offset, length) = split_signed(value)?;
        if offset < 0 {
            return Err(WireError::InvalidOffset(offset));
        }
        if length < MIN_RANGE_LENGTH as i64 {
            return Err(WireError::InvalidLength(length));
        }
        Ok(Self::new(offset as u64, length as u64))
    }

    /// Parse a response header. Zero lengths are legal here: a read at end of
    /// file transfers nothing.
    pub fn parse_response(value: &str) -> Result<Self> {
        let (offset, length) = split_signed(value)?;
        if offset < 0 {
            return Err(WireError::InvalidOffset(offset));
        }
        if length < 0 {
            return Err(WireError::InvalidLength(length));
        }
        Ok(Self::new(offset as u64, length as u64))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.offset, self.length)
    }
}

impl FromStr for ByteRange {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split `<int>-<int>`, where either number may carry its own leading minus.
fn split_signed(value: &str) -> Result<(i64, i64)> {
    let malformed = || WireError::MalformedRange(value.to_string());
    let trimmed = value.trim();

    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (offset, length) = rest.split_once('-').ok_or_else(malformed)?;
    if offset.is_empty() || !offset.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let offset: i64 = offset.parse().map_err(|_| malformed())?;
    let length: i64 = length.parse().map_err(|_| malformed())?;
    Ok((if negative { -offset } else { offset }, length))
}

/// Outcome of evaluating a standard `Range: bytes=...` header against a
/// resource of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytesRange {
    /// No usable range: serve the whole resource with 200.
    Whole,
    /// Serve `start..=end` with 206.
    Partial { start: u64, end: u64 },
    /// No byte of the resource satisfies the range: 416.
    Unsatisfiable,
}

impl BytesRange {
    /// `Content-Range` value for a partial response.
    pub fn content_range(&self, size: u64) -> Option<String> {
        match *self {
            Self::Whole => None,
            Self::Partial { start, end } => Some(format!("bytes {start}-{end}/{size}")),
            Self::Unsatisfiable => Some(format!("bytes */{size}")),
        }
    }
}

/// Evaluate a standard single-range header against `size`.
///
/// Supports `bytes=a-b`, `bytes=a-` and `bytes=-n`. Multi-range requests and
/// anything malformed fall back to [`BytesRange::Whole`].
pub fn resolve_bytes_range(header: Option<&str>, size: u64) -> BytesRange {
    let Some(spec) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return BytesRange::Whole;
    };
    if spec.contains(',') {
        return BytesRange::Whole;
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return BytesRange::Whole;
    };

    match (first.trim(), last.trim()) {
        ("", "") => BytesRange::Whole,
        ("", suffix) => match suffix.parse::<u64>() {
            Ok(0) => BytesRange::Unsatisfiable,
            Ok(_) if size == 0 => BytesRange::Unsatisfiable,
            Ok(n) => BytesRange::Partial {
                start: size.saturating_sub(n),
                end: size - 1,
            },
            Err(_) => BytesRange::Whole,
        },
        (first, last) => {
            let Ok(start) = first.parse::<u64>() else {
                return BytesRange::Whole;
            };
            let end = if last.is_empty() {
                u64::MAX
            } else {
                match last.parse::<u64>() {
                    Ok(end) if end >= start => end,
                    _ => return BytesRange::Whole,
                }
            };
            if start >= size {
                return BytesRange::Unsatisfiable;
            }
            BytesRange::Partial {
                start,
                end: end.min(size - 1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_range() {
        let range = ByteRange::parse("137-13").unwrap();
        assert_eq!(range, ByteRange::new(137, 13));
        assert_eq!(range.end(), 150);
        assert_eq!(range.to_string(), "137-13");
    }

    #[test]
    fn test_negative_offset_rejected() {
        assert!(matches!(
            ByteRange::parse("-5-10"),
            Err(WireError::InvalidOffset(-5))
        ));
    }

    #[test]
    fn test_short_length_rejected() {
        assert!(matches!(
            ByteRange::parse("0-0"),
            Err(WireError::InvalidLength(0))
        ));
        assert!(matches!(
            ByteRange::parse("4--2"),
            Err(WireError::InvalidLength(-2))
        ));
    }

    #[test]
    fn test_malformed_ranges() {
        for value in ["", "12", "a-1", "1-b", "1 2", "-", "--1"] {
            assert!(
                matches!(ByteRange::parse(value), Err(WireError::MalformedRange(_))),
                "{value:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_response_range_allows_zero_length() {
        assert_eq!(
            ByteRange::parse_response("500-0").unwrap(),
            ByteRange::new(500, 0)
        );
    }

    #[test]
    fn test_bytes_range_forms() {
        assert_eq!(
            resolve_bytes_range(Some("bytes=0-9"), 100),
            BytesRange::Partial { start: 0, end: 9 }
        );
        assert_eq!(
            resolve_bytes_range(Some("bytes=90-"), 100),
            BytesRange::Partial { start: 90, end: 99 }
        );
        assert_eq!(
            resolve_bytes_range(Some("bytes=-10"), 100),
            BytesRange::Partial { start: 90, end: 99 }
        );
        assert_eq!(
            resolve_bytes_range(Some("bytes=-500"), 100),
            BytesRange::Partial { start: 0, end: 99 }
        );
        assert_eq!(
            resolve_bytes_range(Some("bytes=50-500"), 100),
            BytesRange::Partial { start: 50, end: 99 }
        );
    }

    #[test]
    fn test_bytes_range_fallbacks() {
        assert_eq!(resolve_bytes_range(None, 100), BytesRange::Whole);
        assert_eq!(
            resolve_bytes_range(Some("bytes=0-1,5-6"), 100),
            BytesRange::Whole
        );
        assert_eq!(resolve_bytes_range(Some("items=0-1"), 100), BytesRange::Whole);
        assert_eq!(resolve_bytes_range(Some("bytes=9-2"), 100), BytesRange::Whole);
        assert_eq!(
            resolve_bytes_range(Some("bytes=100-"), 100),
            BytesRange::Unsatisfiable
        );
        assert_eq!(
            resolve_bytes_range(Some("bytes=-0"), 100),
            BytesRange::Unsatisfiable
        );
    }

    #[test]
    fn test_content_range_values() {
        let partial = BytesRange::Partial { start: 2, end: 4 };
        assert_eq!(partial.content_range(10).unwrap(), "bytes 2-4/10");
        assert_eq!(
            BytesRange::Unsatisfiable.content_range(10).unwrap(),
            "bytes */10"
        );
        assert!(BytesRange::Whole.content_range(10).is_none());
    }
}
