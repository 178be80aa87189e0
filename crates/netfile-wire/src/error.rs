/// Errors produced while decoding wire values.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The range header is not `<offset>-<length>`.
    #[error("error parsing range header {0:?}")]
    MalformedRange(String),

    /// The range starts before byte zero.
    #[error("invalid offset {0}")]
    InvalidOffset(i64),

    /// The range is shorter than the minimum transfer size.
    #[error("invalid buffer length {0}")]
    InvalidLength(i64),

    /// The identifier cannot be used as a URL path segment.
    #[error("invalid file id {0:?}")]
    InvalidFileId(String),
}

pub type Result<T> = std::result::Result<T, WireError>;
