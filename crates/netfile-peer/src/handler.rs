//! Per-request protocol logic, independent of the HTTP server library.
//!
//! Request flow:
//! 1. The path must start with the configured prefix (400 otherwise).
//! 2. The shared secret, from `X-SharedSecret` or `?shared-secret=`, must
//!    match (401 otherwise). Nothing touches a handle before this passes.
//! 3. The rest of the path must be exactly `/<file-id>` (400 otherwise).
//! 4. Route by method: OPTIONS stat, GET read, PATCH ranged write, PUT full
//!    write, DELETE close, anything else 405.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT_RANGES, ALLOW, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use netfile_wire::headers::{SHARED_SECRET_PARAM, X_CONTENT_LENGTH, X_RANGE, X_SHARED_SECRET};
use netfile_wire::{resolve_bytes_range, unknown_error_status, ByteRange, BytesRange, FileId};
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::PeerError;
use crate::registry::Registry;

const OCTET_STREAM: &str = "application/octet-stream";
const ALLOWED_METHODS: &str = "OPTIONS, GET, PATCH, PUT, DELETE";

/// An inbound request, as handed over by the listener.
pub struct FileRequest<'a> {
    pub method: Method,
    /// Raw request path, still percent-encoded, without the query.
    pub path: String,
    /// Raw query string, without the `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: &'a mut dyn Read,
}

impl<'a> FileRequest<'a> {
    /// Build a request from a raw request target such as `/f1?shared-secret=x`.
    pub fn new(method: Method, target: &str, headers: HeaderMap, body: &'a mut dyn Read) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            headers,
            body,
        }
    }

    fn header(&self, name: &http::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn shared_secret(&self) -> String {
        if let Some(secret) = self.header(&X_SHARED_SECRET).filter(|s| !s.is_empty()) {
            return secret.to_string();
        }
        self.query
            .as_deref()
            .and_then(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == SHARED_SECRET_PARAM)
                    .map(|(_, value)| value.into_owned())
            })
            .unwrap_or_default()
    }
}

impl fmt::Debug for FileRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Response payload.
pub enum Body {
    Empty,
    Bytes(Bytes),
    /// Exactly `length` bytes pulled from `reader` while the response is sent.
    Stream {
        reader: Box<dyn Read + Send>,
        length: u64,
    },
}

impl Body {
    /// Number of bytes the body will produce.
    pub fn len(&self) -> u64 {
        match self {
            Self::Empty => 0,
            Self::Bytes(bytes) => bytes.len() as u64,
            Self::Stream { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the body into memory.
    pub fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Bytes(bytes) => Ok(bytes),
            Self::Stream { reader, length } => {
                let mut buf = Vec::new();
                reader.take(length).read_to_end(&mut buf)?;
                Ok(buf.into())
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Stream { length, .. } => write!(f, "Stream({length} bytes)"),
        }
    }
}

/// An outbound response, sent by the listener.
#[derive(Debug)]
pub struct FileResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl FileResponse {
    /// Empty response with `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    /// Plain-text response, used for 400 and unknown-error bodies.
    pub fn text(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .with_body(Body::Bytes(Bytes::from(message.into())))
    }

    pub fn with_header(mut self, name: http::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Translate an error into its wire representation.
    ///
    /// Request errors become 400 with the reason as text; errors in the shared
    /// table become their status with no body; everything else becomes the
    /// unknown-error status with the error text as the body.
    pub fn from_error(err: &PeerError) -> Self {
        match err {
            PeerError::MalformedRequest(_)
            | PeerError::BodyLengthMismatch { .. }
            | PeerError::Wire(_) => Self::text(StatusCode::BAD_REQUEST, err.to_string()),
            _ => match err.code() {
                Some(code) => Self::new(code.status()),
                None => {
                    let message = match err {
                        PeerError::Handle(inner) => inner.to_string(),
                        other => other.to_string(),
                    };
                    Self::text(unknown_error_status(), message)
                }
            },
        }
    }
}

fn header_value(value: impl fmt::Display) -> HeaderValue {
    // Only called with numeric and range values, which are always valid.
    HeaderValue::from_str(&value.to_string()).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Serves one request at a time against a shared [`Registry`].
///
/// Holds no per-request state; every worker thread shares one instance.
#[derive(Debug)]
pub struct FileHandler {
    config: ServerConfig,
    registry: Arc<Registry>,
}

impl FileHandler {
    /// Handler with a fresh registry whose close policy follows `config`.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(Registry::new(config.close_readers, config.close_writers));
        Self::with_registry(config, registry)
    }

    /// Handler over an existing registry.
    pub fn with_registry(config: ServerConfig, registry: Arc<Registry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Answer one request.
    pub fn handle(&self, mut req: FileRequest<'_>) -> FileResponse {
        let prefix = self.config.url_prefix.as_str();
        let Some(rest) = req.path.strip_prefix(prefix) else {
            debug!(path = %req.path, prefix, "request outside url prefix");
            return FileResponse::new(StatusCode::BAD_REQUEST);
        };

        if req.shared_secret() != self.config.shared_secret {
            debug!(path = %req.path, "rejected request with wrong shared secret");
            return FileResponse::new(StatusCode::UNAUTHORIZED);
        }

        let id = match parse_file_id(rest) {
            Ok(id) => id,
            Err(err) => {
                debug!(path = %req.path, error = %err, "invalid request path");
                return FileResponse::from_error(&err);
            }
        };

        let method = req.method.clone();
        let result = match method {
            Method::OPTIONS => self.stat(&id),
            Method::GET => self.read(&id, &req),
            Method::PATCH => self.write_range(&id, &mut req),
            Method::PUT => self.write_full(&id, &mut req),
            Method::DELETE => Ok(self.close(&id)),
            _ => Ok(FileResponse::new(StatusCode::METHOD_NOT_ALLOWED)
                .with_header(ALLOW, HeaderValue::from_static(ALLOWED_METHODS))),
        };

        let response = result.unwrap_or_else(|err| {
            debug!(file_id = %id, %method, error = %err, "request failed");
            FileResponse::from_error(&err)
        });
        debug!(file_id = %id, %method, status = response.status.as_u16(), "handled request");
        response
    }

    fn stat(&self, id: &FileId) -> Result<FileResponse, PeerError> {
        if !self.config.allow_stat {
            return Err(PeerError::Unsupported("stat"));
        }

        let mut info = self.registry.stat(id.as_str())?;
        if !self.config.disclose_filenames {
            info.name = id.to_string();
        }

        let body = serde_json::to_vec(&info)?;
        Ok(FileResponse::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_header(X_CONTENT_LENGTH, header_value(info.size))
            .with_body(Body::Bytes(body.into())))
    }

    fn read(&self, id: &FileId, req: &FileRequest<'_>) -> Result<FileResponse, PeerError> {
        let reader = self
            .registry
            .reader(id.as_str())
            .ok_or_else(|| PeerError::NotFound(id.clone()))?;

        if !req.headers.contains_key(&X_RANGE) && self.config.allow_full_get {
            return self.read_full(reader, req);
        }
        let value = match req.headers.get(&X_RANGE) {
            Some(value) => value.to_str().map_err(|_| {
                PeerError::MalformedRequest("range header is not valid ascii".to_string())
            })?,
            None => "",
        };
        let range = ByteRange::parse(value)?;
        self.check_length(range)?;

        let mut cursor = reader.cursor();
        cursor.seek(SeekFrom::Start(range.offset))?;

        let mut buf = Vec::with_capacity(range.length.min(64 * 1024) as usize);
        (&mut cursor).take(range.length).read_to_end(&mut buf)?;

        let served = ByteRange::new(range.offset, buf.len() as u64);
        debug!(file_id = %id, offset = served.offset, length = served.length, "served range");
        Ok(FileResponse::new(StatusCode::PARTIAL_CONTENT)
            .with_header(X_RANGE, header_value(served))
            .with_header(CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM))
            .with_body(Body::Bytes(buf.into())))
    }

    /// Plain download honoring a single standard `Range` header.
    fn read_full(
        &self,
        reader: crate::registry::SharedReader,
        req: &FileRequest<'_>,
    ) -> Result<FileResponse, PeerError> {
        let mut cursor = reader.cursor();
        let size = cursor.seek(SeekFrom::End(0))?;

        let range = resolve_bytes_range(req.header(&RANGE), size);
        let (status, start, length) = match range {
            BytesRange::Whole => (StatusCode::OK, 0, size),
            BytesRange::Partial { start, end } => {
                (StatusCode::PARTIAL_CONTENT, start, end - start + 1)
            }
            BytesRange::Unsatisfiable => {
                let mut response = FileResponse::new(StatusCode::RANGE_NOT_SATISFIABLE);
                if let Some(content_range) = range.content_range(size) {
                    response = response.with_header(CONTENT_RANGE, header_value(content_range));
                }
                return Ok(response);
            }
        };

        cursor.seek(SeekFrom::Start(start))?;
        let mut response = FileResponse::new(status)
            .with_header(ACCEPT_RANGES, HeaderValue::from_static("bytes"))
            .with_header(CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM))
            .with_body(Body::Stream {
                reader: Box::new(cursor),
                length,
            });
        if let Some(content_range) = range.content_range(size) {
            response = response.with_header(CONTENT_RANGE, header_value(content_range));
        }
        Ok(response)
    }

    fn write_range(
        &self,
        id: &FileId,
        req: &mut FileRequest<'_>,
    ) -> Result<FileResponse, PeerError> {
        let range = ByteRange::parse(req.header(&X_RANGE).unwrap_or_default())?;
        self.check_length(range)?;

        let writer = self
            .registry
            .writer(id.as_str())
            .ok_or_else(|| PeerError::NotFound(id.clone()))?;

        // Buffer one byte past the declared length to detect oversized bodies
        // before anything reaches the handle.
        let mut buf = Vec::with_capacity(range.length.min(64 * 1024) as usize);
        (&mut req.body)
            .take(range.length + 1)
            .read_to_end(&mut buf)
            .map_err(|err| PeerError::MalformedRequest(format!("reading request body: {err}")))?;
        if buf.len() as u64 != range.length {
            return Err(PeerError::BodyLengthMismatch {
                declared: range.length,
                received: buf.len() as u64,
            });
        }

        let mut cursor = writer.cursor();
        cursor.seek(SeekFrom::Start(range.offset))?;
        cursor.write_all(&buf)?;
        cursor.flush()?;

        debug!(file_id = %id, offset = range.offset, length = range.length, "wrote range");
        Ok(FileResponse::new(StatusCode::NO_CONTENT).with_header(X_RANGE, header_value(range)))
    }

    fn write_full(&self, id: &FileId, req: &mut FileRequest<'_>) -> Result<FileResponse, PeerError> {
        if !self.config.allow_put {
            return Ok(FileResponse::new(StatusCode::FORBIDDEN));
        }
        let writer = self
            .registry
            .writer(id.as_str())
            .ok_or_else(|| PeerError::NotFound(id.clone()))?;

        let body = &mut req.body;
        let written = writer.with_handle_mut(|handle| {
            let n = io::copy(body, handle)?;
            handle.flush()?;
            Ok::<_, io::Error>(n)
        })?;

        debug!(file_id = %id, bytes = written, "wrote full body");
        Ok(FileResponse::new(StatusCode::NO_CONTENT))
    }

    fn close(&self, id: &FileId) -> FileResponse {
        if !self.config.allow_close {
            return FileResponse::new(StatusCode::FORBIDDEN);
        }
        match self.registry.close(id.as_str()) {
            0 => FileResponse::new(StatusCode::NOT_FOUND),
            closed => {
                debug!(file_id = %id, closed, "closed by request");
                FileResponse::new(StatusCode::NO_CONTENT)
            }
        }
    }

    fn check_length(&self, range: ByteRange) -> Result<(), PeerError> {
        if range.length > self.config.max_range_length {
            warn!(
                length = range.length,
                max = self.config.max_range_length,
                "rejected oversized range"
            );
            return Err(PeerError::MalformedRequest(format!(
                "range length {} exceeds maximum {}",
                range.length, self.config.max_range_length
            )));
        }
        Ok(())
    }
}

/// `/<segment>` with exactly one non-empty segment.
fn parse_file_id(rest: &str) -> Result<FileId, PeerError> {
    let segment = rest
        .strip_prefix('/')
        .filter(|segment| !segment.is_empty() && !segment.contains('/'))
        .ok_or_else(|| PeerError::MalformedRequest(format!("expected /<file-id>, got {rest:?}")))?;
    Ok(FileId::from_segment(segment)?)
}
