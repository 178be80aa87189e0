//! Client side: a remote handle that behaves like a local file.
//!
//! Every call is one HTTP request; the only state kept locally is the
//! sequential offset used by `Read`, `Write` and `Seek`.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::Duration;

use http::header::USER_AGENT;
use http::{Method, StatusCode};
use netfile_handle::{FileInfo, ReadAt, WriteAt};
use netfile_wire::headers::{SHARED_SECRET_PARAM, X_RANGE, X_SHARED_SECRET};
use netfile_wire::{ByteRange, ErrorCode, FileId};
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use tracing::{debug, trace};
use url::Url;

use crate::cancel::CancelToken;
use crate::config::ClientConfig;
use crate::error::{PeerError, Result};

/// Bytes of an unknown-error body kept for the error message.
const MAX_ERROR_BODY: u64 = 512;

/// A file exposed by a remote `FileServer`.
///
/// Implements `Read`, `Write` and `Seek` over a local offset, and
/// [`ReadAt`]/[`WriteAt`] for positioned access that leaves the offset alone.
/// `SeekFrom::End` costs one stat request; other seeks are local.
///
/// Without a timeout in [`ClientConfig`] or a [`CancelToken`], a hung server
/// blocks the caller indefinitely.
pub struct RemoteFile {
    client: Client,
    base: Url,
    file_id: FileId,
    secret: String,
    offset: u64,
    config: ClientConfig,
    cancel: Option<CancelToken>,
}

impl RemoteFile {
    /// Open `file_id` on the server at `base_url` with a default client.
    pub fn new(base_url: &str, file_id: FileId, secret: impl Into<String>) -> Result<Self> {
        let client = Client::builder().build()?;
        Self::with_client(client, base_url, file_id, secret)
    }

    /// Open `file_id` using an existing client (and its connection pool).
    pub fn with_client(
        client: Client,
        base_url: &str,
        file_id: FileId,
        secret: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base: Url::parse(base_url)?,
            file_id,
            secret: secret.into(),
            offset: 0,
            config: ClientConfig::default(),
            cancel: None,
        })
    }

    /// Override request settings.
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Scope every request to `token`: once it fires, calls fail with
    /// [`PeerError::Cancelled`], and a pending deadline caps request timeouts.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    pub fn shared_secret(&self) -> &str {
        &self.secret
    }

    /// Current sequential offset.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// `<base>/<file-id>`.
    pub fn url(&self) -> Url {
        let mut url = self.base.clone();
        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            self.file_id.to_segment()
        );
        url.set_path(&path);
        url.set_query(None);
        url
    }

    /// URL for a plain GET download, secret included.
    pub fn get_url(&self) -> Url {
        self.url_with_secret()
    }

    /// URL for a single plain PUT upload, secret included.
    pub fn put_url(&self) -> Url {
        self.url_with_secret()
    }

    fn url_with_secret(&self) -> Url {
        let mut url = self.url();
        url.query_pairs_mut()
            .append_pair(SHARED_SECRET_PARAM, &self.secret);
        url
    }

    /// Fetch fresh metadata.
    pub fn stat(&self) -> Result<FileInfo> {
        let response = self.send(self.request(Method::OPTIONS))?;
        let response = self.expect_status(response, StatusCode::OK)?;
        Ok(response.json::<FileInfo>()?)
    }

    /// Ask the server to close and forget the file.
    pub fn close(&self) -> Result<()> {
        let response = self.send(self.request(Method::DELETE))?;
        self.expect_status(response, StatusCode::NO_CONTENT)?;
        debug!(file_id = %self.file_id, "closed remote file");
        Ok(())
    }

    /// Replace content from the server-side position with everything `reader`
    /// yields, in one PUT.
    pub fn put_from<R>(&self, reader: R) -> Result<()>
    where
        R: Read + Send + 'static,
    {
        let request = self.request(Method::PUT).body(Body::new(reader));
        let response = self.send(request)?;
        self.expect_status(response, StatusCode::NO_CONTENT)?;
        Ok(())
    }

    /// Read into `buf` from `offset`. Returns fewer bytes than asked only at
    /// end of file; `Ok(0)` means `offset` is at or past the end.
    pub fn read_range(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let requested = ByteRange::new(offset, buf.len() as u64);
        let request = self
            .request(Method::GET)
            .header(X_RANGE, requested.to_string());
        let response = self.send(request)?;

        if ErrorCode::from_status(response.status()) == Some(ErrorCode::Eof) {
            return Ok(0);
        }
        let mut response = self.expect_status(response, StatusCode::PARTIAL_CONTENT)?;

        if let Some(served) = response_range(&response)? {
            if served.offset != offset {
                return Err(PeerError::Protocol(format!(
                    "requested range {requested}, server sent {served}"
                )));
            }
        }

        let mut filled = 0;
        while filled < buf.len() {
            match response.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(PeerError::Handle(err)),
            }
        }
        trace!(file_id = %self.file_id, offset, requested = buf.len(), filled, "read range");
        Ok(filled)
    }

    /// Write all of `buf` at `offset`.
    ///
    /// The server's acknowledged range must match the request exactly;
    /// anything else is a [`PeerError::Protocol`] error.
    pub fn write_range(&self, buf: &[u8], offset: u64) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let requested = ByteRange::new(offset, buf.len() as u64);
        let request = self
            .request(Method::PATCH)
            .header(X_RANGE, requested.to_string())
            .body(buf.to_vec());
        let response = self.send(request)?;
        let response = self.expect_status(response, StatusCode::NO_CONTENT)?;

        match response_range(&response)? {
            Some(acked) if acked == requested => {
                trace!(file_id = %self.file_id, offset, length = buf.len(), "wrote range");
                Ok(buf.len())
            }
            Some(acked) => Err(PeerError::Protocol(format!(
                "wrote range {requested}, server acknowledged {acked}"
            ))),
            None => Err(PeerError::Protocol(
                "write response carries no range".to_string(),
            )),
        }
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.client
            .request(method, self.url())
            .header(X_SHARED_SECRET, self.secret.as_str())
            .header(USER_AGENT, self.config.user_agent.as_str())
    }

    fn send(&self, mut request: RequestBuilder) -> Result<Response> {
        if self.cancelled() {
            return Err(PeerError::Cancelled);
        }
        if let Some(timeout) = self.timeout() {
            request = request.timeout(timeout);
        }
        request.send().map_err(|err| {
            if self.cancelled() {
                PeerError::Cancelled
            } else {
                PeerError::Http(err)
            }
        })
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// The tighter of the configured timeout and the token's remaining time.
    fn timeout(&self) -> Option<Duration> {
        let remaining = self.cancel.as_ref().and_then(CancelToken::remaining);
        match (self.config.timeout, remaining) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Pass `response` through if it has `expected` status, otherwise decode
    /// the error it carries.
    fn expect_status(&self, response: Response, expected: StatusCode) -> Result<Response> {
        let status = response.status();
        if status == expected {
            return Ok(response);
        }

        match ErrorCode::from_status(status) {
            Some(ErrorCode::NotFound) => Err(PeerError::NotFound(self.file_id.clone())),
            Some(ErrorCode::Unauthorized) => Err(PeerError::Unauthorized),
            Some(code) => Err(PeerError::Remote {
                code,
                status: status.as_u16(),
            }),
            None if status == StatusCode::FORBIDDEN => {
                Err(PeerError::Unsupported("disabled by server policy"))
            }
            None if status == StatusCode::BAD_REQUEST => {
                Err(PeerError::MalformedRequest(error_body(response)))
            }
            None => Err(PeerError::UnknownRemote {
                status: status.as_u16(),
                message: error_body(response),
            }),
        }
    }
}

/// First bytes of an error response, trimmed.
fn error_body(response: Response) -> String {
    let mut message = String::new();
    if let Err(err) = response.take(MAX_ERROR_BODY).read_to_string(&mut message) {
        return format!("error body unreadable: {err}");
    }
    message.trim().to_string()
}

fn response_range(response: &Response) -> Result<Option<ByteRange>> {
    let Some(value) = response.headers().get(X_RANGE) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| PeerError::Protocol("non-ascii range header".to_string()))?;
    Ok(Some(ByteRange::parse_response(value)?))
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile")
            .field("url", &self.url().as_str())
            .field("offset", &self.offset)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Read for RemoteFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // Every call asks the server; another client may have extended the file.
        let n = self.read_range(buf, self.offset)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl Write for RemoteFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.write_range(buf, self.offset)?;
        self.offset += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for RemoteFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => (offset, 0),
            SeekFrom::Current(delta) => (self.offset, delta),
            SeekFrom::End(delta) => (self.stat()?.size, delta),
        };
        let offset = base.checked_add_signed(delta).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;
        self.offset = offset;
        Ok(offset)
    }
}

impl ReadAt for RemoteFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(self.read_range(buf, offset)?)
    }
}

impl WriteAt for RemoteFile {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        Ok(self.write_range(buf, offset)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(base: &str, id: &str) -> RemoteFile {
        RemoteFile::with_client(
            Client::new(),
            base,
            FileId::new(id).expect("id should be valid"),
            "top secret",
        )
        .expect("remote should build")
    }

    #[test]
    fn urls_join_base_and_escaped_id() {
        let file = remote("http://127.0.0.1:9000/files/", "a b");
        assert_eq!(file.url().as_str(), "http://127.0.0.1:9000/files/a%20b");
        assert_eq!(
            file.get_url().as_str(),
            "http://127.0.0.1:9000/files/a%20b?shared-secret=top+secret"
        );
        assert_eq!(file.put_url(), file.get_url());
    }

    #[test]
    fn seeks_are_local_except_end() {
        let mut file = remote("http://127.0.0.1:9", "f");
        assert_eq!(file.seek(SeekFrom::Start(10)).expect("seek start"), 10);
        assert_eq!(file.seek(SeekFrom::Current(-4)).expect("seek current"), 6);
        assert!(file.seek(SeekFrom::Current(-7)).is_err());
        assert_eq!(file.position(), 6);
    }

    #[test]
    fn cancelled_token_blocks_requests() {
        let token = CancelToken::new();
        token.cancel();
        let file = remote("http://127.0.0.1:9", "f").with_cancel(token);
        assert!(matches!(file.stat(), Err(PeerError::Cancelled)));
        assert!(matches!(
            file.read_range(&mut [0u8; 4], 0),
            Err(PeerError::Cancelled)
        ));
    }

    #[test]
    fn timeout_takes_the_tighter_bound() {
        let token = CancelToken::with_timeout(Duration::from_secs(3600));
        let file = remote("http://127.0.0.1:9", "f")
            .with_config(ClientConfig {
                timeout: Some(Duration::from_secs(5)),
                ..ClientConfig::default()
            })
            .with_cancel(token);
        assert_eq!(file.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn empty_buffers_skip_the_network() {
        let file = remote("http://127.0.0.1:9", "f");
        assert_eq!(file.read_range(&mut [], 0).expect("empty read"), 0);
        assert_eq!(file.write_range(&[], 0).expect("empty write"), 0);
    }
}
