use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use netfile_handle::{ReadHandle, WriteHandle};
use netfile_wire::FileId;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::config::ServerConfig;
use crate::error::{PeerError, Result};
use crate::handler::{Body, FileHandler, FileRequest, FileResponse};
use crate::registry::Registry;

/// HTTP server exposing registered handles.
///
/// A pool of worker threads pulls requests off one listening socket and runs
/// each through a shared [`FileHandler`]. Dropping the server stops and joins
/// the workers.
pub struct FileServer {
    server: Arc<tiny_http::Server>,
    handler: Arc<FileHandler>,
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    workers: Vec<JoinHandle<()>>,
}

impl FileServer {
    /// Bind to `addr` (for example `127.0.0.1:0`) and start serving.
    pub fn bind(addr: &str, config: ServerConfig) -> Result<Self> {
        let server = tiny_http::Server::http(addr).map_err(|source| PeerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| PeerError::Bind {
                addr: addr.to_string(),
                source: "listener has no IP address".into(),
            })?;

        let workers = config.workers.max(1);
        let poll_interval = config.poll_interval;
        let mut this = Self {
            server: Arc::new(server),
            handler: Arc::new(FileHandler::new(config)),
            addr: local,
            running: Arc::new(AtomicBool::new(true)),
            active: Arc::new(AtomicUsize::new(0)),
            workers: Vec::with_capacity(workers),
        };

        for index in 0..workers {
            let server = Arc::clone(&this.server);
            let handler = Arc::clone(&this.handler);
            let running = Arc::clone(&this.running);
            let active = Arc::clone(&this.active);
            active.fetch_add(1, Ordering::AcqRel);
            // On spawn failure `this` drops and joins the workers already started.
            let worker = thread::Builder::new()
                .name(format!("netfile-worker-{index}"))
                .spawn(move || {
                    while running.load(Ordering::Acquire) {
                        match server.recv_timeout(poll_interval) {
                            Ok(Some(request)) => serve(&handler, request),
                            Ok(None) => {}
                            Err(err) => {
                                let remaining = active.fetch_sub(1, Ordering::AcqRel) - 1;
                                error!(error = %err, remaining, "listener failed, stopping worker");
                                return;
                            }
                        }
                    }
                    active.fetch_sub(1, Ordering::AcqRel);
                });
            let worker = match worker {
                Ok(worker) => worker,
                Err(err) => {
                    this.active.fetch_sub(1, Ordering::AcqRel);
                    return Err(err.into());
                }
            };
            this.workers.push(worker);
        }

        info!(addr = %local, workers, "file server listening");
        Ok(this)
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL clients should use, including the configured prefix.
    pub fn base_url(&self) -> String {
        format!("http://{}{}", self.addr, self.handler.config().url_prefix)
    }

    /// Workers still pulling requests. Drops below the configured count only
    /// when the listener fails or after [`FileServer::shutdown`].
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ServerConfig {
        self.handler.config()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.handler.registry()
    }

    /// Expose `handle` for reading. See [`Registry::register_reader`].
    pub fn serve_reader(
        &self,
        id: FileId,
        handle: impl ReadHandle + 'static,
        cancel: Option<CancelToken>,
    ) -> Result<()> {
        self.registry().register_reader(id, handle, cancel)
    }

    /// Expose `handle` for writing. See [`Registry::register_writer`].
    pub fn serve_writer(
        &self,
        id: FileId,
        handle: impl WriteHandle + 'static,
        cancel: Option<CancelToken>,
    ) -> Result<()> {
        self.registry().register_writer(id, handle, cancel)
    }

    /// Remove the handles under `id`. See [`Registry::close`].
    pub fn close(&self, id: &str) -> usize {
        self.registry().close(id)
    }

    /// Stop accepting work and join every worker. Idempotent.
    ///
    /// Requests already being answered run to completion; registered handles
    /// stay registered.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.running.store(false, Ordering::Release);
        self.server.unblock();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        info!(addr = %self.addr, "file server stopped");
    }
}

impl Drop for FileServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FileServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileServer")
            .field("addr", &self.addr)
            .field("workers", &self.workers.len())
            .field("active_workers", &self.active_workers())
            .field("registry", self.registry())
            .finish()
    }
}

/// Translate one `tiny_http` request, run it, and send the answer.
fn serve(handler: &FileHandler, mut request: tiny_http::Request) {
    let request_method = request.method().as_str().to_string();
    let method = match Method::from_bytes(request_method.as_bytes()) {
        Ok(method) => method,
        Err(_) => {
            if let Err(err) = request.respond(tiny_http::Response::empty(405)) {
                debug!(method = %request_method, error = %err, "failed to send response");
            }
            return;
        }
    };

    let mut headers = HeaderMap::new();
    for header in request.headers() {
        let name = HeaderName::from_bytes(header.field.as_str().as_bytes());
        let value = HeaderValue::from_bytes(header.value.as_str().as_bytes());
        if let (Ok(name), Ok(value)) = (name, value) {
            headers.append(name, value);
        }
    }

    let target = request.url().to_string();
    let response = handler.handle(FileRequest::new(
        method,
        &target,
        headers,
        request.as_reader(),
    ));

    let status = response.status;
    if let Err(err) = respond(request, response) {
        debug!(url = %target, %status, error = %err, "failed to send response");
    }
}

fn respond(request: tiny_http::Request, response: FileResponse) -> io::Result<()> {
    let headers = response
        .headers
        .iter()
        .filter_map(|(name, value)| {
            tiny_http::Header::from_bytes(name.as_str().as_bytes(), value.as_bytes()).ok()
        })
        .collect();

    let length = response.body.len();
    let body: Box<dyn Read + Send> = match response.body {
        Body::Empty => Box::new(io::empty()),
        Body::Bytes(bytes) => Box::new(io::Cursor::new(bytes)),
        Body::Stream { reader, length } => Box::new(reader.take(length)),
    };

    request.respond(tiny_http::Response::new(
        tiny_http::StatusCode(response.status.as_u16()),
        headers,
        body,
        usize::try_from(length).ok(),
        None,
    ))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use super::*;

    fn config() -> ServerConfig {
        ServerConfig::new("secret")
            .with_workers(2)
            .with_poll_interval(Duration::from_millis(20))
    }

    #[test]
    fn bind_reports_ephemeral_port() {
        let server = FileServer::bind("127.0.0.1:0", config()).expect("server should bind");
        assert_ne!(server.local_addr().port(), 0);
        assert!(server
            .base_url()
            .starts_with(&format!("http://127.0.0.1:{}", server.local_addr().port())));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut server = FileServer::bind("127.0.0.1:0", config()).expect("server should bind");
        assert_eq!(server.active_workers(), 2);
        server.shutdown();
        assert_eq!(server.active_workers(), 0);
        server.shutdown();
        assert_eq!(server.active_workers(), 0);
    }

    #[test]
    fn serve_and_close_delegate_to_registry() {
        let server = FileServer::bind("127.0.0.1:0", config()).expect("server should bind");
        let id = FileId::new("doc").expect("id should be valid");
        server
            .serve_reader(id.clone(), Cursor::new(b"abc".to_vec()), None)
            .expect("reader should register");
        assert!(server.registry().reader("doc").is_some());
        assert_eq!(server.close("doc"), 1);
        assert_eq!(server.close("doc"), 0);
    }

    #[test]
    fn bind_failure_names_the_address() {
        let first = FileServer::bind("127.0.0.1:0", config()).expect("server should bind");
        let taken = first.local_addr().to_string();
        let err = FileServer::bind(&taken, config()).expect_err("second bind should fail");
        assert!(matches!(err, PeerError::Bind { ref addr, .. } if *addr == taken));
    }
}
