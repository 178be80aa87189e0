use std::time::Duration;

/// Default worker threads pulling requests off the listener.
pub const DEFAULT_WORKERS: usize = 4;

/// Default upper bound on one ranged transfer: 64 MiB.
pub const DEFAULT_MAX_RANGE_LENGTH: u64 = 64 * 1024 * 1024;

/// Default interval at which idle workers re-check for shutdown.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Server policy and sizing.
///
/// Every capability defaults to enabled; switch individual verbs off with the
/// `with_*` builders.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path prefix every request must start with (empty = mounted at root).
    pub url_prefix: String,
    /// Secret every request must present.
    pub shared_secret: String,
    /// Answer OPTIONS (stat) requests.
    pub allow_stat: bool,
    /// Answer DELETE (close) requests.
    pub allow_close: bool,
    /// Serve GET requests without `X-Range` as a plain download.
    pub allow_full_get: bool,
    /// Accept PUT requests replacing content from the current position.
    pub allow_put: bool,
    /// Report real file names on stat; otherwise the file id is reported.
    pub disclose_filenames: bool,
    /// Call `close` on readers when they leave the registry.
    pub close_readers: bool,
    /// Call `close` on writers when they leave the registry.
    pub close_writers: bool,
    /// Worker threads.
    pub workers: usize,
    /// Largest ranged read or write accepted.
    pub max_range_length: u64,
    /// How often idle workers check for shutdown.
    pub poll_interval: Duration,
}

impl ServerConfig {
    /// Defaults with the given shared secret.
    pub fn new(shared_secret: impl Into<String>) -> Self {
        Self {
            shared_secret: shared_secret.into(),
            ..Self::default()
        }
    }

    /// Mount under a path prefix such as `/files`.
    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    pub fn with_stat(mut self, allow: bool) -> Self {
        self.allow_stat = allow;
        self
    }

    pub fn with_close(mut self, allow: bool) -> Self {
        self.allow_close = allow;
        self
    }

    pub fn with_full_get(mut self, allow: bool) -> Self {
        self.allow_full_get = allow;
        self
    }

    pub fn with_put(mut self, allow: bool) -> Self {
        self.allow_put = allow;
        self
    }

    pub fn with_disclose_filenames(mut self, disclose: bool) -> Self {
        self.disclose_filenames = disclose;
        self
    }

    /// Choose which kinds get their `close` called on removal.
    pub fn with_close_handles(mut self, readers: bool, writers: bool) -> Self {
        self.close_readers = readers;
        self.close_writers = writers;
        self
    }

    /// Worker thread count (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_max_range_length(mut self, max: u64) -> Self {
        self.max_range_length = max;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url_prefix: String::new(),
            shared_secret: String::new(),
            allow_stat: true,
            allow_close: true,
            allow_full_get: true,
            allow_put: true,
            disclose_filenames: true,
            close_readers: true,
            close_writers: true,
            workers: DEFAULT_WORKERS,
            max_range_length: DEFAULT_MAX_RANGE_LENGTH,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Client-side request settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for each request. `None` waits forever on a hung server;
    /// pass a timeout or a cancel token when that matters.
    pub timeout: Option<Duration>,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: concat!("netfile/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
