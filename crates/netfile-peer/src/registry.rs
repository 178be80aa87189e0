//! File id to exposed handle bookkeeping.
//!
//! Readers and writers live in separate maps behind one `RwLock`: lookups
//! take the shared side, registration and removal the exclusive side. Handle
//! I/O never runs under this lock except the seek-to-start on registration;
//! `close` on removed handles runs after the lock is released.

use std::collections::HashMap;
use std::fmt;
use std::io::{Seek, SeekFrom};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::thread;
use std::time::Duration;

use netfile_handle::{FileInfo, Handle, Multiplexer, ReadHandle, WriteHandle};
use netfile_wire::FileId;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{PeerError, Result};

/// A registered reader, shared by every request that touches it.
pub type SharedReader = Arc<Multiplexer<Box<dyn ReadHandle>>>;

/// A registered writer, shared by every request that touches it.
pub type SharedWriter = Arc<Multiplexer<Box<dyn WriteHandle>>>;

/// How often a cancellation waiter checks whether its handle is already gone.
const WAITER_POLL: Duration = Duration::from_millis(250);

/// Which map a handle lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Reader,
    Writer,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader => write!(f, "reader"),
            Self::Writer => write!(f, "writer"),
        }
    }
}

type Map<H> = HashMap<FileId, Arc<Multiplexer<Box<H>>>>;

#[derive(Default)]
struct Maps {
    readers: Map<dyn ReadHandle>,
    writers: Map<dyn WriteHandle>,
}

fn readers(maps: &mut Maps) -> &mut Map<dyn ReadHandle> {
    &mut maps.readers
}

fn writers(maps: &mut Maps) -> &mut Map<dyn WriteHandle> {
    &mut maps.writers
}

/// Exposed handles by file id.
pub struct Registry {
    maps: RwLock<Maps>,
    close_readers: bool,
    close_writers: bool,
}

impl Registry {
    /// Create an empty registry. The flags select whether removed readers
    /// and writers get their `close` called.
    pub fn new(close_readers: bool, close_writers: bool) -> Self {
        Self {
            maps: RwLock::new(Maps::default()),
            close_readers,
            close_writers,
        }
    }

    /// Expose `handle` for reading under `id`.
    ///
    /// The handle is rewound to offset zero. With a cancel token, the handle
    /// is removed (and closed, per policy) when the token fires, unless it was
    /// closed explicitly first.
    pub fn register_reader(
        self: &Arc<Self>,
        id: FileId,
        handle: impl ReadHandle + 'static,
        cancel: Option<CancelToken>,
    ) -> Result<()> {
        let handle: Box<dyn ReadHandle> = Box::new(handle);
        self.register(id, handle, cancel, HandleKind::Reader, readers)
    }

    /// Expose `handle` for writing under `id`. See [`Self::register_reader`].
    pub fn register_writer(
        self: &Arc<Self>,
        id: FileId,
        handle: impl WriteHandle + 'static,
        cancel: Option<CancelToken>,
    ) -> Result<()> {
        let handle: Box<dyn WriteHandle> = Box::new(handle);
        self.register(id, handle, cancel, HandleKind::Writer, writers)
    }

    /// The reader registered under `id`.
    pub fn reader(&self, id: &str) -> Option<SharedReader> {
        self.read_maps().readers.get(id).cloned()
    }

    /// The writer registered under `id`.
    pub fn writer(&self, id: &str) -> Option<SharedWriter> {
        self.read_maps().writers.get(id).cloned()
    }

    /// Whether a handle of `kind` is registered under `id`.
    pub fn contains(&self, id: &str, kind: HandleKind) -> bool {
        let maps = self.read_maps();
        match kind {
            HandleKind::Reader => maps.readers.contains_key(id),
            HandleKind::Writer => maps.writers.contains_key(id),
        }
    }

    /// Number of registered handles across both kinds.
    pub fn len(&self) -> usize {
        let maps = self.read_maps();
        maps.readers.len() + maps.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fresh metadata for `id`, from the reader if there is one, else the
    /// writer.
    pub fn stat(&self, id: &str) -> Result<FileInfo> {
        let (reader, writer) = {
            let maps = self.read_maps();
            (maps.readers.get(id).cloned(), maps.writers.get(id).cloned())
        };

        if let Some(reader) = reader {
            return Ok(reader.with_handle(|h| h.stat())?);
        }
        if let Some(writer) = writer {
            return Ok(writer.with_handle(|h| h.stat())?);
        }
        Err(PeerError::NotFound(FileId::new(id)?))
    }

    /// Remove the reader and writer under `id`, closing them per policy.
    ///
    /// Returns how many handles were removed; zero means the id was unknown.
    /// Close failures are logged, not returned.
    pub fn close(&self, id: &str) -> usize {
        let (reader, writer) = {
            let mut maps = self.write_maps();
            (maps.readers.remove(id), maps.writers.remove(id))
        };

        let mut closed = 0;
        if let Some(reader) = reader {
            close_handle(&reader, id, HandleKind::Reader, self.close_readers);
            closed += 1;
        }
        if let Some(writer) = writer {
            close_handle(&writer, id, HandleKind::Writer, self.close_writers);
            closed += 1;
        }
        closed
    }

    /// Remove every handle, closing them per policy. Returns how many were
    /// removed.
    pub fn close_all(&self) -> usize {
        let maps = std::mem::take(&mut *self.write_maps());

        let count = maps.readers.len() + maps.writers.len();
        for (id, reader) in maps.readers {
            close_handle(&reader, id.as_str(), HandleKind::Reader, self.close_readers);
        }
        for (id, writer) in maps.writers {
            close_handle(&writer, id.as_str(), HandleKind::Writer, self.close_writers);
        }
        count
    }

    fn register<H>(
        self: &Arc<Self>,
        id: FileId,
        mut handle: Box<H>,
        cancel: Option<CancelToken>,
        kind: HandleKind,
        select: fn(&mut Maps) -> &mut Map<H>,
    ) -> Result<()>
    where
        H: Handle + Seek + ?Sized + 'static,
    {
        let mut maps = self.write_maps();
        let map = select(&mut *maps);
        if map.contains_key(&id) {
            return Err(PeerError::AlreadyRegistered(id));
        }

        handle.seek(SeekFrom::Start(0))?;
        let mux = Arc::new(Multiplexer::new(handle));

        // Spawned under the write lock: a token that has already fired cannot
        // look for the entry before it is inserted.
        if let Some(token) = cancel {
            let registry = Arc::downgrade(self);
            let target = Arc::downgrade(&mux);
            let waiter_id = id.clone();
            thread::Builder::new()
                .name(format!("netfile-expire-{kind}"))
                .spawn(move || {
                    expire_when_cancelled(registry, target, waiter_id, token, kind, select)
                })?;
        }

        info!(file_id = %id, %kind, "registered handle");
        map.insert(id, mux);
        Ok(())
    }

    fn read_maps(&self) -> RwLockReadGuard<'_, Maps> {
        self.maps.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_maps(&self) -> RwLockWriteGuard<'_, Maps> {
        self.maps.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn close_policy(&self, kind: HandleKind) -> bool {
        match kind {
            HandleKind::Reader => self.close_readers,
            HandleKind::Writer => self.close_writers,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let maps = self.read_maps();
        f.debug_struct("Registry")
            .field("readers", &maps.readers.keys().collect::<Vec<_>>())
            .field("writers", &maps.writers.keys().collect::<Vec<_>>())
            .field("close_readers", &self.close_readers)
            .field("close_writers", &self.close_writers)
            .finish()
    }
}

/// Body of a registration's cancellation waiter.
///
/// Exits early once the registry or the handle itself is gone. Removes the
/// entry only if it is still the handle this waiter was created for.
fn expire_when_cancelled<H>(
    registry: Weak<Registry>,
    target: Weak<Multiplexer<Box<H>>>,
    id: FileId,
    token: CancelToken,
    kind: HandleKind,
    select: fn(&mut Maps) -> &mut Map<H>,
) where
    H: Handle + ?Sized + 'static,
{
    let reason = loop {
        if let Some(reason) = token.wait_timeout(WAITER_POLL) {
            break reason;
        }
        if target.strong_count() == 0 || registry.strong_count() == 0 {
            return;
        }
    };

    let Some(registry) = registry.upgrade() else {
        return;
    };
    let removed = {
        let mut maps = registry.write_maps();
        let map = select(&mut *maps);
        match map.get(&id) {
            Some(current) if Weak::ptr_eq(&Arc::downgrade(current), &target) => map.remove(&id),
            _ => None,
        }
    };

    if let Some(mux) = removed {
        info!(file_id = %id, %kind, %reason, "cancellation fired, closing handle");
        close_handle(&mux, id.as_str(), kind, registry.close_policy(kind));
    }
}

fn close_handle<H>(mux: &Multiplexer<Box<H>>, id: &str, kind: HandleKind, enabled: bool)
where
    H: Handle + ?Sized,
{
    if !enabled {
        debug!(file_id = id, %kind, "removed handle without closing");
        return;
    }
    match mux.with_handle_mut(|h| h.close()) {
        Ok(()) => debug!(file_id = id, %kind, "closed handle"),
        Err(err) => warn!(file_id = id, %kind, error = %err, "failed to close handle"),
    }
}
