//! Offset-caching multiplexer.
//!
//! One seekable handle, many logical cursors. Every cursor remembers its own
//! offset; the multiplexer remembers which cursor last positioned the
//! underlying handle. A cursor only issues a physical seek when some other
//! cursor acted since its own last call, so a run of sequential reads from one
//! cursor costs no seeks at all.
//!
//! Invariant (while the lock is not held): if `active` is `Some(id)`, the
//! physical position of the handle equals the logical offset of cursor `id`.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::adapters::resolve_seek;

/// Serializes access to one handle across any number of [`Cursor`]s.
#[derive(Debug)]
pub struct Multiplexer<H> {
    shared: Mutex<Shared<H>>,
    next_cursor: AtomicU64,
}

#[derive(Debug)]
struct Shared<H> {
    handle: H,
    active: Option<u64>,
}

impl<H> Multiplexer<H> {
    /// Wrap `handle`. No cursor owns the physical position yet.
    pub fn new(handle: H) -> Self {
        Self {
            shared: Mutex::new(Shared {
                handle,
                active: None,
            }),
            next_cursor: AtomicU64::new(1),
        }
    }

    /// Create a fresh cursor at logical offset zero. No I/O.
    pub fn cursor(self: &Arc<Self>) -> Cursor<H> {
        Cursor {
            mux: Arc::clone(self),
            id: self.next_cursor.fetch_add(1, Ordering::Relaxed),
            offset: 0,
        }
    }

    /// Run `f` against the handle without disturbing cursor bookkeeping.
    ///
    /// `f` must not move the physical position (stat-like access only).
    pub fn with_handle<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        let shared = self.lock();
        f(&shared.handle)
    }

    /// Run `f` with exclusive access to the handle.
    ///
    /// `f` may move the physical position; every cursor re-seeks before its
    /// next operation.
    pub fn with_handle_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        let mut shared = self.lock();
        shared.active = None;
        f(&mut shared.handle)
    }

    /// Consume the multiplexer and return the handle.
    pub fn into_inner(self) -> H {
        self.shared
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .handle
    }

    fn lock(&self) -> MutexGuard<'_, Shared<H>> {
        // The bookkeeping stays consistent even if a holder panicked:
        // `active` is cleared on every failed operation below.
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A logical offset into a multiplexed handle.
///
/// Cursors are cheap and independent: create one per request.
#[derive(Debug)]
pub struct Cursor<H> {
    mux: Arc<Multiplexer<H>>,
    id: u64,
    offset: u64,
}

impl<H> Cursor<H> {
    /// This cursor's logical offset.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// The multiplexer this cursor belongs to.
    pub fn multiplexer(&self) -> &Arc<Multiplexer<H>> {
        &self.mux
    }
}

impl<H: Seek> Cursor<H> {
    /// Run one transfer under the lock, seeking first if another cursor moved
    /// the handle since this cursor's last call.
    fn transfer(
        &mut self,
        op: impl FnOnce(&mut H) -> io::Result<usize>,
    ) -> io::Result<usize> {
        let mut shared = self.mux.lock();

        if shared.active != Some(self.id) {
            trace!(cursor = self.id, offset = self.offset, "repositioning handle");
            if let Err(err) = shared.handle.seek(SeekFrom::Start(self.offset)) {
                shared.active = None;
                return Err(err);
            }
            shared.active = Some(self.id);
        }

        match op(&mut shared.handle) {
            Ok(n) => {
                self.offset += n as u64;
                Ok(n)
            }
            Err(err) => {
                // Partial transfers leave the physical position unknown.
                shared.active = None;
                Err(err)
            }
        }
    }
}

impl<H: Read + Seek> Read for Cursor<H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.transfer(|handle| handle.read(buf))
    }
}

impl<H: Write + Seek> Write for Cursor<H> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.transfer(|handle| handle.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.mux.lock().handle.flush()
    }
}

impl<H: Seek> Seek for Cursor<H> {
    /// Seeks the underlying handle immediately and takes ownership of its
    /// position. `Current` is relative to this cursor, not to whichever cursor
    /// last moved the handle.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let pos = match pos {
            SeekFrom::Current(delta) => {
                SeekFrom::Start(resolve_seek(self.offset, None, SeekFrom::Current(delta))?)
            }
            other => other,
        };

        let mut shared = self.mux.lock();
        let offset = shared.handle.seek(pos)?;
        shared.active = Some(self.id);
        self.offset = offset;
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor as MemoryCursor;
    use std::thread;

    use super::*;

    /// Counts physical seeks issued against an in-memory buffer.
    #[derive(Debug)]
    struct CountingHandle {
        inner: MemoryCursor<Vec<u8>>,
        seeks: usize,
    }

    impl CountingHandle {
        fn new(data: Vec<u8>) -> Self {
            Self {
                inner: MemoryCursor::new(data),
                seeks: 0,
            }
        }
    }

    impl Read for CountingHandle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Write for CountingHandle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for CountingHandle {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.seeks += 1;
            self.inner.seek(pos)
        }
    }

    /// Fails every seek.
    struct Unseekable;

    impl Read for Unseekable {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Seek for Unseekable {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Err(io::Error::other("seek failed"))
        }
    }

    fn seeks(mux: &Multiplexer<CountingHandle>) -> usize {
        mux.with_handle(|h| h.seeks)
    }

    #[test]
    fn sequential_reads_from_one_cursor_seek_once() {
        let mux = Arc::new(Multiplexer::new(CountingHandle::new((0..100).collect())));
        let mut cursor = mux.cursor();

        let mut buf = [0u8; 10];
        for _ in 0..5 {
            cursor.read_exact(&mut buf).unwrap();
        }
        assert_eq!(buf[0], 40);
        assert_eq!(cursor.position(), 50);
        assert_eq!(seeks(&mux), 1);
    }

    #[test]
    fn interleaved_cursors_keep_independent_offsets() {
        let mux = Arc::new(Multiplexer::new(CountingHandle::new((0..100).collect())));
        let mut a = mux.cursor();
        let mut b = mux.cursor();
        b.seek(SeekFrom::Start(50)).unwrap();

        let mut buf = [0u8; 4];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2, 3]);
        b.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [50, 51, 52, 53]);
        a.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [4, 5, 6, 7]);

        // explicit seek on b, then one repositioning per switch afterwards
        assert_eq!(seeks(&mux), 4);
    }

    #[test]
    fn seek_current_is_relative_to_the_cursor() {
        let mux = Arc::new(Multiplexer::new(CountingHandle::new((0..100).collect())));
        let mut a = mux.cursor();
        let mut b = mux.cursor();

        let mut buf = [0u8; 10];
        a.read_exact(&mut buf).unwrap();
        b.seek(SeekFrom::Start(80)).unwrap();

        assert_eq!(a.seek(SeekFrom::Current(-2)).unwrap(), 8);
        a.read_exact(&mut buf[..1]).unwrap();
        assert_eq!(buf[0], 8);
    }

    #[test]
    fn seek_end_delegates_to_handle() {
        let mux = Arc::new(Multiplexer::new(CountingHandle::new(vec![0u8; 33])));
        let mut cursor = mux.cursor();
        assert_eq!(cursor.seek(SeekFrom::End(-3)).unwrap(), 30);
        assert_eq!(cursor.position(), 30);
    }

    #[test]
    fn failed_reposition_leaves_offset_untouched() {
        let mux = Arc::new(Multiplexer::new(Unseekable));
        let mut cursor = mux.cursor();
        let err = cursor.read(&mut [0u8; 8]).unwrap_err();
        assert_eq!(err.to_string(), "seek failed");
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn exclusive_access_forces_reposition() {
        let mux = Arc::new(Multiplexer::new(CountingHandle::new((0..20).collect())));
        let mut cursor = mux.cursor();
        let mut buf = [0u8; 2];
        cursor.read_exact(&mut buf).unwrap();

        mux.with_handle_mut(|h| h.inner.set_position(15));

        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
    }

    #[test]
    fn concurrent_positioned_writes_match_sequential_result() {
        let mux = Arc::new(Multiplexer::new(CountingHandle::new(vec![0u8; 64 * 16])));

        let workers: Vec<_> = (0..16u8)
            .map(|i| {
                let mux = Arc::clone(&mux);
                thread::spawn(move || {
                    let mut cursor = mux.cursor();
                    cursor.seek(SeekFrom::Start(i as u64 * 64)).unwrap();
                    for chunk in 0..8 {
                        cursor.write_all(&[i; 8]).unwrap();
                        assert_eq!(cursor.position(), i as u64 * 64 + (chunk + 1) * 8);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let mux = Arc::try_unwrap(mux).unwrap();
        let data = mux.into_inner().inner.into_inner();
        for (i, block) in data.chunks(64).enumerate() {
            assert!(block.iter().all(|&b| b == i as u8), "block {i} corrupted");
        }
    }
}
