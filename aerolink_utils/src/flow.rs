//! The byte buffer decoupling the radio's arrival jitter from the host's consumption rate.

use crate::queue;
use core::{
    num,
    sync::atomic::{AtomicBool, Ordering},
};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A bounded single-producer, single-consumer byte FIFO with an activation flag.
///
/// The radio receive path [`write`](Self::write)s, the host transfer path
/// [`read`](Self::read)s, and the stream gate toggles [`set_active`](Self::set_active).
/// Both data paths only ever `try_lock` their half: if that fails, they treat the buffer
/// as full (or empty) and move on. Only `set_active`, which runs outside of real-time
/// contexts, waits on the locks.
///
/// While inactive, writes are rejected and reads return nothing. Every activation change
/// discards buffered bytes, so stale audio is never played back after a restart.
pub struct FlowBuffer {
    tx: Mutex<rtrb::Producer<u8>>,
    rx: Mutex<rtrb::Consumer<u8>>,
    // only written with both locks held
    active: AtomicBool,
    capacity: num::NonZeroUsize,
}

impl core::fmt::Debug for FlowBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlowBuffer")
            .field("capacity", &self.capacity)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[inline(always)]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FlowBuffer {
    /// Creates an inactive buffer holding at most `capacity` bytes.
    pub fn new(capacity: num::NonZeroUsize) -> Self {
        let (tx, rx) = rtrb::RingBuffer::new(capacity.get());

        Self {
            tx: Mutex::new(tx),
            rx: Mutex::new(rx),
            active: AtomicBool::new(false),
            capacity,
        }
    }

    #[inline(always)]
    pub const fn capacity(&self) -> num::NonZeroUsize {
        self.capacity
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Appends as many bytes of `bytes` as fit, returning how many were accepted.
    ///
    /// Returns `0` if the buffer is inactive, or if the producer side is momentarily busy.
    #[inline]
    pub fn write(&self, bytes: &[u8]) -> usize {
        self.with_producer(|tx| queue::producer_write_from(tx, bytes))
    }

    /// Like [`write`](Self::write), but only accepts whole multiples of `frame_size`, so
    /// that a partial write never leaves a split frame in the buffer.
    #[inline]
    pub fn write_frames(&self, bytes: &[u8], frame_size: num::NonZeroUsize) -> usize {
        self.with_producer(|tx| {
            let fitting = bytes.len().min(tx.slots());
            let aligned = fitting - fitting % frame_size;
            queue::producer_write_from(tx, &bytes[..aligned])
        })
    }

    /// Moves up to `out.len()` bytes, oldest first, into `out`, returning how many were
    /// copied.
    ///
    /// Returns `0` if the buffer is inactive, or if the consumer side is momentarily busy.
    #[inline]
    pub fn read(&self, out: &mut [u8]) -> usize {
        if !self.is_active() {
            return 0;
        }

        let Ok(mut rx) = self.rx.try_lock() else {
            return 0;
        };

        if !self.is_active() {
            return 0;
        }

        queue::consumer_read_into(&mut rx, out)
    }

    /// Activates or deactivates the buffer, discarding its contents either way.
    ///
    /// Returns the previous activation state.
    pub fn set_active(&self, active: bool) -> bool {
        let mut rx = lock(&self.rx);
        let _tx = lock(&self.tx);

        let discarded = queue::consumer_discard(&mut rx);

        if discarded > 0 {
            log::debug!("flow buffer flushed {discarded} bytes");
        }

        self.active.swap(active, Ordering::AcqRel)
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        lock(&self.rx).slots()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    fn with_producer(&self, f: impl FnOnce(&mut rtrb::Producer<u8>) -> usize) -> usize {
        if !self.is_active() {
            return 0;
        }

        let Ok(mut tx) = self.tx.try_lock() else {
            return 0;
        };

        if !self.is_active() {
            return 0;
        }

        f(&mut tx)
    }
}
