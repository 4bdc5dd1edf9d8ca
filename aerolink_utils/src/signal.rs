//! Waking a worker thread from contexts that must not block.

use core::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use std::{
    sync::{Arc, OnceLock},
    thread,
    time::Instant,
};

/// A single-slot wake-up signal with one waiting thread.
///
/// [`notify`](Self::notify) never blocks or allocates, making it usable from interrupt-like
/// contexts such as timer callbacks. Notifications arriving while one is already pending
/// coalesce into one.
#[derive(Debug, Default)]
pub struct TickSignal {
    pending: AtomicBool,
    waiter: OnceLock<thread::Thread>,
}

impl TickSignal {
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            waiter: OnceLock::new(),
        }
    }

    #[inline]
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);

        if let Some(waiter) = self.waiter.get() {
            waiter.unpark();
        }
    }

    /// Consumes a pending notification, if any, without waiting.
    #[inline(always)]
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Blocks until a notification is pending, and consumes it.
    ///
    /// The first thread to wait becomes the signal's only waiter.
    pub fn wait(&self) {
        self.register();

        while !self.take() {
            thread::park();
        }
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    ///
    /// Returns whether a notification was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.register();

        let deadline = Instant::now() + timeout;

        loop {
            if self.take() {
                return true;
            }

            let now = Instant::now();

            if now >= deadline {
                return false;
            }

            thread::park_timeout(deadline - now);
        }
    }

    fn register(&self) {
        let waiter = self.waiter.get_or_init(thread::current);

        debug_assert_eq!(
            waiter.id(),
            thread::current().id(),
            "a TickSignal only supports a single waiting thread"
        );
    }
}

/// A background thread invoking a callback at a fixed cadence, until dropped.
///
/// Deadlines are computed from the start instant rather than from the previous wake-up, so
/// that late wake-ups do not accumulate drift.
#[derive(Debug)]
pub struct PeriodicTimer {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PeriodicTimer {
    pub fn spawn(
        period: Duration,
        mut on_tick: impl FnMut() + Send + 'static,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));

        let handle = thread::Builder::new().name("aerolink-tick".into()).spawn({
            let stop = Arc::clone(&stop);
            move || {
                let mut deadline = Instant::now();

                while !stop.load(Ordering::Relaxed) {
                    deadline += period;

                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else if now - deadline > period {
                        log::trace!("tick timer overran by {:?}", now - deadline);
                    }

                    on_tick();
                }
            }
        })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Convenience for the common case of notifying a [`TickSignal`] on each period.
    pub fn notifying(period: Duration, signal: Arc<TickSignal>) -> std::io::Result<Self> {
        Self::spawn(period, move || signal.notify())
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("tick timer thread panicked");
            }
        }
    }
}
