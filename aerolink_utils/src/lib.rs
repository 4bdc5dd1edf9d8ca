//! Real-time plumbing shared by the radio and host sides of the bridge.
//!
//! Nothing here blocks on the hot paths: ring buffer accesses are bounded copies, and
//! contention is resolved by giving up rather than waiting.

pub mod flow;
pub mod queue;
pub mod signal;

pub use flow::FlowBuffer;
pub use signal::{PeriodicTimer, TickSignal};

/// Tracks how long it has been since a peer was last heard from.
///
/// ```ignore
/// let mut timer = ConnectionTimer::new();
///
/// // a datagram arrived from the peer
/// timer.reset();
///
/// if timer.elapsed() > TIMEOUT {
///     // consider the peer gone
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTimer(std::time::Instant);

impl Default for ConnectionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionTimer {
    #[inline(always)]
    pub fn new() -> Self {
        Self(std::time::Instant::now())
    }

    #[inline(always)]
    pub fn reset(&mut self) {
        *self = Self::new()
    }

    #[inline(always)]
    pub fn elapsed(&self) -> core::time::Duration {
        self.0.elapsed()
    }

    #[inline(always)]
    pub fn has_expired(&self, timeout: core::time::Duration) -> bool {
        self.elapsed() > timeout
    }
}
