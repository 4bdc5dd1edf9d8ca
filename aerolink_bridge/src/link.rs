//! Radio-side link state: who we listen to, who we send to, and how the link is doing.

use aerolink_proto::{PeerAddr, PeerBinding};
use aerolink_utils::ConnectionTimer;
use core::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

/// A snapshot of the link's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LinkStats {
    /// Audio datagrams from the bound peer.
    pub accepted: u64,
    /// Datagrams missing from the bound peer's sequence.
    pub lost: u64,
    /// Datagrams arriving behind the bound peer's sequence (late or duplicated).
    pub reordered: u64,
    /// Datagrams from other sessions, or of an unknown kind.
    pub foreign: u64,
    /// Datagrams failing validation, including undecodable beacons.
    pub corrupt: u64,
    /// Audio bytes the flow buffer could not accept.
    pub dropped_bytes: u64,
}

#[derive(Debug, Default)]
pub(crate) struct LinkCounters {
    pub accepted: AtomicU64,
    pub lost: AtomicU64,
    pub reordered: AtomicU64,
    pub foreign: AtomicU64,
    pub corrupt: AtomicU64,
    pub dropped_bytes: AtomicU64,
}

#[inline(always)]
pub(crate) fn bump(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

impl LinkCounters {
    pub fn snapshot(&self) -> LinkStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);

        LinkStats {
            accepted: get(&self.accepted),
            lost: get(&self.lost),
            reordered: get(&self.reordered),
            foreign: get(&self.foreign),
            corrupt: get(&self.corrupt),
            dropped_bytes: get(&self.dropped_bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SequenceEvent {
    InOrder,
    Gap(u16),
    Behind,
}

/// Follows a wrapping sequence number, classifying each new value relative to the
/// expected one. Values less than half the sequence space ahead count as a gap.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SequenceTracker {
    next: Option<u16>,
}

impl SequenceTracker {
    pub fn observe(&mut self, sequence: u16) -> SequenceEvent {
        let Some(expected) = self.next else {
            self.next = Some(sequence.wrapping_add(1));
            return SequenceEvent::InOrder;
        };

        let ahead = sequence.wrapping_sub(expected);

        if ahead >= 0x8000 {
            return SequenceEvent::Behind;
        }

        self.next = Some(sequence.wrapping_add(1));

        if ahead == 0 {
            SequenceEvent::InOrder
        } else {
            SequenceEvent::Gap(ahead)
        }
    }

    #[inline(always)]
    pub fn reset(&mut self) {
        self.next = None;
    }
}

/// A node we have heard from, with when we last did.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Heard {
    pub addr: PeerAddr,
    pub timer: ConnectionTimer,
}

impl Heard {
    #[inline(always)]
    pub fn now(addr: PeerAddr) -> Self {
        Self {
            addr,
            timer: ConnectionTimer::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PeerLink {
    pub binding: PeerBinding,
    /// Where the bound peer's datagrams come from.
    pub bound: Option<Heard>,
    /// The last node whose beacon advertised a compatible format.
    pub candidate: Option<Heard>,
    pub sequence: SequenceTracker,
}

impl PeerLink {
    /// Where to send audio, if anywhere.
    pub fn destination(&self) -> Option<PeerAddr> {
        self.candidate.or(self.bound).map(|heard| heard.addr)
    }

    pub fn has_peer(&self) -> bool {
        self.binding.is_bound() || self.candidate.is_some()
    }

    /// Forgets the bound peer, returning its address.
    pub fn unbind(&mut self) -> Option<PeerAddr> {
        self.binding.unbind();
        self.sequence.reset();
        self.bound.take().map(|heard| heard.addr)
    }

    /// Whether the bound peer has been silent for longer than `timeout`.
    pub fn bound_expired(&self, timeout: Duration) -> bool {
        self.bound
            .is_some_and(|heard| heard.timer.has_expired(timeout))
    }

    /// Drops the candidate if it has been silent for longer than `timeout`, returning its
    /// address.
    pub fn expire_candidate(&mut self, timeout: Duration) -> Option<PeerAddr> {
        self.candidate
            .take_if(|heard| heard.timer.has_expired(timeout))
            .map(|heard| heard.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_in_order_and_wrapping() {
        let mut tracker = SequenceTracker::default();

        assert_eq!(tracker.observe(u16::MAX - 1), SequenceEvent::InOrder);
        assert_eq!(tracker.observe(u16::MAX), SequenceEvent::InOrder);
        assert_eq!(tracker.observe(0), SequenceEvent::InOrder);
        assert_eq!(tracker.observe(1), SequenceEvent::InOrder);
    }

    #[test]
    fn test_sequence_gap_across_wrap() {
        let mut tracker = SequenceTracker::default();

        tracker.observe(u16::MAX - 1);
        assert_eq!(tracker.observe(2), SequenceEvent::Gap(3));
        assert_eq!(tracker.observe(3), SequenceEvent::InOrder);
    }

    #[test]
    fn test_sequence_behind() {
        let mut tracker = SequenceTracker::default();

        tracker.observe(10);
        tracker.observe(11);
        assert_eq!(tracker.observe(11), SequenceEvent::Behind);
        assert_eq!(tracker.observe(5), SequenceEvent::Behind);
        assert_eq!(tracker.observe(12), SequenceEvent::InOrder);
    }

    #[test]
    fn test_destination_prefers_candidate() {
        let mut link = PeerLink::default();
        assert_eq!(link.destination(), None);
        assert!(!link.has_peer());

        link.bound = Some(Heard::now(PeerAddr([1; 6])));
        assert_eq!(link.destination(), Some(PeerAddr([1; 6])));

        link.candidate = Some(Heard::now(PeerAddr([2; 6])));
        assert_eq!(link.destination(), Some(PeerAddr([2; 6])));
        assert!(link.has_peer());
    }

    #[test]
    fn test_expiry() {
        let mut link = PeerLink::default();
        link.bound = Some(Heard::now(PeerAddr([1; 6])));
        link.candidate = Some(Heard::now(PeerAddr([2; 6])));

        assert!(!link.bound_expired(Duration::from_secs(60)));
        assert_eq!(link.expire_candidate(Duration::from_secs(60)), None);

        std::thread::sleep(Duration::from_millis(5));

        assert!(link.bound_expired(Duration::from_millis(1)));
        assert_eq!(link.expire_candidate(Duration::from_millis(1)), Some(PeerAddr([2; 6])));
        assert!(link.candidate.is_none());
    }
}
