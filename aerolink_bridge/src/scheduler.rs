//! The transmit side of the link, paced by a periodic tick.

use crate::bridge::Bridge;
use aerolink_proto::{
    DatagramKind, DiscoveryFlag, MAX_PAYLOAD_LEN, PeerAddr, encode, format::Beacon,
};
use aerolink_utils::{
    TickSignal,
    queue::{self, PeriodicCounter, rtrb},
};
use core::convert::Infallible;
use std::sync::Arc;

/// Something that can put frames on the air.
pub trait RadioTx {
    fn send(&mut self, dest: PeerAddr, frame: &[u8]) -> std::io::Result<()>;
}

impl<T: RadioTx + ?Sized> RadioTx for &mut T {
    #[inline(always)]
    fn send(&mut self, dest: PeerAddr, frame: &[u8]) -> std::io::Result<()> {
        T::send(self, dest, frame)
    }
}

/// Producer side of the outgoing audio queue.
///
/// Bytes pushed here are sent, in order, to whichever peer the scheduler has discovered.
pub struct Outbox {
    tx: rtrb::Producer<u8>,
}

impl Outbox {
    /// Queues as many bytes of `bytes` as fit, returning how many were queued.
    #[inline]
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        queue::producer_write_from(&mut self.tx, bytes)
    }

    #[inline(always)]
    pub fn available(&self) -> usize {
        self.tx.slots()
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TickReport {
    pub beacon_sent: bool,
    /// Audio bytes sent in a unicast datagram.
    pub audio_sent: usize,
    pub torn_down: bool,
}

/// Emits queued audio and discovery beacons, one tick at a time.
///
/// Each tick:
///
/// 1. expires silent peers (tearing the link down if the bound peer went quiet),
/// 2. broadcasts a beacon, every `beacon_every_ticks` ticks,
/// 3. sends one unicast datagram of queued audio, if a destination is known.
///
/// Beacons and audio use separate sequence counters, so that receivers tracking the audio
/// sequence don't see beacons as losses.
pub struct LinkScheduler<R> {
    bridge: Arc<Bridge>,
    radio: R,
    signal: Arc<TickSignal>,
    outbox: rtrb::Consumer<u8>,
    beacons: PeriodicCounter,
    audio_sequence: u16,
    beacon_sequence: u16,
}

impl<R: RadioTx> LinkScheduler<R> {
    pub fn new(bridge: Arc<Bridge>, radio: R, signal: Arc<TickSignal>) -> (Self, Outbox) {
        let config = bridge.config();
        let (tx, rx) = rtrb::RingBuffer::new(config.outbox_capacity.get());
        let beacons = PeriodicCounter::new(config.beacon_every_ticks);

        (
            Self {
                bridge,
                radio,
                signal,
                outbox: rx,
                beacons,
                audio_sequence: 0,
                beacon_sequence: 0,
            },
            Outbox { tx },
        )
    }

    #[inline(always)]
    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn on_tick(&mut self) -> TickReport {
        let mut report = TickReport {
            torn_down: self.bridge.expire_peers(),
            ..TickReport::default()
        };

        if self.beacons.advance(1) > 0 {
            report.beacon_sent = self.send_beacon();
        }

        if let Some(dest) = self.bridge.destination() {
            report.audio_sent = self.send_audio(dest);
        }

        report
    }

    /// Waits for ticks forever, running [`on_tick`](Self::on_tick) for each.
    pub fn run(&mut self) -> Infallible {
        loop {
            self.signal.wait();
            self.on_tick();
        }
    }

    fn send_beacon(&mut self) -> bool {
        let mut buf = [0; MAX_PAYLOAD_LEN];

        let payload = match Beacon::new(self.bridge.config().format).encode(&mut buf) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("cannot encode beacon: {e}");
                return false;
            }
        };

        let sequence = self.beacon_sequence;
        self.beacon_sequence = sequence.wrapping_add(1);

        self.transmit(PeerAddr::BROADCAST, DatagramKind::Broadcast, sequence, payload)
    }

    fn send_audio(&mut self, dest: PeerAddr) -> usize {
        let frame_size = self.bridge.config().format.frame_size().get();

        // never split a frame across datagrams
        let len = self.outbox.slots().min(MAX_PAYLOAD_LEN);
        let len = len - len % frame_size;

        if len == 0 {
            return 0;
        }

        let mut buf = [0; MAX_PAYLOAD_LEN];
        let n = queue::consumer_read_into(&mut self.outbox, &mut buf[..len]);

        let sequence = self.audio_sequence;
        self.audio_sequence = sequence.wrapping_add(1);

        if self.transmit(dest, DatagramKind::Unicast, sequence, &buf[..n]) {
            n
        } else {
            0
        }
    }

    fn transmit(
        &mut self,
        dest: PeerAddr,
        kind: DatagramKind,
        sequence: u16,
        payload: &[u8],
    ) -> bool {
        let state = if self.bridge.has_peer() {
            DiscoveryFlag::PEER_SEEN
        } else {
            DiscoveryFlag::IDLE
        };

        let frame = match encode(payload, kind, state, sequence, self.bridge.token()) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("cannot encode datagram: {e}");
                return false;
            }
        };

        match self.radio.send(dest, &frame) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("send to {dest} failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use aerolink_proto::{Token, decode};
    use core::num::NonZeroUsize;

    #[derive(Default)]
    struct Recorder(Vec<(PeerAddr, Vec<u8>)>);

    impl RadioTx for Recorder {
        fn send(&mut self, dest: PeerAddr, frame: &[u8]) -> std::io::Result<()> {
            self.0.push((dest, frame.to_vec()));
            Ok(())
        }
    }

    struct Jammed;

    impl RadioTx for Jammed {
        fn send(&mut self, _: PeerAddr, _: &[u8]) -> std::io::Result<()> {
            Err(std::io::ErrorKind::WouldBlock.into())
        }
    }

    fn bridge(beacon_every_ticks: usize) -> Arc<Bridge> {
        let config = BridgeConfig {
            beacon_every_ticks: NonZeroUsize::new(beacon_every_ticks).unwrap(),
            ..BridgeConfig::default()
        };

        Arc::new(Bridge::with_token(config, Token(5)).unwrap())
    }

    #[test]
    fn test_beacon_cadence() {
        let (mut scheduler, _outbox) =
            LinkScheduler::new(bridge(3), Recorder::default(), Arc::new(TickSignal::new()));

        let sent: Vec<bool> = (0..6).map(|_| scheduler.on_tick().beacon_sent).collect();
        assert_eq!(sent, [false, false, true, false, false, true]);

        let frames = &scheduler.radio().0;
        assert_eq!(frames.len(), 2);

        let (dest, frame) = &frames[0];
        assert_eq!(*dest, PeerAddr::BROADCAST);

        let datagram = decode(frame).unwrap();
        assert_eq!(datagram.header.kind(), Some(DatagramKind::Broadcast));
        assert_eq!(datagram.header.token, Token(5));
        assert_eq!(datagram.header.state, DiscoveryFlag::IDLE);
        assert!(Beacon::decode(datagram.payload).is_ok());

        assert_eq!(decode(&frames[1].1).unwrap().header.sequence, 1);
    }

    #[test]
    fn test_no_audio_without_destination() {
        let (mut scheduler, mut outbox) =
            LinkScheduler::new(bridge(1000), Recorder::default(), Arc::new(TickSignal::new()));

        assert_eq!(outbox.push(&[1; 64]), 64);
        assert_eq!(scheduler.on_tick().audio_sent, 0);
        assert!(scheduler.radio().0.is_empty());
    }

    #[test]
    fn test_send_failures_are_absorbed() {
        let (mut scheduler, _outbox) =
            LinkScheduler::new(bridge(1), Jammed, Arc::new(TickSignal::new()));

        let report = scheduler.on_tick();
        assert!(!report.beacon_sent);
        assert!(!report.torn_down);
    }
}
