use aerolink_bridge::{
    Bridge, BridgeConfig, ControlRequest, GateState, LinkScheduler, RadioSink, RadioTx,
    RequestCode, TransportSink,
    control::selector,
    proto::{DatagramKind, DiscoveryFlag, Frame, PeerAddr, PeerBinding, Token, encode, format::Beacon},
    utils::TickSignal,
};
use core::{num::NonZeroUsize, time::Duration};
use std::sync::{Arc, Mutex};

const SENDER: PeerAddr = PeerAddr([0xAA, 0, 0, 0, 0, 1]);
const RECEIVER: PeerAddr = PeerAddr([0xBB, 0, 0, 0, 0, 2]);

type Air = Arc<Mutex<Vec<(PeerAddr, Vec<u8>)>>>;

/// Records everything sent, for the test to deliver by hand.
#[derive(Clone, Default)]
struct MemoryRadio(Air);

impl RadioTx for MemoryRadio {
    fn send(&mut self, dest: PeerAddr, frame: &[u8]) -> std::io::Result<()> {
        self.0.lock().unwrap().push((dest, frame.to_vec()));
        Ok(())
    }
}

impl MemoryRadio {
    /// Delivers every recorded frame to `sink`, as if coming from `source`.
    fn deliver(&self, source: PeerAddr, dest: PeerAddr, sink: &impl RadioSink) -> usize {
        let frames = std::mem::take(&mut *self.0.lock().unwrap());
        let mut delivered = 0;

        for (to, frame) in frames {
            if to == dest || to.is_broadcast() {
                sink.on_frame_received(source, &frame);
                delivered += 1;
            }
        }

        delivered
    }
}

fn beacon_from(token: Token) -> Frame {
    let mut buf = [0; 64];
    let payload = Beacon::new(config().format).encode(&mut buf).unwrap();
    encode(payload, DatagramKind::Broadcast, DiscoveryFlag::IDLE, 0, token).unwrap()
}

fn config() -> BridgeConfig {
    BridgeConfig {
        beacon_every_ticks: NonZeroUsize::MIN,
        ..BridgeConfig::default()
    }
}

#[test]
fn test_end_to_end_relay() {
    let sender = Arc::new(Bridge::with_token(config(), Token(0x5E4D)).unwrap());
    let receiver = Arc::new(Bridge::with_token(config(), Token(0x4EC5)).unwrap());

    let sender_air = MemoryRadio::default();
    let receiver_air = MemoryRadio::default();

    let (mut sender_sched, mut outbox) =
        LinkScheduler::new(Arc::clone(&sender), sender_air.clone(), Arc::new(TickSignal::new()));
    let (mut receiver_sched, _) = LinkScheduler::new(
        Arc::clone(&receiver),
        receiver_air.clone(),
        Arc::new(TickSignal::new()),
    );

    // the host starts streaming before any peer shows up
    assert!(receiver.on_altsetting_changed(1, 1));
    assert_eq!(receiver.gate_state(), GateState::Open);

    // the receiver advertises itself, the sender discovers it
    assert!(receiver_sched.on_tick().beacon_sent);
    assert_eq!(receiver_air.deliver(RECEIVER, SENDER, &*sender), 1);
    assert_eq!(sender.destination(), Some(RECEIVER));

    let samples: Vec<u8> = (0..96u16).flat_map(|s| s.to_le_bytes()).collect();
    assert_eq!(outbox.push(&samples), samples.len());

    // 192 bytes fit in one datagram
    let report = sender_sched.on_tick();
    assert!(report.beacon_sent);
    assert_eq!(report.audio_sent, samples.len());

    // the sender's own beacon goes out alongside the audio
    assert_eq!(sender_air.deliver(SENDER, RECEIVER, &*receiver), 2);
    assert_eq!(receiver.binding(), PeerBinding::Bound(Token(0x5E4D)));

    let mut host_buf = vec![0; 512];
    let n = receiver.on_transfer_ready(&mut host_buf);
    assert_eq!(&host_buf[..n], samples.as_slice());

    let stats = receiver.stats();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.lost, 0);
    assert_eq!(stats.dropped_bytes, 0);

    // underrun: the host gets nothing rather than waiting
    assert_eq!(receiver.on_transfer_ready(&mut host_buf), 0);
}

#[test]
fn test_large_backlog_is_split_on_frame_boundaries() {
    let sender = Arc::new(Bridge::with_token(config(), Token(1)).unwrap());
    let air = MemoryRadio::default();

    let (mut scheduler, mut outbox) =
        LinkScheduler::new(Arc::clone(&sender), air.clone(), Arc::new(TickSignal::new()));

    // make the sender aware of a peer
    sender.on_frame_received(RECEIVER, &beacon_from(Token(2)));

    let capacity = sender.config().outbox_capacity.get();

    outbox.push(&[0x11; 501]);
    assert_eq!(outbox.available(), capacity - 501);

    let sizes: Vec<usize> = (0..4).map(|_| scheduler.on_tick().audio_sent).collect();

    // at most 240 bytes each, frames never split, the odd trailing byte stays queued
    assert_eq!(sizes, [240, 240, 20, 0]);
    assert_eq!(outbox.available(), capacity - 1);
}

#[test]
fn test_silent_peer_is_torn_down() {
    let config = BridgeConfig {
        peer_timeout: Duration::from_millis(20),
        ..config()
    };

    let receiver = Arc::new(Bridge::with_token(config, Token(3)).unwrap());
    let (mut scheduler, _) =
        LinkScheduler::new(Arc::clone(&receiver), MemoryRadio::default(), Arc::new(TickSignal::new()));

    receiver.on_altsetting_changed(1, 1);

    let frame = encode(&[0; 4], DatagramKind::Unicast, DiscoveryFlag::PEER_SEEN, 0, Token(9)).unwrap();
    receiver.on_frame_received(SENDER, &frame);

    assert!(!scheduler.on_tick().torn_down);
    assert_eq!(receiver.binding(), PeerBinding::Bound(Token(9)));

    std::thread::sleep(Duration::from_millis(40));

    assert!(scheduler.on_tick().torn_down);
    assert_eq!(receiver.binding(), PeerBinding::Unbound);
    assert_eq!(receiver.gate_state(), GateState::Closed);
    assert!(receiver.flow().is_empty());
}

#[test]
fn test_new_peer_heard_after_teardown() {
    let config = BridgeConfig {
        peer_timeout: Duration::from_millis(20),
        ..config()
    };

    let receiver = Arc::new(Bridge::with_token(config, Token(3)).unwrap());
    let (mut scheduler, _) =
        LinkScheduler::new(Arc::clone(&receiver), MemoryRadio::default(), Arc::new(TickSignal::new()));

    // the host selects the streaming setting once, and keeps it
    assert!(receiver.on_altsetting_changed(1, 1));

    let first = encode(&[0; 4], DatagramKind::Unicast, DiscoveryFlag::PEER_SEEN, 0, Token(9)).unwrap();
    receiver.on_frame_received(SENDER, &first);

    std::thread::sleep(Duration::from_millis(40));
    assert!(scheduler.on_tick().torn_down);
    assert_eq!(receiver.gate_state(), GateState::Closed);

    // the sender came back with a new session
    for seq in 0..50u16 {
        let payload = seq.to_le_bytes();
        let frame =
            encode(&payload, DatagramKind::Unicast, DiscoveryFlag::PEER_SEEN, seq, Token(77)).unwrap();
        receiver.on_frame_received(SENDER, &frame);
    }

    assert_eq!(receiver.binding(), PeerBinding::Bound(Token(77)));
    assert_eq!(receiver.gate_state(), GateState::Open);

    let mut host_buf = vec![0; 256];
    let n = receiver.on_transfer_ready(&mut host_buf);

    let expected: Vec<u8> = (0..50u16).flat_map(u16::to_le_bytes).collect();
    assert_eq!(&host_buf[..n], expected.as_slice());
    assert_eq!(receiver.stats().dropped_bytes, 0);
    assert_eq!(receiver.stats().accepted, 51);
}

#[test]
fn test_host_controls_through_transport() {
    let bridge = Bridge::new(BridgeConfig::default()).unwrap();

    let mute = ControlRequest::set(RequestCode::Cur, 2, selector::FU_MUTE, 1, &[1]);
    assert_eq!(bridge.on_control_request(&mute).map(|r| r.len()), Ok(0));

    let reply = bridge
        .on_control_request(&ControlRequest::get(RequestCode::Cur, 2, selector::FU_MUTE, 1))
        .unwrap();
    assert_eq!(reply.as_slice(), &[1]);

    let bogus = ControlRequest::get(RequestCode::Cur, 7, 1, 0);
    assert!(bridge.on_control_request(&bogus).is_err());
}
