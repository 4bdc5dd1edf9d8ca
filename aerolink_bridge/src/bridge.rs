use crate::{
    config::{BridgeConfig, ConfigError},
    channel::{ChannelTable, ClockState},
    control::{ControlRequest, ControlResponse, ControlSurface, RequestError},
    gate::{AltSetting, GateState, StreamGate, Transition},
    link::{Heard, LinkCounters, LinkStats, PeerLink, SequenceEvent, bump},
};
use aerolink_proto::{Admission, PeerAddr, PeerBinding, Token, format::Beacon};
use aerolink_utils::FlowBuffer;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Callbacks from the host transport (a USB audio class function, or anything acting like
/// one).
pub trait TransportSink {
    /// A class-specific control request. Errors are reported to the host as a stall.
    fn on_control_request(
        &self,
        request: &ControlRequest<'_>,
    ) -> Result<ControlResponse, RequestError>;

    /// The host is about to pull audio. Fills `buf` with as many buffered bytes as
    /// available, returning how many. Must not block.
    fn on_transfer_ready(&self, buf: &mut [u8]) -> usize;

    /// The host selected alternate setting `alt` on `interface`. Returns whether the
    /// setting is accepted.
    fn on_altsetting_changed(&self, interface: u8, alt: u8) -> bool;

    /// The host closed an endpoint of `interface`.
    fn on_endpoint_closed(&self, interface: u8);
}

/// Callbacks from the radio.
pub trait RadioSink {
    /// A frame arrived from `source`. Must not block.
    fn on_frame_received(&self, source: PeerAddr, frame: &[u8]);
}

impl<T: TransportSink + ?Sized> TransportSink for Arc<T> {
    #[inline(always)]
    fn on_control_request(
        &self,
        request: &ControlRequest<'_>,
    ) -> Result<ControlResponse, RequestError> {
        T::on_control_request(self, request)
    }

    #[inline(always)]
    fn on_transfer_ready(&self, buf: &mut [u8]) -> usize {
        T::on_transfer_ready(self, buf)
    }

    #[inline(always)]
    fn on_altsetting_changed(&self, interface: u8, alt: u8) -> bool {
        T::on_altsetting_changed(self, interface, alt)
    }

    #[inline(always)]
    fn on_endpoint_closed(&self, interface: u8) {
        T::on_endpoint_closed(self, interface)
    }
}

impl<T: RadioSink + ?Sized> RadioSink for Arc<T> {
    #[inline(always)]
    fn on_frame_received(&self, source: PeerAddr, frame: &[u8]) {
        T::on_frame_received(self, source, frame)
    }
}

#[inline(always)]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connects the radio to the host.
///
/// Received audio flows from [`RadioSink::on_frame_received`] through the [`FlowBuffer`] to
/// [`TransportSink::on_transfer_ready`]. The host's alternate setting choices open and
/// close the [`StreamGate`] guarding the buffer, and its control requests are answered by
/// the [`ControlSurface`].
///
/// All methods take `&self`, the bridge is meant to be shared (e.g. in an [`Arc`]) between
/// the radio, host and scheduler contexts.
#[derive(Debug)]
pub struct Bridge {
    config: BridgeConfig,
    token: Token,
    flow: FlowBuffer,
    gate: Mutex<StreamGate>,
    control: ControlSurface,
    link: Mutex<PeerLink>,
    counters: LinkCounters,
}

impl Bridge {
    /// Creates a bridge with a random session token.
    pub fn new(config: BridgeConfig) -> Result<Self, ConfigError> {
        Self::with_token(config, Token(rand::random()))
    }

    pub fn with_token(config: BridgeConfig, token: Token) -> Result<Self, ConfigError> {
        config.validate()?;

        let channels = ChannelTable::new(config.n_channels, config.volume_range);

        let clock = ClockState::new(
            config.sample_rates.iter().copied().collect(),
            config.initial_sample_rate,
        );

        log::info!("bridge up, session token {token}");

        Ok(Self {
            flow: FlowBuffer::new(config.flow_capacity),
            gate: Mutex::new(StreamGate::new()),
            control: ControlSurface::new(config.entities, channels, clock),
            link: Mutex::new(PeerLink::default()),
            counters: LinkCounters::default(),
            token,
            config,
        })
    }

    #[inline(always)]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[inline(always)]
    pub const fn token(&self) -> Token {
        self.token
    }

    #[inline(always)]
    pub const fn flow(&self) -> &FlowBuffer {
        &self.flow
    }

    #[inline(always)]
    pub const fn control(&self) -> &ControlSurface {
        &self.control
    }

    pub fn gate_state(&self) -> GateState {
        lock(&self.gate).state()
    }

    pub fn binding(&self) -> PeerBinding {
        lock(&self.link).binding
    }

    pub fn stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    /// Where the scheduler should send audio, if anywhere.
    pub fn destination(&self) -> Option<PeerAddr> {
        lock(&self.link).destination()
    }

    /// Whether any compatible peer is known, bound or not.
    pub fn has_peer(&self) -> bool {
        lock(&self.link).has_peer()
    }

    /// Unbinds the current peer and closes the gate, until a new peer binds.
    pub fn tear_down(&self) {
        let addr = lock(&self.link).unbind();

        if let Some(addr) = addr {
            log::info!("link to {addr} torn down");
        }

        if lock(&self.gate).suspend(&self.flow) == Transition::Closed {
            log::info!("stream gate closed until a peer binds");
        }
    }

    /// Tears the link down if the bound peer went silent, and forgets silent candidates.
    ///
    /// Returns whether the link was torn down.
    pub fn expire_peers(&self) -> bool {
        let timeout = self.config.peer_timeout;

        let mut link = lock(&self.link);

        if let Some(addr) = link.expire_candidate(timeout) {
            log::info!("lost sight of {addr}");
        }

        if !link.bound_expired(timeout) {
            return false;
        }

        drop(link);
        log::info!("bound peer silent for over {timeout:?}");
        self.tear_down();
        true
    }

    fn open_gate(&self) {
        if lock(&self.gate).open(&self.flow) == Transition::Opened {
            log::info!("stream gate opened");
        }
    }

    fn close_gate(&self) {
        if lock(&self.gate).close(&self.flow) == Transition::Closed {
            log::info!("stream gate closed");
        }
    }

    fn resume_gate(&self) {
        if lock(&self.gate).resume(&self.flow) == Transition::Opened {
            log::info!("stream gate reopened");
        }
    }

    fn on_beacon(&self, link: &mut PeerLink, source: PeerAddr, payload: &[u8]) {
        let beacon = match Beacon::decode(payload) {
            Ok(beacon) => beacon,
            Err(e) => {
                bump(&self.counters.corrupt, 1);
                log::trace!("bad beacon from {source}: {e}");
                return;
            }
        };

        if !beacon.is_compatible(&self.config.format) {
            log::debug!("ignoring {source}, incompatible format {:?}", beacon.format);
            return;
        }

        match &mut link.candidate {
            Some(heard) if heard.addr == source => heard.timer.reset(),
            candidate => {
                log::info!("discovered {source}");
                *candidate = Some(Heard::now(source));
            }
        }

        if let Some(bound) = link.bound.as_mut().filter(|heard| heard.addr == source) {
            bound.timer.reset();
        }
    }

    fn on_audio(&self, link: &mut PeerLink, source: PeerAddr, sequence: u16) {
        match &mut link.bound {
            Some(heard) => heard.timer.reset(),
            bound => *bound = Some(Heard::now(source)),
        }

        match link.sequence.observe(sequence) {
            SequenceEvent::InOrder => {}
            SequenceEvent::Gap(n) => bump(&self.counters.lost, u64::from(n)),
            SequenceEvent::Behind => bump(&self.counters.reordered, 1),
        }
    }
}

impl RadioSink for Bridge {
    fn on_frame_received(&self, source: PeerAddr, frame: &[u8]) {
        let datagram = match aerolink_proto::decode(frame) {
            Ok(datagram) => datagram,
            Err(e) => {
                bump(&self.counters.corrupt, 1);
                log::trace!("dropping frame from {source}: {e}");
                return;
            }
        };

        let header = datagram.header;

        // our own broadcasts, looped back
        if header.token == self.token {
            return;
        }

        // only contended by the scheduler's tick, dropping beats waiting
        let Ok(mut link) = self.link.try_lock() else {
            log::trace!("link busy, dropping frame from {source}");
            return;
        };

        let admission = link.binding.admit(&header);

        match admission {
            Admission::Foreign => {
                drop(link);
                bump(&self.counters.foreign, 1);
                log::trace!("foreign frame from {source} (token {})", header.token);
                return;
            }
            Admission::Discovery => {
                self.on_beacon(&mut link, source, datagram.payload);
                return;
            }
            Admission::Bound(token) => {
                log::info!("bound to {source} (token {token})");
                self.on_audio(&mut link, source, header.sequence);
            }
            Admission::Accepted => self.on_audio(&mut link, source, header.sequence),
        }

        drop(link);

        if let Admission::Bound(_) = admission {
            self.resume_gate();
        }

        bump(&self.counters.accepted, 1);

        let payload = datagram.payload;
        let written = self.flow.write_frames(payload, self.config.format.frame_size());

        if written < payload.len() {
            bump(&self.counters.dropped_bytes, (payload.len() - written) as u64);
        }
    }
}

impl TransportSink for Bridge {
    fn on_control_request(
        &self,
        request: &ControlRequest<'_>,
    ) -> Result<ControlResponse, RequestError> {
        let res = self.control.handle(request);

        if let Err(e) = &res {
            log::debug!("rejected control request {request:?}: {e}");
        }

        res
    }

    #[inline]
    fn on_transfer_ready(&self, buf: &mut [u8]) -> usize {
        self.flow.read(buf)
    }

    fn on_altsetting_changed(&self, interface: u8, alt: u8) -> bool {
        match self.config.streaming.classify(interface, alt) {
            AltSetting::Foreign => true,
            AltSetting::ZeroBandwidth => {
                self.close_gate();
                true
            }
            AltSetting::Streaming => {
                self.open_gate();
                true
            }
            AltSetting::Unknown(alt) => {
                log::debug!("rejecting alternate setting {alt} of interface {interface}");
                false
            }
        }
    }

    fn on_endpoint_closed(&self, interface: u8) {
        if interface == self.config.streaming.interface {
            self.close_gate();
        }
    }
}
