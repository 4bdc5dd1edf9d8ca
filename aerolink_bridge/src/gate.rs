//! Gates the flow buffer according to the host's streaming interface alternate setting.

use aerolink_utils::FlowBuffer;
use serde::{Deserialize, Serialize};

/// Identifies the audio streaming interface, and its audio-carrying alternate setting.
///
/// Alternate setting `0` is the zero-bandwidth setting the host selects when idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamingInterface {
    pub interface: u8,
    pub streaming_alt: u8,
}

impl Default for StreamingInterface {
    fn default() -> Self {
        Self {
            interface: 1,
            streaming_alt: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AltSetting {
    /// An interface other than the streaming one.
    Foreign,
    ZeroBandwidth,
    Streaming,
    /// An alternate setting the streaming interface doesn't declare.
    Unknown(u8),
}

impl StreamingInterface {
    pub const fn classify(&self, interface: u8, alt: u8) -> AltSetting {
        if interface != self.interface {
            AltSetting::Foreign
        } else if alt == 0 {
            AltSetting::ZeroBandwidth
        } else if alt == self.streaming_alt {
            AltSetting::Streaming
        } else {
            AltSetting::Unknown(alt)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GateState {
    #[default]
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Opened,
    Closed,
    Unchanged,
}

/// Two-state machine driving the [`FlowBuffer`]'s activation.
///
/// Opening activates the buffer, closing deactivates it, both flushing it. Redundant
/// transitions are no-ops, except that closing always flushes, so that an endpoint close
/// never leaves stale bytes behind.
///
/// The gate also remembers whether the host has selected the streaming setting. A link
/// teardown [`suspend`](Self::suspend)s the gate without forgetting that choice, so that the
/// next peer to bind can [`resume`](Self::resume) it.
#[derive(Debug, Default)]
pub struct StreamGate {
    state: GateState,
    host_streaming: bool,
}

impl StreamGate {
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            state: GateState::Closed,
            host_streaming: false,
        }
    }

    #[inline(always)]
    pub const fn state(&self) -> GateState {
        self.state
    }

    /// Whether the host currently has the streaming alternate setting selected.
    #[inline(always)]
    pub const fn host_streaming(&self) -> bool {
        self.host_streaming
    }

    /// The host selected the streaming setting.
    pub fn open(&mut self, flow: &FlowBuffer) -> Transition {
        self.host_streaming = true;
        self.activate(flow)
    }

    /// The host went idle, or closed the endpoint.
    pub fn close(&mut self, flow: &FlowBuffer) -> Transition {
        self.host_streaming = false;
        self.deactivate(flow)
    }

    /// The link was torn down. Closes the gate, but keeps the host's choice.
    pub fn suspend(&mut self, flow: &FlowBuffer) -> Transition {
        self.deactivate(flow)
    }

    /// A peer bound. Reopens the gate if the host is still streaming.
    pub fn resume(&mut self, flow: &FlowBuffer) -> Transition {
        if self.host_streaming {
            self.activate(flow)
        } else {
            Transition::Unchanged
        }
    }

    fn activate(&mut self, flow: &FlowBuffer) -> Transition {
        match self.state {
            GateState::Open => Transition::Unchanged,
            GateState::Closed => {
                flow.set_active(true);
                self.state = GateState::Open;
                Transition::Opened
            }
        }
    }

    fn deactivate(&mut self, flow: &FlowBuffer) -> Transition {
        flow.set_active(false);

        match self.state {
            GateState::Closed => Transition::Unchanged,
            GateState::Open => {
                self.state = GateState::Closed;
                Transition::Closed
            }
        }
    }
}
