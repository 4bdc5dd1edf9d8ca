//! A real-time bridge relaying audio received over a datagram radio to a host audio
//! interface.
//!
//! Three contexts meet here, none of which may wait on another:
//!
//! - the **radio** context, delivering frames through [`RadioSink`],
//! - the **host** context, pulling audio and issuing control requests through
//!   [`TransportSink`],
//! - the **tick** context, a periodic timer waking the [`LinkScheduler`] through a
//!   [`TickSignal`](aerolink_utils::TickSignal) to emit beacons and queued audio.
//!
//! The [`Bridge`] owns the state they share: the flow buffer between radio and host, the
//! stream gate activating it, the control surface, and the peer link.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod control;
pub mod gate;
pub mod link;
pub mod scheduler;

pub use bridge::{Bridge, RadioSink, TransportSink};
pub use config::{BridgeConfig, ConfigError};
pub use control::{ControlRequest, ControlResponse, ControlSurface, RequestCode, RequestError};
pub use gate::{GateState, StreamGate};
pub use link::LinkStats;
pub use scheduler::{LinkScheduler, Outbox, RadioTx, TickReport};

pub use aerolink_proto as proto;
pub use aerolink_utils as utils;
