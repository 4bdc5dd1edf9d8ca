//! Desktop adapters for the bridge: JACK stands in for the host audio interface, and a UDP
//! socket stands in for the radio.

pub use aerolink_bridge as bridge;

pub mod playback;
pub mod radio;

pub use playback::{Playback, PlaybackError, PlaybackHandler};
pub use radio::UdpRadio;

/// The only format supported by JACK
pub type JackSample = f32;
