//! Local playback: a JACK client pulling audio out of the bridge, the way a host would.

use crate::JackSample;
use aerolink_bridge::{TransportSink, gate::StreamingInterface};
use core::{fmt, num};

/// The bridge carries 16-bit mono PCM.
pub const BYTES_PER_SAMPLE: usize = size_of::<i16>();

/// Upper bound on JACK's period size, the scratch buffer is allocated for it up front.
pub const MAX_FRAMES: usize = 8192;

/// Converts little-endian 16-bit PCM to floating point, filling whatever `pcm` doesn't
/// cover with silence.
///
/// Returns the number of samples converted.
pub fn pcm_i16_to_f32(pcm: &[u8], out: &mut [JackSample]) -> usize {
    let mut converted = 0;

    for (dest, sample) in out.iter_mut().zip(pcm.chunks_exact(BYTES_PER_SAMPLE)) {
        *dest = JackSample::from(i16::from_le_bytes([sample[0], sample[1]])) / 32768.;
        converted += 1;
    }

    out[converted..].fill(0.);
    converted
}

/// Pulls one period of audio per cycle through [`TransportSink::on_transfer_ready`], and
/// writes it to every output port.
///
/// Underruns are padded with silence, never waited for.
pub struct PlaybackHandler<S> {
    sink: S,
    ports: Box<[jack::Port<jack::AudioOut>]>,
    pcm: Box<[u8]>,
}

impl<S> PlaybackHandler<S> {
    pub fn new(sink: S, ports: impl IntoIterator<Item = jack::Port<jack::AudioOut>>) -> Self {
        Self {
            sink,
            ports: ports.into_iter().collect(),
            pcm: vec![0; MAX_FRAMES * BYTES_PER_SAMPLE].into_boxed_slice(),
        }
    }
}

impl<S: TransportSink + Send> jack::ProcessHandler for PlaybackHandler<S> {
    fn process(&mut self, _client: &jack::Client, scope: &jack::ProcessScope) -> jack::Control {
        let n_frames = (scope.n_frames() as usize).min(MAX_FRAMES);

        let pcm = &mut self.pcm[..n_frames * BYTES_PER_SAMPLE];
        let n = self.sink.on_transfer_ready(pcm);

        let Some((first, rest)) = self.ports.split_first_mut() else {
            return jack::Control::Continue;
        };

        // mono, duplicated to every port
        let first = first.as_mut_slice(scope);
        pcm_i16_to_f32(&pcm[..n], first);

        for port in rest {
            port.as_mut_slice(scope).copy_from_slice(first);
        }

        jack::Control::Continue
    }
}

#[derive(Debug)]
pub enum PlaybackError {
    Jack(jack::Error),
    AltSettingRejected { interface: u8, alt: u8 },
}

impl From<jack::Error> for PlaybackError {
    fn from(e: jack::Error) -> Self {
        Self::Jack(e)
    }
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jack(e) => write!(f, "JACK error: {e}"),
            Self::AltSettingRejected { interface, alt } => {
                write!(f, "alternate setting {alt} of interface {interface} was rejected")
            }
        }
    }
}

impl std::error::Error for PlaybackError {}

/// An active JACK playback client.
///
/// Starting one selects the streaming alternate setting, dropping it closes the endpoint.
pub struct Playback<S: TransportSink + Send + 'static> {
    client: Option<jack::AsyncClient<(), PlaybackHandler<S>>>,
    sink: S,
    interface: u8,
}

impl<S: TransportSink + Send + Clone + 'static> Playback<S> {
    pub fn start(
        name: &str,
        sink: S,
        n_ports: num::NonZeroUsize,
        streaming: StreamingInterface,
    ) -> Result<Self, PlaybackError> {
        let (client, _status) = jack::Client::new(name, jack::ClientOptions::NO_START_SERVER)?;

        let ports = (1..=n_ports.get())
            .map(|i| client.register_port(&format!("output_{i}"), jack::AudioOut::default()))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "JACK client {name} up at {}Hz, {} frames per period",
            client.sample_rate(),
            client.buffer_size(),
        );

        let handler = PlaybackHandler::new(sink.clone(), ports);

        let playback = Self {
            client: Some(client.activate_async((), handler)?),
            sink,
            interface: streaming.interface,
        };

        let StreamingInterface {
            interface,
            streaming_alt: alt,
        } = streaming;

        if !playback.sink.on_altsetting_changed(interface, alt) {
            return Err(PlaybackError::AltSettingRejected { interface, alt });
        }

        Ok(playback)
    }
}

impl<S: TransportSink + Send + 'static> Drop for Playback<S> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.deactivate() {
                log::warn!("failed to deactivate JACK client: {e}");
            }
        }

        self.sink.on_endpoint_closed(self.interface);
    }
}
