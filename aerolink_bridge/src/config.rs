//! Build-time parameters of a bridge.

use crate::{
    channel::{MAX_SAMPLE_RATES, VolumeRange},
    control::EntityIds,
    gate::StreamingInterface,
};
use aerolink_proto::format::StreamFormat;
use core::{fmt, num, time::Duration};
use serde::{Deserialize, Serialize};

/// Milliseconds of audio the flow buffer holds by default.
pub const DEFAULT_BUFFER_MILLIS: u32 = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Flow buffer capacity, in bytes.
    pub flow_capacity: num::NonZeroUsize,
    /// Capacity of the outgoing audio queue, in bytes.
    pub outbox_capacity: num::NonZeroUsize,
    pub sample_rates: Vec<u32>,
    pub initial_sample_rate: u32,
    /// Number of logical channels, not counting the master channel.
    pub n_channels: u8,
    pub volume_range: VolumeRange,
    pub streaming: StreamingInterface,
    pub entities: EntityIds,
    /// Format advertised in beacons, and expected from peers.
    pub format: StreamFormat,
    pub tick_period: Duration,
    pub beacon_every_ticks: num::NonZeroUsize,
    /// A bound peer silent for longer than this is considered gone.
    pub peer_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let format = StreamFormat::MONO_48K_I16;

        let capacity = num::NonZeroUsize::new(format.bytes_per_millis(DEFAULT_BUFFER_MILLIS))
            .unwrap_or(num::NonZeroUsize::MIN);

        Self {
            flow_capacity: capacity,
            outbox_capacity: capacity,
            sample_rates: vec![44100, 48000],
            initial_sample_rate: format.sample_rate,
            n_channels: format.channels.get(),
            volume_range: VolumeRange::from_db(-50, 0),
            streaming: StreamingInterface::default(),
            entities: EntityIds::default(),
            format,
            tick_period: Duration::from_millis(1),
            beacon_every_ticks: num::NonZeroUsize::new(250).unwrap_or(num::NonZeroUsize::MIN),
            peer_timeout: Duration::from_millis(600),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rates.is_empty() {
            return Err(ConfigError::NoSampleRates);
        }

        if self.sample_rates.len() > MAX_SAMPLE_RATES {
            return Err(ConfigError::TooManySampleRates {
                count: self.sample_rates.len(),
            });
        }

        if !self.sample_rates.contains(&self.initial_sample_rate) {
            return Err(ConfigError::InitialRateNotListed(self.initial_sample_rate));
        }

        if !self.sample_rates.contains(&self.format.sample_rate) {
            return Err(ConfigError::FormatRateNotListed(self.format.sample_rate));
        }

        if self.n_channels == 0 {
            return Err(ConfigError::NoChannels);
        }

        let VolumeRange { min, max, .. } = self.volume_range;

        if min > max {
            return Err(ConfigError::InvertedVolumeRange { min, max });
        }

        if self.streaming.streaming_alt == 0 {
            return Err(ConfigError::ZeroStreamingAlt);
        }

        if self.flow_capacity < self.format.frame_size() {
            return Err(ConfigError::CapacityBelowFrame {
                capacity: self.flow_capacity.get(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigError {
    NoSampleRates,
    TooManySampleRates { count: usize },
    InitialRateNotListed(u32),
    FormatRateNotListed(u32),
    NoChannels,
    InvertedVolumeRange { min: i16, max: i16 },
    /// Alternate setting `0` is reserved for the zero-bandwidth setting.
    ZeroStreamingAlt,
    CapacityBelowFrame { capacity: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSampleRates => write!(f, "at least one sample rate is required"),
            Self::TooManySampleRates { count } => write!(
                f,
                "{count} sample rates configured, at most {MAX_SAMPLE_RATES} are supported"
            ),
            Self::InitialRateNotListed(rate) => {
                write!(f, "initial sample rate {rate}Hz is not a supported rate")
            }
            Self::FormatRateNotListed(rate) => {
                write!(f, "stream format rate {rate}Hz is not a supported rate")
            }
            Self::NoChannels => write!(f, "at least one channel is required"),
            Self::InvertedVolumeRange { min, max } => {
                write!(f, "volume range minimum {min} exceeds maximum {max}")
            }
            Self::ZeroStreamingAlt => {
                write!(f, "the streaming alternate setting must not be 0")
            }
            Self::CapacityBelowFrame { capacity } => {
                write!(f, "a flow buffer of {capacity} bytes cannot hold a single frame")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_firmware() {
        let config = BridgeConfig::default();

        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.flow_capacity.get(), 3840);
        assert_eq!(config.sample_rates, [44100, 48000]);
        assert_eq!(config.initial_sample_rate, 48000);
        assert_eq!(config.n_channels, 1);
        assert_eq!(
            config.volume_range,
            VolumeRange {
                min: -12800,
                max: 0,
                resolution: 256
            }
        );
        assert_eq!(config.entities.clock_source, 4);
    }

    #[test]
    fn test_rejections() {
        let base = BridgeConfig::default();

        let config = BridgeConfig {
            sample_rates: vec![],
            ..base.clone()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoSampleRates));

        let config = BridgeConfig {
            sample_rates: vec![8000, 16000, 22050, 32000, 44100, 48000],
            ..base.clone()
        };
        assert_eq!(config.validate(), Err(ConfigError::TooManySampleRates { count: 6 }));

        let config = BridgeConfig {
            initial_sample_rate: 96000,
            ..base.clone()
        };
        assert_eq!(config.validate(), Err(ConfigError::InitialRateNotListed(96000)));

        let config = BridgeConfig {
            n_channels: 0,
            ..base.clone()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoChannels));

        let config = BridgeConfig {
            volume_range: VolumeRange {
                min: 10,
                max: -10,
                resolution: 1,
            },
            ..base.clone()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvertedVolumeRange { .. })));

        let config = BridgeConfig {
            streaming: StreamingInterface {
                interface: 1,
                streaming_alt: 0,
            },
            ..base
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroStreamingAlt));
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = BridgeConfig {
            sample_rates: vec![48000],
            peer_timeout: Duration::from_millis(250),
            ..BridgeConfig::default()
        };

        let bytes = postcard::to_allocvec(&config).unwrap();
        let decoded: BridgeConfig = postcard::from_bytes(&bytes).unwrap();

        assert_eq!(decoded, config);
    }
}
