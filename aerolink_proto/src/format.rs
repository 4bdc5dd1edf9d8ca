//! Stream format descriptions, and the discovery beacon advertising them.

use core::{fmt, num};
use serde::{Deserialize, Serialize};

/// Supported sample formats.
///
/// All samples are packed, little-endian, interleaved and uncompressed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SampleType {
    I16,
    I24,
    I32,
    IEEF32,
}

impl SampleType {
    /// Returns the size of a single sample in bytes.
    #[inline(always)]
    pub const fn sample_size(self) -> num::NonZeroU8 {
        use SampleType::*;
        let res = match self {
            I16 => 2,
            I24 => 3,
            I32 | IEEF32 => 4,
        };

        num::NonZeroU8::new(res).unwrap()
    }
}

/// A complete audio stream format description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: num::NonZeroU8,
    pub sample_type: SampleType,
}

impl Default for StreamFormat {
    #[inline(always)]
    fn default() -> Self {
        Self::MONO_48K_I16
    }
}

impl StreamFormat {
    pub const MONO_48K_I16: Self = Self {
        sample_rate: 48000,
        channels: num::NonZeroU8::MIN,
        sample_type: SampleType::I16,
    };

    /// Size of a single frame (one sample per channel), in bytes.
    #[inline(always)]
    pub const fn frame_size(&self) -> num::NonZeroUsize {
        let size = self.channels.get() as usize * self.sample_type.sample_size().get() as usize;
        num::NonZeroUsize::new(size).unwrap()
    }

    /// Number of bytes needed to hold `millis` milliseconds of audio.
    #[inline]
    pub const fn bytes_per_millis(&self, millis: u32) -> usize {
        let frames = self.sample_rate as usize * millis as usize / 1000;
        frames * self.frame_size().get()
    }
}

/// Bumped on any incompatible change to [`Beacon`].
pub const BEACON_VERSION: u8 = 1;

/// Payload of broadcast datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Beacon {
    pub version: u8,
    pub format: StreamFormat,
}

impl Beacon {
    #[inline(always)]
    pub const fn new(format: StreamFormat) -> Self {
        Self {
            version: BEACON_VERSION,
            format,
        }
    }

    /// Serializes the beacon into `buf`, returning the used part.
    #[inline]
    pub fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], BeaconError> {
        postcard::to_slice(self, buf).map_err(BeaconError::Postcard)
    }

    #[inline]
    pub fn decode(bytes: &[u8]) -> Result<Self, BeaconError> {
        let beacon: Self = postcard::from_bytes(bytes).map_err(BeaconError::Postcard)?;

        if beacon.version != BEACON_VERSION {
            return Err(BeaconError::Version(beacon.version));
        }

        Ok(beacon)
    }

    /// Whether a node advertising this beacon can stream to one using `local`.
    #[inline(always)]
    pub fn is_compatible(&self, local: &StreamFormat) -> bool {
        self.format == *local
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeaconError {
    Postcard(postcard::Error),
    Version(u8),
}

impl fmt::Display for BeaconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postcard(e) => write!(f, "malformed beacon: {e}"),
            Self::Version(v) => write!(f, "beacon version {v}, expected {BEACON_VERSION}"),
        }
    }
}

impl core::error::Error for BeaconError {}
