//! Per-channel feature unit state, and the clock source state.
//!
//! Everything is stored in atomics, so that state can be inspected from any thread while the
//! control path runs. Mutations only ever come from
//! [`ControlSurface::set`](crate::control::ControlSurface::set).

use arrayvec::ArrayVec;
use core::sync::atomic::{AtomicBool, AtomicI16, AtomicU32, Ordering};
use serde::{Deserialize, Serialize};

/// Volume values are expressed in 1/256 dB.
pub const UNITS_PER_DB: i16 = 256;

/// Clock ranges are encoded as a 2-byte count followed by 12 bytes per rate, and the whole
/// reply must fit in a control transfer.
pub const MAX_SAMPLE_RATES: usize = (crate::control::CONTROL_BUF_LEN - 2) / 12;

pub type SampleRates = ArrayVec<u32, MAX_SAMPLE_RATES>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeRange {
    pub min: i16,
    pub max: i16,
    pub resolution: u16,
}

impl Default for VolumeRange {
    fn default() -> Self {
        Self::from_db(-50, 0)
    }
}

impl VolumeRange {
    /// A range between two whole dB values, with 1 dB resolution.
    #[inline(always)]
    pub const fn from_db(min_db: i16, max_db: i16) -> Self {
        Self {
            min: min_db * UNITS_PER_DB,
            max: max_db * UNITS_PER_DB,
            resolution: UNITS_PER_DB as u16,
        }
    }

    #[inline(always)]
    pub const fn contains(&self, volume: i16) -> bool {
        self.min <= volume && volume <= self.max
    }

    #[inline(always)]
    pub fn clamp(&self, volume: i16) -> i16 {
        volume.clamp(self.min, self.max)
    }
}

#[derive(Debug)]
pub struct ChannelState {
    muted: AtomicBool,
    volume: AtomicI16,
    range: VolumeRange,
}

impl ChannelState {
    /// Unmuted, at 0 dB (or the nearest value the range allows).
    pub fn new(range: VolumeRange) -> Self {
        Self {
            muted: AtomicBool::new(false),
            volume: AtomicI16::new(range.clamp(0)),
            range,
        }
    }

    #[inline(always)]
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn volume(&self) -> i16 {
        self.volume.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub const fn range(&self) -> VolumeRange {
        self.range
    }

    #[inline(always)]
    pub(crate) fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    /// Stores `volume` as given. Returns whether it lies within the channel's range.
    #[inline(always)]
    pub(crate) fn set_volume(&self, volume: i16) -> bool {
        self.volume.store(volume, Ordering::Relaxed);
        self.range.contains(volume)
    }
}

/// Channel states indexed by channel number. Channel `0` is the master channel.
#[derive(Debug)]
pub struct ChannelTable(Box<[ChannelState]>);

impl ChannelTable {
    /// A table with a master channel plus `n_channels` logical channels.
    pub fn new(n_channels: u8, range: VolumeRange) -> Self {
        Self(
            (0..=n_channels)
                .map(|_| ChannelState::new(range))
                .collect(),
        )
    }

    #[inline(always)]
    pub fn get(&self, channel: u8) -> Option<&ChannelState> {
        self.0.get(usize::from(channel))
    }

    /// Number of entries, the master channel included.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

}

/// The clock source: a fixed set of supported rates, and the current one.
#[derive(Debug)]
pub struct ClockState {
    rates: SampleRates,
    current: AtomicU32,
}

impl ClockState {
    /// `current` should be one of `rates`, which configuration validation ensures.
    pub fn new(rates: SampleRates, current: u32) -> Self {
        Self {
            rates,
            current: AtomicU32::new(current),
        }
    }

    #[inline(always)]
    pub fn rates(&self) -> &[u32] {
        &self.rates
    }

    #[inline(always)]
    pub fn current_rate(&self) -> u32 {
        self.current.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn supports(&self, rate: u32) -> bool {
        self.rates.contains(&rate)
    }

    /// The clock is free-running and always reported valid.
    #[inline(always)]
    pub const fn is_valid(&self) -> bool {
        true
    }

    /// Returns whether `rate` is supported (and was thus applied).
    #[inline(always)]
    pub(crate) fn set_current_rate(&self, rate: u32) -> bool {
        let supported = self.supports(rate);

        if supported {
            self.current.store(rate, Ordering::Relaxed);
        }

        supported
    }
}
