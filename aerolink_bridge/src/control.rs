//! Host-facing audio class controls: mute, volume, the clock source, and the input terminal.
//!
//! Requests address an entity (by ID), a control selector within it, and a channel. Get
//! requests produce a reply in the audio class 2.0 layouts:
//!
//! - mute: 1 byte
//! - volume: `i16`
//! - volume range: `u16` count (always `1`), then `{ min: i16, max: i16, res: u16 }`
//! - sample rate: `u32`
//! - sample rate range: `u16` count `N`, then `N` times `{ min: u32, max: u32, res: u32 }`
//! - clock validity: 1 byte
//! - connector: `{ channels: u8, channel_config: u32, channel_names: u8 }`
//!
//! Every field is little-endian. Any failed request leaves all state untouched, and is
//! reported to the host as a stall.

use crate::channel::{ChannelTable, ClockState, SampleRates, VolumeRange};
use arrayvec::ArrayVec;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Size of the control transfer buffer.
pub const CONTROL_BUF_LEN: usize = 64;

pub type ControlResponse = ArrayVec<u8, CONTROL_BUF_LEN>;

/// Control selectors, per entity type.
pub mod selector {
    pub const FU_MUTE: u8 = 0x01;
    pub const FU_VOLUME: u8 = 0x02;

    pub const CS_SAM_FREQ: u8 = 0x01;
    pub const CS_CLOCK_VALID: u8 = 0x02;

    pub const TE_CONNECTOR: u8 = 0x02;
}

/// Class-specific request codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCode {
    Cur,
    Range,
    Other(u8),
}

impl RequestCode {
    pub const CUR: u8 = 0x01;
    pub const RANGE: u8 = 0x02;

    #[inline(always)]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            Self::CUR => Self::Cur,
            Self::RANGE => Self::Range,
            other => Self::Other(other),
        }
    }

    #[inline(always)]
    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Cur => Self::CUR,
            Self::Range => Self::RANGE,
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Get,
    Set,
}

/// A decoded class-specific control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlRequest<'a> {
    pub direction: Direction,
    pub request: RequestCode,
    pub entity: u8,
    pub selector: u8,
    pub channel: u8,
    /// Data stage of set requests. Empty for get requests.
    pub payload: &'a [u8],
}

impl ControlRequest<'static> {
    #[inline(always)]
    pub const fn get(request: RequestCode, entity: u8, selector: u8, channel: u8) -> Self {
        Self {
            direction: Direction::Get,
            request,
            entity,
            selector,
            channel,
            payload: &[],
        }
    }
}

impl<'a> ControlRequest<'a> {
    #[inline(always)]
    pub const fn set(
        request: RequestCode,
        entity: u8,
        selector: u8,
        channel: u8,
        payload: &'a [u8],
    ) -> Self {
        Self {
            direction: Direction::Set,
            request,
            entity,
            selector,
            channel,
            payload,
        }
    }
}

/// Entity IDs of the audio function's topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityIds {
    pub input_terminal: u8,
    pub feature_unit: u8,
    pub clock_source: u8,
}

impl Default for EntityIds {
    fn default() -> Self {
        Self {
            input_terminal: 1,
            feature_unit: 2,
            clock_source: 4,
        }
    }
}

/// The channel cluster reported by the input terminal's connector control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelCluster {
    pub n_channels: u8,
    pub channel_config: u32,
    pub channel_names: u8,
}

impl ChannelCluster {
    /// The terminal always carries one unnamed channel, whatever the feature unit exposes.
    pub const MONO: Self = Self {
        n_channels: 1,
        channel_config: 0,
        channel_names: 0,
    };
}

/// A control's value, as returned by get requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlValue {
    Mute(bool),
    Volume(i16),
    VolumeRange(VolumeRange),
    SampleRate(u32),
    SampleRates(SampleRates),
    ClockValid(bool),
    Connector(ChannelCluster),
}

impl ControlValue {
    /// Serializes the value in its wire layout.
    pub fn encode(&self) -> ControlResponse {
        let mut buf = ControlResponse::new();

        // every layout is bounded by MAX_SAMPLE_RATES to fit CONTROL_BUF_LEN
        match self {
            &Self::Mute(muted) => buf.push(u8::from(muted)),
            &Self::Volume(volume) => buf.extend(volume.to_le_bytes()),
            &Self::VolumeRange(range) => {
                buf.extend(1u16.to_le_bytes());
                buf.extend(range.min.to_le_bytes());
                buf.extend(range.max.to_le_bytes());
                buf.extend(range.resolution.to_le_bytes());
            }
            &Self::SampleRate(rate) => buf.extend(rate.to_le_bytes()),
            Self::SampleRates(rates) => {
                buf.extend((rates.len() as u16).to_le_bytes());
                for &rate in rates {
                    buf.extend(rate.to_le_bytes());
                    buf.extend(rate.to_le_bytes());
                    buf.extend(0u32.to_le_bytes());
                }
            }
            &Self::ClockValid(valid) => buf.push(u8::from(valid)),
            &Self::Connector(cluster) => {
                buf.push(cluster.n_channels);
                buf.extend(cluster.channel_config.to_le_bytes());
                buf.push(cluster.channel_names);
            }
        }

        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestError {
    /// No such entity, selector, or request code for that selector.
    Unsupported {
        entity: u8,
        selector: u8,
        request: RequestCode,
    },
    BadLength {
        expected: usize,
        found: usize,
    },
    NoSuchChannel(u8),
    RateNotSupported(u32),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported {
                entity,
                selector,
                request,
            } => write!(
                f,
                "unsupported request {:#04x} for entity {entity}, selector {selector:#04x}",
                request.to_raw(),
            ),
            Self::BadLength { expected, found } => {
                write!(f, "expected {expected} bytes of data, got {found}")
            }
            Self::NoSuchChannel(channel) => write!(f, "no channel {channel}"),
            Self::RateNotSupported(rate) => write!(f, "unsupported sample rate {rate}Hz"),
        }
    }
}

impl std::error::Error for RequestError {}

#[inline(always)]
fn exact<const N: usize>(payload: &[u8]) -> Result<[u8; N], RequestError> {
    payload.try_into().map_err(|_| RequestError::BadLength {
        expected: N,
        found: payload.len(),
    })
}

/// Holds the state of every host-visible control, and answers control requests.
#[derive(Debug)]
pub struct ControlSurface {
    entities: EntityIds,
    channels: ChannelTable,
    clock: ClockState,
}

impl ControlSurface {
    pub fn new(entities: EntityIds, channels: ChannelTable, clock: ClockState) -> Self {
        Self {
            entities,
            channels,
            clock,
        }
    }

    #[inline(always)]
    pub const fn entities(&self) -> &EntityIds {
        &self.entities
    }

    #[inline(always)]
    pub const fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    #[inline(always)]
    pub const fn clock(&self) -> &ClockState {
        &self.clock
    }

    /// Answers a request, returning the reply bytes (empty for set requests).
    pub fn handle(&self, request: &ControlRequest<'_>) -> Result<ControlResponse, RequestError> {
        let &ControlRequest {
            direction,
            request,
            entity,
            selector,
            channel,
            payload,
        } = request;

        match direction {
            Direction::Get => self
                .get(entity, selector, channel, request)
                .map(|value| value.encode()),
            Direction::Set => self
                .set(entity, selector, channel, request, payload)
                .map(|()| ControlResponse::new()),
        }
    }

    pub fn get(
        &self,
        entity: u8,
        selector: u8,
        channel: u8,
        request: RequestCode,
    ) -> Result<ControlValue, RequestError> {
        use {RequestCode::*, selector::*};

        let unsupported = RequestError::Unsupported {
            entity,
            selector,
            request,
        };

        let ids = &self.entities;

        if entity == ids.input_terminal {
            match (selector, request) {
                (TE_CONNECTOR, Cur) => Ok(ControlValue::Connector(ChannelCluster::MONO)),
                _ => Err(unsupported),
            }
        } else if entity == ids.feature_unit {
            let state = self
                .channels
                .get(channel)
                .ok_or(RequestError::NoSuchChannel(channel));

            match (selector, request) {
                (FU_MUTE, Cur) => Ok(ControlValue::Mute(state?.is_muted())),
                (FU_VOLUME, Cur) => Ok(ControlValue::Volume(state?.volume())),
                (FU_VOLUME, Range) => Ok(ControlValue::VolumeRange(state?.range())),
                _ => Err(unsupported),
            }
        } else if entity == ids.clock_source {
            match (selector, request) {
                (CS_SAM_FREQ, Cur) => Ok(ControlValue::SampleRate(self.clock.current_rate())),
                (CS_SAM_FREQ, Range) => Ok(ControlValue::SampleRates(
                    self.clock.rates().iter().copied().collect(),
                )),
                (CS_CLOCK_VALID, Cur) => Ok(ControlValue::ClockValid(self.clock.is_valid())),
                _ => Err(unsupported),
            }
        } else {
            Err(unsupported)
        }
    }

    pub fn set(
        &self,
        entity: u8,
        selector: u8,
        channel: u8,
        request: RequestCode,
        payload: &[u8],
    ) -> Result<(), RequestError> {
        use {RequestCode::*, selector::*};

        let unsupported = RequestError::Unsupported {
            entity,
            selector,
            request,
        };

        let ids = &self.entities;

        if entity == ids.feature_unit {
            let state = || {
                self.channels
                    .get(channel)
                    .ok_or(RequestError::NoSuchChannel(channel))
            };

            match (selector, request) {
                (FU_MUTE, Cur) => {
                    let [muted] = exact(payload)?;
                    let muted = muted != 0;
                    state()?.set_muted(muted);
                    log::debug!("channel {channel} mute: {muted}");
                }
                (FU_VOLUME, Cur) => {
                    let volume = i16::from_le_bytes(exact(payload)?);

                    if state()?.set_volume(volume) {
                        log::debug!("channel {channel} volume: {volume} (1/256 dB)");
                    } else {
                        log::debug!("channel {channel} volume: {volume} (1/256 dB), outside range");
                    }
                }
                _ => return Err(unsupported),
            }

            Ok(())
        } else if entity == ids.clock_source {
            match (selector, request) {
                (CS_SAM_FREQ, Cur) => {
                    let rate = u32::from_le_bytes(exact(payload)?);

                    if !self.clock.set_current_rate(rate) {
                        return Err(RequestError::RateNotSupported(rate));
                    }

                    log::info!("sample rate set to {rate}Hz");
                    Ok(())
                }
                _ => Err(unsupported),
            }
        } else {
            Err(unsupported)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selector::*;

    fn surface() -> ControlSurface {
        ControlSurface::new(
            EntityIds::default(),
            ChannelTable::new(1, VolumeRange::from_db(-50, 0)),
            ClockState::new([44100, 48000].into_iter().collect(), 48000),
        )
    }

    const FU: u8 = 2;
    const CLOCK: u8 = 4;
    const TERMINAL: u8 = 1;

    #[test]
    fn test_mute_roundtrip() {
        let surface = surface();

        assert_eq!(surface.get(FU, FU_MUTE, 1, RequestCode::Cur), Ok(ControlValue::Mute(false)));

        surface.set(FU, FU_MUTE, 1, RequestCode::Cur, &[1]).unwrap();
        assert_eq!(surface.get(FU, FU_MUTE, 1, RequestCode::Cur), Ok(ControlValue::Mute(true)));

        // other channels are independent
        assert_eq!(surface.get(FU, FU_MUTE, 0, RequestCode::Cur), Ok(ControlValue::Mute(false)));
    }

    #[test]
    fn test_volume_set_and_range_unaffected() {
        let surface = surface();

        surface
            .set(FU, FU_VOLUME, 0, RequestCode::Cur, &(-1280i16).to_le_bytes())
            .unwrap();

        let reply = surface
            .handle(&ControlRequest::get(RequestCode::Cur, FU, FU_VOLUME, 0))
            .unwrap();
        assert_eq!(reply.as_slice(), &(-1280i16).to_le_bytes());

        let range = surface
            .handle(&ControlRequest::get(RequestCode::Range, FU, FU_VOLUME, 0))
            .unwrap();
        assert_eq!(range.as_slice(), &[1, 0, 0x00, 0xCE, 0, 0, 0, 1]);
    }

    #[test]
    fn test_volume_read_back_as_written() {
        let surface = surface();

        // below the advertised range, still stored verbatim
        surface
            .set(FU, FU_VOLUME, 1, RequestCode::Cur, &i16::MIN.to_le_bytes())
            .unwrap();
        assert_eq!(
            surface.get(FU, FU_VOLUME, 1, RequestCode::Cur),
            Ok(ControlValue::Volume(i16::MIN)),
        );
        assert_eq!(
            surface.get(FU, FU_VOLUME, 1, RequestCode::Range),
            Ok(ControlValue::VolumeRange(VolumeRange::from_db(-50, 0))),
        );
    }

    #[test]
    fn test_bad_length_mutates_nothing() {
        let surface = surface();

        assert_eq!(
            surface.set(FU, FU_VOLUME, 0, RequestCode::Cur, &[0x00]),
            Err(RequestError::BadLength { expected: 2, found: 1 }),
        );
        assert_eq!(
            surface.set(FU, FU_MUTE, 0, RequestCode::Cur, &[1, 1]),
            Err(RequestError::BadLength { expected: 1, found: 2 }),
        );

        assert_eq!(surface.get(FU, FU_VOLUME, 0, RequestCode::Cur), Ok(ControlValue::Volume(0)));
        assert_eq!(surface.get(FU, FU_MUTE, 0, RequestCode::Cur), Ok(ControlValue::Mute(false)));
    }

    #[test]
    fn test_set_requires_cur() {
        let surface = surface();

        assert!(matches!(
            surface.set(FU, FU_MUTE, 0, RequestCode::Range, &[1]),
            Err(RequestError::Unsupported { .. }),
        ));
        assert!(matches!(
            surface.set(FU, FU_VOLUME, 0, RequestCode::Other(0x04), &[0, 0]),
            Err(RequestError::Unsupported { .. }),
        ));
        assert_eq!(surface.get(FU, FU_MUTE, 0, RequestCode::Cur), Ok(ControlValue::Mute(false)));
    }

    #[test]
    fn test_out_of_range_channel() {
        let surface = surface();

        assert_eq!(
            surface.get(FU, FU_MUTE, 2, RequestCode::Cur),
            Err(RequestError::NoSuchChannel(2)),
        );
        assert_eq!(
            surface.set(FU, FU_VOLUME, 9, RequestCode::Cur, &[0, 0]),
            Err(RequestError::NoSuchChannel(9)),
        );
    }

    #[test]
    fn test_clock_enumeration() {
        let surface = surface();

        let reply = surface
            .handle(&ControlRequest::get(RequestCode::Range, CLOCK, CS_SAM_FREQ, 0))
            .unwrap();

        let mut expected = vec![2, 0];
        for rate in [44100u32, 48000] {
            expected.extend(rate.to_le_bytes());
            expected.extend(rate.to_le_bytes());
            expected.extend(0u32.to_le_bytes());
        }

        assert_eq!(reply.as_slice(), expected.as_slice());

        let current = surface
            .handle(&ControlRequest::get(RequestCode::Cur, CLOCK, CS_SAM_FREQ, 0))
            .unwrap();
        assert_eq!(current.as_slice(), &48000u32.to_le_bytes());

        let valid = surface
            .handle(&ControlRequest::get(RequestCode::Cur, CLOCK, CS_CLOCK_VALID, 0))
            .unwrap();
        assert_eq!(valid.as_slice(), &[1]);
    }

    #[test]
    fn test_clock_set() {
        let surface = surface();

        surface
            .set(CLOCK, CS_SAM_FREQ, 0, RequestCode::Cur, &44100u32.to_le_bytes())
            .unwrap();
        assert_eq!(surface.clock().current_rate(), 44100);

        assert_eq!(
            surface.set(CLOCK, CS_SAM_FREQ, 0, RequestCode::Cur, &96000u32.to_le_bytes()),
            Err(RequestError::RateNotSupported(96000)),
        );
        assert_eq!(surface.clock().current_rate(), 44100);
    }

    #[test]
    fn test_connector_cluster() {
        let surface = surface();

        let reply = surface
            .handle(&ControlRequest::get(RequestCode::Cur, TERMINAL, TE_CONNECTOR, 0))
            .unwrap();

        assert_eq!(reply.as_slice(), &[1, 0, 0, 0, 0, 0]);

        // more feature unit channels don't change the terminal's cluster
        let wide = ControlSurface::new(
            EntityIds::default(),
            ChannelTable::new(4, VolumeRange::default()),
            ClockState::new([48000].into_iter().collect(), 48000),
        );

        assert_eq!(
            wide.get(TERMINAL, TE_CONNECTOR, 0, RequestCode::Cur),
            Ok(ControlValue::Connector(ChannelCluster::MONO)),
        );
        assert!(wide.channels().get(4).is_some());
    }

    #[test]
    fn test_unknown_entity_and_selector() {
        let surface = surface();

        assert!(matches!(
            surface.get(9, FU_MUTE, 0, RequestCode::Cur),
            Err(RequestError::Unsupported { entity: 9, .. }),
        ));
        assert!(matches!(
            surface.get(FU, 0x0B, 0, RequestCode::Cur),
            Err(RequestError::Unsupported { selector: 0x0B, .. }),
        ));
        assert!(matches!(
            surface.handle(&ControlRequest::set(RequestCode::Cur, TERMINAL, TE_CONNECTOR, 0, &[0; 6])),
            Err(RequestError::Unsupported { .. }),
        ));
    }
}
