//! Datagram framing: header layout, checksum, encoding and decoding.

use crate::{crc::Crc16, peer::Token};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Largest frame the radio carries.
pub const MAX_DATAGRAM_LEN: usize = 250;

/// `kind (1) + state (1) + sequence (2) + checksum (2) + token (4)`
pub const HEADER_LEN: usize = size_of::<u8>()
    + size_of::<u8>()
    + size_of::<u16>()
    + size_of::<u16>()
    + size_of::<u32>();

pub const MAX_PAYLOAD_LEN: usize = MAX_DATAGRAM_LEN - HEADER_LEN;

/// An encoded datagram, ready to be handed to the radio.
pub type Frame = arrayvec::ArrayVec<u8, MAX_DATAGRAM_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DatagramKind {
    /// Discovery traffic, sent to every node in range.
    Broadcast = 0,
    /// Audio traffic, addressed to a single peer.
    Unicast = 1,
}

impl DatagramKind {
    #[inline(always)]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Broadcast),
            1 => Some(Self::Unicast),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn to_raw(self) -> u8 {
        self as u8
    }
}

/// Discovery state advertised by the sender.
///
/// Any non-zero value means the sender has seen a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct DiscoveryFlag(pub u8);

impl DiscoveryFlag {
    pub const IDLE: Self = Self(0);
    pub const PEER_SEEN: Self = Self(1);

    #[inline(always)]
    pub const fn peer_seen(self) -> bool {
        self.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    /// Raw kind byte. Unknown values are preserved, see [`Header::kind`].
    pub kind: u8,
    pub state: DiscoveryFlag,
    pub sequence: u16,
    pub checksum: u16,
    pub token: Token,
}

impl Header {
    #[inline(always)]
    pub const fn kind(&self) -> Option<DatagramKind> {
        DatagramKind::from_raw(self.kind)
    }

    #[inline]
    pub const fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let [s0, s1] = self.sequence.to_le_bytes();
        let [c0, c1] = self.checksum.to_le_bytes();
        let [t0, t1, t2, t3] = self.token.0.to_le_bytes();

        [self.kind, self.state.0, s0, s1, c0, c1, t0, t1, t2, t3]
    }

    #[inline]
    pub const fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Self {
        let [kind, state, s0, s1, c0, c1, t0, t1, t2, t3] = *bytes;

        Self {
            kind,
            state: DiscoveryFlag(state),
            sequence: u16::from_le_bytes([s0, s1]),
            checksum: u16::from_le_bytes([c0, c1]),
            token: Token(u32::from_le_bytes([t0, t1, t2, t3])),
        }
    }
}

/// A decoded, checksum-verified datagram borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Datagram<'a> {
    pub header: Header,
    pub payload: &'a [u8],
}

/// CRC over `state ‖ sequence ‖ token ‖ payload`. The kind byte is not covered.
pub fn compute_checksum(state: DiscoveryFlag, sequence: u16, token: Token, payload: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(&[state.0]);
    crc.update(&sequence.to_le_bytes());
    crc.update(&token.0.to_le_bytes());
    crc.update(payload);
    crc.finish()
}

/// Builds a complete frame around `payload`.
pub fn encode(
    payload: &[u8],
    kind: DatagramKind,
    state: DiscoveryFlag,
    sequence: u16,
    token: Token,
) -> Result<Frame, EncodeError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(EncodeError::PayloadTooLarge { len: payload.len() });
    }

    let header = Header {
        kind: kind.to_raw(),
        state,
        sequence,
        checksum: compute_checksum(state, sequence, token, payload),
        token,
    };

    let mut frame = Frame::new();

    frame
        .try_extend_from_slice(&header.to_bytes())
        .and_then(|()| frame.try_extend_from_slice(payload))
        .map_err(|_| EncodeError::PayloadTooLarge { len: payload.len() })?;

    Ok(frame)
}

/// Parses and verifies a received frame.
///
/// Only the length and checksum are checked here: unknown kinds and discovery states are
/// returned as-is, for the caller to accept or ignore.
pub fn decode(bytes: &[u8]) -> Result<Datagram<'_>, DecodeError> {
    let (header, payload) = bytes
        .split_first_chunk::<HEADER_LEN>()
        .ok_or(DecodeError::Truncated { len: bytes.len() })?;

    let header = Header::from_bytes(header);

    let expected = compute_checksum(header.state, header.sequence, header.token, payload);

    if expected != header.checksum {
        return Err(DecodeError::ChecksumMismatch {
            expected,
            found: header.checksum,
        });
    }

    Ok(Datagram { header, payload })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodeError {
    PayloadTooLarge { len: usize },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge { len } => write!(
                f,
                "payload of {len} bytes exceeds the {MAX_PAYLOAD_LEN} byte limit"
            ),
        }
    }
}

impl core::error::Error for EncodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeError {
    /// The frame is shorter than a header.
    Truncated { len: usize },
    ChecksumMismatch { expected: u16, found: u16 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { len } => {
                write!(f, "frame of {len} bytes is shorter than a {HEADER_LEN} byte header")
            }
            Self::ChecksumMismatch { expected, found } => {
                write!(f, "checksum mismatch: computed {expected:#06x}, header says {found:#06x}")
            }
        }
    }
}

impl core::error::Error for DecodeError {}
