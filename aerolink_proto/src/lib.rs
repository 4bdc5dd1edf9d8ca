#![no_std]
//! Wire format shared by every node of an audio radio link.
//!
//! Nodes exchange small datagrams over a connectionless radio (ESP-NOW and the like).
//! Each datagram carries a fixed 10-byte header followed by an opaque payload:
//!
//! | offset | size | field                                             |
//! |--------|------|---------------------------------------------------|
//! | 0      | 1    | kind (`0` broadcast, `1` unicast)                 |
//! | 1      | 1    | discovery flag                                    |
//! | 2      | 2    | sequence number                                   |
//! | 4      | 2    | CRC-16 over `state ‖ sequence ‖ token ‖ payload`  |
//! | 6      | 4    | session token                                     |
//! | 10     | ..   | payload                                           |
//!
//! All multi-byte fields are little-endian.
//!
//! ## Discovery and binding
//!
//! Broadcast datagrams carry a [`Beacon`](format::Beacon), advertising the stream format
//! of their sender. Once a node has seen a compatible beacon, it starts sending unicast
//! datagrams carrying raw audio to it.
//!
//! Each node draws a random session token at startup and stamps it on everything it sends.
//! A receiver binds to the token of the first unicast datagram it accepts, and ignores
//! other tokens until it is explicitly unbound (see [`peer::PeerBinding`]).

pub mod crc;
pub mod datagram;
pub mod format;
pub mod peer;

pub use datagram::{
    Datagram, DatagramKind, DecodeError, DiscoveryFlag, EncodeError, Frame, HEADER_LEN, Header,
    MAX_DATAGRAM_LEN, MAX_PAYLOAD_LEN, decode, encode,
};
pub use peer::{Admission, PeerAddr, PeerBinding, Token};
