//! Peer identities and the session binding a receiver maintains.

use crate::datagram::{DatagramKind, Header};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Random per-session identifier, stamped on every datagram a node sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Token(pub u32);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Link-layer address of a radio node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PeerAddr(pub [u8; 6]);

impl PeerAddr {
    pub const BROADCAST: Self = Self([0xFF; 6]);

    #[inline(always)]
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// The outcome of [`PeerBinding::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Admission {
    /// Unicast datagram from the bound peer.
    Accepted,
    /// Unicast datagram from a new peer, whose token has just been adopted.
    Bound(Token),
    /// Broadcast datagram, from an unknown node or from the bound peer.
    Discovery,
    /// Traffic from another session, or of an unknown kind.
    Foreign,
}

impl Admission {
    /// Whether the datagram's payload is audio meant for us.
    #[inline(always)]
    pub const fn is_audio(self) -> bool {
        matches!(self, Self::Accepted | Self::Bound(_))
    }
}

/// Which session a receiver listens to.
///
/// A binding is established by the first accepted unicast datagram, and only cleared
/// by [`unbind`](Self::unbind). Tokens are never compared across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PeerBinding {
    #[default]
    Unbound,
    Bound(Token),
}

impl PeerBinding {
    #[inline(always)]
    pub const fn token(&self) -> Option<Token> {
        match *self {
            Self::Unbound => None,
            Self::Bound(token) => Some(token),
        }
    }

    #[inline(always)]
    pub const fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    /// Classifies an incoming datagram, binding to its sender if we were unbound and the
    /// datagram is unicast.
    pub fn admit(&mut self, header: &Header) -> Admission {
        let token = header.token;

        match (header.kind(), *self) {
            (Some(DatagramKind::Unicast), Self::Unbound) => {
                *self = Self::Bound(token);
                Admission::Bound(token)
            }
            (Some(DatagramKind::Unicast), Self::Bound(bound)) if bound == token => {
                Admission::Accepted
            }
            (Some(DatagramKind::Broadcast), Self::Unbound) => Admission::Discovery,
            (Some(DatagramKind::Broadcast), Self::Bound(bound)) if bound == token => {
                Admission::Discovery
            }
            _ => Admission::Foreign,
        }
    }

    /// Forgets the current peer, returning its token.
    #[inline(always)]
    pub fn unbind(&mut self) -> Option<Token> {
        let token = self.token();
        *self = Self::Unbound;
        token
    }
}
