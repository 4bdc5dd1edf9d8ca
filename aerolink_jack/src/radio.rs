//! A UDP socket posing as the datagram radio.
//!
//! Peer addresses are six bytes long, exactly enough for an IPv4 address followed by a
//! little-endian port number.

use aerolink_bridge::{
    RadioSink, RadioTx,
    proto::{MAX_DATAGRAM_LEN, PeerAddr},
};
use core::{
    convert::Infallible,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    time::Duration,
};

pub fn peer_addr(addr: SocketAddrV4) -> PeerAddr {
    let [a, b, c, d] = addr.ip().octets();
    let [p0, p1] = addr.port().to_le_bytes();
    PeerAddr([a, b, c, d, p0, p1])
}

pub fn socket_addr(peer: PeerAddr) -> SocketAddrV4 {
    let [a, b, c, d, p0, p1] = peer.0;
    SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), u16::from_le_bytes([p0, p1]))
}

/// Returns `true` if the given I/O error kind represents a timeout condition.
#[inline(always)]
fn io_err_is_timeout(e: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind::*;
    [WouldBlock, TimedOut].contains(&e)
}

#[derive(Debug)]
pub struct UdpRadio {
    sock: std::net::UdpSocket,
    /// Where frames for [`PeerAddr::BROADCAST`] go.
    broadcast: SocketAddrV4,
}

impl UdpRadio {
    pub fn bind(local: SocketAddrV4, broadcast: SocketAddrV4) -> std::io::Result<Self> {
        Self::new(std::net::UdpSocket::bind(local)?, broadcast)
    }

    pub fn new(sock: std::net::UdpSocket, broadcast: SocketAddrV4) -> std::io::Result<Self> {
        sock.set_broadcast(true)?;
        Ok(Self { sock, broadcast })
    }

    /// Another handle to the same socket, e.g. to send from one thread and receive from
    /// another.
    pub fn try_clone(&self) -> std::io::Result<Self> {
        Ok(Self {
            sock: self.sock.try_clone()?,
            broadcast: self.broadcast,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddrV4> {
        match self.sock.local_addr()? {
            SocketAddr::V4(addr) => Ok(addr),
            SocketAddr::V6(_) => Err(std::io::ErrorKind::Unsupported.into()),
        }
    }

    pub fn set_recv_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.sock.set_read_timeout(timeout)
    }

    /// Receives a single datagram and hands it to `sink`.
    ///
    /// Returns `Ok(false)` if the receive timed out, or if the datagram didn't come from
    /// an IPv4 address.
    pub fn poll(&self, sink: &impl RadioSink, buf: &mut [u8]) -> std::io::Result<bool> {
        let (n, source) = match self.sock.recv_from(buf) {
            Ok(r) => r,
            Err(e) if io_err_is_timeout(e.kind()) => return Ok(false),
            Err(e) => return Err(e),
        };

        let SocketAddr::V4(source) = source else {
            return Ok(false);
        };

        sink.on_frame_received(peer_addr(source), &buf[..n]);
        Ok(true)
    }

    /// Feeds every received datagram to `sink`.
    ///
    /// Only returns if a non-recoverable I/O error occurs.
    pub fn run(&self, sink: &impl RadioSink) -> std::io::Result<Infallible> {
        // larger than any valid frame, so that oversized ones get truncated and rejected
        let mut buf = [0; MAX_DATAGRAM_LEN * 2];

        loop {
            self.poll(sink, &mut buf)?;
        }
    }
}

impl RadioTx for UdpRadio {
    fn send(&mut self, dest: PeerAddr, frame: &[u8]) -> std::io::Result<()> {
        let addr = if dest.is_broadcast() {
            self.broadcast
        } else {
            socket_addr(dest)
        };

        let n = self.sock.send_to(frame, addr)?;

        (n == frame.len())
            .then_some(())
            .ok_or(std::io::ErrorKind::FileTooLarge.into())
    }
}
