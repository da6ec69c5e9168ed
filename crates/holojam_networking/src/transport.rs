//! # Transport Layer
//!
//! Socket setup for the two kinds of channel.
//!
//! ## Design
//!
//! - Receive sockets bind the channel port on every interface with address
//!   reuse, so several nodes on one machine can listen to the same tracker
//! - Receive sockets carry a read timeout; a worker never waits on the
//!   socket for longer than one poll interval before checking for a stop
//! - Send sockets bind an ephemeral port and only ever `send_to`

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

/// Outcome of one bounded socket read.
#[derive(Debug)]
pub enum RecvOutcome {
    /// A datagram of this many bytes was written into the buffer.
    Datagram(usize),
    /// The read timed out with nothing to deliver.
    Idle,
    /// The socket reported an error.
    Failed(io::Error),
}

/// A UDP socket bound to a channel port and joined to a multicast group.
#[derive(Debug)]
pub struct MulticastReceiver {
    socket: UdpSocket,
    local_addr: SocketAddr,
    joined: bool,
}

impl MulticastReceiver {
    /// Binds `0.0.0.0:port` with address reuse and the given read timeout.
    ///
    /// Failing to join `group` is not fatal: the socket still receives
    /// unicast datagrams sent to the port. Check [`Self::joined`].
    pub fn bind(port: u16, group: Ipv4Addr, read_timeout: Duration) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into())?;

        let socket: UdpSocket = socket.into();
        socket.set_read_timeout(Some(read_timeout))?;
        let local_addr = socket.local_addr()?;

        let joined = match socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("join_multicast_v4({}) on port {} failed: {}", group, port, e);
                false
            }
        };

        Ok(Self { socket, local_addr, joined })
    }

    /// Returns the local address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns true if the multicast group was joined.
    #[must_use]
    pub const fn joined(&self) -> bool {
        self.joined
    }

    /// Reads one datagram into `buf`, waiting at most the read timeout.
    ///
    /// A datagram longer than `buf` is cut short; pass one spare byte to
    /// tell a full buffer from an oversize datagram.
    pub fn recv(&self, buf: &mut [u8]) -> RecvOutcome {
        match self.socket.recv_from(buf) {
            Ok((len, _)) => RecvOutcome::Datagram(len),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                RecvOutcome::Idle
            }
            Err(e) => RecvOutcome::Failed(e),
        }
    }
}

/// A UDP socket that sends every datagram to one collector.
#[derive(Debug)]
pub struct UnicastSender {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UnicastSender {
    /// Binds an ephemeral local port for sending to `destination`.
    pub fn bind(destination: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))?;
        Ok(Self { socket, destination })
    }

    /// Returns the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Returns the collector address.
    #[must_use]
    pub const fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Sends one datagram to the collector.
    pub fn send(&self, data: &[u8]) -> io::Result<usize> {
        self.socket.send_to(data, self.destination)
    }
}
