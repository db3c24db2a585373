//! The datagram socket collaborator.
//!
//! The connection core does not own UDP specifics; it drives anything that
//! can receive and send datagrams. `std::net::UdpSocket` implements the
//! trait out of the box.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

/// An unreliable, unordered packet transport shared by the connection's
/// reader and writer paths.
///
/// `recv_from` may be configured with a timeout via `set_read_timeout`; the
/// reader loop uses short timeouts to observe connection shutdown, so
/// implementations must return `io::ErrorKind::WouldBlock` or `TimedOut`
/// when the timeout fires.
pub trait DatagramSocket: Send + Sync {
    /// Receive one datagram. Returns the byte count and the sender address.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Send one datagram to `addr`.
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;

    /// Set the timeout applied to subsequent `recv_from` calls. `None`
    /// blocks indefinitely.
    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()>;

    /// Local address, if the transport has one.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl DatagramSocket for UdpSocket {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf)
    }

    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, addr)
    }

    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        UdpSocket::set_read_timeout(self, dur)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}
