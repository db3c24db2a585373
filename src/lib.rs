//! dtls12 — a DTLS 1.2 endpoint over an unreliable datagram socket.
//!
//! The crate implements the DTLS 1.2 connection core for both roles:
//! the flight-based handshake with retransmission and reassembly, the
//! record layer with epoch-scoped sequence numbers, AES-GCM protection and
//! anti-replay, Connection IDs (RFC 9146) with peer-address migration, and
//! the coordination of two concurrent loops sharing one socket.
//!
//! # Scope
//! - **DTLS 1.2 only** (RFC 6347); no DTLS 1.3, no stream TLS.
//! - **AEAD suites**: ECDHE-ECDSA with AES-GCM, plus plain PSK AES-GCM.
//! - **Key exchange**: X25519, P-256, P-384.
//! - **Extensions**: extended master secret (RFC 7627), use_srtp
//!   (RFC 5764), ALPN (RFC 7301), SNI, connection_id (RFC 9146),
//!   renegotiation_info (signalled empty, renegotiation itself is not
//!   performed).
//!
//! ## Certificate model
//! Certificates are opaque DER. The crate checks handshake signatures
//! against the peer's leaf key; chain and policy validation is delegated
//! to a pluggable [`CertVerifier`] (or skipped with
//! `insecure_skip_verify`).
//!
//! # Example
//!
//! ```no_run
//! use std::net::UdpSocket;
//! use dtls12::{connect, Config};
//!
//! fn main() -> Result<(), dtls12::Error> {
//!     let socket = UdpSocket::bind("0.0.0.0:0")?;
//!     let config = Config::builder()
//!         .insecure_skip_verify(true)
//!         .build();
//!     let conn = connect(socket, "127.0.0.1:4444".parse().unwrap(), config)?;
//!
//!     conn.write(b"hello")?;
//!     let mut buf = [0u8; 2048];
//!     let n = conn.read(&mut buf)?;
//!     println!("{:?}", &buf[..n]);
//!     conn.close()
//! }
//! ```
//!
//! # Concurrency model
//! Each connection runs two threads: a reader blocking on the socket and a
//! handshaker driving the flight state machine. Application `read`/`write`
//! happen on the caller's threads; writes serialize through the connection
//! lock, reads drain a capacity-1 channel. `set_read_deadline` /
//! `set_write_deadline` bound individual calls without affecting the
//! connection.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(missing_docs)]
#![allow(clippy::upper_case_acronyms)]

// The DTLS 1.2 handshake this crate implements:
//
// Client                                               Server
//
// 1     ClientHello                  -------->
//
// 2                                  <--------   HelloVerifyRequest
//                                                 (contains cookie)
//
// 3     ClientHello                  -------->
//       (with cookie)
// 4                                                     ServerHello
//                                                      Certificate*
//                                                ServerKeyExchange*
//                                               CertificateRequest*
//                                    <--------      ServerHelloDone
// 5     Certificate*
//       ClientKeyExchange
//       CertificateVerify*
//       [ChangeCipherSpec]
//       Finished                     -------->
// 6                                              [ChangeCipherSpec]
//                                    <--------             Finished
//       Application Data             <------->     Application Data

#[macro_use]
extern crate log;

use std::net::SocketAddr;
use std::sync::Arc;

mod buffer;
mod cache;
pub mod certificate;
mod config;
mod conn;
pub mod crypto;
mod error;
mod flight;
mod fragment;
mod fsm;
pub mod message;
mod socket;
mod state;
mod timer;
mod util;
mod window;

pub use certificate::{generate_self_signed_certificate, DtlsCertificate};
pub use config::{
    CertificateRequestInfo, ClientAuthType, ClientHelloInfo, Config, ConfigBuilder,
    ExtendedMasterSecretType, KeyLog, KeyLogWriter, Session, SessionStore,
};
pub use conn::Connection;
pub use crypto::{CertVerifier, SkipVerify};
pub use error::Error;
pub use message::{
    Alert, AlertDescription, AlertLevel, CipherSuiteId, NamedCurve, SignatureScheme, SrtpProfile,
};
pub use socket::DatagramSocket;
pub use state::ConnectionState;

/// Open a client connection: run the handshake against `peer_addr` and
/// return once it completes.
pub fn connect(
    socket: impl DatagramSocket + 'static,
    peer_addr: SocketAddr,
    config: Config,
) -> Result<Connection, Error> {
    Connection::establish(Arc::new(socket), Some(peer_addr), config, true)
}

/// Accept a single DTLS connection on `socket`: wait for a ClientHello,
/// run the handshake and return once it completes.
pub fn listen(
    socket: impl DatagramSocket + 'static,
    config: Config,
) -> Result<Connection, Error> {
    Connection::establish(Arc::new(socket), None, config, false)
}
