use std::fmt;
use std::io;

use crate::message::Alert;

/// Errors produced by the DTLS endpoint.
#[derive(Debug)]
pub enum Error {
    /// The configuration is invalid (e.g. PSK without identity hint).
    InvalidConfig(String),
    /// The handshake did not complete within the retry budget.
    HandshakeTimeout(&'static str),
    /// The handshake was aborted by an alert, ours or the peer's.
    HandshakeFailure(Alert),
    /// An AEAD open failed. Never surfaced for wire records (those are
    /// silently dropped), only for API-level decrypt operations.
    DecryptError,
    /// A packet could not be parsed.
    InvalidPacket,
    /// The 48-bit record sequence number space for an epoch is exhausted.
    SequenceOverflow,
    /// The buffer passed to `read` is smaller than the record payload.
    BufferTooSmall,
    /// The connection is closed.
    ConnectionClosed,
    /// A read or write deadline expired.
    DeadlineExceeded,
    /// A message arrived that is not legal in the current state.
    UnexpectedMessage(String),
    /// A cryptographic operation failed.
    CryptoError(String),
    /// Certificate handling failed.
    CertificateError(String),
    /// Parse error from the wire codecs.
    ParseError(nom::error::ErrorKind),
    /// Parse ran out of input.
    ParseIncomplete,
    /// Underlying socket error.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(s) => write!(f, "invalid config: {}", s),
            Error::HandshakeTimeout(what) => write!(f, "handshake timeout: {}", what),
            Error::HandshakeFailure(alert) => write!(f, "handshake failure: {}", alert),
            Error::DecryptError => write!(f, "decrypt error"),
            Error::InvalidPacket => write!(f, "invalid packet"),
            Error::SequenceOverflow => write!(f, "record sequence number overflow"),
            Error::BufferTooSmall => write!(f, "buffer too small"),
            Error::ConnectionClosed => write!(f, "connection closed"),
            Error::DeadlineExceeded => write!(f, "deadline exceeded"),
            Error::UnexpectedMessage(s) => write!(f, "unexpected message: {}", s),
            Error::CryptoError(s) => write!(f, "crypto error: {}", s),
            Error::CertificateError(s) => write!(f, "certificate error: {}", s),
            Error::ParseError(kind) => write!(f, "parse error: {:?}", kind),
            Error::ParseIncomplete => write!(f, "parse incomplete"),
            Error::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_) => Error::ParseIncomplete,
            nom::Err::Error(x) => Error::ParseError(x.code),
            nom::Err::Failure(x) => Error::ParseError(x.code),
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::DeadlineExceeded,
            _ => Error::Io(value),
        }
    }
}
