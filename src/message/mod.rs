//! Wire types: records, handshake messages, extensions, alerts.
//!
//! Every type pairs a nom `parse` with a `serialize(&mut Vec<u8>)`; the two
//! are inverses for all well-formed values and each module carries the
//! round-trip tests proving it.

mod alert;
mod certificate;
mod certificate_request;
mod certificate_verify;
mod client_hello;
mod client_key_exchange;
pub mod extension;
mod finished;
pub mod handshake;
mod hello_verify_request;
pub mod record;
mod random;
mod server_hello;
mod server_key_exchange;
mod types;

pub use alert::{Alert, AlertDescription, AlertLevel};
pub use certificate::Certificate;
pub use certificate_request::{CertificateRequest, CERT_TYPE_ECDSA_SIGN};
pub use certificate_verify::CertificateVerify;
pub use client_hello::ClientHello;
pub use client_key_exchange::ClientKeyExchange;
pub use extension::Extension;
pub use finished::Finished;
pub use handshake::HandshakeHeader;
pub use hello_verify_request::HelloVerifyRequest;
pub use random::HandshakeRandom;
pub use record::{RecordHeader, MAX_SEQUENCE_NUMBER};
pub use server_hello::ServerHello;
pub use server_key_exchange::ServerKeyExchange;
pub use types::{
    CipherSuiteId, CompressionMethod, ContentType, HashAlgorithm, MessageType, NamedCurve,
    ProtocolVersion, SignatureAlgorithm, SignatureScheme, SrtpProfile,
};

use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

/// ChangeCipherSpec body: the single byte 0x01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeCipherSpec;

impl ChangeCipherSpec {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ChangeCipherSpec> {
        let (input, byte) = be_u8(input)?;
        if byte != 0x01 {
            return Err(Err::Failure(NomError::new(input, ErrorKind::Tag)));
        }
        Ok((input, ChangeCipherSpec))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(0x01);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_cipher_spec_roundtrip() {
        let mut out = Vec::new();
        ChangeCipherSpec.serialize(&mut out);
        assert_eq!(out, [0x01]);
        assert!(ChangeCipherSpec::parse(&out).is_ok());
        assert!(ChangeCipherSpec::parse(&[0x02]).is_err());
    }
}
