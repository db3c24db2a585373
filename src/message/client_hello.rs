use nom::bytes::complete::take;
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::extension::{parse_extensions, serialize_extensions, Extension};
use super::{CipherSuiteId, CompressionMethod, HandshakeRandom, ProtocolVersion};

/// ClientHello body (RFC 5246 Section 7.4.1.2 with the DTLS cookie field
/// from RFC 6347 Section 4.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub client_version: ProtocolVersion,
    pub random: HandshakeRandom,
    pub session_id: Vec<u8>,
    pub cookie: Vec<u8>,
    pub cipher_suites: Vec<CipherSuiteId>,
    pub compression_methods: Vec<CompressionMethod>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientHello> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = HandshakeRandom::parse(input)?;

        let (input, session_id_len) = be_u8(input)?;
        if session_id_len > 32 {
            return Err(Err::Failure(NomError::new(input, ErrorKind::LengthValue)));
        }
        let (input, session_id) = take(session_id_len as usize)(input)?;

        let (input, cookie_len) = be_u8(input)?;
        let (input, cookie) = take(cookie_len as usize)(input)?;

        let (input, cipher_suites_len) = be_u16(input)?;
        let (input, mut suites_block) = take(cipher_suites_len as usize)(input)?;
        let mut cipher_suites = Vec::new();
        while !suites_block.is_empty() {
            let (rest, suite) = CipherSuiteId::parse(suites_block)?;
            suites_block = rest;
            cipher_suites.push(suite);
        }

        let (input, compression_len) = be_u8(input)?;
        let (input, mut compression_block) = take(compression_len as usize)(input)?;
        let mut compression_methods = Vec::new();
        while !compression_block.is_empty() {
            let (rest, method) = CompressionMethod::parse(compression_block)?;
            compression_block = rest;
            compression_methods.push(method);
        }

        let (input, extensions) = parse_extensions(input)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id: session_id.to_vec(),
                cookie: cookie.to_vec(),
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.client_version.serialize(out);
        self.random.serialize(out);

        out.push(self.session_id.len() as u8);
        out.extend_from_slice(&self.session_id);

        out.push(self.cookie.len() as u8);
        out.extend_from_slice(&self.cookie);

        out.extend_from_slice(&((self.cipher_suites.len() * 2) as u16).to_be_bytes());
        for suite in &self.cipher_suites {
            suite.serialize(out);
        }

        out.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            out.push(method.0);
        }

        serialize_extensions(&self.extensions, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::NamedCurve;

    #[test]
    fn roundtrip() {
        let hello = ClientHello {
            client_version: ProtocolVersion::DTLS1_2,
            random: HandshakeRandom {
                gmt_unix_time: 1234,
                random_bytes: [5u8; 28],
            },
            session_id: vec![],
            cookie: vec![0xAA; 20],
            cipher_suites: vec![
                CipherSuiteId::ECDHE_ECDSA_AES128_GCM_SHA256,
                CipherSuiteId::ECDHE_ECDSA_AES256_GCM_SHA384,
            ],
            compression_methods: vec![CompressionMethod::NULL],
            extensions: vec![
                Extension::RenegotiationInfo(vec![]),
                Extension::SupportedGroups(vec![NamedCurve::X25519, NamedCurve::P256]),
                Extension::ExtendedMasterSecret,
            ],
        };

        let mut out = Vec::new();
        hello.serialize(&mut out);
        let (rest, parsed) = ClientHello::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, hello);
    }

    #[test]
    fn rejects_oversized_session_id() {
        let mut out = Vec::new();
        let hello = ClientHello {
            client_version: ProtocolVersion::DTLS1_2,
            random: HandshakeRandom::default(),
            session_id: vec![],
            cookie: vec![],
            cipher_suites: vec![CipherSuiteId::ECDHE_ECDSA_AES128_GCM_SHA256],
            compression_methods: vec![CompressionMethod::NULL],
            extensions: vec![],
        };
        hello.serialize(&mut out);
        // Corrupt the session id length to 33 (> 32).
        out[2 + 32] = 33;
        assert!(ClientHello::parse(&out).is_err());
    }
}
