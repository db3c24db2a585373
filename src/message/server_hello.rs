use nom::bytes::complete::take;
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

use super::extension::{parse_extensions, serialize_extensions, Extension};
use super::{CipherSuiteId, CompressionMethod, HandshakeRandom, ProtocolVersion};

/// ServerHello body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub version: ProtocolVersion,
    pub random: HandshakeRandom,
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuiteId,
    pub compression_method: CompressionMethod,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerHello> {
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, random) = HandshakeRandom::parse(input)?;

        let (input, session_id_len) = be_u8(input)?;
        if session_id_len > 32 {
            return Err(Err::Failure(NomError::new(input, ErrorKind::LengthValue)));
        }
        let (input, session_id) = take(session_id_len as usize)(input)?;

        let (input, cipher_suite) = CipherSuiteId::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;
        let (input, extensions) = parse_extensions(input)?;

        Ok((
            input,
            ServerHello {
                version,
                random,
                session_id: session_id.to_vec(),
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.version.serialize(out);
        self.random.serialize(out);
        out.push(self.session_id.len() as u8);
        out.extend_from_slice(&self.session_id);
        self.cipher_suite.serialize(out);
        out.push(self.compression_method.0);
        serialize_extensions(&self.extensions, out);
    }
}
