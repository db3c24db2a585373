use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom::IResult;

use super::ProtocolVersion;

/// HelloVerifyRequest (RFC 6347 Section 4.3.2): the stateless cookie
/// challenge a server issues before committing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub version: ProtocolVersion,
    pub cookie: Vec<u8>,
}

impl HelloVerifyRequest {
    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, cookie_len) = be_u8(input)?;
        let (input, cookie) = take(cookie_len as usize)(input)?;
        Ok((
            input,
            HelloVerifyRequest {
                version,
                cookie: cookie.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.version.serialize(out);
        out.push(self.cookie.len() as u8);
        out.extend_from_slice(&self.cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let hvr = HelloVerifyRequest {
            version: ProtocolVersion::DTLS1_2,
            cookie: vec![0x42; 20],
        };
        let mut out = Vec::new();
        hvr.serialize(&mut out);
        assert_eq!(out.len(), 3 + 20);

        let (rest, parsed) = HelloVerifyRequest::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, hvr);
    }
}
