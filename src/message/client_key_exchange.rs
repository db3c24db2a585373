use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

/// ClientKeyExchange body, parameterized by the negotiated key exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientKeyExchange {
    /// Ephemeral ECDH public key (RFC 8422 Section 5.7).
    Ecdh { public_key: Vec<u8> },
    /// PSK identity (RFC 4279 Section 2).
    Psk { identity: Vec<u8> },
}

impl ClientKeyExchange {
    pub fn parse_ecdh(input: &[u8]) -> IResult<&[u8], ClientKeyExchange> {
        let (input, key_len) = be_u8(input)?;
        let (input, public_key) = take(key_len as usize)(input)?;
        Ok((
            input,
            ClientKeyExchange::Ecdh {
                public_key: public_key.to_vec(),
            },
        ))
    }

    pub fn parse_psk(input: &[u8]) -> IResult<&[u8], ClientKeyExchange> {
        let (input, identity_len) = be_u16(input)?;
        let (input, identity) = take(identity_len as usize)(input)?;
        Ok((
            input,
            ClientKeyExchange::Psk {
                identity: identity.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            ClientKeyExchange::Ecdh { public_key } => {
                out.push(public_key.len() as u8);
                out.extend_from_slice(public_key);
            }
            ClientKeyExchange::Psk { identity } => {
                out.extend_from_slice(&(identity.len() as u16).to_be_bytes());
                out.extend_from_slice(identity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecdh_roundtrip() {
        let cke = ClientKeyExchange::Ecdh {
            public_key: vec![0x35; 32],
        };
        let mut out = Vec::new();
        cke.serialize(&mut out);
        assert_eq!(out.len(), 33);

        let (rest, parsed) = ClientKeyExchange::parse_ecdh(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, cke);
    }

    #[test]
    fn psk_roundtrip() {
        let cke = ClientKeyExchange::Psk {
            identity: b"alice".to_vec(),
        };
        let mut out = Vec::new();
        cke.serialize(&mut out);

        let (rest, parsed) = ClientKeyExchange::parse_psk(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, cke);
    }
}
