use nom::bytes::complete::take;
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::{NamedCurve, SignatureScheme};

/// Curve type byte in the ECDHE params; only named_curve (3) is legal.
const CURVE_TYPE_NAMED: u8 = 3;

/// ServerKeyExchange body. The wire shape depends on the negotiated key
/// exchange, so parsing is parameterized by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerKeyExchange {
    /// ECDHE params plus a signature over randoms ++ params
    /// (RFC 8422 Section 5.4).
    Ecdh {
        curve: NamedCurve,
        public_key: Vec<u8>,
        scheme: SignatureScheme,
        signature: Vec<u8>,
    },
    /// Plain PSK: just the identity hint (RFC 4279 Section 2).
    Psk { identity_hint: Vec<u8> },
}

impl ServerKeyExchange {
    pub fn parse_ecdh(input: &[u8]) -> IResult<&[u8], ServerKeyExchange> {
        let (input, curve_type) = be_u8(input)?;
        if curve_type != CURVE_TYPE_NAMED {
            return Err(Err::Failure(NomError::new(input, ErrorKind::Tag)));
        }
        let (input, curve) = NamedCurve::parse(input)?;
        let (input, key_len) = be_u8(input)?;
        let (input, public_key) = take(key_len as usize)(input)?;
        let (input, scheme) = SignatureScheme::parse(input)?;
        let (input, sig_len) = be_u16(input)?;
        let (input, signature) = take(sig_len as usize)(input)?;

        Ok((
            input,
            ServerKeyExchange::Ecdh {
                curve,
                public_key: public_key.to_vec(),
                scheme,
                signature: signature.to_vec(),
            },
        ))
    }

    pub fn parse_psk(input: &[u8]) -> IResult<&[u8], ServerKeyExchange> {
        let (input, hint_len) = be_u16(input)?;
        let (input, identity_hint) = take(hint_len as usize)(input)?;
        Ok((
            input,
            ServerKeyExchange::Psk {
                identity_hint: identity_hint.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            ServerKeyExchange::Ecdh {
                curve,
                public_key,
                scheme,
                signature,
            } => {
                out.push(CURVE_TYPE_NAMED);
                out.extend_from_slice(&curve.as_u16().to_be_bytes());
                out.push(public_key.len() as u8);
                out.extend_from_slice(public_key);
                scheme.serialize(out);
                out.extend_from_slice(&(signature.len() as u16).to_be_bytes());
                out.extend_from_slice(signature);
            }
            ServerKeyExchange::Psk { identity_hint } => {
                out.extend_from_slice(&(identity_hint.len() as u16).to_be_bytes());
                out.extend_from_slice(identity_hint);
            }
        }
    }

    /// The `ServerECDHParams` bytes the signature covers.
    pub fn ecdh_params(curve: NamedCurve, public_key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + public_key.len());
        out.push(CURVE_TYPE_NAMED);
        out.extend_from_slice(&curve.as_u16().to_be_bytes());
        out.push(public_key.len() as u8);
        out.extend_from_slice(public_key);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecdh_roundtrip() {
        let ske = ServerKeyExchange::Ecdh {
            curve: NamedCurve::X25519,
            public_key: vec![0x11; 32],
            scheme: SignatureScheme::ECDSA_SECP256R1_SHA256,
            signature: vec![0x22; 70],
        };
        let mut out = Vec::new();
        ske.serialize(&mut out);

        let (rest, parsed) = ServerKeyExchange::parse_ecdh(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, ske);
    }

    #[test]
    fn psk_roundtrip() {
        let ske = ServerKeyExchange::Psk {
            identity_hint: b"hint".to_vec(),
        };
        let mut out = Vec::new();
        ske.serialize(&mut out);
        assert_eq!(out, [0, 4, b'h', b'i', b'n', b't']);

        let (rest, parsed) = ServerKeyExchange::parse_psk(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, ske);
    }

    #[test]
    fn rejects_explicit_curve() {
        // curve_type 1 (explicit_prime) is not supported
        let raw = [1u8, 0, 29, 0];
        assert!(ServerKeyExchange::parse_ecdh(&raw).is_err());
    }
}
