use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use super::SignatureScheme;

/// ClientCertificateType values we deal in.
pub const CERT_TYPE_ECDSA_SIGN: u8 = 64;

/// CertificateRequest body (RFC 5246 Section 7.4.4).
///
/// Certificate authorities are carried as opaque DER distinguished names;
/// this endpoint never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CertificateRequest {
    pub certificate_types: Vec<u8>,
    pub signature_schemes: Vec<SignatureScheme>,
    pub certificate_authorities: Vec<Vec<u8>>,
}

impl CertificateRequest {
    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateRequest> {
        let (input, types_len) = be_u8(input)?;
        let (input, certificate_types) = take(types_len as usize)(input)?;

        let (input, schemes_len) = be_u16(input)?;
        let (input, mut schemes_block) = take(schemes_len as usize)(input)?;
        let mut signature_schemes = Vec::new();
        while !schemes_block.is_empty() {
            let (rest, scheme) = SignatureScheme::parse(schemes_block)?;
            schemes_block = rest;
            signature_schemes.push(scheme);
        }

        let (input, cas_len) = be_u16(input)?;
        let (input, mut cas_block) = take(cas_len as usize)(input)?;
        let mut certificate_authorities = Vec::new();
        while !cas_block.is_empty() {
            let (rest, ca_len) = be_u16(cas_block)?;
            let (rest, ca) = take(ca_len as usize)(rest)?;
            cas_block = rest;
            certificate_authorities.push(ca.to_vec());
        }

        Ok((
            input,
            CertificateRequest {
                certificate_types: certificate_types.to_vec(),
                signature_schemes,
                certificate_authorities,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(self.certificate_types.len() as u8);
        out.extend_from_slice(&self.certificate_types);

        out.extend_from_slice(&((self.signature_schemes.len() * 2) as u16).to_be_bytes());
        for scheme in &self.signature_schemes {
            scheme.serialize(out);
        }

        let cas_len: usize = self.certificate_authorities.iter().map(|c| 2 + c.len()).sum();
        out.extend_from_slice(&(cas_len as u16).to_be_bytes());
        for ca in &self.certificate_authorities {
            out.extend_from_slice(&(ca.len() as u16).to_be_bytes());
            out.extend_from_slice(ca);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let req = CertificateRequest {
            certificate_types: vec![CERT_TYPE_ECDSA_SIGN],
            signature_schemes: vec![
                SignatureScheme::ECDSA_SECP256R1_SHA256,
                SignatureScheme::ECDSA_SECP384R1_SHA384,
            ],
            certificate_authorities: vec![vec![0x30, 0x06]],
        };
        let mut out = Vec::new();
        req.serialize(&mut out);

        let (rest, parsed) = CertificateRequest::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, req);
    }
}
