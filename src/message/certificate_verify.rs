use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use super::SignatureScheme;

/// CertificateVerify body: a signature over the handshake transcript so
/// far, proving possession of the client certificate's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub scheme: SignatureScheme,
    pub signature: Vec<u8>,
}

impl CertificateVerify {
    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateVerify> {
        let (input, scheme) = SignatureScheme::parse(input)?;
        let (input, sig_len) = be_u16(input)?;
        let (input, signature) = take(sig_len as usize)(input)?;
        Ok((
            input,
            CertificateVerify {
                scheme,
                signature: signature.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.scheme.serialize(out);
        out.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cv = CertificateVerify {
            scheme: SignatureScheme::ECDSA_SECP256R1_SHA256,
            signature: vec![0x30, 0x45, 0x02, 0x20],
        };
        let mut out = Vec::new();
        cv.serialize(&mut out);

        let (rest, parsed) = CertificateVerify::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, cv);
    }
}
