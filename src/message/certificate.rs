use nom::bytes::complete::take;
use nom::IResult;

use crate::util::{be_u24, put_u24};

/// Certificate chain, leaf first, each entry raw DER. Parsing and
/// validation of the DER itself is the verifier's business.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Certificate {
    pub certificates: Vec<Vec<u8>>,
}

impl Certificate {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Certificate> {
        let (input, total_len) = be_u24(input)?;
        let (input, mut block) = take(total_len as usize)(input)?;

        let mut certificates = Vec::new();
        while !block.is_empty() {
            let (rest, cert_len) = be_u24(block)?;
            let (rest, cert) = take(cert_len as usize)(rest)?;
            block = rest;
            certificates.push(cert.to_vec());
        }

        Ok((input, Certificate { certificates }))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        let total: usize = self.certificates.iter().map(|c| 3 + c.len()).sum();
        put_u24(out, total as u32);
        for cert in &self.certificates {
            put_u24(out, cert.len() as u32);
            out.extend_from_slice(cert);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let msg = Certificate {
            certificates: vec![vec![0x30, 0x82, 0x01, 0x02], vec![0x30, 0x01]],
        };
        let mut out = Vec::new();
        msg.serialize(&mut out);

        let (rest, parsed) = Certificate::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, msg);
    }

    #[test]
    fn empty_chain() {
        let msg = Certificate {
            certificates: vec![],
        };
        let mut out = Vec::new();
        msg.serialize(&mut out);
        assert_eq!(out, [0, 0, 0]);

        let (_, parsed) = Certificate::parse(&out).unwrap();
        assert!(parsed.certificates.is_empty());
    }
}
