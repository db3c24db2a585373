use std::time::{SystemTime, UNIX_EPOCH};

use nom::bytes::complete::take;
use nom::number::complete::be_u32;
use nom::IResult;

/// The 32-byte hello random: 4 bytes of GMT seconds followed by 28 random
/// bytes (RFC 5246 Section 7.4.1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeRandom {
    pub gmt_unix_time: u32,
    pub random_bytes: [u8; 28],
}

impl HandshakeRandom {
    pub const LEN: usize = 32;

    /// Populate with the current time and the given random bytes (taken
    /// from a CSPRNG, or from the configured test generator).
    pub fn new(random_bytes: [u8; 28]) -> Self {
        let gmt_unix_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        HandshakeRandom {
            gmt_unix_time,
            random_bytes,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HandshakeRandom> {
        let (input, gmt_unix_time) = be_u32(input)?;
        let (input, bytes) = take(28usize)(input)?;
        let mut random_bytes = [0u8; 28];
        random_bytes.copy_from_slice(bytes);
        Ok((
            input,
            HandshakeRandom {
                gmt_unix_time,
                random_bytes,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.gmt_unix_time.to_be_bytes());
        out.extend_from_slice(&self.random_bytes);
    }

    /// The full 32 bytes as used in the key schedule.
    pub fn bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[..4].copy_from_slice(&self.gmt_unix_time.to_be_bytes());
        out[4..].copy_from_slice(&self.random_bytes);
        out
    }
}

impl Default for HandshakeRandom {
    fn default() -> Self {
        HandshakeRandom {
            gmt_unix_time: 0,
            random_bytes: [0u8; 28],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let random = HandshakeRandom {
            gmt_unix_time: 560149025,
            random_bytes: [7u8; 28],
        };
        let mut out = Vec::new();
        random.serialize(&mut out);
        assert_eq!(out.len(), HandshakeRandom::LEN);
        assert_eq!(out, random.bytes());

        let (rest, parsed) = HandshakeRandom::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, random);
    }
}
