use nom::IResult;

/// Finished body: the PRF-derived verify_data over the handshake
/// transcript. Always 12 bytes for the suites here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

impl Finished {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Finished> {
        // The body is exactly the verify_data; its length comes from the
        // handshake header.
        Ok((
            &input[input.len()..],
            Finished {
                verify_data: input.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.verify_data);
    }
}
