use nom::bytes::complete::take;
use nom::IResult;

/// Parse a big-endian 24-bit integer.
pub fn be_u24(input: &[u8]) -> IResult<&[u8], u32> {
    let (input, bytes) = take(3usize)(input)?;
    let val = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32;
    Ok((input, val))
}

/// Parse a big-endian 48-bit integer.
pub fn be_u48(input: &[u8]) -> IResult<&[u8], u64> {
    let (input, bytes) = take(6usize)(input)?;
    let val = ((bytes[0] as u64) << 40)
        | ((bytes[1] as u64) << 32)
        | ((bytes[2] as u64) << 24)
        | ((bytes[3] as u64) << 16)
        | ((bytes[4] as u64) << 8)
        | bytes[5] as u64;
    Ok((input, val))
}

/// Serialize a 24-bit integer big-endian.
pub fn put_u24(out: &mut Vec<u8>, val: u32) {
    out.extend_from_slice(&val.to_be_bytes()[1..]);
}

/// Serialize a 48-bit integer big-endian.
pub fn put_u48(out: &mut Vec<u8>, val: u64) {
    out.extend_from_slice(&val.to_be_bytes()[2..]);
}
