//! Handshake message header and fragmentation.
//!
//! DTLS extends the TLS handshake header with a message sequence and
//! fragment bounds so a message can be split across records and reassembled
//! out of order.

use nom::number::complete::be_u16;
use nom::IResult;

use crate::util::{be_u24, put_u24};

use super::MessageType;

/// The 12-byte DTLS handshake header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub msg_type: MessageType,
    /// Total length of the message body across all fragments.
    pub length: u32,
    pub message_sequence: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl HandshakeHeader {
    pub const LEN: usize = 12;

    pub fn parse(input: &[u8]) -> IResult<&[u8], HandshakeHeader> {
        let (input, msg_type) = MessageType::parse(input)?;
        let (input, length) = be_u24(input)?;
        let (input, message_sequence) = be_u16(input)?;
        let (input, fragment_offset) = be_u24(input)?;
        let (input, fragment_length) = be_u24(input)?;
        Ok((
            input,
            HandshakeHeader {
                msg_type,
                length,
                message_sequence,
                fragment_offset,
                fragment_length,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(self.msg_type.as_u8());
        put_u24(out, self.length);
        out.extend_from_slice(&self.message_sequence.to_be_bytes());
        put_u24(out, self.fragment_offset);
        put_u24(out, self.fragment_length);
    }

    /// True when this fragment spans the entire message.
    pub fn is_full_message(&self) -> bool {
        self.fragment_offset == 0 && self.fragment_length == self.length
    }
}

/// Build a complete single-fragment handshake message:
/// header (offset 0, fragment_length == length) followed by the body.
pub fn assemble(msg_type: MessageType, message_sequence: u16, body: &[u8]) -> Vec<u8> {
    let header = HandshakeHeader {
        msg_type,
        length: body.len() as u32,
        message_sequence,
        fragment_offset: 0,
        fragment_length: body.len() as u32,
    };
    let mut out = Vec::with_capacity(HandshakeHeader::LEN + body.len());
    header.serialize(&mut out);
    out.extend_from_slice(body);
    out
}

/// Split a handshake message body into wire fragments no larger than
/// `max_fragment_body` bytes of body each. Every fragment carries the same
/// `(message_sequence, length)` and its own `(fragment_offset,
/// fragment_length)`. An empty body still produces one header-only fragment
/// (e.g. ServerHelloDone).
pub fn fragment(
    msg_type: MessageType,
    message_sequence: u16,
    body: &[u8],
    max_fragment_body: usize,
) -> Vec<Vec<u8>> {
    let max_fragment_body = max_fragment_body.max(1);
    let total = body.len() as u32;
    let mut out = Vec::new();
    let mut offset = 0usize;

    loop {
        let chunk = (body.len() - offset).min(max_fragment_body);
        let header = HandshakeHeader {
            msg_type,
            length: total,
            message_sequence,
            fragment_offset: offset as u32,
            fragment_length: chunk as u32,
        };
        let mut frag = Vec::with_capacity(HandshakeHeader::LEN + chunk);
        header.serialize(&mut frag);
        frag.extend_from_slice(&body[offset..offset + chunk]);
        out.push(frag);

        offset += chunk;
        if offset >= body.len() {
            break;
        }
    }

    out
}
