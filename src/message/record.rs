//! DTLS record header codec.
//!
//! The wire layout is `content_type(1) | version(2) | epoch(2) | seq(6) |
//! length(2)`. Records of content type `tls12_cid` (RFC 9146) splice a
//! variable-length connection ID between the sequence number and the length;
//! its length is not self-describing, so decoding is parameterized by the
//! connection ID length negotiated for this endpoint.

use std::fmt;

use arrayvec::ArrayVec;
use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::util::{be_u48, put_u48};
use crate::Error;

use super::{ContentType, ProtocolVersion};

/// Largest sequence number a record may carry. Emitting beyond this forces
/// a rehandshake or abort (RFC 6347 Section 4.1).
pub const MAX_SEQUENCE_NUMBER: u64 = (1 << 48) - 1;

/// Record header, CID included when present.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub epoch: u16,
    pub sequence_number: u64, // u48 on the wire
    /// Connection ID; empty unless `content_type == Tls12Cid`.
    pub connection_id: Vec<u8>,
    pub length: u16,
}

impl RecordHeader {
    /// Fixed header length without any connection ID.
    pub const FIXED_LEN: usize = 13;

    /// Header length including the connection ID, i.e. the offset of the
    /// record body.
    pub fn len(&self) -> usize {
        Self::FIXED_LEN + self.connection_id.len()
    }

    /// Parse a header. `local_cid_len` is the length of the connection ID
    /// this endpoint expects in inbound `tls12_cid` records.
    pub fn parse(input: &[u8], local_cid_len: usize) -> IResult<&[u8], RecordHeader> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, epoch) = be_u16(input)?;
        let (input, sequence_number) = be_u48(input)?;
        let (input, connection_id) = if content_type == ContentType::Tls12Cid {
            let (input, cid) = take(local_cid_len)(input)?;
            (input, cid.to_vec())
        } else {
            (input, Vec::new())
        };
        let (input, length) = be_u16(input)?;

        Ok((
            input,
            RecordHeader {
                content_type,
                version,
                epoch,
                sequence_number,
                connection_id,
                length,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(self.content_type.as_u8());
        self.version.serialize(out);
        out.extend_from_slice(&self.epoch.to_be_bytes());
        put_u48(out, self.sequence_number);
        if self.content_type == ContentType::Tls12Cid {
            out.extend_from_slice(&self.connection_id);
        }
        out.extend_from_slice(&self.length.to_be_bytes());
    }
}

/// A parsed record: header plus borrowed body.
#[derive(Debug, PartialEq, Eq)]
pub struct Record<'a> {
    pub header: RecordHeader,
    pub body: &'a [u8],
}

impl<'a> Record<'a> {
    /// Parse one record off the front of `input`, returning the rest.
    pub fn parse(input: &'a [u8], local_cid_len: usize) -> Result<(&'a [u8], Record<'a>), Error> {
        let (rest, header) = RecordHeader::parse(input, local_cid_len)?;
        if rest.len() < header.length as usize {
            return Err(Error::InvalidPacket);
        }
        let (body, rest) = rest.split_at(header.length as usize);
        Ok((rest, Record { header, body }))
    }

    /// Produce one contiguous datagram fragment: header followed by body.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.header.serialize(out);
        out.extend_from_slice(self.body);
    }
}

/// Split a datagram into the individual records it concatenates.
///
/// Returns borrowed slices, each covering one full record (header + body).
/// Fails with `InvalidPacket` when a declared length exceeds the remaining
/// buffer; the caller discards the datagram silently in that case.
pub fn unpack_datagram(datagram: &[u8], local_cid_len: usize) -> Result<Vec<&[u8]>, Error> {
    let mut out = Vec::new();
    let mut rest = datagram;

    while !rest.is_empty() {
        let (header_rest, header) = RecordHeader::parse(rest, local_cid_len)?;
        let record_len = rest.len() - header_rest.len() + header.length as usize;
        if rest.len() < record_len {
            return Err(Error::InvalidPacket);
        }
        let (record, r) = rest.split_at(record_len);
        out.push(record);
        rest = r;
    }

    Ok(out)
}

/// AEAD additional data for a classical record, 13 bytes exactly:
/// `epoch(2) || seq(6) || content_type(1) || version(2) || length(2)`.
///
/// `length` is the plaintext length (RFC 5246 Section 6.2.3.3).
pub fn aead_additional_data(header: &RecordHeader, payload_len: usize) -> ArrayVec<u8, 13> {
    let mut aad = ArrayVec::new();
    let _ = aad.try_extend_from_slice(&header.epoch.to_be_bytes());
    let _ = aad.try_extend_from_slice(&header.sequence_number.to_be_bytes()[2..]);
    aad.push(header.content_type.as_u8());
    aad.push(header.version.major);
    aad.push(header.version.minor);
    let _ = aad.try_extend_from_slice(&(payload_len as u16).to_be_bytes());
    aad
}

/// AEAD additional data for a `tls12_cid` record (RFC 9146 Section 5.2):
/// `seq_num_placeholder(8 x 0xff) || tls12_cid || cid_length || tls12_cid ||
/// version || epoch || sequence_number || cid || inner_plaintext_length`.
pub fn aead_additional_data_cid(header: &RecordHeader, payload_len: usize) -> Vec<u8> {
    let cid = &header.connection_id;
    let mut aad = Vec::with_capacity(23 + cid.len());
    aad.extend_from_slice(&[0xff; 8]);
    aad.push(ContentType::Tls12Cid.as_u8());
    aad.push(cid.len() as u8);
    aad.push(ContentType::Tls12Cid.as_u8());
    aad.push(header.version.major);
    aad.push(header.version.minor);
    aad.extend_from_slice(&header.epoch.to_be_bytes());
    put_u48(&mut aad, header.sequence_number);
    aad.extend_from_slice(cid);
    aad.extend_from_slice(&(payload_len as u16).to_be_bytes());
    aad
}

/// The protected body of a `tls12_cid` record:
/// `content || real_content_type(1) || zero padding` (RFC 9146 Section 4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerPlaintext {
    pub content: Vec<u8>,
    pub real_type: ContentType,
    pub zeros: usize,
}

impl InnerPlaintext {
    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.content);
        out.push(self.real_type.as_u8());
        out.resize(out.len() + self.zeros, 0);
    }

    /// Strip padding and recover the real content type.
    pub fn unmarshal(input: &[u8]) -> Result<InnerPlaintext, Error> {
        // Scan backwards over the zero padding to the real type byte.
        let last_nonzero = input
            .iter()
            .rposition(|&b| b != 0)
            .ok_or(Error::InvalidPacket)?;
        let real_type = ContentType::from_u8(input[last_nonzero]);
        Ok(InnerPlaintext {
            content: input[..last_nonzero].to_vec(),
            real_type,
            zeros: input.len() - last_nonzero - 1,
        })
    }
}

impl fmt::Display for RecordHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:?} epoch: {} seq: {}]",
            self.content_type, self.epoch, self.sequence_number
        )
    }
}
