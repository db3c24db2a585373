//! Hello extensions.
//!
//! Only the extensions this endpoint actually negotiates get typed
//! variants; everything else is carried opaquely so it can be echoed or
//! ignored without loss.

use nom::bytes::complete::take;
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::{NamedCurve, SignatureScheme, SrtpProfile};

/// Extension code points.
pub mod code {
    pub const SERVER_NAME: u16 = 0;
    pub const SUPPORTED_GROUPS: u16 = 10;
    pub const EC_POINT_FORMATS: u16 = 11;
    pub const SIGNATURE_ALGORITHMS: u16 = 13;
    pub const USE_SRTP: u16 = 14;
    pub const ALPN: u16 = 16;
    pub const EXTENDED_MASTER_SECRET: u16 = 23;
    pub const CONNECTION_ID: u16 = 54;
    pub const RENEGOTIATION_INFO: u16 = 0xFF01;
}

/// A single hello extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// RFC 6066. Always host_name (type 0) entries.
    ServerName(String),
    /// RFC 8422 supported_groups.
    SupportedGroups(Vec<NamedCurve>),
    /// RFC 8422 ec_point_formats. Entries are the raw format codes.
    EcPointFormats(Vec<u8>),
    /// RFC 5246 Section 7.4.1.4.1.
    SignatureAlgorithms(Vec<SignatureScheme>),
    /// RFC 5764. The MKI is carried but never interpreted here.
    UseSrtp {
        profiles: Vec<SrtpProfile>,
        mki: Vec<u8>,
    },
    /// RFC 7301 application-layer protocol negotiation.
    Alpn(Vec<String>),
    /// RFC 7627. Zero-length.
    ExtendedMasterSecret,
    /// RFC 9146 connection_id: the CID the sender wants to RECEIVE.
    ConnectionId(Vec<u8>),
    /// RFC 5746. We only ever signal the empty "initial handshake" form.
    RenegotiationInfo(Vec<u8>),
    /// Anything we do not interpret.
    Unknown { typ: u16, data: Vec<u8> },
}

impl Extension {
    pub fn typ(&self) -> u16 {
        match self {
            Extension::ServerName(_) => code::SERVER_NAME,
            Extension::SupportedGroups(_) => code::SUPPORTED_GROUPS,
            Extension::EcPointFormats(_) => code::EC_POINT_FORMATS,
            Extension::SignatureAlgorithms(_) => code::SIGNATURE_ALGORITHMS,
            Extension::UseSrtp { .. } => code::USE_SRTP,
            Extension::Alpn(_) => code::ALPN,
            Extension::ExtendedMasterSecret => code::EXTENDED_MASTER_SECRET,
            Extension::ConnectionId(_) => code::CONNECTION_ID,
            Extension::RenegotiationInfo(_) => code::RENEGOTIATION_INFO,
            Extension::Unknown { typ, .. } => *typ,
        }
    }

    fn serialize_data(&self, out: &mut Vec<u8>) {
        match self {
            Extension::ServerName(name) => {
                // server_name_list: u16 len, then entries of
                // (type u8, u16 len, name)
                let name = name.as_bytes();
                let list_len = 3 + name.len();
                out.extend_from_slice(&(list_len as u16).to_be_bytes());
                out.push(0); // host_name
                out.extend_from_slice(&(name.len() as u16).to_be_bytes());
                out.extend_from_slice(name);
            }
            Extension::SupportedGroups(groups) => {
                out.extend_from_slice(&((groups.len() * 2) as u16).to_be_bytes());
                for g in groups {
                    out.extend_from_slice(&g.as_u16().to_be_bytes());
                }
            }
            Extension::EcPointFormats(formats) => {
                out.push(formats.len() as u8);
                out.extend_from_slice(formats);
            }
            Extension::SignatureAlgorithms(schemes) => {
                out.extend_from_slice(&((schemes.len() * 2) as u16).to_be_bytes());
                for s in schemes {
                    s.serialize(out);
                }
            }
            Extension::UseSrtp { profiles, mki } => {
                out.extend_from_slice(&((profiles.len() * 2) as u16).to_be_bytes());
                for p in profiles {
                    out.extend_from_slice(&p.as_u16().to_be_bytes());
                }
                out.push(mki.len() as u8);
                out.extend_from_slice(mki);
            }
            Extension::Alpn(protocols) => {
                let list_len: usize = protocols.iter().map(|p| 1 + p.len()).sum();
                out.extend_from_slice(&(list_len as u16).to_be_bytes());
                for p in protocols {
                    out.push(p.len() as u8);
                    out.extend_from_slice(p.as_bytes());
                }
            }
            Extension::ExtendedMasterSecret => {}
            Extension::ConnectionId(cid) => {
                out.push(cid.len() as u8);
                out.extend_from_slice(cid);
            }
            Extension::RenegotiationInfo(data) => {
                out.push(data.len() as u8);
                out.extend_from_slice(data);
            }
            Extension::Unknown { data, .. } => {
                out.extend_from_slice(data);
            }
        }
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.typ().to_be_bytes());
        let len_at = out.len();
        out.extend_from_slice(&[0, 0]);
        self.serialize_data(out);
        let data_len = (out.len() - len_at - 2) as u16;
        out[len_at..len_at + 2].copy_from_slice(&data_len.to_be_bytes());
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Extension> {
        let (input, typ) = be_u16(input)?;
        let (input, len) = be_u16(input)?;
        let (input, data) = take(len as usize)(input)?;

        let ext = match typ {
            code::SERVER_NAME => parse_server_name(data)?,
            code::SUPPORTED_GROUPS => parse_supported_groups(data)?,
            code::EC_POINT_FORMATS => parse_ec_point_formats(data)?,
            code::SIGNATURE_ALGORITHMS => parse_signature_algorithms(data)?,
            code::USE_SRTP => parse_use_srtp(data)?,
            code::ALPN => parse_alpn(data)?,
            code::EXTENDED_MASTER_SECRET => Extension::ExtendedMasterSecret,
            code::CONNECTION_ID => parse_connection_id(data)?,
            code::RENEGOTIATION_INFO => parse_renegotiation_info(data)?,
            _ => Extension::Unknown {
                typ,
                data: data.to_vec(),
            },
        };

        Ok((input, ext))
    }
}

fn parse_server_name(data: &[u8]) -> Result<Extension, Err<NomError<&[u8]>>> {
    // A ServerHello may echo an empty extension.
    if data.is_empty() {
        return Ok(Extension::ServerName(String::new()));
    }
    let (data, _list_len) = be_u16(data)?;
    let (data, name_type) = be_u8(data)?;
    if name_type != 0 {
        return Err(Err::Failure(NomError::new(data, ErrorKind::Tag)));
    }
    let (data, name_len) = be_u16(data)?;
    let (_, name) = take(name_len as usize)(data)?;
    let name = std::str::from_utf8(name)
        .map_err(|_| Err::Failure(NomError::new(data, ErrorKind::Char)))?;
    Ok(Extension::ServerName(name.to_string()))
}

fn parse_supported_groups(data: &[u8]) -> Result<Extension, Err<NomError<&[u8]>>> {
    let (data, list_len) = be_u16(data)?;
    let (_, mut list) = take(list_len as usize)(data)?;
    let mut groups = Vec::new();
    while !list.is_empty() {
        let (rest, g) = NamedCurve::parse(list)?;
        list = rest;
        groups.push(g);
    }
    Ok(Extension::SupportedGroups(groups))
}

fn parse_ec_point_formats(data: &[u8]) -> Result<Extension, Err<NomError<&[u8]>>> {
    let (data, len) = be_u8(data)?;
    let (_, formats) = take(len as usize)(data)?;
    Ok(Extension::EcPointFormats(formats.to_vec()))
}

fn parse_signature_algorithms(data: &[u8]) -> Result<Extension, Err<NomError<&[u8]>>> {
    let (data, list_len) = be_u16(data)?;
    let (_, mut list) = take(list_len as usize)(data)?;
    let mut schemes = Vec::new();
    while !list.is_empty() {
        let (rest, s) = SignatureScheme::parse(list)?;
        list = rest;
        schemes.push(s);
    }
    Ok(Extension::SignatureAlgorithms(schemes))
}

fn parse_use_srtp(data: &[u8]) -> Result<Extension, Err<NomError<&[u8]>>> {
    let (data, list_len) = be_u16(data)?;
    let (data, mut list) = take(list_len as usize)(data)?;
    let mut profiles = Vec::new();
    while !list.is_empty() {
        let (rest, p) = be_u16(list)?;
        list = rest;
        profiles.push(SrtpProfile::from_u16(p));
    }
    let (data, mki_len) = be_u8(data)?;
    let (_, mki) = take(mki_len as usize)(data)?;
    Ok(Extension::UseSrtp {
        profiles,
        mki: mki.to_vec(),
    })
}

fn parse_alpn(data: &[u8]) -> Result<Extension, Err<NomError<&[u8]>>> {
    let (data, list_len) = be_u16(data)?;
    let (_, mut list) = take(list_len as usize)(data)?;
    let mut protocols = Vec::new();
    while !list.is_empty() {
        let (rest, len) = be_u8(list)?;
        let (rest, name) = take(len as usize)(rest)?;
        list = rest;
        let name = std::str::from_utf8(name)
            .map_err(|_| Err::Failure(NomError::new(list, ErrorKind::Char)))?;
        protocols.push(name.to_string());
    }
    Ok(Extension::Alpn(protocols))
}

fn parse_connection_id(data: &[u8]) -> Result<Extension, Err<NomError<&[u8]>>> {
    let (data, len) = be_u8(data)?;
    let (_, cid) = take(len as usize)(data)?;
    Ok(Extension::ConnectionId(cid.to_vec()))
}

fn parse_renegotiation_info(data: &[u8]) -> Result<Extension, Err<NomError<&[u8]>>> {
    let (data, len) = be_u8(data)?;
    let (_, info) = take(len as usize)(data)?;
    Ok(Extension::RenegotiationInfo(info.to_vec()))
}

/// Parse the trailing extension block of a hello message. An absent block
/// (no bytes left) is an empty list.
pub fn parse_extensions(input: &[u8]) -> IResult<&[u8], Vec<Extension>> {
    if input.is_empty() {
        return Ok((input, Vec::new()));
    }
    let (input, total_len) = be_u16(input)?;
    let (input, mut block) = take(total_len as usize)(input)?;
    let mut extensions = Vec::new();
    while !block.is_empty() {
        let (rest, ext) = Extension::parse(block)?;
        block = rest;
        extensions.push(ext);
    }
    Ok((input, extensions))
}

/// Serialize an extension block, including its u16 total length. Writes
/// nothing at all when `extensions` is empty, matching hellos that omit the
/// block entirely.
pub fn serialize_extensions(extensions: &[Extension], out: &mut Vec<u8>) {
    if extensions.is_empty() {
        return;
    }
    let len_at = out.len();
    out.extend_from_slice(&[0, 0]);
    for ext in extensions {
        ext.serialize(out);
    }
    let total = (out.len() - len_at - 2) as u16;
    out[len_at..len_at + 2].copy_from_slice(&total.to_be_bytes());
}

/// Find an extension by code point.
pub fn find(extensions: &[Extension], typ: u16) -> Option<&Extension> {
    extensions.iter().find(|e| e.typ() == typ)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::HashAlgorithm;

    fn roundtrip(ext: Extension) {
        let mut out = Vec::new();
        ext.serialize(&mut out);
        let (rest, parsed) = Extension::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, ext);
    }

    #[test]
    fn roundtrips() {
        roundtrip(Extension::ServerName("example.com".into()));
        roundtrip(Extension::SupportedGroups(vec![
            NamedCurve::X25519,
            NamedCurve::P256,
        ]));
        roundtrip(Extension::EcPointFormats(vec![0]));
        roundtrip(Extension::SignatureAlgorithms(vec![
            SignatureScheme::ECDSA_SECP256R1_SHA256,
            SignatureScheme::ECDSA_SECP384R1_SHA384,
        ]));
        roundtrip(Extension::UseSrtp {
            profiles: vec![SrtpProfile::AeadAes128Gcm],
            mki: vec![],
        });
        roundtrip(Extension::Alpn(vec!["h2".into(), "webrtc".into()]));
        roundtrip(Extension::ExtendedMasterSecret);
        roundtrip(Extension::ConnectionId(vec![1, 2, 3, 4]));
        roundtrip(Extension::RenegotiationInfo(vec![]));
        roundtrip(Extension::Unknown {
            typ: 0x1234,
            data: vec![9, 9],
        });
    }

    #[test]
    fn block_roundtrip() {
        let exts = vec![
            Extension::ExtendedMasterSecret,
            Extension::SupportedGroups(vec![NamedCurve::P384]),
        ];
        let mut out = Vec::new();
        serialize_extensions(&exts, &mut out);
        let (rest, parsed) = parse_extensions(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, exts);
    }

    #[test]
    fn empty_block_is_omitted() {
        let mut out = Vec::new();
        serialize_extensions(&[], &mut out);
        assert!(out.is_empty());
        let (_, parsed) = parse_extensions(&out).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn signature_algorithms_wire_format() {
        let ext = Extension::SignatureAlgorithms(vec![SignatureScheme {
            hash: HashAlgorithm::Sha256,
            signature: crate::message::SignatureAlgorithm::Ecdsa,
        }]);
        let mut out = Vec::new();
        ext.serialize(&mut out);
        assert_eq!(out, [0x00, 0x0D, 0x00, 0x04, 0x00, 0x02, 0x04, 0x03]);
    }
}
