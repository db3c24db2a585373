//! Small wire-level enums shared across records and handshake messages.

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

/// DTLS record content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    /// Connection ID record (RFC 9146).
    Tls12Cid,
    Unknown(u8),
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            25 => ContentType::Tls12Cid,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Tls12Cid => 25,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

/// Protocol version in record and hello headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    /// DTLS 1.2 (0xFEFD).
    pub const DTLS1_2: ProtocolVersion = ProtocolVersion {
        major: 0xFE,
        minor: 0xFD,
    };

    /// DTLS 1.0 (0xFEFF), only ever emitted in HelloVerifyRequest per
    /// RFC 6347 Section 4.2.1.
    pub const DTLS1_0: ProtocolVersion = ProtocolVersion {
        major: 0xFE,
        minor: 0xFF,
    };

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, major) = be_u8(input)?;
        let (input, minor) = be_u8(input)?;
        Ok((input, ProtocolVersion { major, minor }))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(self.major);
        out.push(self.minor);
    }
}

/// DTLS handshake message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageType {
    HelloRequest,
    ClientHello,
    ServerHello,
    HelloVerifyRequest,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    Unknown(u8),
}

impl MessageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => MessageType::HelloRequest,
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            3 => MessageType::HelloVerifyRequest,
            11 => MessageType::Certificate,
            12 => MessageType::ServerKeyExchange,
            13 => MessageType::CertificateRequest,
            14 => MessageType::ServerHelloDone,
            15 => MessageType::CertificateVerify,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            _ => MessageType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::HelloRequest => 0,
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::HelloVerifyRequest => 3,
            MessageType::Certificate => 11,
            MessageType::ServerKeyExchange => 12,
            MessageType::CertificateRequest => 13,
            MessageType::ServerHelloDone => 14,
            MessageType::CertificateVerify => 15,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], MessageType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

/// Cipher suite identifier as negotiated in the hellos.
///
/// The capability object behind an identifier lives in [`crate::crypto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuiteId(pub u16);

impl CipherSuiteId {
    pub const ECDHE_ECDSA_AES128_GCM_SHA256: CipherSuiteId = CipherSuiteId(0xC02B);
    pub const ECDHE_ECDSA_AES256_GCM_SHA384: CipherSuiteId = CipherSuiteId(0xC02C);
    pub const PSK_AES128_GCM_SHA256: CipherSuiteId = CipherSuiteId(0x00A8);

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuiteId> {
        let (input, v) = be_u16(input)?;
        Ok((input, CipherSuiteId(v)))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_be_bytes());
    }
}

impl std::fmt::Display for CipherSuiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            CipherSuiteId::ECDHE_ECDSA_AES128_GCM_SHA256 => {
                write!(f, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256")
            }
            CipherSuiteId::ECDHE_ECDSA_AES256_GCM_SHA384 => {
                write!(f, "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384")
            }
            CipherSuiteId::PSK_AES128_GCM_SHA256 => write!(f, "TLS_PSK_WITH_AES_128_GCM_SHA256"),
            CipherSuiteId(v) => write!(f, "0x{:04X}", v),
        }
    }
}

/// Named elliptic curve / group (RFC 8422).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedCurve {
    P256,
    P384,
    X25519,
    Unknown(u16),
}

impl NamedCurve {
    pub fn from_u16(value: u16) -> Self {
        match value {
            23 => NamedCurve::P256,
            24 => NamedCurve::P384,
            29 => NamedCurve::X25519,
            _ => NamedCurve::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            NamedCurve::P256 => 23,
            NamedCurve::P384 => 24,
            NamedCurve::X25519 => 29,
            NamedCurve::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedCurve> {
        let (input, v) = be_u16(input)?;
        Ok((input, Self::from_u16(v)))
    }
}

/// Hash algorithm half of a signature scheme (RFC 5246 Section 7.4.1.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Unknown(u8),
}

impl HashAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => HashAlgorithm::Md5,
            2 => HashAlgorithm::Sha1,
            4 => HashAlgorithm::Sha256,
            5 => HashAlgorithm::Sha384,
            _ => HashAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HashAlgorithm::Md5 => 1,
            HashAlgorithm::Sha1 => 2,
            HashAlgorithm::Sha256 => 4,
            HashAlgorithm::Sha384 => 5,
            HashAlgorithm::Unknown(value) => *value,
        }
    }

    /// Insecure hashes are rejected unless explicitly enabled in config.
    pub fn is_insecure(&self) -> bool {
        matches!(self, HashAlgorithm::Md5 | HashAlgorithm::Sha1)
    }
}

/// Signature algorithm half of a signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Rsa,
    Ecdsa,
    Unknown(u8),
}

impl SignatureAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => SignatureAlgorithm::Rsa,
            3 => SignatureAlgorithm::Ecdsa,
            _ => SignatureAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            SignatureAlgorithm::Rsa => 1,
            SignatureAlgorithm::Ecdsa => 3,
            SignatureAlgorithm::Unknown(value) => *value,
        }
    }
}

/// A (hash, signature) pair as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureScheme {
    pub hash: HashAlgorithm,
    pub signature: SignatureAlgorithm,
}

impl SignatureScheme {
    pub const ECDSA_SECP256R1_SHA256: SignatureScheme = SignatureScheme {
        hash: HashAlgorithm::Sha256,
        signature: SignatureAlgorithm::Ecdsa,
    };
    pub const ECDSA_SECP384R1_SHA384: SignatureScheme = SignatureScheme {
        hash: HashAlgorithm::Sha384,
        signature: SignatureAlgorithm::Ecdsa,
    };

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureScheme> {
        let (input, hash) = be_u8(input)?;
        let (input, signature) = be_u8(input)?;
        Ok((
            input,
            SignatureScheme {
                hash: HashAlgorithm::from_u8(hash),
                signature: SignatureAlgorithm::from_u8(signature),
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(self.hash.as_u8());
        out.push(self.signature.as_u8());
    }
}

/// SRTP protection profile carried in the use_srtp extension (RFC 5764).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtpProfile {
    Aes128CmSha1_80,
    AeadAes128Gcm,
    AeadAes256Gcm,
    Unknown(u16),
}

impl SrtpProfile {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0001 => SrtpProfile::Aes128CmSha1_80,
            0x0007 => SrtpProfile::AeadAes128Gcm,
            0x0008 => SrtpProfile::AeadAes256Gcm,
            _ => SrtpProfile::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            SrtpProfile::Aes128CmSha1_80 => 0x0001,
            SrtpProfile::AeadAes128Gcm => 0x0007,
            SrtpProfile::AeadAes256Gcm => 0x0008,
            SrtpProfile::Unknown(value) => *value,
        }
    }
}

/// Compression methods. Only null is legal in DTLS 1.2 here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionMethod(pub u8);

impl CompressionMethod {
    pub const NULL: CompressionMethod = CompressionMethod(0);

    pub fn parse(input: &[u8]) -> IResult<&[u8], CompressionMethod> {
        let (input, v) = be_u8(input)?;
        Ok((input, CompressionMethod(v)))
    }
}
