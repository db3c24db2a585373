//! TLS 1.2 PRF and the key schedule built on it (RFC 5246 Section 5).
//!
//! `PRF(secret, label, seed) = P_<hash>(secret, label + seed)` where the
//! hash is the negotiated suite's hash (SHA-256 or SHA-384 here).

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha384};

use crate::message::HashAlgorithm;
use crate::Error;

const MASTER_SECRET_LEN: usize = 48;
const VERIFY_DATA_LEN: usize = 12;

/// PRF labels reserved by the key schedule. Keying-material exporters must
/// refuse them (RFC 5705 Section 4).
pub const RESERVED_LABELS: [&str; 4] = [
    "client finished",
    "server finished",
    "master secret",
    "key expansion",
];

// P_hash: A(0) = seed, A(i) = HMAC(secret, A(i-1)),
// output = HMAC(secret, A(1) + seed) || HMAC(secret, A(2) + seed) || ...
fn p_hash<M: Mac + hmac::digest::KeyInit>(
    secret: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, Error> {
    let mut result = Vec::with_capacity(output_len);

    let mac = |data: &[&[u8]]| -> Result<Vec<u8>, Error> {
        let mut hmac = <M as Mac>::new_from_slice(secret)
            .map_err(|e| Error::CryptoError(e.to_string()))?;
        for d in data {
            hmac.update(d);
        }
        Ok(hmac.finalize().into_bytes().to_vec())
    };

    // A(1)
    let mut a = mac(&[seed])?;

    while result.len() < output_len {
        let output = mac(&[&a, seed])?;
        let remaining = output_len - result.len();
        let to_copy = remaining.min(output.len());
        result.extend_from_slice(&output[..to_copy]);

        if result.len() < output_len {
            a = mac(&[&a])?;
        }
    }

    Ok(result)
}

/// The TLS 1.2 PRF for the given hash.
pub fn prf(
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
    hash: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    let mut input = Vec::with_capacity(label.len() + seed.len());
    input.extend_from_slice(label.as_bytes());
    input.extend_from_slice(seed);

    match hash {
        HashAlgorithm::Sha256 => p_hash::<Hmac<Sha256>>(secret, &input, output_len),
        HashAlgorithm::Sha384 => p_hash::<Hmac<Sha384>>(secret, &input, output_len),
        other => Err(Error::CryptoError(format!(
            "unsupported PRF hash: {:?}",
            other
        ))),
    }
}

/// Hash `data` with the suite hash.
pub fn hash_transcript(data: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, Error> {
    match hash {
        HashAlgorithm::Sha256 => Ok(Sha256::digest(data).to_vec()),
        HashAlgorithm::Sha384 => Ok(Sha384::digest(data).to_vec()),
        other => Err(Error::CryptoError(format!(
            "unsupported transcript hash: {:?}",
            other
        ))),
    }
}

/// master_secret = PRF(pms, "master secret", client_random + server_random)
/// truncated to 48 bytes (RFC 5246 Section 8.1).
pub fn master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    hash: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    let mut seed = Vec::with_capacity(client_random.len() + server_random.len());
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(pre_master_secret, "master secret", &seed, MASTER_SECRET_LEN, hash)
}

/// Extended master secret (RFC 7627): the seed is the session hash of the
/// transcript instead of the randoms.
pub fn extended_master_secret(
    pre_master_secret: &[u8],
    session_hash: &[u8],
    hash: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    prf(
        pre_master_secret,
        "extended master secret",
        session_hash,
        MASTER_SECRET_LEN,
        hash,
    )
}

/// Pre-master secret for plain PSK (RFC 4279 Section 2):
/// `N || 0 x N || N || psk` with N a u16 length.
pub fn psk_pre_master_secret(psk: &[u8]) -> Vec<u8> {
    let n = psk.len();
    let mut out = Vec::with_capacity(4 + 2 * n);
    out.extend_from_slice(&(n as u16).to_be_bytes());
    out.resize(2 + n, 0);
    out.extend_from_slice(&(n as u16).to_be_bytes());
    out.extend_from_slice(psk);
    out
}

/// The six slices cut from the key block, in RFC 5246 Section 6.3 order.
/// MAC keys are empty for AEAD suites.
#[derive(Debug, PartialEq, Eq)]
pub struct EncryptionKeys {
    pub client_mac_key: Vec<u8>,
    pub server_mac_key: Vec<u8>,
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

/// key_block = PRF(master, "key expansion", server_random + client_random),
/// sliced into MAC keys, write keys and write IVs.
pub fn encryption_keys(
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    mac_len: usize,
    key_len: usize,
    iv_len: usize,
    hash: HashAlgorithm,
) -> Result<EncryptionKeys, Error> {
    let mut seed = Vec::with_capacity(client_random.len() + server_random.len());
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let total = 2 * (mac_len + key_len + iv_len);
    let key_block = prf(master_secret, "key expansion", &seed, total, hash)?;

    let mut offset = 0;
    let mut next = |len: usize| {
        let out = key_block[offset..offset + len].to_vec();
        offset += len;
        out
    };

    Ok(EncryptionKeys {
        client_mac_key: next(mac_len),
        server_mac_key: next(mac_len),
        client_write_key: next(key_len),
        server_write_key: next(key_len),
        client_write_iv: next(iv_len),
        server_write_iv: next(iv_len),
    })
}

/// verify_data = PRF(master, "client finished", hash(transcript))[..12]
pub fn verify_data_client(
    master_secret: &[u8],
    transcript: &[u8],
    hash: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    let digest = hash_transcript(transcript, hash)?;
    prf(master_secret, "client finished", &digest, VERIFY_DATA_LEN, hash)
}

/// Like [`verify_data_client`] with the "server finished" label.
pub fn verify_data_server(
    master_secret: &[u8],
    transcript: &[u8],
    hash: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    let digest = hash_transcript(transcript, hash)?;
    prf(master_secret, "server finished", &digest, VERIFY_DATA_LEN, hash)
}

/// Exported keying material (RFC 5705). `context` support is not offered;
/// the seed is always client_random + server_random.
pub fn export_keying_material(
    master_secret: &[u8],
    label: &str,
    client_random: &[u8],
    server_random: &[u8],
    length: usize,
    hash: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    if RESERVED_LABELS.contains(&label) {
        return Err(Error::CryptoError(format!(
            "reserved keying material label: {}",
            label
        )));
    }
    let mut seed = Vec::with_capacity(client_random.len() + server_random.len());
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(master_secret, label, &seed, length, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_random() -> Vec<u8> {
        (0x00..=0x1f).collect()
    }

    fn server_random() -> Vec<u8> {
        (0x70..=0x8f).collect()
    }

    const PMS: &[u8] = &[
        0xdf, 0x4a, 0x29, 0x1b, 0xaa, 0x1e, 0xb7, 0xcf, 0xa6, 0x93, 0x4b, 0x29, 0xb4, 0x74, 0xba,
        0xad, 0x26, 0x97, 0xe2, 0x9f, 0x1f, 0x92, 0x0d, 0xcc, 0x77, 0xc8, 0xa0, 0xa0, 0x88, 0x44,
        0x76, 0x24,
    ];

    const MASTER: &[u8] = &[
        0x91, 0x6a, 0xbf, 0x9d, 0xa5, 0x59, 0x73, 0xe1, 0x36, 0x14, 0xae, 0x0a, 0x3f, 0x5d, 0x3f,
        0x37, 0xb0, 0x23, 0xba, 0x12, 0x9a, 0xee, 0x02, 0xcc, 0x91, 0x34, 0x33, 0x81, 0x27, 0xcd,
        0x70, 0x49, 0x78, 0x1c, 0x8e, 0x19, 0xfc, 0x1e, 0xb2, 0xa7, 0x38, 0x7a, 0xc0, 0x6a, 0xe2,
        0x37, 0x34, 0x4c,
    ];

    #[test]
    fn master_secret_vector() {
        let ms = master_secret(
            PMS,
            &client_random(),
            &server_random(),
            HashAlgorithm::Sha256,
        )
        .unwrap();
        assert_eq!(ms, MASTER);
    }

    #[test]
    fn key_expansion_vector() {
        let keys = encryption_keys(
            MASTER,
            &client_random(),
            &server_random(),
            0,
            16,
            4,
            HashAlgorithm::Sha256,
        )
        .unwrap();

        assert!(keys.client_mac_key.is_empty());
        assert!(keys.server_mac_key.is_empty());
        assert_eq!(
            keys.client_write_key,
            [
                0x1b, 0x7d, 0x11, 0x7c, 0x7d, 0x5f, 0x69, 0x0b, 0xc2, 0x63, 0xca, 0xe8, 0xef,
                0x60, 0xaf, 0x0f
            ]
        );
        assert_eq!(
            keys.server_write_key,
            [
                0x18, 0x78, 0xac, 0xc2, 0x2a, 0xd8, 0xbd, 0xd8, 0xc6, 0x01, 0xa6, 0x17, 0x12,
                0x6f, 0x63, 0x54
            ]
        );
        assert_eq!(keys.client_write_iv, [0x0e, 0xb2, 0x09, 0x06]);
        assert_eq!(keys.server_write_iv, [0xf7, 0x81, 0xfa, 0xd2]);
    }

    #[test]
    fn verify_data_vector() {
        // Transcript from the published Ulfheim handshake:
        // ClientHello .. ClientKeyExchange.
        let transcript: Vec<u8> = [
            ulfheim::CLIENT_HELLO,
            ulfheim::SERVER_HELLO,
            ulfheim::SERVER_CERTIFICATE,
            ulfheim::SERVER_KEY_EXCHANGE,
            ulfheim::SERVER_HELLO_DONE,
            ulfheim::CLIENT_KEY_EXCHANGE,
        ]
        .concat();

        let vd = verify_data_client(MASTER, &transcript, HashAlgorithm::Sha256).unwrap();
        assert_eq!(
            vd,
            [0xcf, 0x91, 0x96, 0x26, 0xf1, 0x36, 0x0c, 0x53, 0x6a, 0xaa, 0xd7, 0x3a]
        );
    }

    #[test]
    fn psk_pms_layout() {
        let pms = psk_pre_master_secret(&[0xAA, 0xBB, 0xCC]);
        assert_eq!(pms, [0, 3, 0, 0, 0, 0, 3, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn exporter_rejects_reserved_labels() {
        for label in RESERVED_LABELS {
            assert!(export_keying_material(
                MASTER,
                label,
                &client_random(),
                &server_random(),
                32,
                HashAlgorithm::Sha256,
            )
            .is_err());
        }
        assert!(export_keying_material(
            MASTER,
            "EXTRACTOR-dtls_srtp",
            &client_random(),
            &server_random(),
            60,
            HashAlgorithm::Sha256,
        )
        .is_ok());
    }

    #[test]
    fn prf_sha384_produces_requested_length() {
        let out = prf(MASTER, "test label", b"seed", 100, HashAlgorithm::Sha384).unwrap();
        assert_eq!(out.len(), 100);
    }

    // The published Ulfheim TLS 1.2 handshake messages feeding the
    // verify_data vector.
    mod ulfheim {
        pub const CLIENT_HELLO: &[u8] = &[
            0x01, 0x00, 0x00, 0xa1, 0x03, 0x03, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
            0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15,
            0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f, 0x00, 0x00, 0x20, 0xcc,
            0xa8, 0xcc, 0xa9, 0xc0, 0x2f, 0xc0, 0x30, 0xc0, 0x2b, 0xc0, 0x2c, 0xc0, 0x13, 0xc0,
            0x09, 0xc0, 0x14, 0xc0, 0x0a, 0x00, 0x9c, 0x00, 0x9d, 0x00, 0x2f, 0x00, 0x35, 0xc0,
            0x12, 0x00, 0x0a, 0x01, 0x00, 0x00, 0x58, 0x00, 0x00, 0x00, 0x18, 0x00, 0x16, 0x00,
            0x00, 0x13, 0x65, 0x78, 0x61, 0x6d, 0x70, 0x6c, 0x65, 0x2e, 0x75, 0x6c, 0x66, 0x68,
            0x65, 0x69, 0x6d, 0x2e, 0x6e, 0x65, 0x74, 0x00, 0x05, 0x00, 0x05, 0x01, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x0a, 0x00, 0x0a, 0x00, 0x08, 0x00, 0x1d, 0x00, 0x17, 0x00, 0x18,
            0x00, 0x19, 0x00, 0x0b, 0x00, 0x02, 0x01, 0x00, 0x00, 0x0d, 0x00, 0x12, 0x00, 0x10,
            0x04, 0x01, 0x04, 0x03, 0x05, 0x01, 0x05, 0x03, 0x06, 0x01, 0x06, 0x03, 0x02, 0x01,
            0x02, 0x03, 0xff, 0x01, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00, 0x00,
        ];

        pub const SERVER_HELLO: &[u8] = &[
            0x02, 0x00, 0x00, 0x2d, 0x03, 0x03, 0x70, 0x71, 0x72, 0x73, 0x74, 0x75, 0x76, 0x77,
            0x78, 0x79, 0x7a, 0x7b, 0x7c, 0x7d, 0x7e, 0x7f, 0x80, 0x81, 0x82, 0x83, 0x84, 0x85,
            0x86, 0x87, 0x88, 0x89, 0x8a, 0x8b, 0x8c, 0x8d, 0x8e, 0x8f, 0x00, 0xc0, 0x13, 0x00,
            0x00, 0x05, 0xff, 0x01, 0x00, 0x01, 0x00,
        ];

        pub const SERVER_CERTIFICATE: &[u8] = &[
            0x0b, 0x00, 0x03, 0x2b, 0x00, 0x03, 0x28, 0x00, 0x03, 0x25, 0x30, 0x82, 0x03, 0x21,
            0x30, 0x82, 0x02, 0x09, 0xa0, 0x03, 0x02, 0x01, 0x02, 0x02, 0x08, 0x15, 0x5a, 0x92,
            0xad, 0xc2, 0x04, 0x8f, 0x90, 0x30, 0x0d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7,
            0x0d, 0x01, 0x01, 0x0b, 0x05, 0x00, 0x30, 0x22, 0x31, 0x0b, 0x30, 0x09, 0x06, 0x03,
            0x55, 0x04, 0x06, 0x13, 0x02, 0x55, 0x53, 0x31, 0x13, 0x30, 0x11, 0x06, 0x03, 0x55,
            0x04, 0x0a, 0x13, 0x0a, 0x45, 0x78, 0x61, 0x6d, 0x70, 0x6c, 0x65, 0x20, 0x43, 0x41,
            0x30, 0x1e, 0x17, 0x0d, 0x31, 0x38, 0x31, 0x30, 0x30, 0x35, 0x30, 0x31, 0x33, 0x38,
            0x31, 0x37, 0x5a, 0x17, 0x0d, 0x31, 0x39, 0x31, 0x30, 0x30, 0x35, 0x30, 0x31, 0x33,
            0x38, 0x31, 0x37, 0x5a, 0x30, 0x2b, 0x31, 0x0b, 0x30, 0x09, 0x06, 0x03, 0x55, 0x04,
            0x06, 0x13, 0x02, 0x55, 0x53, 0x31, 0x1c, 0x30, 0x1a, 0x06, 0x03, 0x55, 0x04, 0x03,
            0x13, 0x13, 0x65, 0x78, 0x61, 0x6d, 0x70, 0x6c, 0x65, 0x2e, 0x75, 0x6c, 0x66, 0x68,
            0x65, 0x69, 0x6d, 0x2e, 0x6e, 0x65, 0x74, 0x30, 0x82, 0x01, 0x22, 0x30, 0x0d, 0x06,
            0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01, 0x05, 0x00, 0x03, 0x82,
            0x01, 0x0f, 0x00, 0x30, 0x82, 0x01, 0x0a, 0x02, 0x82, 0x01, 0x01, 0x00, 0xc4, 0x80,
            0x36, 0x06, 0xba, 0xe7, 0x47, 0x6b, 0x08, 0x94, 0x04, 0xec, 0xa7, 0xb6, 0x91, 0x04,
            0x3f, 0xf7, 0x92, 0xbc, 0x19, 0xee, 0xfb, 0x7d, 0x74, 0xd7, 0xa8, 0x0d, 0x00, 0x1e,
            0x7b, 0x4b, 0x3a, 0x4a, 0xe6, 0x0f, 0xe8, 0xc0, 0x71, 0xfc, 0x73, 0xe7, 0x02, 0x4c,
            0x0d, 0xbc, 0xf4, 0xbd, 0xd1, 0x1d, 0x39, 0x6b, 0xba, 0x70, 0x46, 0x4a, 0x13, 0xe9,
            0x4a, 0xf8, 0x3d, 0xf3, 0xe1, 0x09, 0x59, 0x54, 0x7b, 0xc9, 0x55, 0xfb, 0x41, 0x2d,
            0xa3, 0x76, 0x52, 0x11, 0xe1, 0xf3, 0xdc, 0x77, 0x6c, 0xaa, 0x53, 0x37, 0x6e, 0xca,
            0x3a, 0xec, 0xbe, 0xc3, 0xaa, 0xb7, 0x3b, 0x31, 0xd5, 0x6c, 0xb6, 0x52, 0x9c, 0x80,
            0x98, 0xbc, 0xc9, 0xe0, 0x28, 0x18, 0xe2, 0x0b, 0xf7, 0xf8, 0xa0, 0x3a, 0xfd, 0x17,
            0x04, 0x50, 0x9e, 0xce, 0x79, 0xbd, 0x9f, 0x39, 0xf1, 0xea, 0x69, 0xec, 0x47, 0x97,
            0x2e, 0x83, 0x0f, 0xb5, 0xca, 0x95, 0xde, 0x95, 0xa1, 0xe6, 0x04, 0x22, 0xd5, 0xee,
            0xbe, 0x52, 0x79, 0x54, 0xa1, 0xe7, 0xbf, 0x8a, 0x86, 0xf6, 0x46, 0x6d, 0x0d, 0x9f,
            0x16, 0x95, 0x1a, 0x4c, 0xf7, 0xa0, 0x46, 0x92, 0x59, 0x5c, 0x13, 0x52, 0xf2, 0x54,
            0x9e, 0x5a, 0xfb, 0x4e, 0xbf, 0xd7, 0x7a, 0x37, 0x95, 0x01, 0x44, 0xe4, 0xc0, 0x26,
            0x87, 0x4c, 0x65, 0x3e, 0x40, 0x7d, 0x7d, 0x23, 0x07, 0x44, 0x01, 0xf4, 0x84, 0xff,
            0xd0, 0x8f, 0x7a, 0x1f, 0xa0, 0x52, 0x10, 0xd1, 0xf4, 0xf0, 0xd5, 0xce, 0x79, 0x70,
            0x29, 0x32, 0xe2, 0xca, 0xbe, 0x70, 0x1f, 0xdf, 0xad, 0x6b, 0x4b, 0xb7, 0x11, 0x01,
            0xf4, 0x4b, 0xad, 0x66, 0x6a, 0x11, 0x13, 0x0f, 0xe2, 0xee, 0x82, 0x9e, 0x4d, 0x02,
            0x9d, 0xc9, 0x1c, 0xdd, 0x67, 0x16, 0xdb, 0xb9, 0x06, 0x18, 0x86, 0xed, 0xc1, 0xba,
            0x94, 0x21, 0x02, 0x03, 0x01, 0x00, 0x01, 0xa3, 0x52, 0x30, 0x50, 0x30, 0x0e, 0x06,
            0x03, 0x55, 0x1d, 0x0f, 0x01, 0x01, 0xff, 0x04, 0x04, 0x03, 0x02, 0x05, 0xa0, 0x30,
            0x1d, 0x06, 0x03, 0x55, 0x1d, 0x25, 0x04, 0x16, 0x30, 0x14, 0x06, 0x08, 0x2b, 0x06,
            0x01, 0x05, 0x05, 0x07, 0x03, 0x02, 0x06, 0x08, 0x2b, 0x06, 0x01, 0x05, 0x05, 0x07,
            0x03, 0x01, 0x30, 0x1f, 0x06, 0x03, 0x55, 0x1d, 0x23, 0x04, 0x18, 0x30, 0x16, 0x80,
            0x14, 0x89, 0x4f, 0xde, 0x5b, 0xcc, 0x69, 0xe2, 0x52, 0xcf, 0x3e, 0xa3, 0x00, 0xdf,
            0xb1, 0x97, 0xb8, 0x1d, 0xe1, 0xc1, 0x46, 0x30, 0x0d, 0x06, 0x09, 0x2a, 0x86, 0x48,
            0x86, 0xf7, 0x0d, 0x01, 0x01, 0x0b, 0x05, 0x00, 0x03, 0x82, 0x01, 0x01, 0x00, 0x59,
            0x16, 0x45, 0xa6, 0x9a, 0x2e, 0x37, 0x79, 0xe4, 0xf6, 0xdd, 0x27, 0x1a, 0xba, 0x1c,
            0x0b, 0xfd, 0x6c, 0xd7, 0x55, 0x99, 0xb5, 0xe7, 0xc3, 0x6e, 0x53, 0x3e, 0xff, 0x36,
            0x59, 0x08, 0x43, 0x24, 0xc9, 0xe7, 0xa5, 0x04, 0x07, 0x9d, 0x39, 0xe0, 0xd4, 0x29,
            0x87, 0xff, 0xe3, 0xeb, 0xdd, 0x09, 0xc1, 0xcf, 0x1d, 0x91, 0x44, 0x55, 0x87, 0x0b,
            0x57, 0x1d, 0xd1, 0x9b, 0xdf, 0x1d, 0x24, 0xf8, 0xbb, 0x9a, 0x11, 0xfe, 0x80, 0xfd,
            0x59, 0x2b, 0xa0, 0x39, 0x8c, 0xde, 0x11, 0xe2, 0x65, 0x1e, 0x61, 0x8c, 0xe5, 0x98,
            0xfa, 0x96, 0xe5, 0x37, 0x2e, 0xef, 0x3d, 0x24, 0x8a, 0xfd, 0xe1, 0x74, 0x63, 0xeb,
            0xbf, 0xab, 0xb8, 0xe4, 0xd1, 0xab, 0x50, 0x2a, 0x54, 0xec, 0x00, 0x64, 0xe9, 0x2f,
            0x78, 0x19, 0x66, 0x0d, 0x3f, 0x27, 0xcf, 0x20, 0x9e, 0x66, 0x7f, 0xce, 0x5a, 0xe2,
            0xe4, 0xac, 0x99, 0xc7, 0xc9, 0x38, 0x18, 0xf8, 0xb2, 0x51, 0x07, 0x22, 0xdf, 0xed,
            0x97, 0xf3, 0x2e, 0x3e, 0x93, 0x49, 0xd4, 0xc6, 0x6c, 0x9e, 0xa6, 0x39, 0x6d, 0x74,
            0x44, 0x62, 0xa0, 0x6b, 0x42, 0xc6, 0xd5, 0xba, 0x68, 0x8e, 0xac, 0x3a, 0x01, 0x7b,
            0xdd, 0xfc, 0x8e, 0x2c, 0xfc, 0xad, 0x27, 0xcb, 0x69, 0xd3, 0xcc, 0xdc, 0xa2, 0x80,
            0x41, 0x44, 0x65, 0xd3, 0xae, 0x34, 0x8c, 0xe0, 0xf3, 0x4a, 0xb2, 0xfb, 0x9c, 0x61,
            0x83, 0x71, 0x31, 0x2b, 0x19, 0x10, 0x41, 0x64, 0x1c, 0x23, 0x7f, 0x11, 0xa5, 0xd6,
            0x5c, 0x84, 0x4f, 0x04, 0x04, 0x84, 0x99, 0x38, 0x71, 0x2b, 0x95, 0x9e, 0xd6, 0x85,
            0xbc, 0x5c, 0x5d, 0xd6, 0x45, 0xed, 0x19, 0x90, 0x94, 0x73, 0x40, 0x29, 0x26, 0xdc,
            0xb4, 0x0e, 0x34, 0x69, 0xa1, 0x59, 0x41, 0xe8, 0xe2, 0xcc, 0xa8, 0x4b, 0xb6, 0x08,
            0x46, 0x36, 0xa0,
        ];

        pub const SERVER_KEY_EXCHANGE: &[u8] = &[
            0x0c, 0x00, 0x01, 0x28, 0x03, 0x00, 0x1d, 0x20, 0x9f, 0xd7, 0xad, 0x6d, 0xcf, 0xf4,
            0x29, 0x8d, 0xd3, 0xf9, 0x6d, 0x5b, 0x1b, 0x2a, 0xf9, 0x10, 0xa0, 0x53, 0x5b, 0x14,
            0x88, 0xd7, 0xf8, 0xfa, 0xbb, 0x34, 0x9a, 0x98, 0x28, 0x80, 0xb6, 0x15, 0x04, 0x01,
            0x01, 0x00, 0x04, 0x02, 0xb6, 0x61, 0xf7, 0xc1, 0x91, 0xee, 0x59, 0xbe, 0x45, 0x37,
            0x66, 0x39, 0xbd, 0xc3, 0xd4, 0xbb, 0x81, 0xe1, 0x15, 0xca, 0x73, 0xc8, 0x34, 0x8b,
            0x52, 0x5b, 0x0d, 0x23, 0x38, 0xaa, 0x14, 0x46, 0x67, 0xed, 0x94, 0x31, 0x02, 0x14,
            0x12, 0xcd, 0x9b, 0x84, 0x4c, 0xba, 0x29, 0x93, 0x4a, 0xaa, 0xcc, 0xe8, 0x73, 0x41,
            0x4e, 0xc1, 0x1c, 0xb0, 0x2e, 0x27, 0x2d, 0x0a, 0xd8, 0x1f, 0x76, 0x7d, 0x33, 0x07,
            0x67, 0x21, 0xf1, 0x3b, 0xf3, 0x60, 0x20, 0xcf, 0x0b, 0x1f, 0xd0, 0xec, 0xb0, 0x78,
            0xde, 0x11, 0x28, 0xbe, 0xba, 0x09, 0x49, 0xeb, 0xec, 0xe1, 0xa1, 0xf9, 0x6e, 0x20,
            0x9d, 0xc3, 0x6e, 0x4f, 0xff, 0xd3, 0x6b, 0x67, 0x3a, 0x7d, 0xdc, 0x15, 0x97, 0xad,
            0x44, 0x08, 0xe4, 0x85, 0xc4, 0xad, 0xb2, 0xc8, 0x73, 0x84, 0x12, 0x49, 0x37, 0x25,
            0x23, 0x80, 0x9e, 0x43, 0x12, 0xd0, 0xc7, 0xb3, 0x52, 0x2e, 0xf9, 0x83, 0xca, 0xc1,
            0xe0, 0x39, 0x35, 0xff, 0x13, 0xa8, 0xe9, 0x6b, 0xa6, 0x81, 0xa6, 0x2e, 0x40, 0xd3,
            0xe7, 0x0a, 0x7f, 0xf3, 0x58, 0x66, 0xd3, 0xd9, 0x99, 0x3f, 0x9e, 0x26, 0xa6, 0x34,
            0xc8, 0x1b, 0x4e, 0x71, 0x38, 0x0f, 0xcd, 0xd6, 0xf4, 0xe8, 0x35, 0xf7, 0x5a, 0x64,
            0x09, 0xc7, 0xdc, 0x2c, 0x07, 0x41, 0x0e, 0x6f, 0x87, 0x85, 0x8c, 0x7b, 0x94, 0xc0,
            0x1c, 0x2e, 0x32, 0xf2, 0x91, 0x76, 0x9e, 0xac, 0xca, 0x71, 0x64, 0x3b, 0x8b, 0x98,
            0xa9, 0x63, 0xdf, 0x0a, 0x32, 0x9b, 0xea, 0x4e, 0xd6, 0x39, 0x7e, 0x8c, 0xd0, 0x1a,
            0x11, 0x0a, 0xb3, 0x61, 0xac, 0x5b, 0xad, 0x1c, 0xcd, 0x84, 0x0a, 0x6c, 0x8a, 0x6e,
            0xaa, 0x00, 0x1a, 0x9d, 0x7d, 0x87, 0xdc, 0x33, 0x18, 0x64, 0x35, 0x71, 0x22, 0x6c,
            0x4d, 0xd2, 0xc2, 0xac, 0x41, 0xfb,
        ];

        pub const SERVER_HELLO_DONE: &[u8] = &[0x0e, 0x00, 0x00, 0x00];

        pub const CLIENT_KEY_EXCHANGE: &[u8] = &[
            0x10, 0x00, 0x00, 0x21, 0x20, 0x35, 0x80, 0x72, 0xd6, 0x36, 0x58, 0x80, 0xd1, 0xae,
            0xea, 0x32, 0x9a, 0xdf, 0x91, 0x21, 0x38, 0x38, 0x51, 0xed, 0x21, 0xa2, 0x8e, 0x3b,
            0x75, 0xe9, 0x65, 0xd0, 0xd2, 0xcd, 0x16, 0x62, 0x54,
        ];
    }
}
