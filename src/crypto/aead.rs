//! AES-GCM record protection (RFC 5288 applied to DTLS per RFC 6347).
//!
//! The record body on the wire is `explicit_nonce(8) || ciphertext ||
//! tag(16)`. The 12-byte AEAD nonce is the 4-byte write IV followed by the
//! explicit nonce; outbound the explicit half is freshly random, inbound it
//! is read off the body. ChangeCipherSpec records pass through untouched.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::message::record::{aead_additional_data, aead_additional_data_cid};
use crate::message::{ContentType, RecordHeader};
use crate::Error;

/// Explicit nonce length prefixed to each AEAD record body.
pub const EXPLICIT_NONCE_LEN: usize = 8;

/// GCM tag length appended to the ciphertext.
pub const TAG_LEN: usize = 16;

/// Total AEAD overhead per record.
pub const AEAD_OVERHEAD: usize = EXPLICIT_NONCE_LEN + TAG_LEN;

enum Key {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl Key {
    fn new(key: &[u8]) -> Result<Key, Error> {
        match key.len() {
            16 => Ok(Key::Aes128(Box::new(
                Aes128Gcm::new_from_slice(key).map_err(|e| Error::CryptoError(e.to_string()))?,
            ))),
            32 => Ok(Key::Aes256(Box::new(
                Aes256Gcm::new_from_slice(key).map_err(|e| Error::CryptoError(e.to_string()))?,
            ))),
            n => Err(Error::CryptoError(format!("bad AES key length {}", n))),
        }
    }

    fn seal(&self, nonce: &[u8; 12], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
        let payload = Payload {
            msg: plaintext,
            aad,
        };
        match self {
            Key::Aes128(gcm) => gcm.encrypt(Nonce::from_slice(nonce), payload),
            Key::Aes256(gcm) => gcm.encrypt(Nonce::from_slice(nonce), payload),
        }
        .map_err(|_| Error::CryptoError("AEAD seal failed".into()))
    }

    fn open(&self, nonce: &[u8; 12], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
        let payload = Payload {
            msg: ciphertext,
            aad,
        };
        match self {
            Key::Aes128(gcm) => gcm.decrypt(Nonce::from_slice(nonce), payload),
            Key::Aes256(gcm) => gcm.decrypt(Nonce::from_slice(nonce), payload),
        }
        .map_err(|_| Error::DecryptError)
    }
}

/// Paired send/receive GCM contexts for one connection.
pub struct Gcm {
    local: Key,
    local_write_iv: [u8; 4],
    remote: Key,
    remote_write_iv: [u8; 4],
}

impl Gcm {
    pub fn new(
        local_key: &[u8],
        local_write_iv: &[u8],
        remote_key: &[u8],
        remote_write_iv: &[u8],
    ) -> Result<Gcm, Error> {
        let iv = |b: &[u8]| -> Result<[u8; 4], Error> {
            b.try_into()
                .map_err(|_| Error::CryptoError("write IV must be 4 bytes".into()))
        };
        Ok(Gcm {
            local: Key::new(local_key)?,
            local_write_iv: iv(local_write_iv)?,
            remote: Key::new(remote_key)?,
            remote_write_iv: iv(remote_write_iv)?,
        })
    }

    // The additional data depends on the record form: CID records follow
    // RFC 9146, everything else RFC 5246/6347.
    fn aad(header: &RecordHeader, payload_len: usize) -> Vec<u8> {
        if header.content_type == ContentType::Tls12Cid {
            aead_additional_data_cid(header, payload_len)
        } else {
            aead_additional_data(header, payload_len).to_vec()
        }
    }

    /// Protect `payload` under `header`. Updates `header.length` to the
    /// wire body length and returns the full record bytes (header + body).
    pub fn encrypt(&self, header: &mut RecordHeader, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let mut explicit = [0u8; EXPLICIT_NONCE_LEN];
        OsRng.fill_bytes(&mut explicit);

        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(&self.local_write_iv);
        nonce[4..].copy_from_slice(&explicit);

        // AAD carries the plaintext length (RFC 5246 Section 6.2.3.3).
        header.length = (payload.len() + AEAD_OVERHEAD) as u16;
        let aad = Self::aad(header, payload.len());

        let ciphertext = self.local.seal(&nonce, payload, &aad)?;

        let mut out = Vec::with_capacity(header.len() + header.length as usize);
        header.serialize(&mut out);
        out.extend_from_slice(&explicit);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Open the body of a protected record. `body` is the record body as
    /// received (explicit nonce first). Returns the plaintext.
    pub fn decrypt(&self, header: &RecordHeader, body: &[u8]) -> Result<Vec<u8>, Error> {
        if header.content_type == ContentType::ChangeCipherSpec {
            // ChangeCipherSpec is never encrypted.
            return Ok(body.to_vec());
        }
        if body.len() < AEAD_OVERHEAD {
            return Err(Error::DecryptError);
        }

        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(&self.remote_write_iv);
        nonce[4..].copy_from_slice(&body[..EXPLICIT_NONCE_LEN]);

        let ciphertext = &body[EXPLICIT_NONCE_LEN..];
        let aad = Self::aad(header, ciphertext.len() - TAG_LEN);

        self.remote.open(&nonce, ciphertext, &aad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ProtocolVersion;

    fn pair() -> (Gcm, Gcm) {
        let client_key = [1u8; 16];
        let server_key = [2u8; 16];
        let client_iv = [3u8; 4];
        let server_iv = [4u8; 4];

        let client = Gcm::new(&client_key, &client_iv, &server_key, &server_iv).unwrap();
        let server = Gcm::new(&server_key, &server_iv, &client_key, &client_iv).unwrap();
        (client, server)
    }

    fn header(content_type: ContentType) -> RecordHeader {
        RecordHeader {
            content_type,
            version: ProtocolVersion::DTLS1_2,
            epoch: 1,
            sequence_number: 7,
            connection_id: Vec::new(),
            length: 0,
        }
    }

    #[test]
    fn decrypt_is_inverse_of_encrypt() {
        let (client, server) = pair();
        let payload = b"hello over dtls";

        let mut h = header(ContentType::ApplicationData);
        let raw = client.encrypt(&mut h, payload).unwrap();
        assert_eq!(h.length as usize, payload.len() + AEAD_OVERHEAD);

        let body = &raw[h.len()..];
        let plain = server.decrypt(&h, body).unwrap();
        assert_eq!(plain, payload);
    }

    #[test]
    fn cid_record_roundtrip() {
        let (client, server) = pair();
        let payload = b"inner plaintext bytes";

        let mut h = header(ContentType::Tls12Cid);
        h.connection_id = vec![0xC1, 0xD2];
        let raw = client.encrypt(&mut h, payload).unwrap();

        let body = &raw[h.len()..];
        let plain = server.decrypt(&h, body).unwrap();
        assert_eq!(plain, payload);
    }

    #[test]
    fn tampered_record_fails_open() {
        let (client, server) = pair();
        let mut h = header(ContentType::ApplicationData);
        let mut raw = client.encrypt(&mut h, b"payload").unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;

        let body = &raw[h.len()..];
        assert!(matches!(server.decrypt(&h, body), Err(Error::DecryptError)));
    }

    #[test]
    fn wrong_sequence_fails_open() {
        // The sequence number is authenticated via the additional data.
        let (client, server) = pair();
        let mut h = header(ContentType::ApplicationData);
        let raw = client.encrypt(&mut h, b"payload").unwrap();

        let mut wrong = h.clone();
        wrong.sequence_number += 1;
        let body = &raw[h.len()..];
        assert!(server.decrypt(&wrong, body).is_err());
    }

    #[test]
    fn change_cipher_spec_passes_through() {
        let (_, server) = pair();
        let h = header(ContentType::ChangeCipherSpec);
        let body = [0x01];
        assert_eq!(server.decrypt(&h, &body).unwrap(), body);
    }
}
