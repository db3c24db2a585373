//! Cryptography for the DTLS 1.2 connection core: the TLS 1.2 key
//! schedule, AES-GCM record protection, ECDHE, ECDSA signing, and the
//! HelloVerifyRequest cookie MAC.

pub mod aead;
pub mod cookie;
pub mod kx;
pub mod prf;
pub mod signature;

pub use aead::{Gcm, AEAD_OVERHEAD, EXPLICIT_NONCE_LEN, TAG_LEN};
pub use cookie::{CookieGenerator, COOKIE_LEN};
pub use kx::{pre_master_secret, EcdhKeypair};
pub use signature::{verify_signature, ParsedKey};

use crate::message::{CipherSuiteId, HashAlgorithm, RecordHeader};
use crate::Error;

/// Key exchange families this endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlgorithm {
    /// Ephemeral ECDH, authenticated by an ECDSA certificate.
    Ecdhe,
    /// Pre-shared key, no certificates on either side.
    Psk,
}

/// Static properties of a cipher suite.
#[derive(Debug, Clone, Copy)]
pub struct SuiteProfile {
    pub id: CipherSuiteId,
    pub hash: HashAlgorithm,
    pub key_exchange: KeyExchangeAlgorithm,
    pub key_len: usize,
    pub iv_len: usize,
}

/// Look up the profile for a suite identifier; `None` for suites this
/// endpoint does not implement.
pub fn profile(id: CipherSuiteId) -> Option<SuiteProfile> {
    match id {
        CipherSuiteId::ECDHE_ECDSA_AES128_GCM_SHA256 => Some(SuiteProfile {
            id,
            hash: HashAlgorithm::Sha256,
            key_exchange: KeyExchangeAlgorithm::Ecdhe,
            key_len: 16,
            iv_len: 4,
        }),
        CipherSuiteId::ECDHE_ECDSA_AES256_GCM_SHA384 => Some(SuiteProfile {
            id,
            hash: HashAlgorithm::Sha384,
            key_exchange: KeyExchangeAlgorithm::Ecdhe,
            key_len: 32,
            iv_len: 4,
        }),
        CipherSuiteId::PSK_AES128_GCM_SHA256 => Some(SuiteProfile {
            id,
            hash: HashAlgorithm::Sha256,
            key_exchange: KeyExchangeAlgorithm::Psk,
            key_len: 16,
            iv_len: 4,
        }),
        _ => None,
    }
}

/// The AEAD ECDHE suites offered by default.
pub fn default_cipher_suites() -> Vec<CipherSuiteId> {
    vec![
        CipherSuiteId::ECDHE_ECDSA_AES128_GCM_SHA256,
        CipherSuiteId::ECDHE_ECDSA_AES256_GCM_SHA384,
    ]
}

/// A negotiated cipher suite: its static profile plus, once the key block
/// has been derived, the installed record protection.
pub struct CipherSuite {
    profile: SuiteProfile,
    gcm: Option<Gcm>,
}

impl CipherSuite {
    /// Instantiate an implemented suite; `None` if the id is unknown.
    pub fn new(id: CipherSuiteId) -> Option<CipherSuite> {
        profile(id).map(|profile| CipherSuite { profile, gcm: None })
    }

    pub fn id(&self) -> CipherSuiteId {
        self.profile.id
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.profile.hash
    }

    pub fn key_exchange(&self) -> KeyExchangeAlgorithm {
        self.profile.key_exchange
    }

    /// ECDSA suites need a compatible certificate on the authenticating
    /// side.
    pub fn requires_certificate(&self) -> bool {
        self.profile.key_exchange == KeyExchangeAlgorithm::Ecdhe
    }

    /// Keys installed and records can be protected.
    pub fn is_initialized(&self) -> bool {
        self.gcm.is_some()
    }

    /// Derive the key block from the master secret and install the GCM
    /// contexts for this endpoint's role.
    pub fn init(
        &mut self,
        master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
        is_client: bool,
    ) -> Result<(), Error> {
        let keys = prf::encryption_keys(
            master_secret,
            client_random,
            server_random,
            0, // AEAD: no MAC keys
            self.profile.key_len,
            self.profile.iv_len,
            self.profile.hash,
        )?;

        let gcm = if is_client {
            Gcm::new(
                &keys.client_write_key,
                &keys.client_write_iv,
                &keys.server_write_key,
                &keys.server_write_iv,
            )?
        } else {
            Gcm::new(
                &keys.server_write_key,
                &keys.server_write_iv,
                &keys.client_write_key,
                &keys.client_write_iv,
            )?
        };

        self.gcm = Some(gcm);
        Ok(())
    }

    /// Protect an outbound record. See [`Gcm::encrypt`].
    pub fn encrypt(&self, header: &mut RecordHeader, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let gcm = self
            .gcm
            .as_ref()
            .ok_or_else(|| Error::CryptoError("cipher suite not initialized".into()))?;
        gcm.encrypt(header, payload)
    }

    /// Open an inbound record body. See [`Gcm::decrypt`].
    pub fn decrypt(&self, header: &RecordHeader, body: &[u8]) -> Result<Vec<u8>, Error> {
        let gcm = self
            .gcm
            .as_ref()
            .ok_or(Error::DecryptError)?;
        gcm.decrypt(header, body)
    }
}

/// Pluggable peer-certificate verification, consuming raw DER.
///
/// The connection hands over the peer chain (leaf first) once during the
/// handshake; policy (chains, names, pinning, fingerprints) is entirely the
/// verifier's. Signature checks on handshake messages happen inside the
/// crate regardless.
pub trait CertVerifier: Send + Sync {
    /// Return an error to abort the handshake with bad_certificate.
    fn verify(&self, chain: &[Vec<u8>]) -> Result<(), Error>;
}

/// A verifier that accepts any certificate. What `insecure_skip_verify`
/// installs.
pub struct SkipVerify;

impl CertVerifier for SkipVerify {
    fn verify(&self, _chain: &[Vec<u8>]) -> Result<(), Error> {
        Ok(())
    }
}
