//! ECDSA signing for ServerKeyExchange and CertificateVerify, plus
//! verification against the peer's leaf certificate.
//!
//! Only the SubjectPublicKeyInfo is ever pulled out of the certificate;
//! chain and policy validation stay with the pluggable verifier.

use p256::ecdsa::VerifyingKey as P256VerifyingKey;
use p256::ecdsa::{Signature as P256Signature, SigningKey as P256SigningKey};
use p384::ecdsa::VerifyingKey as P384VerifyingKey;
use p384::ecdsa::{Signature as P384Signature, SigningKey as P384SigningKey};
use pkcs8::DecodePrivateKey;
use signature::{Signer, Verifier};
use spki::ObjectIdentifier;
use x509_cert::der::referenced::OwnedToRef;
use x509_cert::der::Decode;
use x509_cert::Certificate as X509Certificate;

use crate::message::{CipherSuiteId, HashAlgorithm, SignatureScheme};
use crate::Error;

const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// A parsed signing key. Only ECDSA keys are supported, matching the
/// ECDSA-only suite set.
pub enum ParsedKey {
    P256(Box<P256SigningKey>),
    P384(Box<P384SigningKey>),
}

impl ParsedKey {
    /// Parse a private key from PKCS#8 DER, or PEM wrapping it.
    pub fn try_parse(key_data: &[u8]) -> Result<ParsedKey, Error> {
        if let Ok(key) = P256SigningKey::from_pkcs8_der(key_data) {
            return Ok(ParsedKey::P256(Box::new(key)));
        }
        if let Ok(key) = P384SigningKey::from_pkcs8_der(key_data) {
            return Ok(ParsedKey::P384(Box::new(key)));
        }

        if let Ok(pem_str) = std::str::from_utf8(key_data) {
            if pem_str.contains("-----BEGIN") {
                if let Ok((_label, doc)) = pkcs8::Document::from_pem(pem_str) {
                    return Self::try_parse(doc.as_bytes());
                }
            }
        }

        Err(Error::CertificateError(
            "failed to parse private key (PKCS#8 ECDSA expected)".into(),
        ))
    }

    /// The signature scheme this key produces.
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            ParsedKey::P256(_) => SignatureScheme::ECDSA_SECP256R1_SHA256,
            ParsedKey::P384(_) => SignatureScheme::ECDSA_SECP384R1_SHA384,
        }
    }

    /// Whether the key can authenticate the given cipher suite.
    pub fn is_compatible(&self, suite: CipherSuiteId) -> bool {
        matches!(
            suite,
            CipherSuiteId::ECDHE_ECDSA_AES128_GCM_SHA256
                | CipherSuiteId::ECDHE_ECDSA_AES256_GCM_SHA384
        )
    }

    /// ECDSA-sign `data`, DER-encoded. The curve's hash is applied by the
    /// signer (SHA-256 for P-256, SHA-384 for P-384).
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        match self {
            ParsedKey::P256(key) => {
                let signature: P256Signature = key.sign(data);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            ParsedKey::P384(key) => {
                let signature: P384Signature = key.sign(data);
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }
}

enum LeafPublicKey {
    P256(P256VerifyingKey),
    P384(P384VerifyingKey),
}

fn leaf_public_key(cert_der: &[u8]) -> Result<LeafPublicKey, Error> {
    let cert = X509Certificate::from_der(cert_der)
        .map_err(|e| Error::CertificateError(format!("leaf parse failed: {}", e)))?;
    let spki = cert.tbs_certificate.subject_public_key_info.owned_to_ref();

    if spki.algorithm.oid != OID_EC_PUBLIC_KEY {
        return Err(Error::CertificateError(
            "leaf public key is not EC".into(),
        ));
    }

    let curve: ObjectIdentifier = spki
        .algorithm
        .parameters_oid()
        .map_err(|_| Error::CertificateError("missing EC curve parameters".into()))?;

    let key_bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| Error::CertificateError("unaligned public key bits".into()))?;

    if curve == OID_SECP256R1 {
        let key = P256VerifyingKey::from_sec1_bytes(key_bytes)
            .map_err(|_| Error::CertificateError("invalid P-256 public key".into()))?;
        Ok(LeafPublicKey::P256(key))
    } else if curve == OID_SECP384R1 {
        let key = P384VerifyingKey::from_sec1_bytes(key_bytes)
            .map_err(|_| Error::CertificateError("invalid P-384 public key".into()))?;
        Ok(LeafPublicKey::P384(key))
    } else {
        Err(Error::CertificateError(format!(
            "unsupported EC curve {}",
            curve
        )))
    }
}

/// Verify a TLS 1.2 digitally-signed blob against the peer's leaf
/// certificate.
pub fn verify_signature(
    cert_der: &[u8],
    scheme: SignatureScheme,
    message: &[u8],
    signature: &[u8],
) -> Result<(), Error> {
    match (leaf_public_key(cert_der)?, scheme.hash) {
        (LeafPublicKey::P256(key), HashAlgorithm::Sha256) => {
            let sig = P256Signature::from_der(signature)
                .map_err(|_| Error::CryptoError("malformed ECDSA signature".into()))?;
            key.verify(message, &sig)
                .map_err(|_| Error::CryptoError("signature verification failed".into()))
        }
        (LeafPublicKey::P384(key), HashAlgorithm::Sha384) => {
            let sig = P384Signature::from_der(signature)
                .map_err(|_| Error::CryptoError("malformed ECDSA signature".into()))?;
            key.verify(message, &sig)
                .map_err(|_| Error::CryptoError("signature verification failed".into()))
        }
        (_, hash) => Err(Error::CryptoError(format!(
            "hash {:?} does not match leaf key curve",
            hash
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::generate_self_signed_certificate;

    #[test]
    fn sign_and_verify_roundtrip() {
        let cert = generate_self_signed_certificate().unwrap();
        let key = ParsedKey::try_parse(&cert.private_key).unwrap();
        assert_eq!(key.scheme(), SignatureScheme::ECDSA_SECP256R1_SHA256);

        let message = b"client random server random params";
        let sig = key.sign(message).unwrap();

        verify_signature(&cert.certificate, key.scheme(), message, &sig).unwrap();

        // Flipping a message byte must fail verification.
        let mut tampered = message.to_vec();
        tampered[0] ^= 1;
        assert!(verify_signature(&cert.certificate, key.scheme(), &tampered, &sig).is_err());
    }

    #[test]
    fn suite_compatibility() {
        let cert = generate_self_signed_certificate().unwrap();
        let key = ParsedKey::try_parse(&cert.private_key).unwrap();
        assert!(key.is_compatible(CipherSuiteId::ECDHE_ECDSA_AES128_GCM_SHA256));
        assert!(!key.is_compatible(CipherSuiteId::PSK_AES128_GCM_SHA256));
    }
}
