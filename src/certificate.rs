//! Certificate generation helpers.
//!
//! The endpoint treats certificates as opaque DER; this module only exists
//! so callers (and tests) can mint a self-signed ECDSA identity without
//! pulling in their own PKI tooling.

use rcgen::{
    Certificate as RcgenCertificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256,
};
use sha2::{Digest, Sha256};

use crate::Error;

/// Certificate and private key pair, both DER.
#[derive(Clone)]
pub struct DtlsCertificate {
    /// Leaf certificate in DER format.
    pub certificate: Vec<u8>,
    /// PKCS#8 private key in DER format.
    pub private_key: Vec<u8>,
}

impl DtlsCertificate {
    /// SHA-256 fingerprint of the certificate DER.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(&self.certificate));
        out
    }
}

/// Generate a self-signed ECDSA P-256 certificate usable for either role.
pub fn generate_self_signed_certificate() -> Result<DtlsCertificate, Error> {
    let key_pair = KeyPair::generate(&PKCS_ECDSA_P256_SHA256)
        .map_err(|e| Error::CertificateError(e.to_string()))?;

    let mut params = CertificateParams::new(vec!["dtls12 endpoint".to_string()]);

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, "dtls12 endpoint".to_string());
    params.distinguished_name = distinguished_name;
    params.is_ca = IsCa::NoCa;
    params.key_pair = Some(key_pair);

    let not_before = time::OffsetDateTime::now_utc();
    params.not_before = not_before;
    params.not_after = not_before + time::Duration::days(365);

    let cert = RcgenCertificate::from_params(params)
        .map_err(|e| Error::CertificateError(e.to_string()))?;

    let certificate = cert
        .serialize_der()
        .map_err(|e| Error::CertificateError(e.to_string()))?;
    let private_key = cert.serialize_private_key_der();

    Ok(DtlsCertificate {
        certificate,
        private_key,
    })
}
