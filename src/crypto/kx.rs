//! ECDHE key exchange over X25519, P-256 and P-384.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::message::NamedCurve;
use crate::Error;

/// An ephemeral keypair for the negotiated curve. The private scalar is
/// held as raw bytes and wiped on drop.
pub struct EcdhKeypair {
    pub curve: NamedCurve,
    private: Zeroizing<Vec<u8>>,
    pub public: Vec<u8>,
}

impl EcdhKeypair {
    /// Generate a fresh keypair on `curve`.
    pub fn generate(curve: NamedCurve) -> Result<EcdhKeypair, Error> {
        match curve {
            NamedCurve::X25519 => {
                let mut private = Zeroizing::new(vec![0u8; 32]);
                rand::RngCore::fill_bytes(&mut OsRng, &mut private);
                let mut scalar = [0u8; 32];
                scalar.copy_from_slice(&private);
                let public =
                    x25519_dalek::x25519(scalar, x25519_dalek::X25519_BASEPOINT_BYTES).to_vec();
                Ok(EcdhKeypair {
                    curve,
                    private,
                    public,
                })
            }
            NamedCurve::P256 => {
                let secret = p256::SecretKey::random(&mut OsRng);
                let public = secret.public_key().to_encoded_point(false).as_bytes().to_vec();
                Ok(EcdhKeypair {
                    curve,
                    private: Zeroizing::new(secret.to_bytes().to_vec()),
                    public,
                })
            }
            NamedCurve::P384 => {
                let secret = p384::SecretKey::random(&mut OsRng);
                let public = secret.public_key().to_encoded_point(false).as_bytes().to_vec();
                Ok(EcdhKeypair {
                    curve,
                    private: Zeroizing::new(secret.to_bytes().to_vec()),
                    public,
                })
            }
            NamedCurve::Unknown(v) => Err(Error::CryptoError(format!("unsupported curve {}", v))),
        }
    }

    /// Compute the ECDHE pre-master secret with the peer's public key.
    pub fn pre_master_secret(&self, peer_public: &[u8]) -> Result<Vec<u8>, Error> {
        pre_master_secret(peer_public, &self.private, self.curve)
    }
}

/// Raw ECDH shared secret: X25519 or NIST scalar multiplication, no hash
/// wrapping (RFC 8422 Section 5.10, RFC 7748).
pub fn pre_master_secret(
    peer_public: &[u8],
    local_private: &[u8],
    curve: NamedCurve,
) -> Result<Vec<u8>, Error> {
    match curve {
        NamedCurve::X25519 => {
            let scalar: [u8; 32] = local_private
                .try_into()
                .map_err(|_| Error::CryptoError("X25519 private key must be 32 bytes".into()))?;
            let point: [u8; 32] = peer_public
                .try_into()
                .map_err(|_| Error::CryptoError("X25519 public key must be 32 bytes".into()))?;
            Ok(x25519_dalek::x25519(scalar, point).to_vec())
        }
        NamedCurve::P256 => {
            let secret = p256::SecretKey::from_slice(local_private)
                .map_err(|_| Error::CryptoError("invalid P-256 private key".into()))?;
            let public = p256::PublicKey::from_sec1_bytes(peer_public)
                .map_err(|_| Error::CryptoError("invalid P-256 peer public key".into()))?;
            let shared =
                p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
            Ok(shared.raw_secret_bytes().to_vec())
        }
        NamedCurve::P384 => {
            let secret = p384::SecretKey::from_slice(local_private)
                .map_err(|_| Error::CryptoError("invalid P-384 private key".into()))?;
            let public = p384::PublicKey::from_sec1_bytes(peer_public)
                .map_err(|_| Error::CryptoError("invalid P-384 peer public key".into()))?;
            let shared =
                p384::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
            Ok(shared.raw_secret_bytes().to_vec())
        }
        NamedCurve::Unknown(v) => Err(Error::CryptoError(format!("unsupported curve {}", v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x25519_shared_secret_vector() {
        let private: Vec<u8> = (0x20..=0x3f).collect();
        let public: &[u8] = &[
            0x9f, 0xd7, 0xad, 0x6d, 0xcf, 0xf4, 0x29, 0x8d, 0xd3, 0xf9, 0x6d, 0x5b, 0x1b, 0x2a,
            0xf9, 0x10, 0xa0, 0x53, 0x5b, 0x14, 0x88, 0xd7, 0xf8, 0xfa, 0xbb, 0x34, 0x9a, 0x98,
            0x28, 0x80, 0xb6, 0x15,
        ];
        let expected: &[u8] = &[
            0xdf, 0x4a, 0x29, 0x1b, 0xaa, 0x1e, 0xb7, 0xcf, 0xa6, 0x93, 0x4b, 0x29, 0xb4, 0x74,
            0xba, 0xad, 0x26, 0x97, 0xe2, 0x9f, 0x1f, 0x92, 0x0d, 0xcc, 0x77, 0xc8, 0xa0, 0xa0,
            0x88, 0x44, 0x76, 0x24,
        ];

        let pms = pre_master_secret(public, &private, NamedCurve::X25519).unwrap();
        assert_eq!(pms, expected);
    }

    #[test]
    fn generated_pairs_agree() {
        for curve in [NamedCurve::X25519, NamedCurve::P256, NamedCurve::P384] {
            let a = EcdhKeypair::generate(curve).unwrap();
            let b = EcdhKeypair::generate(curve).unwrap();
            let ab = a.pre_master_secret(&b.public).unwrap();
            let ba = b.pre_master_secret(&a.public).unwrap();
            assert_eq!(ab, ba, "{:?}", curve);
            assert!(!ab.is_empty());
        }
    }

    #[test]
    fn rejects_malformed_public_key() {
        let kp = EcdhKeypair::generate(NamedCurve::P256).unwrap();
        assert!(kp.pre_master_secret(&[0x04, 0x01, 0x02]).is_err());
    }
}
