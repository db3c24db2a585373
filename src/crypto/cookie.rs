//! Stateless HelloVerifyRequest cookies (RFC 6347 Section 4.2.1).
//!
//! The cookie binds the client's claimed transport address to its hello
//! parameters under a per-endpoint secret, so the server commits no state
//! until the client proves it can receive at that address.

use std::net::SocketAddr;

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::message::{CipherSuiteId, NamedCurve};

/// Cookie length sent in HelloVerifyRequest.
pub const COOKIE_LEN: usize = 20;

type HmacSha256 = Hmac<Sha256>;

/// Generates and verifies cookies under a random per-endpoint secret.
pub struct CookieGenerator {
    secret: [u8; 32],
}

impl CookieGenerator {
    pub fn new() -> CookieGenerator {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        CookieGenerator { secret }
    }

    /// cookie = MAC(secret, client_ip || client_random || ciphers || curves)
    pub fn generate(
        &self,
        peer: &SocketAddr,
        client_random: &[u8],
        cipher_suites: &[CipherSuiteId],
        curves: &[NamedCurve],
    ) -> Vec<u8> {
        // unwrap: HMAC accepts any key length.
        let mut mac = HmacSha256::new_from_slice(&self.secret).unwrap();
        match peer.ip() {
            std::net::IpAddr::V4(ip) => mac.update(&ip.octets()),
            std::net::IpAddr::V6(ip) => mac.update(&ip.octets()),
        }
        mac.update(client_random);
        for suite in cipher_suites {
            mac.update(&suite.0.to_be_bytes());
        }
        for curve in curves {
            mac.update(&curve.as_u16().to_be_bytes());
        }
        mac.finalize().into_bytes()[..COOKIE_LEN].to_vec()
    }

    /// Constant-time check of a cookie echoed by the client.
    pub fn verify(
        &self,
        cookie: &[u8],
        peer: &SocketAddr,
        client_random: &[u8],
        cipher_suites: &[CipherSuiteId],
        curves: &[NamedCurve],
    ) -> bool {
        let expected = self.generate(peer, client_random, cipher_suites, curves);
        cookie.len() == expected.len() && bool::from(cookie.ct_eq(&expected))
    }
}

impl Default for CookieGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn valid_cookie_verifies() {
        let gen = CookieGenerator::new();
        let random = [7u8; 32];
        let suites = [CipherSuiteId::ECDHE_ECDSA_AES128_GCM_SHA256];
        let curves = [NamedCurve::X25519];

        let cookie = gen.generate(&addr("10.0.0.1:5000"), &random, &suites, &curves);
        assert_eq!(cookie.len(), COOKIE_LEN);
        assert!(gen.verify(&cookie, &addr("10.0.0.1:5000"), &random, &suites, &curves));
    }

    #[test]
    fn cookie_is_bound_to_address_and_hello() {
        let gen = CookieGenerator::new();
        let random = [7u8; 32];
        let suites = [CipherSuiteId::ECDHE_ECDSA_AES128_GCM_SHA256];
        let curves = [NamedCurve::X25519];

        let cookie = gen.generate(&addr("10.0.0.1:5000"), &random, &suites, &curves);

        // Different source IP
        assert!(!gen.verify(&cookie, &addr("10.0.0.2:5000"), &random, &suites, &curves));
        // Different random
        assert!(!gen.verify(&cookie, &addr("10.0.0.1:5000"), &[8u8; 32], &suites, &curves));
        // Different offered suites
        assert!(!gen.verify(
            &cookie,
            &addr("10.0.0.1:5000"),
            &random,
            &[CipherSuiteId::ECDHE_ECDSA_AES256_GCM_SHA384],
            &curves
        ));
    }

    #[test]
    fn secrets_differ_between_endpoints() {
        let random = [7u8; 32];
        let a = CookieGenerator::new();
        let b = CookieGenerator::new();
        let cookie = a.generate(&addr("10.0.0.1:5000"), &random, &[], &[]);
        assert!(!b.verify(&cookie, &addr("10.0.0.1:5000"), &random, &[], &[]));
    }
}
