//! Endpoint configuration.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::certificate::DtlsCertificate;
use crate::crypto::{self, CertVerifier};
use crate::message::{
    CertificateRequest, CipherSuiteId, ClientHello, NamedCurve, ServerHello, SignatureScheme,
    SrtpProfile,
};
use crate::Error;

/// How the server treats client certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuthType {
    /// Never ask for one.
    #[default]
    NoClientCert,
    /// Ask, accept none.
    RequestClientCert,
    /// Require one, do not verify it.
    RequireAnyClientCert,
    /// Verify one if the client offers it.
    VerifyClientCertIfGiven,
    /// Require and verify.
    RequireAndVerifyClientCert,
}

/// Extended Master Secret negotiation stance (RFC 7627).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtendedMasterSecretType {
    /// Never offer or accept it.
    Disable,
    /// Offer it, proceed without if the peer declines.
    #[default]
    Request,
    /// Abort the handshake when the peer does not support it.
    Require,
}

/// What the server learns from a ClientHello when choosing a certificate.
#[derive(Debug, Clone)]
pub struct ClientHelloInfo {
    pub server_name: String,
    pub cipher_suites: Vec<CipherSuiteId>,
}

/// What the client learns from a CertificateRequest when choosing its
/// certificate.
#[derive(Debug, Clone)]
pub struct CertificateRequestInfo {
    pub acceptable_cas: Vec<Vec<u8>>,
    pub signature_schemes: Vec<SignatureScheme>,
}

/// A resumable session: identifier plus master secret.
#[derive(Clone)]
pub struct Session {
    pub id: Vec<u8>,
    pub secret: Vec<u8>,
}

/// Persistence for sessions, keyed by session id (server) or by
/// `addr_servername` (client).
pub trait SessionStore: Send + Sync {
    fn set(&self, key: &[u8], session: Session) -> Result<(), Error>;
    fn get(&self, key: &[u8]) -> Result<Option<Session>, Error>;
    fn del(&self, key: &[u8]) -> Result<(), Error>;
}

/// Sink for per-handshake key material, NSS key log format.
pub trait KeyLog: Send + Sync {
    /// `label` is `CLIENT_RANDOM` for TLS 1.2 master secrets.
    fn log(&self, label: &str, client_random: &[u8], secret: &[u8]);
}

/// A [`KeyLog`] writing NSS `CLIENT_RANDOM <hex> <hex>` lines to a writer,
/// suitable for SSLKEYLOGFILE consumers like Wireshark.
pub struct KeyLogWriter {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl KeyLogWriter {
    pub fn new(writer: impl Write + Send + 'static) -> KeyLogWriter {
        KeyLogWriter {
            inner: Mutex::new(Box::new(writer)),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl KeyLog for KeyLogWriter {
    fn log(&self, label: &str, client_random: &[u8], secret: &[u8]) {
        if let Ok(mut w) = self.inner.lock() {
            let _ = writeln!(w, "{} {} {}", label, hex(client_random), hex(secret));
        }
    }
}

pub(crate) type PskCallback = dyn Fn(&[u8]) -> Result<Vec<u8>, Error> + Send + Sync;
pub(crate) type GetCertificate =
    dyn Fn(&ClientHelloInfo) -> Result<DtlsCertificate, Error> + Send + Sync;
pub(crate) type GetClientCertificate =
    dyn Fn(&CertificateRequestInfo) -> Result<DtlsCertificate, Error> + Send + Sync;
pub(crate) type CidGenerator = dyn Fn() -> Vec<u8> + Send + Sync;
pub(crate) type HelloRandomGenerator = dyn Fn() -> [u8; 28] + Send + Sync;
pub(crate) type PaddingLengthGenerator = dyn Fn(usize) -> usize + Send + Sync;
pub(crate) type ClientHelloHook = dyn Fn(&mut ClientHello) + Send + Sync;
pub(crate) type ServerHelloHook = dyn Fn(&mut ServerHello) + Send + Sync;
pub(crate) type CertificateRequestHook = dyn Fn(&mut CertificateRequest) + Send + Sync;

/// DTLS endpoint configuration. Build with [`Config::builder`].
#[derive(Clone)]
pub struct Config {
    pub(crate) cipher_suites: Vec<CipherSuiteId>,
    pub(crate) elliptic_curves: Vec<NamedCurve>,
    pub(crate) signature_schemes: Vec<SignatureScheme>,
    pub(crate) insecure_hashes: bool,
    pub(crate) certificates: Vec<DtlsCertificate>,
    pub(crate) get_certificate: Option<Arc<GetCertificate>>,
    pub(crate) get_client_certificate: Option<Arc<GetClientCertificate>>,
    pub(crate) cert_verifier: Option<Arc<dyn CertVerifier>>,
    pub(crate) client_auth: ClientAuthType,
    pub(crate) insecure_skip_verify: bool,
    pub(crate) insecure_skip_verify_hello: bool,
    pub(crate) psk: Option<Arc<PskCallback>>,
    pub(crate) psk_identity_hint: Vec<u8>,
    pub(crate) server_name: String,
    pub(crate) mtu: usize,
    pub(crate) flight_interval: Duration,
    pub(crate) flight_retries: usize,
    pub(crate) replay_protection_window: usize,
    pub(crate) extended_master_secret: ExtendedMasterSecretType,
    pub(crate) connection_id_generator: Option<Arc<CidGenerator>>,
    pub(crate) padding_length_generator: Option<Arc<PaddingLengthGenerator>>,
    pub(crate) hello_random_bytes_generator: Option<Arc<HelloRandomGenerator>>,
    pub(crate) client_hello_message_hook: Option<Arc<ClientHelloHook>>,
    pub(crate) server_hello_message_hook: Option<Arc<ServerHelloHook>>,
    pub(crate) certificate_request_message_hook: Option<Arc<CertificateRequestHook>>,
    pub(crate) srtp_protection_profiles: Vec<SrtpProfile>,
    pub(crate) supported_protocols: Vec<String>,
    pub(crate) session_store: Option<Arc<dyn SessionStore>>,
    pub(crate) key_log: Option<Arc<dyn KeyLog>>,
}

impl Config {
    /// Create a new configuration builder with the defaults: AEAD ECDHE
    /// suites, curves X25519/P-256/P-384, MTU 1200, 1 s flight interval,
    /// 12 retries, replay window 64.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            config: Config {
                cipher_suites: crypto::default_cipher_suites(),
                elliptic_curves: vec![NamedCurve::X25519, NamedCurve::P256, NamedCurve::P384],
                signature_schemes: vec![
                    SignatureScheme::ECDSA_SECP256R1_SHA256,
                    SignatureScheme::ECDSA_SECP384R1_SHA384,
                ],
                insecure_hashes: false,
                certificates: Vec::new(),
                get_certificate: None,
                get_client_certificate: None,
                cert_verifier: None,
                client_auth: ClientAuthType::default(),
                insecure_skip_verify: false,
                insecure_skip_verify_hello: false,
                psk: None,
                psk_identity_hint: Vec::new(),
                server_name: String::new(),
                mtu: 1200,
                flight_interval: Duration::from_secs(1),
                flight_retries: 12,
                replay_protection_window: 64,
                extended_master_secret: ExtendedMasterSecretType::default(),
                connection_id_generator: None,
                padding_length_generator: None,
                hello_random_bytes_generator: None,
                client_hello_message_hook: None,
                server_hello_message_hook: None,
                certificate_request_message_hook: None,
                srtp_protection_profiles: Vec::new(),
                supported_protocols: Vec::new(),
                session_store: None,
                key_log: None,
            },
        }
    }

    pub(crate) fn validate(&self, is_client: bool) -> Result<(), Error> {
        if self.cipher_suites.is_empty() {
            return Err(Error::InvalidConfig("no cipher suites".into()));
        }
        for id in &self.cipher_suites {
            if crypto::profile(*id).is_none() {
                return Err(Error::InvalidConfig(format!(
                    "unsupported cipher suite {}",
                    id
                )));
            }
        }
        if is_client && self.psk.is_some() && self.psk_identity_hint.is_empty() {
            return Err(Error::InvalidConfig(
                "PSK requires an identity on the client".into(),
            ));
        }
        if self.mtu < 100 {
            return Err(Error::InvalidConfig("mtu too small".into()));
        }
        Ok(())
    }

    /// Ordered cipher suite preference.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuiteId] {
        &self.cipher_suites
    }

    /// Largest datagram this endpoint will emit.
    #[inline(always)]
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Interval before the first flight retransmission.
    #[inline(always)]
    pub fn flight_interval(&self) -> Duration {
        self.flight_interval
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("cipher_suites", &self.cipher_suites)
            .field("elliptic_curves", &self.elliptic_curves)
            .field("mtu", &self.mtu)
            .field("flight_interval", &self.flight_interval)
            .field("client_auth", &self.client_auth)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the ordered cipher suite preference list.
    pub fn cipher_suites(mut self, suites: Vec<CipherSuiteId>) -> Self {
        self.config.cipher_suites = suites;
        self
    }

    /// Set the supported elliptic curves, most preferred first.
    pub fn elliptic_curves(mut self, curves: Vec<NamedCurve>) -> Self {
        self.config.elliptic_curves = curves;
        self
    }

    /// Set the acceptable signature schemes.
    pub fn signature_schemes(mut self, schemes: Vec<SignatureScheme>) -> Self {
        self.config.signature_schemes = schemes;
        self
    }

    /// Allow SHA-1/MD5 signature schemes. Off by default.
    pub fn insecure_hashes(mut self, allow: bool) -> Self {
        self.config.insecure_hashes = allow;
        self
    }

    /// Provide the local certificate chain(s).
    pub fn certificates(mut self, certificates: Vec<DtlsCertificate>) -> Self {
        self.config.certificates = certificates;
        self
    }

    /// Server-side certificate selection callback; overrides
    /// `certificates` when set.
    pub fn get_certificate(
        mut self,
        f: impl Fn(&ClientHelloInfo) -> Result<DtlsCertificate, Error> + Send + Sync + 'static,
    ) -> Self {
        self.config.get_certificate = Some(Arc::new(f));
        self
    }

    /// Client-side certificate selection callback.
    pub fn get_client_certificate(
        mut self,
        f: impl Fn(&CertificateRequestInfo) -> Result<DtlsCertificate, Error>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.config.get_client_certificate = Some(Arc::new(f));
        self
    }

    /// Install the peer-certificate verifier.
    pub fn cert_verifier(mut self, verifier: Arc<dyn CertVerifier>) -> Self {
        self.config.cert_verifier = Some(verifier);
        self
    }

    /// Server-side client certificate policy.
    pub fn client_auth(mut self, client_auth: ClientAuthType) -> Self {
        self.config.client_auth = client_auth;
        self
    }

    /// Accept any peer certificate without verification.
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.config.insecure_skip_verify = skip;
        self
    }

    /// Server-side: skip the HelloVerifyRequest cookie exchange.
    pub fn insecure_skip_verify_hello(mut self, skip: bool) -> Self {
        self.config.insecure_skip_verify_hello = skip;
        self
    }

    /// Pre-shared key lookup. The argument is the server's identity hint
    /// (client side) or the client's identity (server side).
    pub fn psk(
        mut self,
        f: impl Fn(&[u8]) -> Result<Vec<u8>, Error> + Send + Sync + 'static,
    ) -> Self {
        self.config.psk = Some(Arc::new(f));
        self
    }

    /// PSK identity hint (server) / identity (client).
    pub fn psk_identity_hint(mut self, hint: Vec<u8>) -> Self {
        self.config.psk_identity_hint = hint;
        self
    }

    /// SNI sent by the client. Must be a DNS name; IP literals are
    /// silently cleared (RFC 6066 Section 3).
    pub fn server_name(mut self, server_name: impl Into<String>) -> Self {
        self.config.server_name = server_name.into();
        self
    }

    /// Largest datagram to emit. Defaults to 1200.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.config.mtu = mtu;
        self
    }

    /// Retransmission interval for the first retry of each flight.
    /// Defaults to 1 second; doubled per retry with jitter.
    pub fn flight_interval(mut self, interval: Duration) -> Self {
        self.config.flight_interval = interval;
        self
    }

    /// Max retransmissions per flight. Defaults to 12.
    pub fn flight_retries(mut self, retries: usize) -> Self {
        self.config.flight_retries = retries;
        self
    }

    /// Anti-replay window size in records. Defaults to 64.
    pub fn replay_protection_window(mut self, window: usize) -> Self {
        self.config.replay_protection_window = window;
        self
    }

    /// Extended Master Secret stance. Defaults to request.
    pub fn extended_master_secret(mut self, ems: ExtendedMasterSecretType) -> Self {
        self.config.extended_master_secret = ems;
        self
    }

    /// Enable RFC 9146 Connection IDs: the generator produces the CID this
    /// endpoint wants to receive under.
    pub fn connection_id_generator(
        mut self,
        f: impl Fn() -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        self.config.connection_id_generator = Some(Arc::new(f));
        self
    }

    /// Zero-padding length for CID inner plaintexts, as a function of the
    /// content length. Defaults to no padding.
    pub fn padding_length_generator(
        mut self,
        f: impl Fn(usize) -> usize + Send + Sync + 'static,
    ) -> Self {
        self.config.padding_length_generator = Some(Arc::new(f));
        self
    }

    /// Test seam: source of the 28 random bytes in hellos. Production
    /// default is the CSPRNG.
    pub fn hello_random_bytes_generator(
        mut self,
        f: impl Fn() -> [u8; 28] + Send + Sync + 'static,
    ) -> Self {
        self.config.hello_random_bytes_generator = Some(Arc::new(f));
        self
    }

    /// Test seam: mutate the ClientHello before it is sent.
    pub fn client_hello_message_hook(
        mut self,
        f: impl Fn(&mut ClientHello) + Send + Sync + 'static,
    ) -> Self {
        self.config.client_hello_message_hook = Some(Arc::new(f));
        self
    }

    /// Test seam: mutate the ServerHello before it is sent.
    pub fn server_hello_message_hook(
        mut self,
        f: impl Fn(&mut ServerHello) + Send + Sync + 'static,
    ) -> Self {
        self.config.server_hello_message_hook = Some(Arc::new(f));
        self
    }

    /// Test seam: mutate the CertificateRequest before it is sent.
    pub fn certificate_request_message_hook(
        mut self,
        f: impl Fn(&mut CertificateRequest) + Send + Sync + 'static,
    ) -> Self {
        self.config.certificate_request_message_hook = Some(Arc::new(f));
        self
    }

    /// SRTP protection profiles to offer/accept (RFC 5764).
    pub fn srtp_protection_profiles(mut self, profiles: Vec<SrtpProfile>) -> Self {
        self.config.srtp_protection_profiles = profiles;
        self
    }

    /// ALPN protocols, most preferred first (RFC 7301).
    pub fn supported_protocols(mut self, protocols: Vec<String>) -> Self {
        self.config.supported_protocols = protocols;
        self
    }

    /// Install session persistence for resumption data.
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.config.session_store = Some(store);
        self
    }

    /// Install a key log sink (NSS format).
    pub fn key_log(mut self, key_log: Arc<dyn KeyLog>) -> Self {
        self.config.key_log = Some(key_log);
        self
    }

    /// Finish the builder. Role-dependent validation happens at
    /// `connect`/`listen`.
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_for_both_roles() {
        let config = Config::default();
        config.validate(true).unwrap();
        config.validate(false).unwrap();
        assert_eq!(config.mtu(), 1200);
        assert_eq!(config.flight_interval(), Duration::from_secs(1));
        assert_eq!(config.flight_retries, 12);
        assert_eq!(config.replay_protection_window, 64);
    }

    #[test]
    fn client_psk_requires_identity() {
        let config = Config::builder().psk(|_| Ok(vec![1, 2, 3])).build();
        assert!(config.validate(true).is_err());
        // Server side only needs the callback.
        assert!(config.validate(false).is_ok());

        let config = Config::builder()
            .psk(|_| Ok(vec![1, 2, 3]))
            .psk_identity_hint(b"id".to_vec())
            .build();
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn rejects_unknown_suite() {
        let config = Config::builder()
            .cipher_suites(vec![CipherSuiteId(0x1234)])
            .build();
        assert!(matches!(
            config.validate(true),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn key_log_writer_formats_nss_lines() {
        use std::sync::Mutex as StdMutex;

        #[derive(Clone)]
        struct Sink(Arc<StdMutex<Vec<u8>>>);
        impl Write for Sink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let data = Arc::new(StdMutex::new(Vec::new()));
        let log = KeyLogWriter::new(Sink(data.clone()));
        log.log("CLIENT_RANDOM", &[0xab, 0xcd], &[0x01, 0x02]);

        let line = String::from_utf8(data.lock().unwrap().clone()).unwrap();
        assert_eq!(line, "CLIENT_RANDOM abcd 0102\n");
    }
}
