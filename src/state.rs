//! Per-connection negotiated state.

use std::net::SocketAddr;

use zeroize::Zeroizing;

use crate::crypto::{CipherSuite, EcdhKeypair};
use crate::message::{
    CipherSuiteId, HandshakeRandom, NamedCurve, SignatureScheme, SrtpProfile,
};
use crate::window::ReplayWindow;

/// Mutable connection state shared by the reader loop, the handshaker and
/// the send path. Lives behind the connection lock; the epochs and the
/// handshake-completed flag live as atomics next to it.
pub(crate) struct State {
    pub is_client: bool,

    /// Outbound sequence numbers, indexed by epoch.
    pub local_sequence_number: Vec<u64>,
    /// Inbound anti-replay windows, indexed by epoch.
    pub replay: Vec<ReplayWindow>,

    pub cipher_suite: Option<CipherSuite>,

    pub pre_master_secret: Zeroizing<Vec<u8>>,
    pub master_secret: Zeroizing<Vec<u8>>,
    pub extended_master_secret: bool,

    pub local_random: HandshakeRandom,
    pub remote_random: HandshakeRandom,

    pub session_id: Vec<u8>,
    /// CID this endpoint expects in inbound records; empty = none.
    pub local_connection_id: Vec<u8>,
    /// CID to put into outbound records; empty = none.
    pub remote_connection_id: Vec<u8>,

    pub srtp_profile: Option<SrtpProfile>,
    pub alpn_protocol: Option<String>,

    /// Server-issued cookie, client-echoed. Transient.
    pub cookie: Vec<u8>,

    pub handshake_send_sequence: u16,
    pub handshake_recv_sequence: u16,

    /// Peer chain, leaf first, raw DER.
    pub peer_certificates: Vec<Vec<u8>>,

    pub named_curve: NamedCurve,
    pub local_keypair: Option<EcdhKeypair>,
    /// Peer's ephemeral ECDH public key.
    pub remote_kx_public: Vec<u8>,

    /// PSK identity hint received from the server.
    pub psk_identity_hint: Vec<u8>,

    /// Whether the server asked for a client certificate.
    pub certificate_requested: bool,

    /// Signature schemes the peer offered (signature_algorithms /
    /// CertificateRequest).
    pub remote_signature_schemes: Vec<SignatureScheme>,

    /// SNI received by the server.
    pub remote_server_name: String,

    /// Suites and curves from the ClientHello, kept for the cookie MAC and
    /// suite selection (server side).
    pub remote_offered_suites: Vec<CipherSuiteId>,
    pub remote_offered_curves: Vec<NamedCurve>,

    /// Whether the client offered the connection_id extension.
    pub remote_requested_cid: bool,

    pub peer_addr: SocketAddr,
    /// False on a listening endpoint until the first datagram arrives.
    pub peer_confirmed: bool,
}

impl State {
    pub fn new(is_client: bool, peer_addr: SocketAddr, replay_window: usize) -> State {
        State {
            is_client,
            local_sequence_number: vec![0],
            replay: vec![ReplayWindow::new(replay_window)],
            cipher_suite: None,
            pre_master_secret: Zeroizing::new(Vec::new()),
            master_secret: Zeroizing::new(Vec::new()),
            extended_master_secret: false,
            local_random: HandshakeRandom::default(),
            remote_random: HandshakeRandom::default(),
            session_id: Vec::new(),
            local_connection_id: Vec::new(),
            remote_connection_id: Vec::new(),
            srtp_profile: None,
            alpn_protocol: None,
            cookie: Vec::new(),
            handshake_send_sequence: 0,
            handshake_recv_sequence: 0,
            peer_certificates: Vec::new(),
            named_curve: NamedCurve::X25519,
            local_keypair: None,
            remote_kx_public: Vec::new(),
            psk_identity_hint: Vec::new(),
            certificate_requested: false,
            remote_signature_schemes: Vec::new(),
            remote_server_name: String::new(),
            remote_offered_suites: Vec::new(),
            remote_offered_curves: Vec::new(),
            remote_requested_cid: false,
            peer_addr,
            peer_confirmed: false,
        }
    }

    /// Snapshot for `Connection::connection_state`.
    pub fn snapshot(&self) -> ConnectionState {
        ConnectionState {
            is_client: self.is_client,
            cipher_suite: self.cipher_suite.as_ref().map(|s| s.id()),
            srtp_profile: self.srtp_profile,
            alpn_protocol: self.alpn_protocol.clone(),
            extended_master_secret: self.extended_master_secret,
            session_id: self.session_id.clone(),
            local_connection_id: self.local_connection_id.clone(),
            remote_connection_id: self.remote_connection_id.clone(),
            peer_certificates: self.peer_certificates.clone(),
            peer_addr: self.peer_addr,
        }
    }
}

/// Snapshot of the negotiated connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    /// Whether this endpoint initiated the handshake.
    pub is_client: bool,
    /// The negotiated cipher suite, once ServerHello has been processed.
    pub cipher_suite: Option<CipherSuiteId>,
    /// Negotiated DTLS-SRTP protection profile, if any.
    pub srtp_profile: Option<SrtpProfile>,
    /// ALPN protocol selected by the server, if any.
    pub alpn_protocol: Option<String>,
    /// Whether the Extended Master Secret extension was negotiated.
    pub extended_master_secret: bool,
    /// Session identifier issued by the server.
    pub session_id: Vec<u8>,
    /// Connection ID this endpoint receives under (RFC 9146).
    pub local_connection_id: Vec<u8>,
    /// Connection ID this endpoint sends under.
    pub remote_connection_id: Vec<u8>,
    /// Peer certificate chain, leaf first, raw DER.
    pub peer_certificates: Vec<Vec<u8>>,
    /// Current peer address (may move via CID records).
    pub peer_addr: SocketAddr,
}
