//! Flight-indexed handshake logic (RFC 6347 Section 4.2.4).
//!
//! The client emits flights 1, 3 and 5; the server holds flight 0 (awaiting
//! ClientHello), 2 (HelloVerifyRequest), 4 and 6. Each flight is a pair of
//! functions over the connection state and handshake cache: `parse` consumes
//! cached peer messages and decides the next flight, `generate` produces the
//! outbound records. The FSM in [`crate::fsm`] drives the pair with
//! retransmission timers.

mod flight0;
mod flight1;
mod flight2;
mod flight3;
mod flight4;
mod flight5;
mod flight6;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::cache::HandshakeCache;
use crate::certificate::DtlsCertificate;
use crate::config::{ClientHelloInfo, Config};
use crate::crypto::{self, CookieGenerator, ParsedKey};
use crate::message::{
    Alert, AlertDescription, CipherSuiteId, ContentType, HandshakeRandom, MessageType,
    SignatureScheme,
};
use crate::state::State;
use crate::Error;

/// One outbound record-to-be. Handshake contents are fragmented by the
/// send path; everything else maps to a single record.
#[derive(Debug, Clone)]
pub(crate) enum PacketContent {
    Handshake {
        msg_type: MessageType,
        message_sequence: u16,
        body: Vec<u8>,
    },
    Raw {
        content_type: ContentType,
        payload: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Packet {
    pub content: PacketContent,
    pub epoch: u16,
    pub should_encrypt: bool,
}

impl Packet {
    pub fn handshake(msg_type: MessageType, message_sequence: u16, body: Vec<u8>) -> Packet {
        Packet {
            content: PacketContent::Handshake {
                msg_type,
                message_sequence,
                body,
            },
            epoch: 0,
            should_encrypt: false,
        }
    }

    pub fn at_epoch(mut self, epoch: u16) -> Packet {
        self.epoch = epoch;
        self
    }

    pub fn encrypted(mut self) -> Packet {
        self.should_encrypt = true;
        self
    }
}

/// A handshake-fatal condition: the alert to put on the wire (if any) and
/// the error surfaced to the caller.
#[derive(Debug)]
pub(crate) struct FlightError {
    pub alert: Option<Alert>,
    pub error: Error,
}

impl FlightError {
    pub fn fatal(description: AlertDescription, error: Error) -> FlightError {
        FlightError {
            alert: Some(Alert::fatal(description)),
            error,
        }
    }

    pub fn internal(error: Error) -> FlightError {
        FlightError {
            alert: Some(Alert::fatal(AlertDescription::InternalError)),
            error,
        }
    }
}

/// Everything a flight function may touch. The FSM holds the connection
/// locks while a flight runs.
pub(crate) struct FlightCtx<'a> {
    pub state: &'a mut State,
    pub cache: &'a HandshakeCache,
    pub config: &'a Config,
    pub cookie_gen: &'a CookieGenerator,
}

/// Flight numbering per RFC 6347 Section 4.2.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flight {
    /// Server: awaiting the first ClientHello.
    Flight0,
    /// Client: ClientHello.
    Flight1,
    /// Server: HelloVerifyRequest.
    Flight2,
    /// Client: ClientHello with cookie.
    Flight3,
    /// Server: ServerHello .. ServerHelloDone.
    Flight4,
    /// Client: [Certificate] ClientKeyExchange [CertificateVerify]
    /// ChangeCipherSpec Finished.
    Flight5,
    /// Server: ChangeCipherSpec Finished.
    Flight6,
}

impl Flight {
    pub fn initial(is_client: bool) -> Flight {
        if is_client {
            Flight::Flight1
        } else {
            Flight::Flight0
        }
    }

    /// After sending this flight the handshake is complete; nothing more is
    /// awaited.
    pub fn is_last_send_flight(self) -> bool {
        self == Flight::Flight6
    }

    /// Completion of this flight's parse finishes the handshake (client at
    /// flight 5, once the server Finished verifies).
    pub fn is_last_recv_flight(self) -> bool {
        self == Flight::Flight5
    }

    pub fn generate(self, ctx: &mut FlightCtx) -> Result<Vec<Packet>, FlightError> {
        match self {
            Flight::Flight0 => Ok(Vec::new()),
            Flight::Flight1 => flight1::generate(ctx),
            Flight::Flight2 => flight2::generate(ctx),
            Flight::Flight3 => flight3::generate(ctx),
            Flight::Flight4 => flight4::generate(ctx),
            Flight::Flight5 => flight5::generate(ctx),
            Flight::Flight6 => flight6::generate(ctx),
        }
    }

    /// Try to complete this flight from the cache. `Ok(None)` means "not
    /// yet"; `Ok(Some(next))` advances (possibly to the same flight for a
    /// terminal recv).
    pub fn parse(self, ctx: &mut FlightCtx) -> Result<Option<Flight>, FlightError> {
        match self {
            Flight::Flight0 => flight0::parse(ctx),
            Flight::Flight1 => flight1::parse(ctx),
            Flight::Flight2 => flight2::parse(ctx),
            Flight::Flight3 => flight3::parse(ctx),
            Flight::Flight4 => flight4::parse(ctx),
            Flight::Flight5 => flight5::parse(ctx),
            // Flight 6 is terminal; retransmits of the client's flight are
            // answered by resending, which the FSM handles.
            Flight::Flight6 => Ok(None),
        }
    }
}

impl std::fmt::Display for Flight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = match self {
            Flight::Flight0 => 0,
            Flight::Flight1 => 1,
            Flight::Flight2 => 2,
            Flight::Flight3 => 3,
            Flight::Flight4 => 4,
            Flight::Flight5 => 5,
            Flight::Flight6 => 6,
        };
        write!(f, "flight {}", n)
    }
}

/// Allocate the next outbound handshake message sequence.
pub(crate) fn next_send_sequence(state: &mut State) -> u16 {
    let seq = state.handshake_send_sequence;
    state.handshake_send_sequence = seq.wrapping_add(1);
    seq
}

/// A fresh hello random: CSPRNG, or the configured test generator.
pub(crate) fn new_hello_random(config: &Config) -> HandshakeRandom {
    let bytes = match &config.hello_random_bytes_generator {
        Some(generate) => generate(),
        None => {
            let mut b = [0u8; 28];
            OsRng.fill_bytes(&mut b);
            b
        }
    };
    HandshakeRandom::new(bytes)
}

/// The signature schemes this endpoint accepts, insecure hashes filtered
/// out unless explicitly enabled.
pub(crate) fn allowed_signature_schemes(config: &Config) -> Vec<SignatureScheme> {
    config
        .signature_schemes
        .iter()
        .copied()
        .filter(|s| config.insecure_hashes || !s.hash.is_insecure())
        .collect()
}

/// Resolve the certificate the server presents for this hello.
pub(crate) fn server_certificate(
    config: &Config,
    info: &ClientHelloInfo,
) -> Result<Option<DtlsCertificate>, Error> {
    if let Some(get) = &config.get_certificate {
        return get(info).map(Some);
    }
    Ok(config.certificates.first().cloned())
}

/// Does the server hold a certificate able to authenticate `suite`?
pub(crate) fn certificate_compatible(config: &Config, suite: CipherSuiteId, info: &ClientHelloInfo) -> bool {
    let cert = match server_certificate(config, info) {
        Ok(Some(cert)) => cert,
        _ => return false,
    };
    match ParsedKey::try_parse(&cert.private_key) {
        Ok(key) => key.is_compatible(suite),
        Err(_) => false,
    }
}

/// Server-side suite selection: the first client-offered suite also in the
/// server's list, skipping ECDSA suites without a compatible certificate
/// and PSK suites without a PSK callback.
pub(crate) fn select_cipher_suite(
    config: &Config,
    offered: &[CipherSuiteId],
    info: &ClientHelloInfo,
) -> Result<CipherSuiteId, FlightError> {
    for id in offered {
        if !config.cipher_suites.contains(id) {
            continue;
        }
        let Some(profile) = crypto::profile(*id) else {
            continue;
        };
        match profile.key_exchange {
            crypto::KeyExchangeAlgorithm::Ecdhe => {
                if certificate_compatible(config, *id, info) {
                    return Ok(*id);
                }
            }
            crypto::KeyExchangeAlgorithm::Psk => {
                if config.psk.is_some() {
                    return Ok(*id);
                }
            }
        }
    }
    Err(FlightError::fatal(
        AlertDescription::InsufficientSecurity,
        Error::UnexpectedMessage("no mutually supported cipher suite".into()),
    ))
}
