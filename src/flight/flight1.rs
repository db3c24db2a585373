//! Flight 1: the client's opening ClientHello, and the wait for either a
//! HelloVerifyRequest or the server's hello flight.

use super::{allowed_signature_schemes, flight3, next_send_sequence, Flight, FlightCtx, FlightError, Packet};
use crate::cache::PullRule;
use crate::config::ExtendedMasterSecretType;
use crate::crypto;
use crate::message::{
    AlertDescription, CipherSuiteId, ClientHello, CompressionMethod, Extension,
    HelloVerifyRequest, MessageType, ProtocolVersion,
};
use crate::Error;

pub(super) fn generate(ctx: &mut FlightCtx) -> Result<Vec<Packet>, FlightError> {
    // Offer our CID if configured, before the hello carries it.
    if ctx.state.local_connection_id.is_empty() {
        if let Some(generate) = &ctx.config.connection_id_generator {
            ctx.state.local_connection_id = generate();
        }
    }
    Ok(vec![build_client_hello(ctx)?])
}

pub(super) fn parse(ctx: &mut FlightCtx) -> Result<Option<Flight>, FlightError> {
    let start = ctx.state.handshake_recv_sequence;

    // The cookie exchange is optional; the server may answer with its
    // hello flight directly.
    if let Some((next_seq, msgs)) = ctx.cache.full_pull_map(
        start,
        &[PullRule::required(MessageType::HelloVerifyRequest, 0, false)],
    ) {
        let (_, hvr) = HelloVerifyRequest::parse(msgs[0].body()).map_err(|e| {
            FlightError::fatal(AlertDescription::DecodeError, Error::from(e))
        })?;
        if hvr.version.major != 0xFE {
            return Err(FlightError::fatal(
                AlertDescription::ProtocolVersion,
                Error::UnexpectedMessage("bad HelloVerifyRequest version".into()),
            ));
        }
        ctx.state.cookie = hvr.cookie;
        ctx.state.handshake_recv_sequence = next_seq;
        return Ok(Some(Flight::Flight3));
    }

    // No HelloVerifyRequest: treat the cached messages as the server's
    // flight 4 and jump straight to flight 5 when it completes.
    flight3::parse_server_flight(ctx)
}

/// Build the ClientHello for flights 1 and 3; the cookie in the state
/// decides which one this is. The hello random never changes between the
/// two (RFC 6347 Section 4.2.1).
pub(super) fn build_client_hello(ctx: &mut FlightCtx) -> Result<Packet, FlightError> {
    let mut extensions = vec![
        Extension::RenegotiationInfo(Vec::new()),
        Extension::SupportedGroups(ctx.config.elliptic_curves.clone()),
        Extension::EcPointFormats(vec![0]), // uncompressed
        Extension::SignatureAlgorithms(allowed_signature_schemes(ctx.config)),
    ];

    if !ctx.config.server_name.is_empty() {
        extensions.push(Extension::ServerName(ctx.config.server_name.clone()));
    }
    if !ctx.config.supported_protocols.is_empty() {
        extensions.push(Extension::Alpn(ctx.config.supported_protocols.clone()));
    }
    if !ctx.config.srtp_protection_profiles.is_empty() {
        extensions.push(Extension::UseSrtp {
            profiles: ctx.config.srtp_protection_profiles.clone(),
            mki: Vec::new(),
        });
    }
    if ctx.config.extended_master_secret != ExtendedMasterSecretType::Disable {
        extensions.push(Extension::ExtendedMasterSecret);
    }
    if !ctx.state.local_connection_id.is_empty() {
        extensions.push(Extension::ConnectionId(
            ctx.state.local_connection_id.clone(),
        ));
    }

    let mut hello = ClientHello {
        client_version: ProtocolVersion::DTLS1_2,
        random: ctx.state.local_random,
        session_id: ctx.state.session_id.clone(),
        cookie: ctx.state.cookie.clone(),
        cipher_suites: offered_cipher_suites(ctx),
        compression_methods: vec![CompressionMethod::NULL],
        extensions,
    };

    if let Some(hook) = &ctx.config.client_hello_message_hook {
        hook(&mut hello);
    }

    let mut body = Vec::new();
    hello.serialize(&mut body);

    let seq = next_send_sequence(ctx.state);
    Ok(Packet::handshake(MessageType::ClientHello, seq, body))
}

fn offered_cipher_suites(ctx: &FlightCtx) -> Vec<CipherSuiteId> {
    ctx.config
        .cipher_suites
        .iter()
        .copied()
        .filter(|id| match crypto::profile(*id).map(|p| p.key_exchange) {
            Some(crypto::KeyExchangeAlgorithm::Psk) => ctx.config.psk.is_some(),
            Some(crypto::KeyExchangeAlgorithm::Ecdhe) => true,
            None => false,
        })
        .collect()
}
