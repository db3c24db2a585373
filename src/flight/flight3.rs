//! Flight 3: the cookie-bearing ClientHello, and the parse of the server's
//! hello flight (ServerHello through ServerHelloDone).

use super::{allowed_signature_schemes, flight1, Flight, FlightCtx, FlightError, Packet};
use crate::cache::PullRule;
use crate::config::ExtendedMasterSecretType;
use crate::crypto::{self, verify_signature, CipherSuite};
use crate::message::{
    AlertDescription, Certificate, CertificateRequest, Extension, MessageType, ServerHello,
    ServerKeyExchange,
};
use crate::Error;

pub(super) fn generate(ctx: &mut FlightCtx) -> Result<Vec<Packet>, FlightError> {
    // Same hello, same random, now with the cookie from state.
    Ok(vec![flight1::build_client_hello(ctx)?])
}

pub(super) fn parse(ctx: &mut FlightCtx) -> Result<Option<Flight>, FlightError> {
    parse_server_flight(ctx)
}

/// Complete the server's flight 4 out of the cache: ServerHello,
/// [Certificate], [ServerKeyExchange], [CertificateRequest],
/// ServerHelloDone. Shared with flight 1 for servers that skip the cookie
/// exchange.
pub(super) fn parse_server_flight(ctx: &mut FlightCtx) -> Result<Option<Flight>, FlightError> {
    let start = ctx.state.handshake_recv_sequence;
    let rules = [
        PullRule::required(MessageType::ServerHello, 0, false),
        PullRule::optional(MessageType::Certificate, 0, false),
        PullRule::optional(MessageType::ServerKeyExchange, 0, false),
        PullRule::optional(MessageType::CertificateRequest, 0, false),
        PullRule::required(MessageType::ServerHelloDone, 0, false),
    ];
    let Some((next_seq, msgs)) = ctx.cache.full_pull_map(start, &rules) else {
        return Ok(None);
    };

    let mut certificate: Option<Certificate> = None;
    let mut key_exchange: Option<ServerKeyExchange> = None;

    for msg in &msgs {
        match msg.typ {
            MessageType::ServerHello => {
                let (_, hello) = ServerHello::parse(msg.body()).map_err(|e| {
                    FlightError::fatal(AlertDescription::DecodeError, Error::from(e))
                })?;
                process_server_hello(ctx, &hello)?;
            }
            MessageType::Certificate => {
                let (_, cert) = Certificate::parse(msg.body()).map_err(|e| {
                    FlightError::fatal(AlertDescription::DecodeError, Error::from(e))
                })?;
                certificate = Some(cert);
            }
            MessageType::ServerKeyExchange => {
                // Parsed below once the suite is known.
                key_exchange = Some(parse_server_key_exchange(ctx, msg.body())?);
            }
            MessageType::CertificateRequest => {
                let (_, req) = CertificateRequest::parse(msg.body()).map_err(|e| {
                    FlightError::fatal(AlertDescription::DecodeError, Error::from(e))
                })?;
                ctx.state.certificate_requested = true;
                ctx.state.remote_signature_schemes = req.signature_schemes;
            }
            MessageType::ServerHelloDone => {}
            _ => {}
        }
    }

    let suite_kx = ctx
        .state
        .cipher_suite
        .as_ref()
        .map(|s| s.key_exchange())
        .ok_or_else(|| {
            FlightError::internal(Error::UnexpectedMessage("no cipher suite selected".into()))
        })?;

    match suite_kx {
        crypto::KeyExchangeAlgorithm::Ecdhe => {
            let cert = certificate.ok_or_else(|| {
                FlightError::fatal(
                    AlertDescription::UnexpectedMessage,
                    Error::UnexpectedMessage("missing server Certificate".into()),
                )
            })?;
            verify_peer_chain(ctx, &cert.certificates)?;
            ctx.state.peer_certificates = cert.certificates;

            let ske = key_exchange.ok_or_else(|| {
                FlightError::fatal(
                    AlertDescription::UnexpectedMessage,
                    Error::UnexpectedMessage("missing ServerKeyExchange".into()),
                )
            })?;
            process_ecdh_params(ctx, ske)?;
        }
        crypto::KeyExchangeAlgorithm::Psk => {
            if let Some(ServerKeyExchange::Psk { identity_hint }) = key_exchange {
                ctx.state.psk_identity_hint = identity_hint;
            }
        }
    }

    ctx.state.handshake_recv_sequence = next_seq;
    Ok(Some(Flight::Flight5))
}

fn process_server_hello(ctx: &mut FlightCtx, hello: &ServerHello) -> Result<(), FlightError> {
    if hello.version.major != 0xFE {
        return Err(FlightError::fatal(
            AlertDescription::ProtocolVersion,
            Error::UnexpectedMessage("not a DTLS ServerHello".into()),
        ));
    }

    if !ctx.config.cipher_suites.contains(&hello.cipher_suite) {
        return Err(FlightError::fatal(
            AlertDescription::IllegalParameter,
            Error::UnexpectedMessage(format!(
                "server selected unoffered suite {}",
                hello.cipher_suite
            )),
        ));
    }
    let suite = CipherSuite::new(hello.cipher_suite).ok_or_else(|| {
        FlightError::fatal(
            AlertDescription::IllegalParameter,
            Error::UnexpectedMessage("server selected unsupported suite".into()),
        )
    })?;
    ctx.state.cipher_suite = Some(suite);
    ctx.state.remote_random = hello.random;
    ctx.state.session_id = hello.session_id.clone();

    let mut cid_negotiated = false;
    for ext in &hello.extensions {
        match ext {
            Extension::ExtendedMasterSecret => {
                if ctx.config.extended_master_secret != ExtendedMasterSecretType::Disable {
                    ctx.state.extended_master_secret = true;
                }
            }
            Extension::UseSrtp { profiles, .. } => {
                let selected = profiles.first().copied();
                match selected {
                    Some(p) if ctx.config.srtp_protection_profiles.contains(&p) => {
                        ctx.state.srtp_profile = Some(p);
                    }
                    _ => {
                        return Err(FlightError::fatal(
                            AlertDescription::IllegalParameter,
                            Error::UnexpectedMessage("server selected unoffered SRTP profile".into()),
                        ));
                    }
                }
            }
            Extension::Alpn(protocols) => {
                let selected = protocols.first().cloned().filter(|p| {
                    ctx.config.supported_protocols.contains(p)
                });
                match selected {
                    Some(p) => ctx.state.alpn_protocol = Some(p),
                    None => {
                        return Err(FlightError::fatal(
                            AlertDescription::NoApplicationProtocol,
                            Error::UnexpectedMessage("server selected unoffered protocol".into()),
                        ));
                    }
                }
            }
            Extension::ConnectionId(cid) => {
                if ctx.state.local_connection_id.is_empty() {
                    // We never offered CID; the server must not negotiate it.
                    return Err(FlightError::fatal(
                        AlertDescription::IllegalParameter,
                        Error::UnexpectedMessage("unsolicited connection id".into()),
                    ));
                }
                cid_negotiated = true;
                ctx.state.remote_connection_id = cid.clone();
            }
            _ => {}
        }
    }

    // The server did not echo the connection_id extension: CID is off for
    // both directions, and inbound records stay bare.
    if !cid_negotiated {
        ctx.state.local_connection_id.clear();
    }

    if ctx.config.extended_master_secret == ExtendedMasterSecretType::Require
        && !ctx.state.extended_master_secret
    {
        return Err(FlightError::fatal(
            AlertDescription::InsufficientSecurity,
            Error::UnexpectedMessage("server does not support extended master secret".into()),
        ));
    }

    Ok(())
}

fn parse_server_key_exchange(
    ctx: &FlightCtx,
    body: &[u8],
) -> Result<ServerKeyExchange, FlightError> {
    let kx = ctx
        .state
        .cipher_suite
        .as_ref()
        .map(|s| s.key_exchange())
        .unwrap_or(crypto::KeyExchangeAlgorithm::Ecdhe);
    let parsed = match kx {
        crypto::KeyExchangeAlgorithm::Ecdhe => ServerKeyExchange::parse_ecdh(body),
        crypto::KeyExchangeAlgorithm::Psk => ServerKeyExchange::parse_psk(body),
    };
    let (_, ske) = parsed.map_err(|e| {
        FlightError::fatal(AlertDescription::DecodeError, Error::from(e))
    })?;
    Ok(ske)
}

fn verify_peer_chain(ctx: &FlightCtx, chain: &[Vec<u8>]) -> Result<(), FlightError> {
    if chain.is_empty() {
        return Err(FlightError::fatal(
            AlertDescription::BadCertificate,
            Error::CertificateError("empty server certificate".into()),
        ));
    }
    if ctx.config.insecure_skip_verify {
        return Ok(());
    }
    let verifier = ctx.config.cert_verifier.as_ref().ok_or_else(|| {
        FlightError::fatal(
            AlertDescription::BadCertificate,
            Error::CertificateError(
                "no certificate verifier configured; set one or insecure_skip_verify".into(),
            ),
        )
    })?;
    verifier.verify(chain).map_err(|e| {
        FlightError::fatal(AlertDescription::BadCertificate, e)
    })
}

fn process_ecdh_params(ctx: &mut FlightCtx, ske: ServerKeyExchange) -> Result<(), FlightError> {
    let ServerKeyExchange::Ecdh {
        curve,
        public_key,
        scheme,
        signature,
    } = ske
    else {
        return Err(FlightError::internal(Error::UnexpectedMessage(
            "PSK key exchange in ECDHE flight".into(),
        )));
    };

    if !ctx.config.elliptic_curves.contains(&curve) {
        return Err(FlightError::fatal(
            AlertDescription::IllegalParameter,
            Error::UnexpectedMessage("server picked unoffered curve".into()),
        ));
    }
    if !allowed_signature_schemes(ctx.config).contains(&scheme) {
        return Err(FlightError::fatal(
            AlertDescription::IllegalParameter,
            Error::UnexpectedMessage("server signed with unoffered scheme".into()),
        ));
    }

    // Signature covers client_random || server_random || ServerECDHParams
    // (RFC 8422 Section 5.4).
    let mut message = Vec::new();
    message.extend_from_slice(&ctx.state.local_random.bytes());
    message.extend_from_slice(&ctx.state.remote_random.bytes());
    message.extend_from_slice(&ServerKeyExchange::ecdh_params(curve, &public_key));

    let leaf = &ctx.state.peer_certificates[0];
    verify_signature(leaf, scheme, &message, &signature).map_err(|e| {
        FlightError::fatal(AlertDescription::HandshakeFailure, e)
    })?;

    ctx.state.named_curve = curve;
    ctx.state.remote_kx_public = public_key;
    Ok(())
}
