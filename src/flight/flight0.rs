//! Flight 0: the server waits for the first ClientHello and negotiates the
//! session parameters out of it.

use super::{select_cipher_suite, Flight, FlightCtx, FlightError};
use crate::cache::PullRule;
use crate::config::{ClientHelloInfo, ExtendedMasterSecretType};
use crate::crypto::CipherSuite;
use crate::message::{
    extension, AlertDescription, ClientHello, Extension, MessageType, NamedCurve,
};
use crate::Error;

pub(super) fn parse(ctx: &mut FlightCtx) -> Result<Option<Flight>, FlightError> {
    let start = ctx.state.handshake_recv_sequence;
    let Some((next_seq, msgs)) = ctx.cache.full_pull_map(
        start,
        &[PullRule::required(MessageType::ClientHello, 0, true)],
    ) else {
        return Ok(None);
    };

    let (_, hello) = ClientHello::parse(msgs[0].body()).map_err(|e| {
        FlightError::fatal(AlertDescription::DecodeError, Error::from(e))
    })?;

    process_client_hello(ctx, &hello)?;

    // The server random is fixed from here on, across any cookie exchange.
    ctx.state.local_random = super::new_hello_random(ctx.config);

    ctx.state.handshake_recv_sequence = next_seq;

    if ctx.config.insecure_skip_verify_hello {
        Ok(Some(Flight::Flight4))
    } else {
        Ok(Some(Flight::Flight2))
    }
}

/// Digest a ClientHello into negotiated state. Runs for both the initial
/// and the cookie-bearing hello; all updates are idempotent.
pub(super) fn process_client_hello(
    ctx: &mut FlightCtx,
    hello: &ClientHello,
) -> Result<(), FlightError> {
    if hello.client_version.major != 0xFE {
        return Err(FlightError::fatal(
            AlertDescription::ProtocolVersion,
            Error::UnexpectedMessage("not a DTLS hello".into()),
        ));
    }
    if !hello.compression_methods.iter().any(|m| m.0 == 0) {
        return Err(FlightError::fatal(
            AlertDescription::IllegalParameter,
            Error::UnexpectedMessage("null compression not offered".into()),
        ));
    }

    ctx.state.remote_random = hello.random;
    ctx.state.remote_offered_suites = hello.cipher_suites.clone();

    for ext in &hello.extensions {
        match ext {
            Extension::ServerName(name) => {
                ctx.state.remote_server_name = name.clone();
            }
            Extension::SupportedGroups(groups) => {
                ctx.state.remote_offered_curves = groups.clone();
            }
            Extension::SignatureAlgorithms(schemes) => {
                ctx.state.remote_signature_schemes = schemes.clone();
            }
            Extension::UseSrtp { profiles, .. } => {
                ctx.state.srtp_profile = ctx
                    .config
                    .srtp_protection_profiles
                    .iter()
                    .find(|p| profiles.contains(*p))
                    .copied();
            }
            Extension::Alpn(protocols) => {
                let selected = ctx
                    .config
                    .supported_protocols
                    .iter()
                    .find(|p| protocols.contains(*p))
                    .cloned();
                if selected.is_none() && !ctx.config.supported_protocols.is_empty() {
                    return Err(FlightError::fatal(
                        AlertDescription::NoApplicationProtocol,
                        Error::UnexpectedMessage("no common ALPN protocol".into()),
                    ));
                }
                ctx.state.alpn_protocol = selected;
            }
            Extension::ExtendedMasterSecret => {
                if ctx.config.extended_master_secret != ExtendedMasterSecretType::Disable {
                    ctx.state.extended_master_secret = true;
                }
            }
            Extension::ConnectionId(cid) => {
                // CID is only negotiated when both sides send the
                // extension; without a generator we ignore the offer
                // entirely (RFC 9146 Section 3).
                if let Some(generate) = &ctx.config.connection_id_generator {
                    ctx.state.remote_requested_cid = true;
                    // The CID the client wants to receive under.
                    ctx.state.remote_connection_id = cid.clone();
                    if ctx.state.local_connection_id.is_empty() {
                        ctx.state.local_connection_id = generate();
                    }
                }
            }
            _ => {}
        }
    }

    if ctx.config.extended_master_secret == ExtendedMasterSecretType::Require
        && !ctx.state.extended_master_secret
    {
        return Err(FlightError::fatal(
            AlertDescription::InsufficientSecurity,
            Error::UnexpectedMessage("peer does not support extended master secret".into()),
        ));
    }

    // Curve: first client curve we also support; X25519 when the client
    // sent no supported_groups at all.
    let curve = if ctx.state.remote_offered_curves.is_empty() {
        NamedCurve::X25519
    } else {
        *ctx.state
            .remote_offered_curves
            .iter()
            .find(|c| ctx.config.elliptic_curves.contains(*c))
            .ok_or_else(|| {
                FlightError::fatal(
                    AlertDescription::InsufficientSecurity,
                    Error::UnexpectedMessage("no mutually supported curve".into()),
                )
            })?
    };
    ctx.state.named_curve = curve;

    let info = ClientHelloInfo {
        server_name: ctx.state.remote_server_name.clone(),
        cipher_suites: hello.cipher_suites.clone(),
    };
    let suite_id = select_cipher_suite(ctx.config, &hello.cipher_suites, &info)?;
    // unwrap can't fail: select only returns implemented suites.
    ctx.state.cipher_suite = Some(CipherSuite::new(suite_id).unwrap());

    // Session id offered by the client; a fresh one is issued in flight 4.
    ctx.state.session_id = hello.session_id.clone();

    // The cookie the client echoed (empty in the initial hello).
    ctx.state.cookie = hello.cookie.clone();

    let _ = extension::find(&hello.extensions, extension::code::RENEGOTIATION_INFO);

    Ok(())
}
