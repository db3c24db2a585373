//! Flight 4: the server's hello flight, and the parse of the client's
//! answering flight 5 up to its Finished.

use subtle::ConstantTimeEq;

use super::{
    allowed_signature_schemes, next_send_sequence, server_certificate, Flight, FlightCtx,
    FlightError, Packet,
};
use crate::cache::{HandshakeCache, PullRule};
use crate::config::{ClientAuthType, ClientHelloInfo};
use crate::crypto::{self, prf, verify_signature, EcdhKeypair, ParsedKey};
use crate::message::{
    AlertDescription, Certificate, CertificateRequest, CertificateVerify, ClientKeyExchange,
    Extension, Finished, HashAlgorithm, MessageType, ProtocolVersion, ServerHello,
    ServerKeyExchange, CERT_TYPE_ECDSA_SIGN,
};
use crate::Error;

pub(super) fn generate(ctx: &mut FlightCtx) -> Result<Vec<Packet>, FlightError> {
    let (suite_id, kx, _hash) = suite_params(ctx)?;
    let info = ClientHelloInfo {
        server_name: ctx.state.remote_server_name.clone(),
        cipher_suites: ctx.state.remote_offered_suites.clone(),
    };

    // A fresh session id when persistence is on; resumption data is stored
    // under it after the handshake.
    if ctx.config.session_store.is_some() {
        use rand::RngCore;
        let mut id = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut id);
        ctx.state.session_id = id;
    } else {
        ctx.state.session_id = Vec::new();
    }

    let mut extensions = vec![Extension::RenegotiationInfo(Vec::new())];
    if kx == crypto::KeyExchangeAlgorithm::Ecdhe {
        extensions.push(Extension::EcPointFormats(vec![0]));
    }
    if let Some(profile) = ctx.state.srtp_profile {
        extensions.push(Extension::UseSrtp {
            profiles: vec![profile],
            mki: Vec::new(),
        });
    }
    if ctx.state.extended_master_secret {
        extensions.push(Extension::ExtendedMasterSecret);
    }
    if let Some(protocol) = &ctx.state.alpn_protocol {
        extensions.push(Extension::Alpn(vec![protocol.clone()]));
    }
    if ctx.state.remote_requested_cid && !ctx.state.local_connection_id.is_empty() {
        extensions.push(Extension::ConnectionId(
            ctx.state.local_connection_id.clone(),
        ));
    }

    let mut hello = ServerHello {
        version: ProtocolVersion::DTLS1_2,
        random: ctx.state.local_random,
        session_id: ctx.state.session_id.clone(),
        cipher_suite: suite_id,
        compression_method: Default::default(),
        extensions,
    };
    if let Some(hook) = &ctx.config.server_hello_message_hook {
        hook(&mut hello);
    }

    let mut packets = Vec::new();
    let mut body = Vec::new();
    hello.serialize(&mut body);
    packets.push(Packet::handshake(
        MessageType::ServerHello,
        next_send_sequence(ctx.state),
        body,
    ));

    match kx {
        crypto::KeyExchangeAlgorithm::Ecdhe => {
            let cert = server_certificate(ctx.config, &info)
                .map_err(FlightError::internal)?
                .ok_or_else(|| {
                    FlightError::internal(Error::InvalidConfig("server has no certificate".into()))
                })?;

            let mut body = Vec::new();
            Certificate {
                certificates: vec![cert.certificate.clone()],
            }
            .serialize(&mut body);
            packets.push(Packet::handshake(
                MessageType::Certificate,
                next_send_sequence(ctx.state),
                body,
            ));

            let keypair = EcdhKeypair::generate(ctx.state.named_curve)
                .map_err(FlightError::internal)?;

            let key = ParsedKey::try_parse(&cert.private_key).map_err(FlightError::internal)?;
            let scheme = key.scheme();
            if !ctx.state.remote_signature_schemes.is_empty()
                && !ctx.state.remote_signature_schemes.contains(&scheme)
            {
                return Err(FlightError::fatal(
                    AlertDescription::InsufficientSecurity,
                    Error::UnexpectedMessage("client does not accept our signature scheme".into()),
                ));
            }

            let mut message = Vec::new();
            message.extend_from_slice(&ctx.state.remote_random.bytes());
            message.extend_from_slice(&ctx.state.local_random.bytes());
            message.extend_from_slice(&ServerKeyExchange::ecdh_params(
                ctx.state.named_curve,
                &keypair.public,
            ));
            let signature = key.sign(&message).map_err(FlightError::internal)?;

            let mut body = Vec::new();
            ServerKeyExchange::Ecdh {
                curve: ctx.state.named_curve,
                public_key: keypair.public.clone(),
                scheme,
                signature,
            }
            .serialize(&mut body);
            packets.push(Packet::handshake(
                MessageType::ServerKeyExchange,
                next_send_sequence(ctx.state),
                body,
            ));

            ctx.state.local_keypair = Some(keypair);

            if ctx.config.client_auth != ClientAuthType::NoClientCert {
                let mut request = CertificateRequest {
                    certificate_types: vec![CERT_TYPE_ECDSA_SIGN],
                    signature_schemes: allowed_signature_schemes(ctx.config),
                    certificate_authorities: Vec::new(),
                };
                if let Some(hook) = &ctx.config.certificate_request_message_hook {
                    hook(&mut request);
                }
                let mut body = Vec::new();
                request.serialize(&mut body);
                packets.push(Packet::handshake(
                    MessageType::CertificateRequest,
                    next_send_sequence(ctx.state),
                    body,
                ));
            }
        }
        crypto::KeyExchangeAlgorithm::Psk => {
            if !ctx.config.psk_identity_hint.is_empty() {
                let mut body = Vec::new();
                ServerKeyExchange::Psk {
                    identity_hint: ctx.config.psk_identity_hint.clone(),
                }
                .serialize(&mut body);
                packets.push(Packet::handshake(
                    MessageType::ServerKeyExchange,
                    next_send_sequence(ctx.state),
                    body,
                ));
            }
        }
    }

    packets.push(Packet::handshake(
        MessageType::ServerHelloDone,
        next_send_sequence(ctx.state),
        Vec::new(),
    ));

    Ok(packets)
}

pub(super) fn parse(ctx: &mut FlightCtx) -> Result<Option<Flight>, FlightError> {
    let (_, kx, hash) = suite_params(ctx)?;
    let start = ctx.state.handshake_recv_sequence;

    // Probe for the optional client Certificate first; its presence decides
    // whether CertificateVerify belongs to the flight.
    let probe = [
        PullRule::optional(MessageType::Certificate, 0, true),
        PullRule::required(MessageType::ClientKeyExchange, 0, true),
    ];
    let Some((_, probe_msgs)) = ctx.cache.full_pull_map(start, &probe) else {
        return Ok(None);
    };

    let client_chain = probe_msgs
        .iter()
        .find(|m| m.typ == MessageType::Certificate)
        .map(|m| {
            Certificate::parse(m.body())
                .map(|(_, c)| c.certificates)
                .map_err(|e| FlightError::fatal(AlertDescription::DecodeError, Error::from(e)))
        })
        .transpose()?;
    let has_chain = client_chain.as_ref().map(|c| !c.is_empty()).unwrap_or(false);

    enforce_client_auth(ctx, client_chain.as_deref())?;

    let mut rules = vec![];
    if client_chain.is_some() {
        rules.push(PullRule::required(MessageType::Certificate, 0, true));
    }
    rules.push(PullRule::required(MessageType::ClientKeyExchange, 0, true));
    if has_chain {
        // A client that sent a certificate must prove possession.
        rules.push(PullRule::required(MessageType::CertificateVerify, 0, true));
    }
    let Some((after_cv, msgs)) = ctx.cache.full_pull_map(start, &rules) else {
        return Ok(None);
    };

    if let Some(chain) = client_chain {
        ctx.state.peer_certificates = chain;
    }

    // Derive the keys once, on the first pass that sees ClientKeyExchange.
    let initialized = ctx
        .state
        .cipher_suite
        .as_ref()
        .map(|s| s.is_initialized())
        .unwrap_or(false);
    if !initialized {
        let cke_msg = msgs
            .iter()
            .find(|m| m.typ == MessageType::ClientKeyExchange)
            .expect("pull rules guarantee ClientKeyExchange");
        derive_keys(ctx, kx, hash, cke_msg.body())?;
    }

    if has_chain {
        let cv_msg = msgs
            .iter()
            .find(|m| m.typ == MessageType::CertificateVerify)
            .expect("pull rules guarantee CertificateVerify");
        verify_certificate_verify(ctx, cv_msg.body())?;
    }

    // Finally the client Finished, on epoch 1.
    let fin_rule = [PullRule::required(MessageType::Finished, 1, true)];
    let Some((next_seq, fin_msgs)) = ctx.cache.full_pull_map(after_cv, &fin_rule) else {
        return Ok(None);
    };
    let (_, finished) = Finished::parse(fin_msgs[0].body()).map_err(|e| {
        FlightError::fatal(AlertDescription::DecodeError, Error::from(e))
    })?;

    let transcript = ctx.cache.pull_and_merge(&client_finished_rules());
    let expected = prf::verify_data_client(&ctx.state.master_secret, &transcript, hash)
        .map_err(FlightError::internal)?;
    if !bool::from(expected.ct_eq(&finished.verify_data)) {
        return Err(FlightError::fatal(
            AlertDescription::HandshakeFailure,
            Error::CryptoError("client verify_data mismatch".into()),
        ));
    }

    ctx.state.handshake_recv_sequence = next_seq;
    Ok(Some(Flight::Flight6))
}

fn suite_params(
    ctx: &FlightCtx,
) -> Result<(crate::message::CipherSuiteId, crypto::KeyExchangeAlgorithm, HashAlgorithm), FlightError>
{
    let suite = ctx.state.cipher_suite.as_ref().ok_or_else(|| {
        FlightError::internal(Error::UnexpectedMessage("no cipher suite selected".into()))
    })?;
    Ok((suite.id(), suite.key_exchange(), suite.hash()))
}

fn enforce_client_auth(ctx: &FlightCtx, chain: Option<&[Vec<u8>]>) -> Result<(), FlightError> {
    let has_chain = chain.map(|c| !c.is_empty()).unwrap_or(false);
    match ctx.config.client_auth {
        ClientAuthType::RequireAnyClientCert | ClientAuthType::RequireAndVerifyClientCert
            if !has_chain =>
        {
            return Err(FlightError::fatal(
                AlertDescription::HandshakeFailure,
                Error::CertificateError("client certificate required".into()),
            ));
        }
        _ => {}
    }

    let must_verify = matches!(
        ctx.config.client_auth,
        ClientAuthType::RequireAndVerifyClientCert | ClientAuthType::VerifyClientCertIfGiven
    );
    if has_chain && must_verify && !ctx.config.insecure_skip_verify {
        let verifier = ctx.config.cert_verifier.as_ref().ok_or_else(|| {
            FlightError::fatal(
                AlertDescription::BadCertificate,
                Error::CertificateError("no certificate verifier configured".into()),
            )
        })?;
        verifier
            .verify(chain.unwrap())
            .map_err(|e| FlightError::fatal(AlertDescription::BadCertificate, e))?;
    }
    Ok(())
}

fn derive_keys(
    ctx: &mut FlightCtx,
    kx: crypto::KeyExchangeAlgorithm,
    hash: HashAlgorithm,
    cke_body: &[u8],
) -> Result<(), FlightError> {
    let pms = match kx {
        crypto::KeyExchangeAlgorithm::Ecdhe => {
            let (_, cke) = ClientKeyExchange::parse_ecdh(cke_body).map_err(|e| {
                FlightError::fatal(AlertDescription::DecodeError, Error::from(e))
            })?;
            let ClientKeyExchange::Ecdh { public_key } = cke else {
                unreachable!();
            };
            let pms = {
                let keypair = ctx.state.local_keypair.as_ref().ok_or_else(|| {
                    FlightError::internal(Error::UnexpectedMessage("no local keypair".into()))
                })?;
                keypair
                    .pre_master_secret(&public_key)
                    .map_err(|e| FlightError::fatal(AlertDescription::IllegalParameter, e))?
            };
            ctx.state.remote_kx_public = public_key;
            pms
        }
        crypto::KeyExchangeAlgorithm::Psk => {
            let (_, cke) = ClientKeyExchange::parse_psk(cke_body).map_err(|e| {
                FlightError::fatal(AlertDescription::DecodeError, Error::from(e))
            })?;
            let ClientKeyExchange::Psk { identity } = cke else {
                unreachable!();
            };
            let psk_callback = ctx.config.psk.as_ref().ok_or_else(|| {
                FlightError::internal(Error::InvalidConfig("PSK suite without callback".into()))
            })?;
            let psk = psk_callback(&identity)
                .map_err(|e| FlightError::fatal(AlertDescription::UnknownCa, e))?;
            prf::psk_pre_master_secret(&psk)
        }
    };

    let client_random = ctx.state.remote_random.bytes();
    let server_random = ctx.state.local_random.bytes();
    *ctx.state.pre_master_secret = pms;

    let master = if ctx.state.extended_master_secret {
        let session_hash = ctx
            .cache
            .session_hash(hash, 0, &[])
            .map_err(FlightError::internal)?;
        prf::extended_master_secret(&ctx.state.pre_master_secret, &session_hash, hash)
    } else {
        prf::master_secret(
            &ctx.state.pre_master_secret,
            &client_random,
            &server_random,
            hash,
        )
    }
    .map_err(FlightError::internal)?;

    *ctx.state.master_secret = master.clone();

    let suite = ctx.state.cipher_suite.as_mut().expect("suite selected");
    suite
        .init(&master, &client_random, &server_random, false)
        .map_err(FlightError::internal)?;

    if let Some(key_log) = &ctx.config.key_log {
        key_log.log("CLIENT_RANDOM", &client_random, &master);
    }

    Ok(())
}

fn verify_certificate_verify(ctx: &FlightCtx, cv_body: &[u8]) -> Result<(), FlightError> {
    let (_, cv) = CertificateVerify::parse(cv_body).map_err(|e| {
        FlightError::fatal(AlertDescription::DecodeError, Error::from(e))
    })?;

    if !allowed_signature_schemes(ctx.config).contains(&cv.scheme) {
        return Err(FlightError::fatal(
            AlertDescription::IllegalParameter,
            Error::UnexpectedMessage("client signed with unacceptable scheme".into()),
        ));
    }

    // The signature covers every handshake message before CertificateVerify.
    let transcript = ctx.cache.pull_and_merge(&certificate_verify_rules());
    let leaf = &ctx.state.peer_certificates[0];
    verify_signature(leaf, cv.scheme, &transcript, &cv.signature)
        .map_err(|e| FlightError::fatal(AlertDescription::HandshakeFailure, e))
}

/// Transcript rules for the client CertificateVerify signature.
pub(super) fn certificate_verify_rules() -> Vec<PullRule> {
    vec![
        PullRule::required(MessageType::ClientHello, 0, true),
        PullRule::required(MessageType::ServerHello, 0, false),
        PullRule::required(MessageType::Certificate, 0, false),
        PullRule::required(MessageType::ServerKeyExchange, 0, false),
        PullRule::required(MessageType::CertificateRequest, 0, false),
        PullRule::required(MessageType::ServerHelloDone, 0, false),
        PullRule::required(MessageType::Certificate, 0, true),
        PullRule::required(MessageType::ClientKeyExchange, 0, true),
    ]
}

/// Transcript rules for the client Finished verify_data.
pub(super) fn client_finished_rules() -> Vec<PullRule> {
    let mut rules = certificate_verify_rules();
    rules.push(PullRule::required(MessageType::CertificateVerify, 0, true));
    rules
}

/// Transcript rules for the server Finished verify_data: everything
/// including the client Finished on epoch 1.
pub(super) fn server_finished_rules() -> Vec<PullRule> {
    let mut rules = client_finished_rules();
    rules.push(PullRule::required(MessageType::Finished, 1, true));
    rules
}

/// Helper shared with flight 5/6: merge the transcript for `rules`.
pub(super) fn merge_transcript(cache: &HandshakeCache, rules: &[PullRule]) -> Vec<u8> {
    cache.pull_and_merge(rules)
}
