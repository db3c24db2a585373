//! Flight 5: the client's certificate/key-exchange flight ending in its
//! Finished, then the wait for the server's.

use subtle::ConstantTimeEq;

use super::flight4::{certificate_verify_rules, merge_transcript, server_finished_rules};
use super::{next_send_sequence, Flight, FlightCtx, FlightError, Packet, PacketContent};
use crate::cache::PullRule;
use crate::certificate::DtlsCertificate;
use crate::config::CertificateRequestInfo;
use crate::crypto::{self, prf, EcdhKeypair, ParsedKey};
use crate::message::handshake::assemble;
use crate::message::{
    AlertDescription, Certificate, CertificateRequest, CertificateVerify, ClientKeyExchange,
    ContentType, Finished, MessageType,
};
use crate::Error;

pub(super) fn generate(ctx: &mut FlightCtx) -> Result<Vec<Packet>, FlightError> {
    let (kx, hash) = {
        let suite = ctx.state.cipher_suite.as_ref().ok_or_else(|| {
            FlightError::internal(Error::UnexpectedMessage("no cipher suite selected".into()))
        })?;
        (suite.key_exchange(), suite.hash())
    };

    let mut packets = Vec::new();
    // Wire bytes of this flight's messages, appended to the cached
    // transcript as we go; they are not in the cache until sent.
    let mut flight_raw = Vec::new();

    let client_cert = if ctx.state.certificate_requested {
        resolve_client_certificate(ctx)
    } else {
        None
    };

    if ctx.state.certificate_requested {
        // An empty certificate list is legal when we hold none.
        let chain = client_cert
            .as_ref()
            .map(|c| vec![c.certificate.clone()])
            .unwrap_or_default();
        let mut body = Vec::new();
        Certificate {
            certificates: chain,
        }
        .serialize(&mut body);
        let seq = next_send_sequence(ctx.state);
        flight_raw.extend_from_slice(&assemble(MessageType::Certificate, seq, &body));
        packets.push(Packet::handshake(MessageType::Certificate, seq, body));
    }

    // ClientKeyExchange and the pre-master secret.
    let (cke_body, pms) = match kx {
        crypto::KeyExchangeAlgorithm::Ecdhe => {
            let keypair = EcdhKeypair::generate(ctx.state.named_curve)
                .map_err(FlightError::internal)?;
            let pms = keypair
                .pre_master_secret(&ctx.state.remote_kx_public)
                .map_err(|e| FlightError::fatal(AlertDescription::IllegalParameter, e))?;
            let mut body = Vec::new();
            ClientKeyExchange::Ecdh {
                public_key: keypair.public.clone(),
            }
            .serialize(&mut body);
            ctx.state.local_keypair = Some(keypair);
            (body, pms)
        }
        crypto::KeyExchangeAlgorithm::Psk => {
            let psk_callback = ctx.config.psk.as_ref().ok_or_else(|| {
                FlightError::internal(Error::InvalidConfig("PSK suite without callback".into()))
            })?;
            let psk = psk_callback(&ctx.state.psk_identity_hint)
                .map_err(FlightError::internal)?;
            let mut body = Vec::new();
            ClientKeyExchange::Psk {
                identity: ctx.config.psk_identity_hint.clone(),
            }
            .serialize(&mut body);
            (body, prf::psk_pre_master_secret(&psk))
        }
    };
    let cke_seq = next_send_sequence(ctx.state);
    flight_raw.extend_from_slice(&assemble(MessageType::ClientKeyExchange, cke_seq, &cke_body));
    packets.push(Packet::handshake(
        MessageType::ClientKeyExchange,
        cke_seq,
        cke_body,
    ));

    // Transcript through ClientKeyExchange: the cached server flight plus
    // our not-yet-sent messages.
    let mut transcript = merge_transcript(ctx.cache, &cached_server_rules());
    transcript.extend_from_slice(&flight_raw);

    let client_random = ctx.state.local_random.bytes();
    let server_random = ctx.state.remote_random.bytes();
    *ctx.state.pre_master_secret = pms;

    let master = if ctx.state.extended_master_secret {
        let session_hash =
            prf::hash_transcript(&transcript, hash).map_err(FlightError::internal)?;
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

    // CertificateVerify over the transcript so far.
    if let Some(cert) = &client_cert {
        let key = ParsedKey::try_parse(&cert.private_key).map_err(FlightError::internal)?;
        let scheme = key.scheme();
        if !ctx.state.remote_signature_schemes.is_empty()
            && !ctx.state.remote_signature_schemes.contains(&scheme)
        {
            return Err(FlightError::fatal(
                AlertDescription::InsufficientSecurity,
                Error::UnexpectedMessage("server does not accept our signature scheme".into()),
            ));
        }
        let signature = key.sign(&transcript).map_err(FlightError::internal)?;
        let mut body = Vec::new();
        CertificateVerify { scheme, signature }.serialize(&mut body);
        let seq = next_send_sequence(ctx.state);
        transcript.extend_from_slice(&assemble(MessageType::CertificateVerify, seq, &body));
        packets.push(Packet::handshake(MessageType::CertificateVerify, seq, body));
    }

    // Install our keys before ChangeCipherSpec goes out.
    {
        let suite = ctx.state.cipher_suite.as_mut().expect("suite selected");
        suite
            .init(&master, &client_random, &server_random, true)
            .map_err(FlightError::internal)?;
    }
    if let Some(key_log) = &ctx.config.key_log {
        key_log.log("CLIENT_RANDOM", &client_random, &master);
    }

    packets.push(Packet {
        content: PacketContent::Raw {
            content_type: ContentType::ChangeCipherSpec,
            payload: vec![0x01],
        },
        epoch: 0,
        should_encrypt: false,
    });

    let verify_data =
        prf::verify_data_client(&master, &transcript, hash).map_err(FlightError::internal)?;
    let mut fin_body = Vec::new();
    Finished { verify_data }.serialize(&mut fin_body);
    let fin_seq = next_send_sequence(ctx.state);
    packets.push(
        Packet::handshake(MessageType::Finished, fin_seq, fin_body)
            .at_epoch(1)
            .encrypted(),
    );

    Ok(packets)
}

pub(super) fn parse(ctx: &mut FlightCtx) -> Result<Option<Flight>, FlightError> {
    let hash = ctx
        .state
        .cipher_suite
        .as_ref()
        .map(|s| s.hash())
        .ok_or_else(|| {
            FlightError::internal(Error::UnexpectedMessage("no cipher suite selected".into()))
        })?;

    let start = ctx.state.handshake_recv_sequence;
    let rules = [PullRule::required(MessageType::Finished, 1, false)];
    let Some((next_seq, msgs)) = ctx.cache.full_pull_map(start, &rules) else {
        return Ok(None);
    };
    let (_, finished) = Finished::parse(msgs[0].body()).map_err(|e| {
        FlightError::fatal(AlertDescription::DecodeError, Error::from(e))
    })?;

    let transcript = merge_transcript(ctx.cache, &server_finished_rules());
    let expected = prf::verify_data_server(&ctx.state.master_secret, &transcript, hash)
        .map_err(FlightError::internal)?;
    if !bool::from(expected.ct_eq(&finished.verify_data)) {
        return Err(FlightError::fatal(
            AlertDescription::HandshakeFailure,
            Error::CryptoError("server verify_data mismatch".into()),
        ));
    }

    ctx.state.handshake_recv_sequence = next_seq;

    // Persist the session for resumption once the server is authenticated.
    if let Some(store) = &ctx.config.session_store {
        if !ctx.state.session_id.is_empty() {
            let key = session_key(ctx);
            let _ = store.set(
                &key,
                crate::config::Session {
                    id: ctx.state.session_id.clone(),
                    secret: ctx.state.master_secret.to_vec(),
                },
            );
        }
    }

    // Terminal: the FSM moves to Finished on a last-recv flight.
    Ok(Some(Flight::Flight5))
}

fn session_key(ctx: &FlightCtx) -> Vec<u8> {
    // ServerName can be a bare host; the underscore never occurs in either
    // an address or a DNS name.
    format!("{}_{}", ctx.state.peer_addr, ctx.config.server_name).into_bytes()
}

fn resolve_client_certificate(ctx: &FlightCtx) -> Option<DtlsCertificate> {
    if let Some(get) = &ctx.config.get_client_certificate {
        let info = CertificateRequestInfo {
            acceptable_cas: cached_certificate_authorities(ctx),
            signature_schemes: ctx.state.remote_signature_schemes.clone(),
        };
        return get(&info).ok();
    }
    ctx.config.certificates.first().cloned()
}

fn cached_certificate_authorities(ctx: &FlightCtx) -> Vec<Vec<u8>> {
    let rules = [PullRule::required(MessageType::CertificateRequest, 0, false)];
    let merged = ctx.cache.pull_and_merge(&rules);
    if merged.len() <= crate::message::HandshakeHeader::LEN {
        return Vec::new();
    }
    CertificateRequest::parse(&merged[crate::message::HandshakeHeader::LEN..])
        .map(|(_, r)| r.certificate_authorities)
        .unwrap_or_default()
}

// The transcript prefix already in the cache when flight 5 is generated:
// our hello plus the server's flight, in wire order.
fn cached_server_rules() -> Vec<PullRule> {
    certificate_verify_rules()
        .into_iter()
        .filter(|r| !r.is_client || r.typ == MessageType::ClientHello)
        .collect()
}
