//! Flight 2: the server answers the initial ClientHello with a stateless
//! cookie challenge and waits for the echo.

use super::{flight0, next_send_sequence, Flight, FlightCtx, FlightError, Packet};
use crate::cache::PullRule;
use crate::message::{
    AlertDescription, ClientHello, HelloVerifyRequest, MessageType, ProtocolVersion,
};
use crate::Error;

pub(super) fn generate(ctx: &mut FlightCtx) -> Result<Vec<Packet>, FlightError> {
    // RFC 6347 Section 4.2.2: the cookie exchange restarts the server's
    // message sequence; the HelloVerifyRequest mirrors the hello's seq 0.
    ctx.state.handshake_send_sequence = 0;

    let cookie = ctx.cookie_gen.generate(
        &ctx.state.peer_addr,
        &ctx.state.remote_random.bytes(),
        &ctx.state.remote_offered_suites,
        &ctx.state.remote_offered_curves,
    );

    let hvr = HelloVerifyRequest {
        version: ProtocolVersion::DTLS1_2,
        cookie,
    };
    let mut body = Vec::new();
    hvr.serialize(&mut body);

    let seq = next_send_sequence(ctx.state);
    Ok(vec![Packet::handshake(
        MessageType::HelloVerifyRequest,
        seq,
        body,
    )])
}

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

    // The echo must reuse the original client random; a different one
    // breaks the cookie binding and the key schedule.
    if hello.random != ctx.state.remote_random {
        return Err(FlightError::fatal(
            AlertDescription::IllegalParameter,
            Error::UnexpectedMessage("client random changed across cookie exchange".into()),
        ));
    }

    let cookie_ok = ctx.cookie_gen.verify(
        &hello.cookie,
        &ctx.state.peer_addr,
        &hello.random.bytes(),
        &hello.cipher_suites,
        &offered_curves(&hello),
    );
    if !cookie_ok {
        return Err(FlightError::fatal(
            AlertDescription::HandshakeFailure,
            Error::UnexpectedMessage("cookie mismatch".into()),
        ));
    }

    flight0::process_client_hello(ctx, &hello)?;

    ctx.state.handshake_recv_sequence = next_seq;
    Ok(Some(Flight::Flight4))
}

fn offered_curves(hello: &ClientHello) -> Vec<crate::message::NamedCurve> {
    use crate::message::Extension;
    hello
        .extensions
        .iter()
        .find_map(|e| match e {
            Extension::SupportedGroups(groups) => Some(groups.clone()),
            _ => None,
        })
        .unwrap_or_default()
}
