//! Flight 6: the server's ChangeCipherSpec and Finished, completing the
//! handshake.

use super::flight4::{merge_transcript, server_finished_rules};
use super::{next_send_sequence, FlightCtx, FlightError, Packet, PacketContent};
use crate::crypto::prf;
use crate::message::{ContentType, Finished, MessageType};
use crate::Error;

pub(super) fn generate(ctx: &mut FlightCtx) -> Result<Vec<Packet>, FlightError> {
    let hash = ctx
        .state
        .cipher_suite
        .as_ref()
        .map(|s| s.hash())
        .ok_or_else(|| {
            FlightError::internal(Error::UnexpectedMessage("no cipher suite selected".into()))
        })?;

    // The server Finished covers the whole handshake including the
    // client's Finished on epoch 1.
    let transcript = merge_transcript(ctx.cache, &server_finished_rules());
    let verify_data = prf::verify_data_server(&ctx.state.master_secret, &transcript, hash)
        .map_err(FlightError::internal)?;

    let mut fin_body = Vec::new();
    Finished { verify_data }.serialize(&mut fin_body);
    let fin_seq = next_send_sequence(ctx.state);

    // Persist the session once we commit to completing the handshake.
    if let Some(store) = &ctx.config.session_store {
        if !ctx.state.session_id.is_empty() {
            let _ = store.set(
                &ctx.state.session_id.clone(),
                crate::config::Session {
                    id: ctx.state.session_id.clone(),
                    secret: ctx.state.master_secret.to_vec(),
                },
            );
        }
    }

    Ok(vec![
        Packet {
            content: PacketContent::Raw {
                content_type: ContentType::ChangeCipherSpec,
                payload: vec![0x01],
            },
            epoch: 0,
            should_encrypt: false,
        },
        Packet::handshake(MessageType::Finished, fin_seq, fin_body)
            .at_epoch(1)
            .encrypted(),
    ])
}
