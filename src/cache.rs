//! Ordered store of sent and received handshake messages.
//!
//! Each entry is a complete wire message (12-byte header, single fragment).
//! The cache feeds two consumers: flight parsers pulling typed message sets
//! with sequence-continuity checks, and transcript assembly for Finished,
//! CertificateVerify and the Extended Master Secret session hash.

use crate::crypto::prf::hash_transcript;
use crate::message::handshake::HandshakeHeader;
use crate::message::{HashAlgorithm, MessageType};
use crate::Error;

/// One cached handshake message.
#[derive(Debug, Clone)]
pub struct CachedMessage {
    pub message_sequence: u16,
    pub epoch: u16,
    pub is_client: bool,
    pub typ: MessageType,
    /// Full wire message: header with `fragment_offset == 0` plus body.
    pub data: Vec<u8>,
}

impl CachedMessage {
    /// The message body without the handshake header.
    pub fn body(&self) -> &[u8] {
        &self.data[HandshakeHeader::LEN..]
    }
}

/// Selects messages out of the cache: `(type, epoch, sender, optional)`.
#[derive(Debug, Clone, Copy)]
pub struct PullRule {
    pub typ: MessageType,
    pub epoch: u16,
    pub is_client: bool,
    pub optional: bool,
}

impl PullRule {
    pub fn required(typ: MessageType, epoch: u16, is_client: bool) -> PullRule {
        PullRule {
            typ,
            epoch,
            is_client,
            optional: false,
        }
    }

    pub fn optional(typ: MessageType, epoch: u16, is_client: bool) -> PullRule {
        PullRule {
            typ,
            epoch,
            is_client,
            optional: true,
        }
    }
}

/// Append-only handshake message log.
#[derive(Default)]
pub struct HandshakeCache {
    cache: Vec<CachedMessage>,
}

impl HandshakeCache {
    pub fn new() -> HandshakeCache {
        HandshakeCache::default()
    }

    /// Store a message. Duplicates (same type, epoch, sender and sequence)
    /// are dropped so retransmits do not corrupt transcripts.
    pub fn push(
        &mut self,
        data: Vec<u8>,
        epoch: u16,
        message_sequence: u16,
        typ: MessageType,
        is_client: bool,
    ) -> bool {
        let duplicate = self.cache.iter().any(|m| {
            m.typ == typ
                && m.epoch == epoch
                && m.is_client == is_client
                && m.message_sequence == message_sequence
        });
        if duplicate {
            return false;
        }
        self.cache.push(CachedMessage {
            message_sequence,
            epoch,
            is_client,
            typ,
            data,
        });
        true
    }

    // The latest matching message wins: after a cookie exchange both
    // ClientHellos are cached, and transcripts must use the second one
    // (RFC 6347 Section 4.2.1 excludes the initial hello).
    fn find(&self, rule: &PullRule) -> Option<&CachedMessage> {
        self.cache
            .iter()
            .filter(|m| m.typ == rule.typ && m.epoch == rule.epoch && m.is_client == rule.is_client)
            .max_by_key(|m| m.message_sequence)
    }

    /// Pull the messages matching `rules`, verifying that the found
    /// messages carry contiguous sequence numbers starting at `start_seq`.
    /// Returns the next expected sequence and the matches in rule order.
    /// `None` when a required message is missing or the sequence has gaps —
    /// the flight is not complete yet.
    pub fn full_pull_map(
        &self,
        start_seq: u16,
        rules: &[PullRule],
    ) -> Option<(u16, Vec<CachedMessage>)> {
        let mut out = Vec::with_capacity(rules.len());
        let mut seq = start_seq;

        for rule in rules {
            match self.find(rule) {
                Some(m) => {
                    if m.message_sequence != seq {
                        return None;
                    }
                    seq = seq.wrapping_add(1);
                    out.push(m.clone());
                }
                None if rule.optional => {}
                None => return None,
            }
        }

        Some((seq, out))
    }

    /// Concatenate the raw bytes of the messages matching `rules`, in rule
    /// order, skipping absentees. This is the transcript fed to the PRF.
    pub fn pull_and_merge(&self, rules: &[PullRule]) -> Vec<u8> {
        let mut out = Vec::new();
        for rule in rules {
            if let Some(m) = self.find(rule) {
                out.extend_from_slice(&m.data);
            }
        }
        out
    }

    /// Transcript hash as of ClientKeyExchange (RFC 7627 session_hash),
    /// with `additional` appended before hashing (the caller's own
    /// ClientKeyExchange when it has not been pushed yet).
    pub fn session_hash(
        &self,
        hash: HashAlgorithm,
        epoch: u16,
        additional: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let mut merged = self.pull_and_merge(&[
            PullRule::required(MessageType::ClientHello, epoch, true),
            PullRule::required(MessageType::ServerHello, epoch, false),
            PullRule::required(MessageType::Certificate, epoch, false),
            PullRule::required(MessageType::ServerKeyExchange, epoch, false),
            PullRule::required(MessageType::CertificateRequest, epoch, false),
            PullRule::required(MessageType::ServerHelloDone, epoch, false),
            PullRule::required(MessageType::Certificate, epoch, true),
            PullRule::required(MessageType::ClientKeyExchange, epoch, true),
        ]);
        merged.extend_from_slice(additional);
        hash_transcript(&merged, hash)
    }
}
