//! Reassembly of handshake messages fragmented across records.
//!
//! Fragments are keyed by `(message_sequence, epoch)` and may arrive out of
//! order, duplicated, or overlapping (later bytes win). Messages pop out
//! strictly in `message_sequence` order; a gap blocks later messages even
//! when they are already complete.

use std::collections::HashMap;

use crate::message::handshake::HandshakeHeader;
use crate::message::MessageType;
use crate::Error;

// Upper bound on buffered fragment bytes, against misbehaving peers.
const MAX_BUFFERED_BYTES: usize = 1_000_000;

#[derive(Debug)]
struct Partial {
    msg_type: MessageType,
    total: usize,
    buf: Vec<u8>,
    /// Received [start, end) ranges, sorted and coalesced.
    ranges: Vec<(usize, usize)>,
}

impl Partial {
    fn new(msg_type: MessageType, total: usize) -> Partial {
        Partial {
            msg_type,
            total,
            buf: vec![0; total],
            ranges: Vec::new(),
        }
    }

    fn insert(&mut self, offset: usize, data: &[u8]) {
        let end = offset + data.len();
        if end > self.total {
            return; // fragment exceeds declared message length
        }
        self.buf[offset..end].copy_from_slice(data);

        self.ranges.push((offset, end));
        self.ranges.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(self.ranges.len());
        for &(s, e) in self.ranges.iter() {
            match merged.last_mut() {
                Some(last) if s <= last.1 => last.1 = last.1.max(e),
                _ => merged.push((s, e)),
            }
        }
        self.ranges = merged;
    }

    fn is_complete(&self) -> bool {
        self.ranges == [(0, self.total)] || (self.total == 0 && !self.ranges.is_empty())
    }
}

/// Per-connection reassembly buffer.
pub struct FragmentBuffer {
    /// Keyed by `(message_sequence, epoch)`: a fragment arriving under a
    /// different epoch never touches another epoch's partial message.
    partials: HashMap<(u16, u16), Partial>,
    current_message_sequence: u16,
    buffered_bytes: usize,
    saw_retransmit: bool,
}

impl FragmentBuffer {
    pub fn new() -> FragmentBuffer {
        FragmentBuffer {
            partials: HashMap::new(),
            current_message_sequence: 0,
            buffered_bytes: 0,
            saw_retransmit: false,
        }
    }

    /// Feed the plaintext content of one handshake record. A record may
    /// concatenate several handshake fragments; all are consumed.
    pub fn push(&mut self, mut content: &[u8], epoch: u16) -> Result<(), Error> {
        while !content.is_empty() {
            let (rest, header) = HandshakeHeader::parse(content).map_err(Error::from)?;
            let frag_len = header.fragment_length as usize;
            if rest.len() < frag_len {
                return Err(Error::InvalidPacket);
            }
            let (data, rest) = rest.split_at(frag_len);
            content = rest;

            if header.message_sequence < self.current_message_sequence {
                // A fragment of a message already delivered: the peer is
                // retransmitting its previous flight.
                self.saw_retransmit = true;
                continue;
            }

            let key = (header.message_sequence, epoch);
            if !self.partials.contains_key(&key) {
                if self.buffered_bytes + header.length as usize > MAX_BUFFERED_BYTES {
                    debug!(
                        "fragment buffer full, dropping fragment (seq: {})",
                        header.message_sequence
                    );
                    continue;
                }
                self.buffered_bytes += header.length as usize;
                self.partials
                    .insert(key, Partial::new(header.msg_type, header.length as usize));
            }
            // unwrap: inserted above if absent.
            let partial = self.partials.get_mut(&key).unwrap();

            // A zero-length message (e.g. ServerHelloDone) completes on its
            // header alone.
            if header.length == 0 {
                partial.ranges = vec![(0, 0)];
                continue;
            }

            partial.insert(header.fragment_offset as usize, data);
        }
        Ok(())
    }

    /// Pop the next complete message in sequence order, reassembled to a
    /// single-fragment wire message (12-byte header, offset 0). Returns the
    /// epoch it arrived on. `None` while the next-in-order message has gaps.
    /// Should the same sequence number show up on two epochs, only a
    /// complete one is delivered.
    pub fn pop(&mut self) -> Option<(Vec<u8>, u16)> {
        let seq = self.current_message_sequence;
        let key = self
            .partials
            .iter()
            .filter(|(key, partial)| key.0 == seq && partial.is_complete())
            .map(|(key, _)| *key)
            .next()?;
        // unwrap: the key was just found.
        let partial = self.partials.remove(&key).unwrap();
        self.buffered_bytes = self.buffered_bytes.saturating_sub(partial.total);

        let header = HandshakeHeader {
            msg_type: partial.msg_type,
            length: partial.total as u32,
            message_sequence: seq,
            fragment_offset: 0,
            fragment_length: partial.total as u32,
        };
        let mut out = Vec::with_capacity(HandshakeHeader::LEN + partial.total);
        header.serialize(&mut out);
        out.extend_from_slice(&partial.buf);

        self.current_message_sequence = seq.wrapping_add(1);
        Some((out, key.1))
    }

    /// True once a fragment below the delivery cursor arrived since the
    /// last call: the peer retransmitted a flight we already consumed.
    /// Clears the flag.
    pub fn take_retransmit_seen(&mut self) -> bool {
        std::mem::take(&mut self.saw_retransmit)
    }
}

impl Default for FragmentBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::handshake::{assemble, fragment};

    fn push_all(buf: &mut FragmentBuffer, frags: &[Vec<u8>], epoch: u16) {
        for f in frags {
            buf.push(f, epoch).unwrap();
        }
    }

    #[test]
    fn single_fragment_message() {
        let mut buf = FragmentBuffer::new();
        let msg = assemble(MessageType::ClientHello, 0, b"hello body");
        buf.push(&msg, 0).unwrap();

        let (out, epoch) = buf.pop().unwrap();
        assert_eq!(out, msg);
        assert_eq!(epoch, 0);
        assert!(buf.pop().is_none());
    }

    #[test]
    fn reverse_order_fragments_reassemble() {
        let mut buf = FragmentBuffer::new();
        let body: Vec<u8> = (0..200u8).collect();
        let mut frags = fragment(MessageType::Certificate, 0, &body, 64);
        frags.reverse();
        push_all(&mut buf, &frags, 0);

        let (out, _) = buf.pop().unwrap();
        assert_eq!(out, assemble(MessageType::Certificate, 0, &body));
    }

    #[test]
    fn every_permutation_of_fragments_reassembles() {
        let body: Vec<u8> = (0..90u8).collect();
        let frags = fragment(MessageType::Certificate, 0, &body, 30);
        assert_eq!(frags.len(), 3);

        let orders: &[[usize; 3]] = &[
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let mut buf = FragmentBuffer::new();
            for &i in order {
                buf.push(&frags[i], 0).unwrap();
            }
            let (out, _) = buf.pop().expect("complete for every permutation");
            assert_eq!(out, assemble(MessageType::Certificate, 0, &body));
        }
    }

    #[test]
    fn overlapping_fragments_later_bytes_win() {
        let mut buf = FragmentBuffer::new();
        let body = [1u8, 2, 3, 4, 5, 6];

        // Two overlapping fragments covering [0,4) and [2,6); the second
        // rewrites bytes 2..4 with the true values.
        let mut first = Vec::new();
        HandshakeHeader {
            msg_type: MessageType::Certificate,
            length: 6,
            message_sequence: 0,
            fragment_offset: 0,
            fragment_length: 4,
        }
        .serialize(&mut first);
        first.extend_from_slice(&[1, 2, 9, 9]);

        let mut second = Vec::new();
        HandshakeHeader {
            msg_type: MessageType::Certificate,
            length: 6,
            message_sequence: 0,
            fragment_offset: 2,
            fragment_length: 4,
        }
        .serialize(&mut second);
        second.extend_from_slice(&[3, 4, 5, 6]);

        buf.push(&first, 0).unwrap();
        buf.push(&second, 0).unwrap();

        let (out, _) = buf.pop().unwrap();
        assert_eq!(&out[HandshakeHeader::LEN..], &body);
    }

    #[test]
    fn gap_blocks_later_messages() {
        let mut buf = FragmentBuffer::new();
        // Message 1 complete, message 0 missing.
        let msg1 = assemble(MessageType::ServerHello, 1, b"second");
        buf.push(&msg1, 0).unwrap();
        assert!(buf.pop().is_none());

        let msg0 = assemble(MessageType::ClientHello, 0, b"first");
        buf.push(&msg0, 0).unwrap();

        let (out0, _) = buf.pop().unwrap();
        assert_eq!(out0, msg0);
        let (out1, _) = buf.pop().unwrap();
        assert_eq!(out1, msg1);
    }

    #[test]
    fn multiple_messages_in_one_record() {
        let mut buf = FragmentBuffer::new();
        let mut record = assemble(MessageType::ClientHello, 0, b"a");
        record.extend_from_slice(&assemble(MessageType::ServerHello, 1, b"bb"));
        buf.push(&record, 0).unwrap();

        assert!(buf.pop().is_some());
        assert!(buf.pop().is_some());
        assert!(buf.pop().is_none());
    }

    #[test]
    fn below_cursor_fragment_flags_retransmit() {
        let mut buf = FragmentBuffer::new();
        let msg0 = assemble(MessageType::ClientHello, 0, b"x");
        buf.push(&msg0, 0).unwrap();
        buf.pop().unwrap();
        assert!(!buf.take_retransmit_seen());

        // The same message again: below the cursor now.
        buf.push(&msg0, 0).unwrap();
        assert!(buf.take_retransmit_seen());
        assert!(!buf.take_retransmit_seen());
        assert!(buf.pop().is_none());
    }

    #[test]
    fn same_sequence_on_two_epochs_stays_separate() {
        let mut buf = FragmentBuffer::new();
        // An incomplete message at sequence 0 on epoch 0...
        let body: Vec<u8> = (0..60u8).collect();
        let frags = fragment(MessageType::Certificate, 0, &body, 40);
        buf.push(&frags[0], 0).unwrap();
        assert!(buf.pop().is_none());

        // ...is untouched by a complete message with the same sequence on
        // epoch 1, which is delivered under its own epoch.
        let fin = assemble(MessageType::Finished, 0, b"verify data!");
        buf.push(&fin, 1).unwrap();
        let (out, epoch) = buf.pop().unwrap();
        assert_eq!(out, fin);
        assert_eq!(epoch, 1);
    }

    #[test]
    fn zero_length_message_completes() {
        let mut buf = FragmentBuffer::new();
        let msg = assemble(MessageType::ServerHelloDone, 0, &[]);
        buf.push(&msg, 0).unwrap();
        let (out, _) = buf.pop().unwrap();
        assert_eq!(out, msg);
    }
}
