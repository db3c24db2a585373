//! The connection core: one datagram socket, two cooperating loops.
//!
//! The reader loop pulls datagrams off the socket, runs the record
//! pipeline (header parse, replay check, decrypt, CID unwrap) and routes
//! plaintext to the fragment buffer, the alert handler or the decrypted
//! channel. The handshake loop (see [`crate::fsm`]) drives flights and
//! retransmission. All outbound records funnel through [`ConnInner::
//! write_packets`], which holds the connection lock while assigning
//! epoch-scoped sequence numbers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::buffer;
use crate::cache::HandshakeCache;
use crate::config::Config;
use crate::crypto::prf;
use crate::flight::{Packet, PacketContent};
use crate::fragment::FragmentBuffer;
use crate::fsm::HandshakeFsm;
use crate::message::handshake::{assemble, fragment, HandshakeHeader};
use crate::message::record::{unpack_datagram, InnerPlaintext, Record};
use crate::message::{
    Alert, AlertDescription, ContentType, ProtocolVersion, RecordHeader, SrtpProfile,
    MAX_SEQUENCE_NUMBER,
};
use crate::socket::DatagramSocket;
use crate::state::{ConnectionState, State};
use crate::window::ReplayWindow;
use crate::Error;

// Bound for records of the next epoch buffered until keys install.
const MAX_QUEUED_ENCRYPTED_PACKETS: usize = 100;

// The reader polls the socket at this granularity so it can observe
// connection shutdown.
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Wakes the handshaker after handshake records arrived. Dropping the
/// signal acks the reader so it can answer retransmissions promptly.
pub(crate) struct HandshakeSignal {
    _ack: SyncSender<()>,
}

pub(crate) struct ConnInner {
    pub config: Arc<Config>,
    pub is_client: bool,
    socket: Arc<dyn DatagramSocket>,

    pub state: Mutex<State>,
    pub local_epoch: AtomicU16,
    pub remote_epoch: AtomicU16,
    handshake_completed: AtomicBool,
    closed: AtomicBool,

    pub fragments: Mutex<FragmentBuffer>,
    pub cache: Mutex<HandshakeCache>,

    queued_packets: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    decrypted_tx: Mutex<Option<SyncSender<Result<Vec<u8>, Error>>>>,
    handshake_tx: Mutex<Option<Sender<HandshakeSignal>>>,
    handshake_error: Mutex<Option<Error>>,
}

impl ConnInner {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_handshake_completed(&self) -> bool {
        self.handshake_completed.load(Ordering::SeqCst)
    }

    pub fn set_handshake_completed(&self) {
        self.handshake_completed.store(true, Ordering::SeqCst);
    }

    pub fn take_handshake_error(&self) -> Option<Error> {
        self.handshake_error.lock().expect("error slot poisoned").take()
    }

    fn store_error(&self, err: Error) {
        if self.is_handshake_completed() {
            self.deliver(Err(err));
        } else {
            let mut slot = self.handshake_error.lock().expect("error slot poisoned");
            if slot.is_none() {
                *slot = Some(err);
            }
            // Wake the handshaker so it notices.
            self.signal_handshake();
        }
    }

    // Push into the decrypted channel, bounded, giving up on close.
    fn deliver(&self, item: Result<Vec<u8>, Error>) {
        let tx = {
            let guard = self.decrypted_tx.lock().expect("decrypted poisoned");
            match &*guard {
                Some(tx) => tx.clone(),
                None => return,
            }
        };
        let mut item = item;
        loop {
            match tx.try_send(item) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if self.is_closed() {
                        return;
                    }
                    item = back;
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    fn signal_handshake(&self) {
        let tx = {
            let guard = self.handshake_tx.lock().expect("handshake tx poisoned");
            match &*guard {
                Some(tx) => tx.clone(),
                None => return,
            }
        };
        let (ack_tx, _ack_rx) = mpsc::sync_channel(1);
        let _ = tx.send(HandshakeSignal { _ack: ack_tx });
    }

    // Signal and block until the handshaker acknowledges, so our answer to
    // a retransmitted flight goes out before we read more input.
    fn signal_handshake_and_wait(&self) {
        let tx = {
            let guard = self.handshake_tx.lock().expect("handshake tx poisoned");
            match &*guard {
                Some(tx) => tx.clone(),
                None => return,
            }
        };
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        if tx.send(HandshakeSignal { _ack: ack_tx }).is_ok() {
            // Returns with Disconnected once the handshaker drops the
            // signal.
            let _ = ack_rx.recv();
        }
    }

    /// Serialize, protect and transmit records. Holds the connection lock
    /// across sequence-number assignment so records on one epoch leave in
    /// order.
    pub fn write_packets(&self, packets: &[Packet]) -> Result<(), Error> {
        let mut state = self.state.lock().expect("state poisoned");

        let mut raw_records: Vec<Vec<u8>> = Vec::new();
        for p in packets {
            match &p.content {
                PacketContent::Handshake {
                    msg_type,
                    message_sequence,
                    body,
                } => {
                    trace!(
                        "[handshake] -> {:?} (epoch: {}, seq: {})",
                        msg_type,
                        p.epoch,
                        message_sequence
                    );
                    let full = assemble(*msg_type, *message_sequence, body);
                    self.cache.lock().expect("cache poisoned").push(
                        full,
                        p.epoch,
                        *message_sequence,
                        *msg_type,
                        state.is_client,
                    );

                    for frag in fragment(
                        *msg_type,
                        *message_sequence,
                        body,
                        self.max_fragment_body(&state, p),
                    ) {
                        let raw = self.seal_record(
                            &mut state,
                            ContentType::Handshake,
                            p.epoch,
                            p.should_encrypt,
                            &frag,
                        )?;
                        raw_records.push(raw);
                    }
                }
                PacketContent::Raw {
                    content_type,
                    payload,
                } => {
                    let raw = self.seal_record(
                        &mut state,
                        *content_type,
                        p.epoch,
                        p.should_encrypt,
                        payload,
                    )?;
                    raw_records.push(raw);
                }
            }
        }

        if raw_records.is_empty() {
            return Ok(());
        }
        let peer = state.peer_addr;
        drop(state);

        for datagram in coalesce(raw_records, self.config.mtu) {
            self.socket.send_to(&datagram, peer)?;
        }
        Ok(())
    }

    // Room left for a handshake fragment body in one record.
    fn max_fragment_body(&self, state: &State, p: &Packet) -> usize {
        let wrap_cid = p.epoch > 0 && !state.remote_connection_id.is_empty();
        let mut overhead = RecordHeader::FIXED_LEN + HandshakeHeader::LEN;
        if wrap_cid {
            // CID in the header, real-type byte in the inner plaintext.
            overhead += state.remote_connection_id.len() + 1;
        }
        if p.should_encrypt {
            overhead += crate::crypto::AEAD_OVERHEAD;
        }
        self.config.mtu.saturating_sub(overhead).max(64)
    }

    // Build the full wire bytes of one record, assigning its sequence
    // number, wrapping in a CID record and encrypting as negotiated.
    fn seal_record(
        &self,
        state: &mut State,
        content_type: ContentType,
        epoch: u16,
        should_encrypt: bool,
        payload: &[u8],
    ) -> Result<Vec<u8>, Error> {
        while state.local_sequence_number.len() <= epoch as usize {
            state.local_sequence_number.push(0);
        }
        let seq = state.local_sequence_number[epoch as usize];
        if seq >= MAX_SEQUENCE_NUMBER {
            // RFC 6347 Section 4.1: abandon or rehandshake before wrap.
            return Err(Error::SequenceOverflow);
        }
        state.local_sequence_number[epoch as usize] = seq + 1;

        let wrap_cid = epoch > 0 && !state.remote_connection_id.is_empty();
        if wrap_cid {
            let zeros = self
                .config
                .padding_length_generator
                .as_ref()
                .map(|f| f(payload.len()))
                .unwrap_or(0);
            let inner = InnerPlaintext {
                content: payload.to_vec(),
                real_type: content_type,
                zeros,
            };
            let mut inner_raw = Vec::new();
            inner.serialize(&mut inner_raw);

            let mut header = RecordHeader {
                content_type: ContentType::Tls12Cid,
                version: ProtocolVersion::DTLS1_2,
                epoch,
                sequence_number: seq,
                connection_id: state.remote_connection_id.clone(),
                length: 0,
            };
            let suite = state
                .cipher_suite
                .as_ref()
                .ok_or_else(|| Error::CryptoError("cipher suite not negotiated".into()))?;
            return suite.encrypt(&mut header, &inner_raw);
        }

        let mut header = RecordHeader {
            content_type,
            version: ProtocolVersion::DTLS1_2,
            epoch,
            sequence_number: seq,
            connection_id: Vec::new(),
            length: payload.len() as u16,
        };

        if should_encrypt {
            let suite = state
                .cipher_suite
                .as_ref()
                .ok_or_else(|| Error::CryptoError("cipher suite not negotiated".into()))?;
            suite.encrypt(&mut header, payload)
        } else {
            let mut out = Vec::with_capacity(header.len() + payload.len());
            header.serialize(&mut out);
            out.extend_from_slice(payload);
            Ok(out)
        }
    }

    /// Emit an alert record. Fatal alerts also invalidate any stored
    /// session (RFC 5246 Section 7.2).
    pub fn notify_alert(&self, alert: Alert) -> Result<(), Error> {
        if alert.level == crate::message::AlertLevel::Fatal {
            self.forget_session();
        }
        let mut payload = Vec::new();
        alert.serialize(&mut payload);
        let epoch = self.local_epoch.load(Ordering::SeqCst);
        self.write_packets(&[Packet {
            content: PacketContent::Raw {
                content_type: ContentType::Alert,
                payload,
            },
            epoch,
            should_encrypt: self.is_handshake_completed(),
        }])
    }

    fn forget_session(&self) {
        let Some(store) = &self.config.session_store else {
            return;
        };
        let state = self.state.lock().expect("state poisoned");
        let key = if state.is_client {
            format!("{}_{}", state.peer_addr, self.config.server_name).into_bytes()
        } else {
            state.session_id.clone()
        };
        if !key.is_empty() {
            let _ = store.del(&key);
        }
    }

    fn enqueue_encrypted(&self, peer: SocketAddr, data: &[u8]) {
        let mut queued = self.queued_packets.lock().expect("queue poisoned");
        if queued.len() < MAX_QUEUED_ENCRYPTED_PACKETS {
            debug!("queuing packet for next epoch");
            queued.push((peer, data.to_vec()));
        }
        // Overflow drops silently.
    }

    /// Run packets buffered for the next epoch back through the pipeline
    /// once keys are installed. Returns true if anything was replayed.
    pub fn replay_queued_packets(&self) -> bool {
        let ready = {
            let state = self.state.lock().expect("state poisoned");
            state
                .cipher_suite
                .as_ref()
                .map(|s| s.is_initialized())
                .unwrap_or(false)
        };
        if !ready {
            return false;
        }
        let queued = std::mem::take(&mut *self.queued_packets.lock().expect("queue poisoned"));
        if queued.is_empty() {
            return false;
        }
        for (peer, data) in queued {
            let outcome = self.handle_incoming(&data, peer, false);
            if let Some(alert) = outcome.reply {
                let _ = self.notify_alert(alert);
            }
            if let Some(err) = outcome.error {
                self.store_error(err);
            }
        }
        true
    }

    fn handle_incoming(&self, buf: &[u8], peer: SocketAddr, enqueue: bool) -> Incoming {
        let local_cid_len = {
            let state = self.state.lock().expect("state poisoned");
            state.local_connection_id.len()
        };

        // Parse errors are silently discarded (RFC 6347 Section 4.1.2.7).
        let Ok((_, record)) = Record::parse(buf, local_cid_len) else {
            debug!("discarded broken packet");
            return Incoming::none();
        };
        let header = record.header;
        let original_cid = header.content_type == ContentType::Tls12Cid;

        // Epoch gate: one epoch ahead may be queued for later, anything
        // further is dropped.
        let remote_epoch = self.remote_epoch.load(Ordering::SeqCst);
        if header.epoch > remote_epoch {
            if header.epoch > remote_epoch + 1 {
                debug!("discarded future packet {}", header);
                return Incoming::none();
            }
            if enqueue {
                self.enqueue_encrypted(peer, buf);
            }
            return Incoming::none();
        }

        // Anti-replay: pure check now, commit only after the record fully
        // processes so forgeries cannot poison the window.
        {
            let mut state = self.state.lock().expect("state poisoned");
            while state.replay.len() <= header.epoch as usize {
                state
                    .replay
                    .push(ReplayWindow::new(self.config.replay_protection_window));
            }
            if !state.replay[header.epoch as usize].check(header.sequence_number) {
                debug!("discarded duplicated packet {}", header);
                return Incoming::none();
            }
        }

        let mut content_type = header.content_type;
        let body: Vec<u8>;
        if header.epoch > 0 {
            let state = self.state.lock().expect("state poisoned");
            let suite_ready = state
                .cipher_suite
                .as_ref()
                .map(|s| s.is_initialized())
                .unwrap_or(false);
            if !suite_ready {
                drop(state);
                if enqueue {
                    self.enqueue_encrypted(peer, buf);
                }
                return Incoming::none();
            }

            // Once a CID is negotiated for us, bare records are not
            // acceptable at epoch > 0 (RFC 9146 Section 3).
            if !state.local_connection_id.is_empty() && !original_cid {
                debug!("discarded packet missing connection id");
                return Incoming::none();
            }
            if original_cid && header.connection_id != state.local_connection_id {
                debug!("discarded packet with unexpected connection id");
                return Incoming::none();
            }

            let suite = state.cipher_suite.as_ref().unwrap();
            let plaintext = match suite.decrypt(&header, record.body) {
                Ok(p) => p,
                Err(_) => {
                    debug!("decrypt failed {}", header);
                    return Incoming::none();
                }
            };
            drop(state);

            if original_cid {
                match InnerPlaintext::unmarshal(&plaintext) {
                    Ok(inner) => {
                        content_type = inner.real_type;
                        body = inner.content;
                    }
                    Err(_) => {
                        debug!("unpacking inner plaintext failed");
                        return Incoming::none();
                    }
                }
            } else {
                body = plaintext;
            }
        } else {
            body = record.body.to_vec();
        }

        match content_type {
            ContentType::Handshake => {
                {
                    let mut fragments = self.fragments.lock().expect("fragments poisoned");
                    if let Err(e) = fragments.push(&body, header.epoch) {
                        debug!("defragment failed: {}", e);
                        return Incoming::none();
                    }
                    self.commit_replay(&header);

                    let mut cache = self.cache.lock().expect("cache poisoned");
                    while let Some((msg, epoch)) = fragments.pop() {
                        let Ok((_, h)) = HandshakeHeader::parse(&msg) else {
                            continue;
                        };
                        trace!(
                            "[handshake] <- {:?} (epoch: {}, seq: {})",
                            h.msg_type,
                            epoch,
                            h.message_sequence
                        );
                        cache.push(msg, epoch, h.message_sequence, h.msg_type, !self.is_client);
                    }
                }
                Incoming::handshake()
            }
            ContentType::Alert => {
                let Ok((_, alert)) = Alert::parse(&body) else {
                    debug!("broken alert record");
                    return Incoming::none();
                };
                self.commit_replay(&header);
                trace!("<- {}", alert);

                if alert.description == AlertDescription::CloseNotify {
                    // Answer with our own close_notify (RFC 5246 7.2.1).
                    return Incoming {
                        is_handshake: false,
                        reply: Some(Alert::warning(AlertDescription::CloseNotify)),
                        error: Some(Error::ConnectionClosed),
                    };
                }
                if alert.level == crate::message::AlertLevel::Fatal {
                    return Incoming {
                        is_handshake: false,
                        reply: None,
                        error: Some(Error::HandshakeFailure(alert)),
                    };
                }
                // Warning alerts are logged and reading continues.
                Incoming::none()
            }
            ContentType::ChangeCipherSpec => {
                let suite_ready = {
                    let state = self.state.lock().expect("state poisoned");
                    state
                        .cipher_suite
                        .as_ref()
                        .map(|s| s.is_initialized())
                        .unwrap_or(false)
                };
                if !suite_ready {
                    if enqueue {
                        self.enqueue_encrypted(peer, buf);
                    }
                    return Incoming::none();
                }
                if crate::message::ChangeCipherSpec::parse(&body).is_err() {
                    debug!("broken ChangeCipherSpec");
                    return Incoming::none();
                }

                let new_remote_epoch = header.epoch + 1;
                if self.remote_epoch.load(Ordering::SeqCst) + 1 == new_remote_epoch {
                    trace!("<- ChangeCipherSpec (epoch: {})", new_remote_epoch);
                    self.remote_epoch.store(new_remote_epoch, Ordering::SeqCst);
                    let latest = self.commit_replay(&header);
                    self.maybe_update_peer(original_cid, latest, peer);
                    // Wake the handshaker: records queued for the new epoch
                    // can be replayed now.
                    return Incoming::handshake();
                }
                Incoming::none()
            }
            ContentType::ApplicationData => {
                if header.epoch == 0 {
                    return Incoming {
                        is_handshake: false,
                        reply: Some(Alert::fatal(AlertDescription::UnexpectedMessage)),
                        error: Some(Error::UnexpectedMessage(
                            "application data at epoch 0".into(),
                        )),
                    };
                }
                let latest = self.commit_replay(&header);
                self.maybe_update_peer(original_cid, latest, peer);
                self.deliver(Ok(body));
                Incoming::none()
            }
            other => Incoming {
                is_handshake: false,
                reply: Some(Alert::fatal(AlertDescription::UnexpectedMessage)),
                error: Some(Error::UnexpectedMessage(format!(
                    "unhandled content type {:?}",
                    other
                ))),
            },
        }
    }

    // Returns true when this sequence number is the latest seen for its
    // epoch.
    fn commit_replay(&self, header: &RecordHeader) -> bool {
        let mut state = self.state.lock().expect("state poisoned");
        let epoch = header.epoch as usize;
        if state.replay.len() <= epoch {
            return false;
        }
        state.replay[epoch].accept(header.sequence_number)
    }

    // RFC 9146 Section 6: the latest valid CID record updates the peer
    // address; out-of-order CID records must not.
    fn maybe_update_peer(&self, original_cid: bool, is_latest: bool, peer: SocketAddr) {
        if !original_cid || !is_latest {
            return;
        }
        let mut state = self.state.lock().expect("state poisoned");
        if state.peer_addr != peer {
            debug!("peer address moved to {}", peer);
            state.peer_addr = peer;
        }
    }

    fn close(&self, by_user: bool) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return if by_user {
                Err(Error::ConnectionClosed)
            } else {
                Ok(())
            };
        }

        if by_user && self.is_handshake_completed() {
            let _ = self.notify_alert(Alert::warning(AlertDescription::CloseNotify));
        }

        // Dropping the channel ends pending and future reads, dropping the
        // handshake sender ends the handshaker.
        *self.decrypted_tx.lock().expect("decrypted poisoned") = None;
        *self.handshake_tx.lock().expect("handshake tx poisoned") = None;
        Ok(())
    }
}

struct Incoming {
    is_handshake: bool,
    reply: Option<Alert>,
    error: Option<Error>,
}

impl Incoming {
    fn none() -> Incoming {
        Incoming {
            is_handshake: false,
            reply: None,
            error: None,
        }
    }

    fn handshake() -> Incoming {
        Incoming {
            is_handshake: true,
            reply: None,
            error: None,
        }
    }
}

// Pack consecutive records into datagrams bounded by the MTU, never
// splitting one record across datagrams.
fn coalesce(raw_records: Vec<Vec<u8>>, mtu: usize) -> Vec<Vec<u8>> {
    if raw_records.len() == 1 {
        return raw_records;
    }
    let mut out: Vec<Vec<u8>> = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    for record in raw_records {
        if !current.is_empty() && current.len() + record.len() >= mtu {
            out.push(std::mem::take(&mut current));
        }
        current.extend_from_slice(&record);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn reader_loop(inner: Arc<ConnInner>) {
    let _ = inner.socket.set_read_timeout(Some(SOCKET_POLL_INTERVAL));
    let mut buf = buffer::pop();
    buf.resize(buffer::INBOUND_BUFFER_SIZE, 0);

    loop {
        if inner.is_closed() {
            break;
        }
        let (n, peer) = match inner.socket.recv_from(&mut buf) {
            Ok(v) => v,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                if !inner.is_closed() {
                    inner.store_error(Error::Io(e));
                    let _ = inner.close(false);
                }
                break;
            }
        };

        {
            // A listener learns its peer from the first datagram.
            let mut state = inner.state.lock().expect("state poisoned");
            if !state.peer_confirmed {
                state.peer_addr = peer;
                state.peer_confirmed = true;
            }
        }

        let local_cid_len = {
            let state = inner.state.lock().expect("state poisoned");
            state.local_connection_id.len()
        };
        let records = match unpack_datagram(&buf[..n], local_cid_len) {
            Ok(r) => r,
            Err(_) => {
                // Decode errors are silently discarded
                // (RFC 6347 Section 4.1.2.7).
                debug!("discarded undecodable datagram ({} bytes)", n);
                continue;
            }
        };

        let mut has_handshake = false;
        let mut fatal = false;
        let mut sent_close_notify = false;
        for record in records {
            let outcome = inner.handle_incoming(record, peer, true);
            if let Some(alert) = outcome.reply {
                sent_close_notify |= alert.description == AlertDescription::CloseNotify;
                let _ = inner.notify_alert(alert);
            }
            if let Some(err) = outcome.error {
                fatal = true;
                inner.store_error(err);
            }
            if outcome.is_handshake {
                has_handshake = true;
            }
        }

        if has_handshake {
            inner.signal_handshake_and_wait();
        }
        if fatal {
            // Best-effort close_notify on the way down, unless one already
            // answered the peer's.
            if inner.is_handshake_completed() && !sent_close_notify {
                let _ = inner.notify_alert(Alert::warning(AlertDescription::CloseNotify));
            }
            let _ = inner.close(false);
            break;
        }
    }

    buffer::push(buf);
}

/// A DTLS 1.2 connection over a datagram socket.
///
/// Created with [`connect`](crate::connect) or [`listen`](crate::listen);
/// both return once the handshake completed. Reads and writes are safe to
/// call from separate threads.
pub struct Connection {
    inner: Arc<ConnInner>,
    decrypted_rx: Mutex<Receiver<Result<Vec<u8>, Error>>>,
    read_deadline: Mutex<Option<Instant>>,
    write_deadline: Mutex<Option<Instant>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

impl Connection {
    pub(crate) fn establish(
        socket: Arc<dyn DatagramSocket>,
        peer: Option<SocketAddr>,
        config: Config,
        is_client: bool,
    ) -> Result<Connection, Error> {
        config.validate(is_client)?;

        let mut config = config;
        // An IP literal is not a valid SNI value (RFC 6066 Section 3).
        if config.server_name.parse::<std::net::IpAddr>().is_ok() {
            config.server_name.clear();
        }
        let config = Arc::new(config);

        let placeholder: SocketAddr = "0.0.0.0:0".parse().expect("placeholder addr");
        let mut state = State::new(
            is_client,
            peer.unwrap_or(placeholder),
            config.replay_protection_window,
        );
        state.peer_confirmed = peer.is_some();
        if is_client {
            state.local_random = crate::flight::new_hello_random(&config);
        }

        let (decrypted_tx, decrypted_rx) = mpsc::sync_channel(1);
        let (handshake_tx, handshake_rx) = mpsc::channel();

        let inner = Arc::new(ConnInner {
            config,
            is_client,
            socket,
            state: Mutex::new(state),
            local_epoch: AtomicU16::new(0),
            remote_epoch: AtomicU16::new(0),
            handshake_completed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fragments: Mutex::new(FragmentBuffer::new()),
            cache: Mutex::new(HandshakeCache::new()),
            queued_packets: Mutex::new(Vec::new()),
            decrypted_tx: Mutex::new(Some(decrypted_tx)),
            handshake_tx: Mutex::new(Some(handshake_tx)),
            handshake_error: Mutex::new(None),
        });

        let (done_tx, done_rx) = mpsc::sync_channel(1);

        let reader = {
            let inner = Arc::clone(&inner);
            thread::Builder::new()
                .name("dtls12-reader".into())
                .spawn(move || reader_loop(inner))
                .map_err(|e| Error::Io(e))?
        };
        let handshaker = {
            let inner = Arc::clone(&inner);
            thread::Builder::new()
                .name("dtls12-handshake".into())
                .spawn(move || HandshakeFsm::new(inner).run(handshake_rx, done_tx))
                .map_err(|e| Error::Io(e))?
        };

        let conn = Connection {
            inner,
            decrypted_rx: Mutex::new(decrypted_rx),
            read_deadline: Mutex::new(None),
            write_deadline: Mutex::new(None),
            threads: Mutex::new(vec![reader, handshaker]),
        };

        match done_rx.recv() {
            Ok(Ok(())) => Ok(conn),
            Ok(Err(e)) => {
                let _ = conn.inner.close(false);
                conn.join_threads();
                Err(e)
            }
            Err(_) => {
                let _ = conn.inner.close(false);
                conn.join_threads();
                Err(Error::ConnectionClosed)
            }
        }
    }

    /// Read one application data record into `buf`, blocking until one is
    /// available or the read deadline passes. Returns the record length;
    /// fails with `BufferTooSmall` when `buf` cannot hold it.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let rx = self.decrypted_rx.lock().expect("read side poisoned");
        let deadline = *self.read_deadline.lock().expect("deadline poisoned");

        let item = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                let timeout = deadline
                    .checked_duration_since(now)
                    .ok_or(Error::DeadlineExceeded)?;
                rx.recv_timeout(timeout).map_err(|e| match e {
                    mpsc::RecvTimeoutError::Timeout => Error::DeadlineExceeded,
                    mpsc::RecvTimeoutError::Disconnected => Error::ConnectionClosed,
                })?
            }
            None => rx.recv().map_err(|_| Error::ConnectionClosed)?,
        };

        let data = item?;
        if buf.len() < data.len() {
            return Err(Error::BufferTooSmall);
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    /// Write `buf` as a single DTLS record. Returns once the datagram has
    /// been handed to the socket.
    pub fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        if self.inner.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        if !self.inner.is_handshake_completed() {
            return Err(Error::UnexpectedMessage("handshake in progress".into()));
        }
        if let Some(deadline) = *self.write_deadline.lock().expect("deadline poisoned") {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded);
            }
        }

        let epoch = self.inner.local_epoch.load(Ordering::SeqCst);
        self.inner.write_packets(&[Packet {
            content: PacketContent::Raw {
                content_type: ContentType::ApplicationData,
                payload: buf.to_vec(),
            },
            epoch,
            should_encrypt: true,
        }])?;
        Ok(buf.len())
    }

    /// Send close_notify (when the handshake completed), stop both loops
    /// and release the socket.
    pub fn close(&self) -> Result<(), Error> {
        let result = self.inner.close(true);
        self.join_threads();
        result
    }

    fn join_threads(&self) {
        let mut threads = self.threads.lock().expect("threads poisoned");
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }

    /// Snapshot of the negotiated parameters.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().expect("state poisoned").snapshot()
    }

    /// The negotiated SRTP protection profile, if any.
    pub fn selected_srtp_protection_profile(&self) -> Option<SrtpProfile> {
        self.inner.state.lock().expect("state poisoned").srtp_profile
    }

    /// Export keying material per RFC 5705. Reserved key-schedule labels
    /// are rejected.
    pub fn export_keying_material(&self, label: &str, length: usize) -> Result<Vec<u8>, Error> {
        if !self.inner.is_handshake_completed() {
            return Err(Error::UnexpectedMessage("handshake in progress".into()));
        }
        let state = self.inner.state.lock().expect("state poisoned");
        let suite_hash = state
            .cipher_suite
            .as_ref()
            .map(|s| s.hash())
            .ok_or_else(|| Error::CryptoError("no cipher suite".into()))?;
        let (client_random, server_random) = if state.is_client {
            (state.local_random.bytes(), state.remote_random.bytes())
        } else {
            (state.remote_random.bytes(), state.local_random.bytes())
        };
        prf::export_keying_material(
            &state.master_secret,
            label,
            &client_random,
            &server_random,
            length,
            suite_hash,
        )
    }

    /// Abort an in-flight `read` at `deadline`. `None` clears it.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        *self.read_deadline.lock().expect("deadline poisoned") = deadline;
    }

    /// Fail `write` calls made after `deadline`. `None` clears it.
    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        *self.write_deadline.lock().expect("deadline poisoned") = deadline;
    }

    /// Local socket address.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        self.inner.socket.local_addr().map_err(Error::from)
    }

    /// Current peer address (may change via CID address migration).
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.state.lock().expect("state poisoned").peer_addr
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.inner.close(true);
        // Threads exit on their own once closed; detach rather than join so
        // dropping from inside a callback cannot deadlock.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesce_respects_mtu() {
        let records = vec![vec![1u8; 500], vec![2u8; 500], vec![3u8; 500]];
        let datagrams = coalesce(records, 1200);
        assert_eq!(datagrams.len(), 2);
        assert_eq!(datagrams[0].len(), 1000);
        assert_eq!(datagrams[1].len(), 500);
    }

    #[test]
    fn coalesce_single_record_is_untouched() {
        let records = vec![vec![1u8; 2000]];
        let datagrams = coalesce(records, 1200);
        assert_eq!(datagrams.len(), 1);
        assert_eq!(datagrams[0].len(), 2000);
    }
}
