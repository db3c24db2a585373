//! The handshake state machine: preparing → sending → waiting → finished,
//! with retransmission on a jittered exponential backoff.
//!
//! Runs on its own thread, rendezvousing with the reader loop through the
//! handshake signal channel. After the handshake completes the machine
//! stays alive to answer retransmissions of the peer's last flight.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use crate::conn::{ConnInner, HandshakeSignal};
use crate::crypto::CookieGenerator;
use crate::flight::{Flight, FlightCtx, FlightError, Packet};
use crate::message::AlertDescription;
use crate::timer::ExponentialBackoff;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeState {
    Preparing,
    Sending,
    Waiting,
    Finished,
}

pub(crate) struct HandshakeFsm {
    conn: Arc<ConnInner>,
    cookie_gen: CookieGenerator,
    flight: Flight,
    backoff: ExponentialBackoff,
    saved_flight: Vec<Packet>,
}

impl HandshakeFsm {
    pub fn new(conn: Arc<ConnInner>) -> HandshakeFsm {
        let backoff = ExponentialBackoff::new(
            conn.config.flight_interval,
            conn.config.flight_retries,
        );
        let flight = Flight::initial(conn.is_client);
        HandshakeFsm {
            conn,
            cookie_gen: CookieGenerator::new(),
            flight,
            backoff,
            saved_flight: Vec::new(),
        }
    }

    /// Drive the handshake to completion, then serve retransmit requests
    /// until the connection closes. The first outcome is reported through
    /// `done_tx`.
    pub fn run(mut self, rx: Receiver<HandshakeSignal>, done_tx: SyncSender<Result<(), Error>>) {
        let mut state = HandshakeState::Preparing;

        loop {
            if let Some(err) = self.conn.take_handshake_error() {
                let _ = done_tx.try_send(Err(err));
                return;
            }
            if self.conn.is_closed() {
                let _ = done_tx.try_send(Err(Error::ConnectionClosed));
                return;
            }

            let step = match state {
                HandshakeState::Preparing => self.prepare(),
                HandshakeState::Sending => self.send(),
                HandshakeState::Waiting => self.wait(&rx),
                HandshakeState::Finished => {
                    self.finished(&rx, &done_tx);
                    return;
                }
            };

            state = match step {
                Ok(next) => next,
                Err(fe) => {
                    if let Some(alert) = fe.alert {
                        let _ = self.conn.notify_alert(alert);
                    }
                    warn!("handshake failed in {}: {}", self.flight, fe.error);
                    let _ = done_tx.try_send(Err(fe.error));
                    return;
                }
            };
        }
    }

    fn prepare(&mut self) -> Result<HandshakeState, FlightError> {
        debug!("preparing {}", self.flight);
        let packets = {
            let mut state = self.conn.state.lock().expect("state poisoned");
            let cache = self.conn.cache.lock().expect("cache poisoned");
            let mut ctx = FlightCtx {
                state: &mut state,
                cache: &cache,
                config: &self.conn.config,
                cookie_gen: &self.cookie_gen,
            };
            self.flight.generate(&mut ctx)?
        };
        self.saved_flight = packets;
        self.backoff.reset();
        Ok(HandshakeState::Sending)
    }

    fn send(&mut self) -> Result<HandshakeState, FlightError> {
        // Sending an epoch-1 record (the Finished after ChangeCipherSpec)
        // moves the local epoch forward first.
        for p in &self.saved_flight {
            if p.epoch > self.conn.local_epoch.load(Ordering::SeqCst) {
                self.conn.local_epoch.store(p.epoch, Ordering::SeqCst);
            }
        }

        if !self.saved_flight.is_empty() {
            debug!("sending {}", self.flight);
            self.conn
                .write_packets(&self.saved_flight)
                .map_err(|e| match e {
                    Error::SequenceOverflow => FlightError::fatal(
                        AlertDescription::InternalError,
                        Error::SequenceOverflow,
                    ),
                    other => FlightError::internal(other),
                })?;
        }

        if self.flight.is_last_send_flight() {
            Ok(HandshakeState::Finished)
        } else {
            Ok(HandshakeState::Waiting)
        }
    }

    fn wait(&mut self, rx: &Receiver<HandshakeSignal>) -> Result<HandshakeState, FlightError> {
        loop {
            // Flight 0 has sent nothing; there is nothing to retransmit,
            // so park until the first hello arrives.
            let timeout = if self.saved_flight.is_empty() {
                Duration::from_secs(3600)
            } else {
                self.backoff.rto()
            };

            match rx.recv_timeout(timeout) {
                Ok(signal) => {
                    if self.conn.is_closed() {
                        return Err(FlightError {
                            alert: None,
                            error: Error::ConnectionClosed,
                        });
                    }
                    if let Some(err) = self.conn.take_handshake_error() {
                        return Err(FlightError { alert: None, error: err });
                    }

                    let transition = self.try_parse();
                    // Ack the reader only after parsing, so a retransmitted
                    // peer flight is answered before more input is read.
                    drop(signal);
                    let transition = transition?;

                    match transition {
                        Some(next) if next == self.flight && next.is_last_recv_flight() => {
                            return Ok(HandshakeState::Finished);
                        }
                        Some(next) => {
                            debug!("{} -> {}", self.flight, next);
                            self.flight = next;
                            return Ok(HandshakeState::Preparing);
                        }
                        None => {
                            let peer_retransmitted = self
                                .conn
                                .fragments
                                .lock()
                                .expect("fragments poisoned")
                                .take_retransmit_seen();
                            if peer_retransmitted && !self.saved_flight.is_empty() {
                                debug!("peer retransmitted; resending {}", self.flight);
                                return Ok(HandshakeState::Sending);
                            }
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.saved_flight.is_empty() {
                        continue;
                    }
                    if self.backoff.can_retry() {
                        self.backoff.attempt();
                        debug!("retransmitting {}", self.flight);
                        return Ok(HandshakeState::Sending);
                    }
                    return Err(FlightError {
                        alert: None,
                        error: Error::HandshakeTimeout("flight retries exhausted"),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FlightError {
                        alert: None,
                        error: Error::ConnectionClosed,
                    });
                }
            }
        }
    }

    // Parse the current flight; replay early next-epoch records once keys
    // are installed, then parse again so a queued Finished counts.
    fn try_parse(&mut self) -> Result<Option<Flight>, FlightError> {
        loop {
            let parsed = {
                let mut state = self.conn.state.lock().expect("state poisoned");
                let cache = self.conn.cache.lock().expect("cache poisoned");
                let mut ctx = FlightCtx {
                    state: &mut state,
                    cache: &cache,
                    config: &self.conn.config,
                    cookie_gen: &self.cookie_gen,
                };
                self.flight.parse(&mut ctx)?
            };

            if parsed.is_none() && self.conn.replay_queued_packets() {
                continue;
            }
            if parsed.is_some() {
                // A transition may also have unlocked the queue (e.g. the
                // server deriving keys while CCS and Finished wait).
                self.conn.replay_queued_packets();
            }
            return Ok(parsed);
        }
    }

    fn finished(&mut self, rx: &Receiver<HandshakeSignal>, done_tx: &SyncSender<Result<(), Error>>) {
        self.conn.set_handshake_completed();
        let _ = done_tx.try_send(Ok(()));
        debug!("handshake completed ({})", if self.conn.is_client { "client" } else { "server" });

        // The peer may lose our last flight and retransmit its own; keep
        // answering until the connection goes away.
        while let Ok(signal) = rx.recv() {
            let peer_retransmitted = self
                .conn
                .fragments
                .lock()
                .expect("fragments poisoned")
                .take_retransmit_seen();
            drop(signal);

            if self.conn.is_closed() {
                return;
            }
            if peer_retransmitted && !self.saved_flight.is_empty() {
                debug!("answering peer retransmit of {}", self.flight);
                if self.conn.write_packets(&self.saved_flight).is_err() {
                    return;
                }
            }
        }
    }
}
