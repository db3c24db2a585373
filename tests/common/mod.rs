//! Shared test harness: an in-memory datagram pipe standing in for UDP,
//! with hooks for dropping or rewriting outbound traffic and moving the
//! apparent source address.
#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;

use dtls12::{Config, DatagramSocket, DtlsCertificate};

/// Rewrites one outbound datagram into the datagrams to actually put on
/// the wire: empty = swallow (lost, or held back for later), several =
/// release buffered traffic. Lets a test drop a single record out of a
/// flight or replay a flight in a different order.
pub type OutboundFilter = dyn Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync;

pub struct PipeSocket {
    local: Mutex<SocketAddr>,
    tx: Sender<(Vec<u8>, SocketAddr)>,
    rx: Mutex<Receiver<(Vec<u8>, SocketAddr)>>,
    timeout: Mutex<Option<Duration>>,
    // Drop this many outbound datagrams before letting traffic through.
    drop_outbound: AtomicUsize,
    filter: Mutex<Option<Box<OutboundFilter>>>,
}

impl PipeSocket {
    /// Two connected endpoints with distinct fake addresses.
    pub fn pair() -> (PipeSocket, PipeSocket) {
        let a_addr: SocketAddr = "10.0.0.1:4444".parse().unwrap();
        let b_addr: SocketAddr = "10.0.0.2:5555".parse().unwrap();
        let (a_tx, b_rx) = channel();
        let (b_tx, a_rx) = channel();
        (
            PipeSocket {
                local: Mutex::new(a_addr),
                tx: a_tx,
                rx: Mutex::new(a_rx),
                timeout: Mutex::new(None),
                drop_outbound: AtomicUsize::new(0),
                filter: Mutex::new(None),
            },
            PipeSocket {
                local: Mutex::new(b_addr),
                tx: b_tx,
                rx: Mutex::new(b_rx),
                timeout: Mutex::new(None),
                drop_outbound: AtomicUsize::new(0),
                filter: Mutex::new(None),
            },
        )
    }

    /// Silently drop the next `n` datagrams sent from this endpoint.
    pub fn drop_next_outbound(&self, n: usize) {
        self.drop_outbound.store(n, Ordering::SeqCst);
    }

    /// Install an [`OutboundFilter`] over everything this endpoint sends.
    pub fn set_outbound_filter(
        &self,
        f: impl Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync + 'static,
    ) {
        *self.filter.lock().unwrap() = Some(Box::new(f));
    }

    /// Change the source address later datagrams appear to come from,
    /// simulating an address migration behind a NAT rebinding.
    pub fn set_reported_addr(&self, addr: SocketAddr) {
        *self.local.lock().unwrap() = addr;
    }
}

impl DatagramSocket for PipeSocket {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let rx = self.rx.lock().unwrap();
        let timeout = *self.timeout.lock().unwrap();
        let (data, from) = match timeout {
            Some(t) => rx.recv_timeout(t).map_err(|e| match e {
                RecvTimeoutError::Timeout => io::Error::from(io::ErrorKind::WouldBlock),
                RecvTimeoutError::Disconnected => {
                    io::Error::from(io::ErrorKind::ConnectionAborted)
                }
            })?,
            None => rx
                .recv()
                .map_err(|_| io::Error::from(io::ErrorKind::ConnectionAborted))?,
        };
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok((n, from))
    }

    fn send_to(&self, buf: &[u8], _addr: SocketAddr) -> io::Result<usize> {
        let remaining = self.drop_outbound.load(Ordering::SeqCst);
        if remaining > 0 {
            self.drop_outbound.store(remaining - 1, Ordering::SeqCst);
            return Ok(buf.len());
        }
        let from = *self.local.lock().unwrap();
        if let Some(filter) = &*self.filter.lock().unwrap() {
            for datagram in filter(buf) {
                let _ = self.tx.send((datagram, from));
            }
            return Ok(buf.len());
        }
        let _ = self.tx.send((buf.to_vec(), from));
        Ok(buf.len())
    }

    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        *self.timeout.lock().unwrap() = dur;
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(*self.local.lock().unwrap())
    }
}

pub fn identity() -> DtlsCertificate {
    dtls12::generate_self_signed_certificate().unwrap()
}

/// Client/server configs that trust each other blindly and retransmit
/// fast enough for tests.
pub fn fast_configs() -> (Config, Config) {
    let client = Config::builder()
        .insecure_skip_verify(true)
        .flight_interval(Duration::from_millis(100))
        .build();
    let server = Config::builder()
        .certificates(vec![identity()])
        .flight_interval(Duration::from_millis(100))
        .build();
    (client, server)
}
