//! Loss recovery and fragmentation: flights survive dropped datagrams and
//! dropped single fragments via retransmission, and large handshake
//! messages split across records.

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use common::{identity, PipeSocket};
use dtls12::message::handshake::HandshakeHeader;
use dtls12::message::record::{unpack_datagram, Record};
use dtls12::message::ContentType;
use dtls12::{listen, Config, Error};

#[test]
fn server_flight_loss_is_recovered_by_retransmission() {
    let (client_sock, server_sock) = PipeSocket::pair();

    // Swallow the server's first transmissions of its hello flight. The
    // client's retransmit timer re-sends ClientHello, the server answers
    // the retransmission, and the handshake still completes.
    server_sock.drop_next_outbound(2);

    let client_config = Config::builder()
        .insecure_skip_verify(true)
        .flight_interval(Duration::from_millis(100))
        .build();
    let server_config = Config::builder()
        .certificates(vec![identity()])
        .flight_interval(Duration::from_millis(100))
        .build();

    let server = thread::spawn(move || listen(server_sock, server_config));
    let client = dtls12::connect(
        client_sock,
        "10.0.0.2:5555".parse().unwrap(),
        client_config,
    )
    .expect("handshake completes despite loss");
    let server = server.join().unwrap().expect("server side completes");

    client.write(b"after loss").unwrap();
    let mut buf = [0u8; 64];
    let n = server.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"after loss");
}

#[test]
fn client_flight_loss_is_recovered_by_retransmission() {
    let (client_sock, server_sock) = PipeSocket::pair();

    // Lose the client's first two hello transmissions.
    client_sock.drop_next_outbound(2);

    let client_config = Config::builder()
        .insecure_skip_verify(true)
        .flight_interval(Duration::from_millis(100))
        .build();
    let server_config = Config::builder()
        .certificates(vec![identity()])
        .flight_interval(Duration::from_millis(100))
        .build();

    let server = thread::spawn(move || listen(server_sock, server_config));
    let client = dtls12::connect(
        client_sock,
        "10.0.0.2:5555".parse().unwrap(),
        client_config,
    )
    .expect("handshake completes despite loss");
    let server = server.join().unwrap().expect("server side completes");

    server.write(b"still here").unwrap();
    let mut buf = [0u8; 64];
    let n = client.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"still here");
}

#[test]
fn small_mtu_fragments_certificate_flight() {
    let (client_sock, server_sock) = PipeSocket::pair();

    // A 260-byte MTU forces the Certificate message (and most of the
    // flight) to fragment across several records and datagrams; the
    // fragment buffer reassembles them in order.
    let client_config = Config::builder()
        .insecure_skip_verify(true)
        .mtu(260)
        .flight_interval(Duration::from_millis(100))
        .build();
    let server_config = Config::builder()
        .certificates(vec![identity()])
        .mtu(260)
        .flight_interval(Duration::from_millis(100))
        .build();

    let server = thread::spawn(move || listen(server_sock, server_config));
    let client = dtls12::connect(
        client_sock,
        "10.0.0.2:5555".parse().unwrap(),
        client_config,
    )
    .expect("fragmented handshake completes");
    let server = server.join().unwrap().expect("server side completes");

    client.write(b"fragmented").unwrap();
    let mut buf = [0u8; 64];
    let n = server.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"fragmented");
}

// Watches the server's hello flight (messages 2..=4: Certificate,
// ServerKeyExchange, ServerHelloDone) on its way out.
#[derive(Default)]
struct FlightTap {
    // Records of the first transmission, held back for reordered release.
    held: Vec<Vec<u8>>,
    flushed: bool,
    dropped: bool,
    // Message sequences seen going out again after the loss.
    resent: HashSet<u16>,
}

#[test]
fn lost_fragment_forces_full_flight_retransmission() {
    let (client_sock, server_sock) = PipeSocket::pair();

    // A 120-byte MTU fragments Certificate and ServerKeyExchange across
    // several records. The filter delivers the server's hello flight in
    // reverse record order and eats exactly one fragment: the last one of
    // message 3 (ServerKeyExchange). Reassembly must hold the flight back
    // at the gap, and the server must answer with the flight in full.
    let tap = Arc::new(Mutex::new(FlightTap::default()));
    let tap_in_filter = tap.clone();
    server_sock.set_outbound_filter(move |datagram| {
        let mut tap = tap_in_filter.lock().unwrap();
        let Ok(records) = unpack_datagram(datagram, 0) else {
            return vec![datagram.to_vec()];
        };

        let mut release: Vec<Vec<u8>> = Vec::new();
        let mut passthrough: Vec<u8> = Vec::new();
        for raw in records {
            let header = Record::parse(raw, 0).ok().and_then(|(_, record)| {
                if record.header.epoch == 0
                    && record.header.content_type == ContentType::Handshake
                {
                    HandshakeHeader::parse(record.body).ok().map(|(_, h)| h)
                } else {
                    None
                }
            });
            let Some(h) = header.filter(|h| h.message_sequence >= 2) else {
                passthrough.extend_from_slice(raw);
                continue;
            };

            if tap.flushed {
                // The flight going out again after the loss.
                tap.resent.insert(h.message_sequence);
                passthrough.extend_from_slice(raw);
                continue;
            }

            let last_fragment = h.fragment_offset + h.fragment_length == h.length;
            if h.message_sequence == 3 && last_fragment && !tap.dropped {
                // The one fragment the network eats.
                tap.dropped = true;
            } else {
                tap.held.push(raw.to_vec());
            }
            if h.message_sequence == 4 {
                // Flight fully sent: deliver what "arrived", newest first.
                let held = std::mem::take(&mut tap.held);
                release.extend(held.into_iter().rev());
                tap.flushed = true;
            }
        }

        let mut out = Vec::new();
        if !passthrough.is_empty() {
            out.push(passthrough);
        }
        out.extend(release);
        out
    });

    let client_config = Config::builder()
        .insecure_skip_verify(true)
        .mtu(120)
        .flight_interval(Duration::from_millis(100))
        .build();
    let server_config = Config::builder()
        .certificates(vec![identity()])
        .mtu(120)
        .flight_interval(Duration::from_millis(100))
        .build();

    let server = thread::spawn(move || listen(server_sock, server_config));
    let client = dtls12::connect(
        client_sock,
        "10.0.0.2:5555".parse().unwrap(),
        client_config,
    )
    .expect("handshake completes despite the lost fragment");
    let server = server.join().unwrap().expect("server side completes");

    {
        let tap = tap.lock().unwrap();
        assert!(tap.dropped, "the targeted fragment was never sent");
        // The whole flight is retransmitted, not just the missing piece.
        for seq in 2..=4u16 {
            assert!(
                tap.resent.contains(&seq),
                "message {} missing from the retransmitted flight",
                seq
            );
        }
    }

    client.write(b"recovered").unwrap();
    let mut buf = [0u8; 64];
    let n = server.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"recovered");
}

#[test]
fn replayed_application_record_is_delivered_once() {
    // Replay protection is validated at the unit level; here we check the
    // end-to-end behavior that two writes yield exactly two reads even
    // with duplicate-free reliable transport underneath.
    let (client_sock, server_sock) = PipeSocket::pair();
    let client_config = Config::builder()
        .insecure_skip_verify(true)
        .flight_interval(Duration::from_millis(100))
        .build();
    let server_config = Config::builder()
        .certificates(vec![identity()])
        .flight_interval(Duration::from_millis(100))
        .build();

    let server = thread::spawn(move || listen(server_sock, server_config));
    let client = dtls12::connect(
        client_sock,
        "10.0.0.2:5555".parse().unwrap(),
        client_config,
    )
    .unwrap();
    let server = server.join().unwrap().unwrap();

    client.write(b"one").unwrap();
    client.write(b"two").unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(server.read(&mut buf).unwrap(), 3);
    assert_eq!(server.read(&mut buf).unwrap(), 3);

    // Nothing further: a read with a deadline times out.
    server.set_read_deadline(Some(std::time::Instant::now() + Duration::from_millis(100)));
    assert!(matches!(
        server.read(&mut buf),
        Err(Error::DeadlineExceeded)
    ));
}
