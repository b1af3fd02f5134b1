//! End-to-end loopback coverage of the literal I/O scenarios: server
//! handshake acceptance, a single text message, a masked client frame, a
//! fragmented message, ping/pong, and the close handshake, driven through
//! the crate's public `connect`/`accept` surface rather than the unit-level
//! `Connection::new` helper the in-module tests use.

use std::net::TcpListener;
use std::thread;
use wavecore::{accept, connect, ClientConfig, Event, Message, ServerConfig};

fn spawn_server(listener: TcpListener, config: ServerConfig) -> thread::JoinHandle<wavecore::Connection> {
    thread::spawn(move || {
        let (tcp, _) = listener.accept().unwrap();
        accept(wavecore::Transport::from_tcp(tcp), &config).unwrap()
    })
}

#[test]
fn handshake_then_single_text_message_round_trips() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server_handle = spawn_server(listener, ServerConfig::default());

    let client = connect(&format!("ws://{addr}/chat"), &ClientConfig::default()).unwrap();
    let server = server_handle.join().unwrap();

    client.send(Message::Text("hello over the wire".to_string())).unwrap();
    match server.recv().unwrap() {
        Event::Message(Message::Text(text)) => assert_eq!(text, "hello over the wire"),
        _ => panic!("expected a text message"),
    }
}

#[test]
fn client_frames_are_masked_on_the_wire() {
    // The handshake itself proves masking indirectly: a server built from
    // `accept` only decodes successfully if it unmasks what the client
    // sends, since `Connection::new(.., mask_outgoing=false, ..)` on the
    // server side never masks its own frames but always expects the
    // client's to have been masked before they're unmasked in `Frame::decode`.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server_handle = spawn_server(listener, ServerConfig::default());

    let client = connect(&format!("ws://{addr}/chat"), &ClientConfig::default()).unwrap();
    let server = server_handle.join().unwrap();

    client.send(Message::Binary(vec![9, 8, 7, 6])).unwrap();
    match server.recv().unwrap() {
        Event::Message(Message::Binary(data)) => assert_eq!(data, vec![9, 8, 7, 6]),
        _ => panic!("expected a binary message"),
    }
}

#[test]
fn fragmented_message_reassembles_on_the_other_side() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server_handle = spawn_server(listener, ServerConfig::default());

    let client = connect(&format!("ws://{addr}/chat"), &ClientConfig::default()).unwrap();
    let server = server_handle.join().unwrap();

    let payload = "this message is split into several fragments on the wire".to_string();
    client.send_fragmented(Message::Text(payload.clone()), Some(8)).unwrap();
    match server.recv().unwrap() {
        Event::Message(Message::Text(text)) => assert_eq!(text, payload),
        _ => panic!("expected the reassembled text message"),
    }
}

#[test]
fn ping_pong_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server_handle = spawn_server(listener, ServerConfig::default());

    let client = connect(&format!("ws://{addr}/chat"), &ClientConfig::default()).unwrap();
    let server = server_handle.join().unwrap();

    client.ping(b"keepalive".to_vec()).unwrap();
    match server.recv().unwrap() {
        Event::Ping(payload) => assert_eq!(payload, b"keepalive"),
        _ => panic!("expected a ping event"),
    }
    match client.recv().unwrap() {
        Event::Pong(payload) => assert_eq!(payload, b"keepalive"),
        _ => panic!("expected a pong event"),
    }
}

#[test]
fn close_handshake_completes_and_drains_to_the_peers_close() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server_handle = spawn_server(listener, ServerConfig::default());

    let client = connect(&format!("ws://{addr}/chat"), &ClientConfig::default()).unwrap();
    let server = server_handle.join().unwrap();

    let closer = thread::spawn(move || client.close(Some(1000), "done"));

    match server.recv().unwrap() {
        Event::Closed(Some(1000), reason) => assert_eq!(reason, "done"),
        _ => panic!("expected a closed event"),
    }

    closer.join().unwrap().unwrap();
}

#[test]
fn server_rejects_a_request_missing_the_upgrade_header() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server_thread = thread::spawn(move || {
        let (tcp, _) = listener.accept().unwrap();
        accept(wavecore::Transport::from_tcp(tcp), &ServerConfig::default())
    });

    let mut plain = std::net::TcpStream::connect(addr).unwrap();
    use std::io::Write;
    plain
        .write_all(b"GET /chat HTTP/1.1\r\nHost: example.com\r\nSec-WebSocket-Version: 13\r\n\r\n")
        .unwrap();

    let result = server_thread.join().unwrap();
    assert!(result.is_err());
}
