//! A synchronous WebSocket (RFC 6455) implementation.
//!
//! This crate offers the frame codec, fragmentation/assembly, the HTTP
//! Upgrade handshake (both client and server sides), a generic extension
//! hook pipeline (with `deflate-frame` as the shipped worked example), and
//! the connection-level control-frame state machine, all running over a
//! blocking [`std::net::TcpStream`] (optionally wrapped in `rustls` for
//! `wss://`). Accepting connections on a listener and spawning a thread per
//! connection is left to the caller: construct a [`Transport`] from an
//! accepted `TcpStream`, call [`accept`], and drive the resulting
//! [`Connection`] however fits your server.

pub mod assembler;
pub mod auth;
pub mod config;
pub mod connection;
pub mod deflate;
pub mod error;
pub mod extension;
pub mod frame;
pub mod handshake;
pub mod message;
pub mod request;
pub mod transport;

pub use config::{ClientConfig, ServerConfig, WebSocketConfig};
pub use connection::{Connection, Event, Handler};
pub use error::{Error, Result};
pub use message::Message;
pub use transport::Transport;

/// Runs the client handshake against `ws_url` and returns a ready
/// [`Connection`]. Opens its own TCP (and, for `wss://`, TLS) connection.
pub fn connect(ws_url: &str, config: &ClientConfig) -> Result<Connection> {
    let connected = handshake::client::connect(ws_url, config)?;
    Ok(Connection::new(
        connected.transport,
        connected.hooks_send,
        connected.hooks_recv,
        true,
        config.websocket.max_frame_size,
        config.websocket.max_message_size,
    ))
}

/// Runs the server handshake over an already-accepted transport and returns
/// a ready [`Connection`]. Callers own the listen loop and thread spawning;
/// this only drives the one Upgrade exchange.
pub fn accept(transport: Transport, config: &ServerConfig) -> Result<Connection> {
    let accepted = handshake::server::accept(transport, config)?;
    Ok(Connection::new(
        accepted.transport,
        accepted.hooks_send,
        accepted.hooks_recv,
        false,
        config.websocket.max_frame_size,
        config.websocket.max_message_size,
    ))
}
