//! The HTTP Upgrade handshake (spec §4.F): server `accept` and client
//! `connect`. Grounded on the teacher's `handshake.rs` accept-key derivation
//! (SHA-1 + GUID + base64) and 101 response template, generalized with the
//! origin/location/subprotocol/extension negotiation and the client-side
//! auth-retry/redirect-follow loop the teacher never implemented.

pub mod client;
pub mod server;

use base64::prelude::*;
use sha1::{Digest, Sha1};

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// `Sec-WebSocket-Accept: base64(sha1(key + GUID))`, RFC 6455 §1.3.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.trim().as_bytes());
    hasher.update(GUID.as_bytes());
    BASE64_STANDARD.encode(hasher.finalize())
}

pub fn generate_client_key() -> String {
    let nonce: [u8; 16] = rand::random();
    BASE64_STANDARD.encode(nonce)
}
