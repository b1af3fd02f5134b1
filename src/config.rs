//! Configuration knobs exposed to callers of the core (spec §6). Shaped
//! after the teacher's `config.rs` `ServerConfig`/`ClientConfig`/
//! `WebSocketConfig` split, generalized to carry the handshake-side policy
//! (origins, locations, subprotocols, auth) spec.md §4.F requires.

use crate::auth::{Credentials, DigestTokenFn};
use crate::extension::Extension;
use std::sync::Arc;

#[derive(Clone)]
pub struct WebSocketConfig {
    pub max_frame_size: usize,
    pub max_message_size: usize,
    /// Subprotocols this side supports, in preference order.
    pub subprotocols: Vec<String>,
    /// Extensions this side supports. The client offers them in this
    /// order; the server's order is irrelevant to negotiation (the
    /// client's offer order governs, per spec §4.D).
    pub extensions: Vec<Arc<dyn Extension>>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_frame_size: 16 << 20,
            max_message_size: 64 << 20,
            subprotocols: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ServerConfig {
    pub websocket: WebSocketConfig,
    /// Empty means "accept any origin".
    pub trusted_origins: Vec<String>,
    /// Empty means "accept any location".
    pub allowed_locations: Vec<String>,
    pub tls: Option<Arc<rustls::ServerConfig>>,
}

#[derive(Clone)]
pub struct ClientConfig {
    pub websocket: WebSocketConfig,
    pub origin: Option<String>,
    pub credentials: Option<Credentials>,
    /// Required to retry a 401 Digest challenge (spec.md §1 treats Digest
    /// token construction as an external, opaque collaborator). Without
    /// one, a Digest challenge fails the handshake with
    /// `Error::UnsupportedAuthScheme`.
    pub digest_token_fn: Option<DigestTokenFn>,
    pub max_redirects: usize,
    pub tls: Option<Arc<rustls::ClientConfig>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            websocket: WebSocketConfig::default(),
            origin: None,
            credentials: None,
            digest_token_fn: None,
            max_redirects: 10,
            tls: None,
        }
    }
}
