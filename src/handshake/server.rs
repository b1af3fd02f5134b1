//! Server-side accept path.

use super::accept_key;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::extension::{self, Hook};
use crate::request::{self, HttpRequest};
use crate::transport::Transport;
use log::{debug, warn};

pub struct Accepted {
    pub transport: Transport,
    pub request_path: String,
    pub subprotocol: Option<String>,
    pub hooks_send: Vec<Box<dyn Hook>>,
    pub hooks_recv: Vec<Box<dyn Hook>>,
}

pub fn accept(mut transport: Transport, config: &ServerConfig) -> Result<Accepted> {
    if let Some(tls_config) = &config.tls {
        transport.enable_tls_server(tls_config.clone())?;
    }
    transport.mark_handshake_started();

    let req = request::read_http_request(&mut transport)?;
    debug!("handshake request: {} {}", req.method, req.path);
    validate_upgrade_request(&req)?;
    validate_origin(&req, config)?;
    validate_location(&req, config)?;

    let key = req.header("sec-websocket-key").ok_or(Error::NoSecWebsocketKey)?.to_string();
    let subprotocol = negotiate_subprotocol(&req, config);
    let offers = req
        .header("sec-websocket-extensions")
        .map(extension::parse_offer_list)
        .unwrap_or_default();
    let negotiated = extension::negotiate(&offers, &config.websocket.extensions);

    let response = build_response(&key, subprotocol.as_deref(), &negotiated.accepted);
    transport.write_all(response.as_bytes())?;

    Ok(Accepted {
        transport,
        request_path: req.path,
        subprotocol,
        hooks_send: negotiated.hooks_send,
        hooks_recv: negotiated.hooks_recv,
    })
}

fn validate_upgrade_request(req: &HttpRequest) -> Result<()> {
    if req.method != "GET" {
        return Err(Error::InvalidHTTPHandshake);
    }
    if req.header("host").is_none() {
        return Err(Error::NoHostHeaderPresent);
    }
    if !req.header_contains_token("upgrade", "websocket") {
        return Err(Error::NoUpgradeHeaderPresent);
    }
    if !req.header_contains_token("connection", "upgrade") {
        return Err(Error::NoConnectionHeaderPresent);
    }
    if req.header("sec-websocket-key").is_none() {
        return Err(Error::NoSecWebsocketKey);
    }
    if req.header("sec-websocket-version") != Some("13") {
        return Err(Error::UnsupportedVersion);
    }
    Ok(())
}

fn validate_origin(req: &HttpRequest, config: &ServerConfig) -> Result<()> {
    if config.trusted_origins.is_empty() {
        return Ok(());
    }
    match req.header("origin") {
        Some(origin) => {
            if config.trusted_origins.iter().any(|o| o == origin) {
                Ok(())
            } else {
                warn!("rejecting handshake from untrusted origin {origin}");
                Err(Error::UntrustedOrigin(origin.to_string()))
            }
        }
        None if req.header("user-agent").is_some() => Err(Error::MissingOrigin),
        None => Ok(()),
    }
}

fn validate_location(req: &HttpRequest, config: &ServerConfig) -> Result<()> {
    if config.allowed_locations.is_empty() || config.allowed_locations.iter().any(|p| p == &req.path) {
        Ok(())
    } else {
        Err(Error::DisallowedLocation(req.path.clone()))
    }
}

fn negotiate_subprotocol(req: &HttpRequest, config: &ServerConfig) -> Option<String> {
    let offered = req.header("sec-websocket-protocol")?;
    offered
        .split(',')
        .map(str::trim)
        .find(|p| config.websocket.subprotocols.iter().any(|s| s == p))
        .map(str::to_string)
}

fn build_response(key: &str, subprotocol: Option<&str>, extensions: &[extension::ExtensionParams]) -> String {
    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Accept: {}\r\n",
        accept_key(key)
    );
    if let Some(protocol) = subprotocol {
        response.push_str(&format!("Sec-WebSocket-Protocol: {protocol}\r\n"));
    }
    if !extensions.is_empty() {
        response.push_str(&format!("Sec-WebSocket-Extensions: {}\r\n", extension::render_offer_list(extensions)));
    }
    response.push_str("\r\n");
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::ExtensionParams;

    fn request(headers: &[(&str, &str)]) -> HttpRequest {
        HttpRequest {
            method: "GET".to_string(),
            path: "/chat".to_string(),
            headers: headers.iter().map(|(k, v)| (k.to_lowercase(), v.to_string())).collect(),
        }
    }

    #[test]
    fn validates_a_well_formed_request() {
        let req = request(&[
            ("Host", "example.com"),
            ("Upgrade", "websocket"),
            ("Connection", "Upgrade"),
            ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ("Sec-WebSocket-Version", "13"),
        ]);
        assert!(validate_upgrade_request(&req).is_ok());
    }

    #[test]
    fn rejects_missing_upgrade_token() {
        let req = request(&[
            ("Host", "example.com"),
            ("Upgrade", "h2c"),
            ("Connection", "Upgrade"),
            ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ("Sec-WebSocket-Version", "13"),
        ]);
        assert!(matches!(validate_upgrade_request(&req), Err(Error::NoUpgradeHeaderPresent)));
    }

    #[test]
    fn rejects_untrusted_origin() {
        let req = request(&[("Origin", "https://evil.example")]);
        let config = ServerConfig {
            trusted_origins: vec!["https://good.example".to_string()],
            ..Default::default()
        };
        assert!(matches!(validate_origin(&req, &config), Err(Error::UntrustedOrigin(_))));
    }

    #[test]
    fn rejects_disallowed_location() {
        let req = request(&[]);
        let config = ServerConfig {
            allowed_locations: vec!["/ws".to_string()],
            ..Default::default()
        };
        assert!(matches!(validate_location(&req, &config), Err(Error::DisallowedLocation(_))));
    }

    #[test]
    fn negotiates_first_mutually_supported_subprotocol() {
        let req = request(&[("Sec-WebSocket-Protocol", "graphql-ws, chat")]);
        let config = ServerConfig {
            websocket: crate::config::WebSocketConfig {
                subprotocols: vec!["chat".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(negotiate_subprotocol(&req, &config), Some("chat".to_string()));
    }

    #[test]
    fn response_includes_accept_key_and_extensions() {
        let accepted = vec![ExtensionParams {
            name: "deflate-frame".to_string(),
            params: vec![],
        }];
        let response = build_response("dGhlIHNhbXBsZSBub25jZQ==", Some("chat"), &accepted);
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
        assert!(response.contains("Sec-WebSocket-Protocol: chat"));
        assert!(response.contains("Sec-WebSocket-Extensions: deflate-frame"));
    }
}
