//! Client-side connect path: handshake request, 401-retry-once, redirect
//! handling, and accept-key verification. The teacher never implemented a
//! client handshake; grounded on `original_source/websocket.py`'s retry
//! loop (redirect-follow and a single auth retry) re-expressed as a bounded
//! Rust loop instead of recursion.

use super::accept_key;
use crate::auth::{self, Credentials};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::extension::{self, Hook};
use crate::request::{self, HttpResponse};
use crate::transport::Transport;
use log::{debug, warn};

pub struct Connected {
    pub transport: Transport,
    pub subprotocol: Option<String>,
    pub hooks_send: Vec<Box<dyn Hook>>,
    pub hooks_recv: Vec<Box<dyn Hook>>,
}

pub fn connect(ws_url: &str, config: &ClientConfig) -> Result<Connected> {
    let mut url = ws_url.to_string();
    let mut redirects = 0usize;
    let mut auth_header: Option<String> = None;
    let mut auth_attempted = false;

    loop {
        let parsed = request::parse_ws_url(&url)?;
        let mut transport = Transport::connect(&parsed.host_with_port)?;
        if parsed.use_tls {
            let tls_config = config.tls.clone().ok_or(Error::TlsConfig)?;
            transport.enable_tls_client(tls_config, &parsed.host)?;
        }
        transport.mark_handshake_started();

        let key = super::generate_client_key();
        let request_text = build_request(&parsed, &key, config, auth_header.as_deref());
        transport.write_all(request_text.as_bytes())?;

        let response = request::read_http_response(&mut transport)?;
        debug!("handshake response: {}", response.status);

        match response.status {
            101 => {
                return finish(transport, &key, &response, config);
            }
            401 if !auth_attempted => {
                auth_attempted = true;
                auth_header = Some(build_auth_header(&response, config, &parsed.request_path)?);
                continue;
            }
            300..=399 => {
                redirects += 1;
                if redirects > config.max_redirects {
                    return Err(Error::TooManyRedirects(config.max_redirects));
                }
                let location = response
                    .header("location")
                    .ok_or_else(|| Error::HandshakeError("redirect response carried no Location header".to_string()))?;
                warn!("following handshake redirect to {location}");
                url = location.to_string();
                auth_header = None;
                auth_attempted = false;
                continue;
            }
            status => return Err(Error::NoUpgrade(status)),
        }
    }
}

fn build_request(parsed: &request::ParsedUrl, key: &str, config: &ClientConfig, auth_header: Option<&str>) -> String {
    let mut request_text = request::base_request_lines(parsed, key);
    if let Some(origin) = &config.origin {
        request_text.push_str(&format!("Origin: {origin}\r\n"));
    }
    if !config.websocket.subprotocols.is_empty() {
        request_text.push_str(&format!("Sec-WebSocket-Protocol: {}\r\n", config.websocket.subprotocols.join(", ")));
    }
    let offers: Vec<_> = config.websocket.extensions.iter().map(|e| e.offer()).collect();
    if !offers.is_empty() {
        request_text.push_str(&format!("Sec-WebSocket-Extensions: {}\r\n", extension::render_offer_list(&offers)));
    }
    if let Some(auth) = auth_header {
        request_text.push_str(&format!("Authorization: {auth}\r\n"));
    }
    request_text.push_str("\r\n");
    request_text
}

fn build_auth_header(response: &HttpResponse, config: &ClientConfig, request_path: &str) -> Result<String> {
    let Credentials { user, pass } = config
        .credentials
        .as_ref()
        .ok_or_else(|| Error::UnsupportedAuthScheme("no credentials configured for 401 response".to_string()))?;
    let challenge = response
        .header("www-authenticate")
        .ok_or_else(|| Error::HandshakeError("401 response carried no WWW-Authenticate header".to_string()))?;

    if challenge.trim_start().starts_with("Basic") {
        let creds = Credentials { user: user.clone(), pass: pass.clone() };
        return Ok(format!("Basic {}", auth::basic_token(&creds)));
    }

    if let Some(digest) = auth::parse_digest_challenge(challenge) {
        let producer = config
            .digest_token_fn
            .as_ref()
            .ok_or_else(|| Error::UnsupportedAuthScheme("Digest".to_string()))?;
        let creds = Credentials { user: user.clone(), pass: pass.clone() };
        return Ok(producer(&digest, &creds, "GET", request_path));
    }

    Err(Error::UnsupportedAuthScheme(challenge.to_string()))
}

fn finish(transport: Transport, key: &str, response: &HttpResponse, config: &ClientConfig) -> Result<Connected> {
    let expected = accept_key(key);
    if response.header("sec-websocket-accept") != Some(expected.as_str()) {
        return Err(Error::InvalidAcceptKey);
    }

    let subprotocol = response.header("sec-websocket-protocol").map(str::to_string);

    let mut hooks_send = Vec::new();
    let mut hooks_recv = Vec::new();
    if let Some(header) = response.header("sec-websocket-extensions") {
        for returned in extension::parse_offer_list(header) {
            let ext = config
                .websocket
                .extensions
                .iter()
                .find(|e| e.name() == returned.name)
                .ok_or_else(|| Error::UnofferedExtension(returned.name.clone()))?;
            let validated = ext
                .accept(&returned)
                .ok_or_else(|| Error::UnofferedExtension(returned.name.clone()))?;
            hooks_send.push(ext.make_hook(&validated));
            hooks_recv.push(ext.make_hook(&validated));
        }
    }

    Ok(Connected {
        transport,
        subprotocol,
        hooks_send,
        hooks_recv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn response(status: u16, headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers.iter().map(|(k, v)| (k.to_lowercase(), v.to_string())).collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn builds_basic_auth_header() {
        let resp = response(401, &[("WWW-Authenticate", "Basic realm=\"x\"")]);
        let config = ClientConfig {
            credentials: Some(Credentials {
                user: "Aladdin".to_string(),
                pass: "open sesame".to_string(),
            }),
            ..Default::default()
        };
        let header = build_auth_header(&resp, &config, "/").unwrap();
        assert_eq!(header, "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn digest_without_token_fn_is_unsupported() {
        let resp = response(401, &[("WWW-Authenticate", "Digest realm=\"x\", nonce=\"y\"")]);
        let config = ClientConfig {
            credentials: Some(Credentials {
                user: "a".to_string(),
                pass: "b".to_string(),
            }),
            ..Default::default()
        };
        assert!(matches!(
            build_auth_header(&resp, &config, "/"),
            Err(Error::UnsupportedAuthScheme(_))
        ));
    }

    #[test]
    fn missing_credentials_is_unsupported() {
        let resp = response(401, &[("WWW-Authenticate", "Basic realm=\"x\"")]);
        let config = ClientConfig::default();
        assert!(build_auth_header(&resp, &config, "/").is_err());
    }
}
