//! HTTP/1.1 request and response plumbing for the handshake (spec §4.F).
//! Grounded on the teacher's `request.rs` URL-to-request construction and
//! header parsing, rewritten against blocking `Transport` reads instead of
//! `tokio::io::BufReader`, and using `httparse` for the header grammar
//! instead of hand-rolled line splitting.

use crate::error::{Error, Result};
use crate::transport::Transport;
use std::collections::HashMap;
use url::Url;

const HTTP_REQUEST_DELIMITER: &[u8] = b"\r\n\r\n";
/// Matches the teacher's 16 KiB header cap (`handshake.rs`'s `header_buf`
/// capacity), tightened to 8 KiB per spec §4.F.
const MAX_HEADER_BYTES: usize = 8 * 1024;

pub struct ParsedUrl {
    pub use_tls: bool,
    pub host: String,
    pub host_with_port: String,
    pub request_host_field: String,
    pub request_path: String,
}

pub fn parse_ws_url(ws_url: &str) -> Result<ParsedUrl> {
    let parsed = Url::parse(ws_url)?;
    let (use_tls, default_port) = match parsed.scheme() {
        "ws" => (false, 80u16),
        "wss" => (true, 443u16),
        _ => return Err(Error::InvalidSchemeURL),
    };

    let host = parsed.host_str().ok_or(Error::URLNoHost)?.to_string();
    let port = parsed.port().unwrap_or(default_port);
    let request_host_field = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.clone(),
    };
    let request_path = match parsed.query() {
        Some(query) => format!("{}?{query}", parsed.path()),
        None => parsed.path().to_string(),
    };

    Ok(ParsedUrl {
        use_tls,
        host_with_port: format!("{host}:{port}"),
        host,
        request_host_field,
        request_path,
    })
}

/// Builds the client's opening request line and the fixed headers every
/// request carries; callers append `Origin`, extension offers, subprotocol
/// list, and `Authorization` as needed before sending.
pub fn base_request_lines(url: &ParsedUrl, key: &str) -> String {
    format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nUpgrade: websocket\r\nConnection: keep-alive, Upgrade\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\nPragma: no-cache\r\nCache-Control: no-cache\r\n",
        url.request_path, url.request_host_field, key,
    )
}

#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn header_contains_token(&self, key: &str, token: &str) -> bool {
        self.header(key)
            .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
}

impl HttpResponse {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Reads bytes off `transport` one at a time until the blank-line
/// terminator, capped at `MAX_HEADER_BYTES` to bound a client that never
/// completes its handshake. Deliberately unbuffered: any bytes `Transport`
/// handed back past the terminator would otherwise be lost to an internal
/// buffer, stealing the first bytes of the peer's opening data frame.
fn read_header_block(transport: &mut Transport) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    loop {
        if buf.len() >= MAX_HEADER_BYTES {
            return Err(Error::IncompleteHTTPRequest);
        }
        let byte = transport.read_exact(1)?;
        buf.push(byte[0]);
        if buf.ends_with(HTTP_REQUEST_DELIMITER) {
            return Ok(buf);
        }
    }
}

pub fn read_http_request(transport: &mut Transport) -> Result<HttpRequest> {
    let buf = read_header_block(transport)?;
    let mut headers_storage = [httparse::EMPTY_HEADER; 64];
    let mut parsed = httparse::Request::new(&mut headers_storage);
    parsed.parse(&buf)?;

    let method = parsed.method.ok_or(Error::InvalidHTTPHandshake)?.to_string();
    let path = parsed.path.ok_or(Error::InvalidHTTPHandshake)?.to_string();
    let headers = collect_headers(parsed.headers);

    Ok(HttpRequest { method, path, headers })
}

pub fn read_http_response(transport: &mut Transport) -> Result<HttpResponse> {
    let buf = read_header_block(transport)?;
    let mut headers_storage = [httparse::EMPTY_HEADER; 64];
    let mut parsed = httparse::Response::new(&mut headers_storage);
    parsed.parse(&buf)?;

    let status = parsed.code.ok_or(Error::InvalidHTTPHandshake)?;
    let headers = collect_headers(parsed.headers);

    Ok(HttpResponse { status, headers })
}

/// Duplicate headers are concatenated with `, ` rather than the last one
/// winning, per the combined-field-value rule for repeated header fields.
fn collect_headers(raw: &[httparse::Header]) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = HashMap::new();
    for h in raw {
        if h.name.is_empty() {
            continue;
        }
        let name = h.name.to_ascii_lowercase();
        let value = String::from_utf8_lossy(h.value).trim().to_string();
        headers
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ws_url_without_explicit_port() {
        let url = parse_ws_url("ws://example.com/chat?x=1").unwrap();
        assert!(!url.use_tls);
        assert_eq!(url.host_with_port, "example.com:80");
        assert_eq!(url.request_host_field, "example.com");
        assert_eq!(url.request_path, "/chat?x=1");
    }

    #[test]
    fn parses_wss_url_with_explicit_port() {
        let url = parse_ws_url("wss://example.com:9001/").unwrap();
        assert!(url.use_tls);
        assert_eq!(url.host_with_port, "example.com:9001");
        assert_eq!(url.request_host_field, "example.com:9001");
    }

    #[test]
    fn rejects_non_ws_scheme() {
        assert!(matches!(parse_ws_url("http://example.com"), Err(Error::InvalidSchemeURL)));
    }

    #[test]
    fn builds_base_request_lines() {
        let url = parse_ws_url("ws://example.com/chat").unwrap();
        let req = base_request_lines(&url, "dGhlIHNhbXBsZSBub25jZQ==");
        assert!(req.starts_with("GET /chat HTTP/1.1\r\n"));
        assert!(req.contains("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n"));
    }
}
