//! HTTP authentication for the client handshake's 401 retry (spec §4.F).
//!
//! Basic auth is trivial enough to build in-core. Digest auth is explicitly
//! out of scope per spec.md §1 ("HTTP Digest authentication building,
//! treated as an opaque token producer") — the core only parses the
//! `WWW-Authenticate` challenge and, if the caller supplied a
//! `digest_token_fn`, asks it for the `Authorization` header value. Without
//! one configured, a Digest challenge fails the handshake.

use base64::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

/// The handful of fields callers need to build a Digest response; parsed
/// from `WWW-Authenticate: Digest ...`, RFC 2617 §3.2.1.
#[derive(Debug, Clone, Default)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub qop: Option<String>,
}

/// `(method, request_uri)` is given to the token producer so it can compute
/// the request-digest without this crate needing to know the algorithm.
pub type DigestTokenFn = Arc<dyn Fn(&DigestChallenge, &Credentials, &str, &str) -> String + Send + Sync>;

pub fn basic_token(creds: &Credentials) -> String {
    BASE64_STANDARD.encode(format!("{}:{}", creds.user, creds.pass))
}

/// Parses `WWW-Authenticate: Digest realm="...", nonce="...", opaque="...", qop="..."`.
pub fn parse_digest_challenge(header_value: &str) -> Option<DigestChallenge> {
    let rest = header_value.trim().strip_prefix("Digest")?.trim();
    let mut challenge = DigestChallenge::default();
    for part in split_header_params(rest) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match key.trim() {
            "realm" => challenge.realm = value,
            "nonce" => challenge.nonce = value,
            "opaque" => challenge.opaque = Some(value),
            "qop" => challenge.qop = Some(value),
            _ => {}
        }
    }
    if challenge.realm.is_empty() || challenge.nonce.is_empty() {
        return None;
    }
    Some(challenge)
}

/// Splits `key="value, with, commas", key2=value2` on the top-level commas
/// only, respecting quoted sections.
fn split_header_params(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_token_matches_rfc_example() {
        let creds = Credentials {
            user: "Aladdin".to_string(),
            pass: "open sesame".to_string(),
        };
        assert_eq!(basic_token(&creds), "QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn parses_digest_challenge_fields() {
        let header = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;
        let challenge = parse_digest_challenge(header).unwrap();
        assert_eq!(challenge.realm, "testrealm@host.com");
        assert_eq!(challenge.nonce, "dcd98b7102dd2f0e8b11d0f600bfb0c093");
        assert_eq!(challenge.opaque.as_deref(), Some("5ccc069c403ebaf9f0171e9517f40e41"));
        assert_eq!(challenge.qop.as_deref(), Some("auth,auth-int"));
    }

    #[test]
    fn rejects_non_digest_scheme() {
        assert!(parse_digest_challenge("Basic realm=\"x\"").is_none());
    }
}
