//! The generic extension-hook pipeline (spec §4.D). An `Extension` is a
//! read-only descriptor shared across connections; each connection
//! instantiates its own stateful `Hook` from the negotiated extension list.
//! `deflate_frame` (the `deflate-frame` extension) is the one concrete
//! extension shipped; the pipeline itself has no knowledge of it.

use crate::error::Result;
use crate::frame::{Frame, OpCode};
use std::sync::Arc;

/// A single parsed `name; key=value; flag` offer or response entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionParams {
    pub name: String,
    pub params: Vec<(String, ParamValue)>,
}

impl ExtensionParams {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn has_flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(ParamValue::Flag) | Some(ParamValue::Integer(_)) | Some(ParamValue::String(_)))
    }

    fn render(&self) -> String {
        let mut out = self.name.clone();
        for (key, value) in &self.params {
            match value {
                ParamValue::Flag => out.push_str(&format!("; {}", key)),
                ParamValue::Integer(n) => out.push_str(&format!("; {}={}", key, n)),
                ParamValue::String(s) => out.push_str(&format!("; {}={}", key, s)),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Flag,
    Integer(u64),
    String(String),
}

/// Parses a comma-separated `Sec-WebSocket-Extensions` header value into an
/// ordered offer list. Within one offer, parameters are `;`-separated; a
/// bare key means `true` (a flag), a value matching `[0-9]+` parses as an
/// integer, anything else is a string.
pub fn parse_offer_list(header_value: &str) -> Vec<ExtensionParams> {
    header_value
        .split(',')
        .filter_map(|offer| {
            let mut parts = offer.split(';').map(str::trim).filter(|p| !p.is_empty());
            let name = parts.next()?.to_string();
            let params = parts
                .map(|part| match part.split_once('=') {
                    Some((key, value)) => {
                        let value = value.trim().trim_matches('"');
                        let parsed = if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                            ParamValue::Integer(value.parse().unwrap_or(0))
                        } else {
                            ParamValue::String(value.to_string())
                        };
                        (key.trim().to_string(), parsed)
                    }
                    None => (part.to_string(), ParamValue::Flag),
                })
                .collect();
            Some(ExtensionParams { name, params })
        })
        .collect()
}

pub fn render_offer_list(offers: &[ExtensionParams]) -> String {
    offers.iter().map(ExtensionParams::render).collect::<Vec<_>>().join(", ")
}

/// A per-connection, stateful transform applied to every frame on its way
/// out (`on_send`) or in (`on_recv`). Hooks run in the order they were
/// registered on the connection.
pub trait Hook: Send {
    fn on_send(&mut self, frame: Frame) -> Result<Frame>;
    fn on_recv(&mut self, frame: Frame) -> Result<Frame>;
}

/// A read-only, shareable extension descriptor. One descriptor can back
/// many connections; `make_hook` is called once per connection with the
/// negotiated parameters for that connection.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn reserves_rsv1(&self) -> bool {
        false
    }
    fn reserves_rsv2(&self) -> bool {
        false
    }
    fn reserves_rsv3(&self) -> bool {
        false
    }
    fn reserves_opcodes(&self) -> &'static [OpCode] {
        &[]
    }

    /// Validates and normalizes an offer, filling in defaults. Returns
    /// `None` if the offer contains a parameter this extension does not
    /// recognize (the offer is then rejected, per spec §4.D).
    fn accept(&self, offer: &ExtensionParams) -> Option<ExtensionParams>;

    fn make_hook(&self, params: &ExtensionParams) -> Box<dyn Hook>;

    /// The offer a client sends for this extension. The bare name with no
    /// parameters is a reasonable default for most extensions.
    fn offer(&self) -> ExtensionParams {
        ExtensionParams {
            name: self.name().to_string(),
            params: Vec::new(),
        }
    }
}

/// Result of running negotiation over a client offer list against a
/// server's (or client's, for response validation) supported set.
pub struct Negotiated {
    pub accepted: Vec<ExtensionParams>,
    pub hooks_send: Vec<Box<dyn Hook>>,
    pub hooks_recv: Vec<Box<dyn Hook>>,
}

/// Greedily admits extensions in client-preference order. Each admitted
/// extension reserves its rsv bits and opcodes; a later extension whose
/// reservations conflict with an already-admitted one is rejected silently,
/// as is an offer with an unrecognized parameter.
pub fn negotiate(offers: &[ExtensionParams], supported: &[Arc<dyn Extension>]) -> Negotiated {
    let mut reserved_rsv = (false, false, false);
    let mut reserved_opcodes: Vec<OpCode> = Vec::new();
    let mut negotiated = Negotiated {
        accepted: Vec::new(),
        hooks_send: Vec::new(),
        hooks_recv: Vec::new(),
    };

    for offer in offers {
        let Some(ext) = supported.iter().find(|e| e.name() == offer.name) else {
            continue;
        };
        let Some(accepted_params) = ext.accept(offer) else {
            continue;
        };

        let wants_rsv = (ext.reserves_rsv1(), ext.reserves_rsv2(), ext.reserves_rsv3());
        let rsv_conflict = (wants_rsv.0 && reserved_rsv.0)
            || (wants_rsv.1 && reserved_rsv.1)
            || (wants_rsv.2 && reserved_rsv.2);
        let opcode_conflict = ext
            .reserves_opcodes()
            .iter()
            .any(|op| reserved_opcodes.contains(op));
        if rsv_conflict || opcode_conflict {
            continue;
        }

        reserved_rsv.0 |= wants_rsv.0;
        reserved_rsv.1 |= wants_rsv.1;
        reserved_rsv.2 |= wants_rsv.2;
        reserved_opcodes.extend_from_slice(ext.reserves_opcodes());

        negotiated.hooks_send.push(ext.make_hook(&accepted_params));
        negotiated.hooks_recv.push(ext.make_hook(&accepted_params));
        negotiated.accepted.push(accepted_params);
    }

    negotiated
}
