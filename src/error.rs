use pki_types::InvalidDnsNameError;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// Error taxonomy for the frame codec, handshake and connection state
/// machine. `Closed` is the only variant that is not really a failure: it
/// signals a clean peer disconnect, or a close handshake that has already
/// completed, and the receive loop treats it as end-of-stream rather than
/// surfacing it to `on_error`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("connection closed")]
    Closed,

    #[error("IO error: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    // Handshake errors
    #[error("invalid HTTP request line, expected GET <path> HTTP/1.1")]
    InvalidHTTPHandshake,

    #[error("Connection header missing or does not contain 'Upgrade'")]
    NoConnectionHeaderPresent,

    #[error("Upgrade header missing or does not contain 'websocket'")]
    NoUpgradeHeaderPresent,

    #[error("Host header missing in the request")]
    NoHostHeaderPresent,

    #[error("Sec-WebSocket-Key header missing in the request")]
    NoSecWebsocketKey,

    #[error("Sec-WebSocket-Version was not \"13\"")]
    UnsupportedVersion,

    #[error("origin `{0}` is not in the trusted origins list")]
    UntrustedOrigin(String),

    #[error("request carries a User-Agent header but no Origin header")]
    MissingOrigin,

    #[error("location `{0}` is not in the allowed locations list")]
    DisallowedLocation(String),

    #[error("server did not upgrade the connection (status {0})")]
    NoUpgrade(u16),

    #[error("server's Sec-WebSocket-Accept value did not match the expected derivation")]
    InvalidAcceptKey,

    #[error("server negotiated extension `{0}` that the client never offered")]
    UnofferedExtension(String),

    #[error("unsupported HTTP authentication scheme: {0}")]
    UnsupportedAuthScheme(String),

    #[error("exceeded the maximum of {0} HTTP redirects during the handshake")]
    TooManyRedirects(usize),

    #[error("handshake failed: {0}")]
    HandshakeError(String),

    // Framing errors
    #[error("RSV bit set without a negotiated extension that reserves it")]
    RSVNotZero,

    #[error("control frames must not be fragmented")]
    ControlFramesFragmented,

    #[error("control frame payload exceeds 125 bytes")]
    ControlFramePayloadSize,

    #[error("payload length {0} exceeds the RFC 6455 limit of 2^63 - 1 bytes")]
    FrameTooLarge(u64),

    #[error("compressed control frame (RSV1 set on a control opcode)")]
    CompressedControlFrame,

    #[error("fragment_size `{0}` can't be greater than max_frame_size `{1}`")]
    CustomFragmentSizeExceeded(usize, usize),

    #[error("frame payload exceeds the configured max frame size")]
    MaxFrameSize,

    #[error("message payload exceeds the configured max message size")]
    MaxMessageSize,

    // Fragmentation errors
    #[error("data frame received while a fragmented message is already in progress")]
    InvalidFrameFragmentation,

    #[error("continuation frame received but no fragmented message is in progress")]
    InvalidContinuationFrame,

    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    // Ping/pong
    #[error("received an unsolicited PONG with no outstanding PING")]
    UnsolicitedPong,

    #[error("PONG payload did not match the outstanding PING payload")]
    PingPayloadMismatch,

    // Close payload
    #[error("CLOSE frame payload carries a reason without a status code")]
    CloseReasonWithoutCode,

    // HTTP / URL errors
    #[error("{source}")]
    URLParseError {
        #[from]
        source: UrlParseError,
    },

    #[error("invalid scheme in WebSocket URL, expected ws:// or wss://")]
    InvalidSchemeURL,

    #[error("URL has no host")]
    URLNoHost,

    #[error("{source}")]
    HttpParseError {
        #[from]
        source: httparse::Error,
    },

    #[error("incomplete HTTP request: missing the blank line terminator")]
    IncompleteHTTPRequest,

    #[error("{source}")]
    DomainError {
        #[from]
        source: InvalidDnsNameError,
    },

    // TLS
    #[error("TLS must be enabled before the first handshake byte is sent")]
    TlsConfig,

    #[error("TLS error: {0}")]
    TlsError(String),

    // Compression
    #[error("max_window_bits must be between 1 and 15")]
    InvalidMaxWindowBits,

    #[error("unrecognized parameter `{0}` in extension offer")]
    UnknownExtensionParameter(String),

    #[error("leftover compressed bytes after decompressing a deflate-frame payload")]
    ResidualCompressedInput,

    #[error("deflate-frame compression failure: {0}")]
    CompressionFailure(String),
}

pub type Result<T> = std::result::Result<T, Error>;
