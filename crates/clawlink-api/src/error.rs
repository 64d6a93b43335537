use thiserror::Error;

/// Top-level error type for the `clawlink-api` crate.
///
/// Covers every failure mode of the relay link: connecting, the
/// WebSocket session itself, and the JSON wire format.
/// `clawlink-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The endpoint uses a scheme other than `ws` / `wss`.
    #[error("Unsupported relay URL scheme '{scheme}' (expected ws or wss)")]
    UnsupportedScheme { scheme: String },

    /// Connecting took longer than the configured timeout.
    #[error("Connect timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket handshake or I/O failed (refused, reset, DNS, TLS, ...).
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The relay closed the WebSocket.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The link has already been torn down; nothing can be written to it.
    #[error("Link closed")]
    LinkClosed,

    // ── Data ────────────────────────────────────────────────────────
    /// An inbound frame could not be decoded into a typed message.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// Every transport failure is transient from the client's point of
    /// view; only configuration mistakes are not.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_) | Self::UnsupportedScheme { .. })
    }
}

/// Failure to turn a text frame into an [`InboundMessage`](crate::InboundMessage).
///
/// Always local: the caller logs it and drops the frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not JSON, or not a JSON object.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The object has no string `type` discriminant.
    #[error("frame has no 'type' tag")]
    MissingType,

    /// A known tag whose required fields are missing or mistyped.
    #[error("invalid '{kind}' message: {reason}")]
    InvalidPayload { kind: String, reason: String },
}
