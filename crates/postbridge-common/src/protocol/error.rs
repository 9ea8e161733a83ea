use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// A call was attempted before the handshake completed.
    #[error("not connected to the executor")]
    NotConnected,

    /// No response arrived within the configured deadline.
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// The executor reported a failure; the message is its description.
    #[error("remote error: {0}")]
    Remote(String),

    /// Network I/O or response decoding failed inside the executor.
    #[error("http error: {0}")]
    Http(String),

    /// The caller was stopped while the request was still in flight.
    #[error("connection reset")]
    ConnectionReset,

    /// The peer realm is gone or the message could not be posted.
    #[error("transport error: {0}")]
    Transport(String),

    /// An origin string did not parse as `scheme://host[:port]`.
    #[error("invalid origin: {0}")]
    InvalidOrigin(String),

    /// The call parameters were unusable (e.g. an unknown HTTP method).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
