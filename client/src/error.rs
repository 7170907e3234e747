//! Session and transport error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Send attempted on a channel name with no registered transport.
    /// Non-fatal: callers drop the message and log.
    #[error("no channel registered under \"{0}\"")]
    ChannelNotFound(String),

    /// The underlying connection could not be created. The session or
    /// matchmaking attempt aborts before any event listener exists.
    #[error("failed to open transport to {url}: {reason}")]
    TransportConstructionFailed { url: String, reason: String },

    /// A payload that does not decode. The message is discarded and the
    /// session continues.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    /// Transport-level failure. Fatal for the current session.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Connection closed with a non-terminal code; the persisted rejoin
    /// id survives so a later session can pick the game back up.
    #[error("connection closed unexpectedly (code {0})")]
    UnexpectedClose(u16),
}
