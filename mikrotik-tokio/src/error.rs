//! The error taxonomy surfaced by a connection and its channels/streams.

use std::io;
use std::time::Duration;

use mikrotik_proto::{CommandError, CommandResponse, ProtocolError, ReceiverError, TrapResponse};

/// Result type alias for connection and channel operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors surfaced by a [`crate::connector::Connector`] and the channels and
/// streams built on top of it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceError {
    /// A transport-level I/O error.
    #[error("connection error: {0}")]
    Connection(io::ErrorKind),
    /// A malformed sentence was observed on the wire.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    /// A command could not be built (e.g. a non-Windows-1252 character).
    #[error("could not build command: {0}")]
    Command(#[from] CommandError),
    /// The byte stream could not be framed into sentences at all (bad
    /// length prefix, undecodable word).
    #[error("framing error: {0}")]
    Framing(#[from] ReceiverError),
    /// TLS handshake or configuration failure.
    #[error("TLS error: {0}")]
    Tls(String),
    /// The TCP or TLS handshake did not complete within `connect_timeout`.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    /// No bytes were read from the socket within `idle_timeout`.
    #[error("connection idle for longer than {0:?}")]
    IdleTimeout(Duration),
    /// The login handshake ended in a `!trap`.
    #[error("login rejected: {response}")]
    LoginRejected {
        /// The trap the router returned during login.
        response: TrapResponse,
    },
    /// A command ended in a `!trap`.
    #[error("command trapped: {0}")]
    Trap(TrapResponse),
    /// The connection was torn down (transport error, `!fatal`, or a clean
    /// close); every open channel/stream sees this.
    #[error("connection lost")]
    ConnectionLost,
    /// The router addressed a sentence to a tag with no registered
    /// subscriber. The connection remains usable; the sentence is dropped.
    #[error("received a sentence for unregistered tag {0}")]
    UnregisteredTag(u16),
    /// A write was attempted after the connection closed.
    #[error("not connected")]
    NotConnected,
    /// An operation was attempted on a stream that already stopped.
    #[error("stream closed")]
    StreamClosed,
    /// The internal actor channel was disconnected (the actor task ended).
    #[error("internal channel error: {0}")]
    Channel(String),
    /// A reply arrived out of the sequence a handshake or protocol step
    /// expects.
    #[error("unexpected response: received {received:?}, expected one of {expected:?}")]
    ResponseSequence {
        /// The response actually received.
        received: Box<CommandResponse>,
        /// Human-readable description of the responses that would have been
        /// valid here.
        expected: Vec<&'static str>,
    },
}

impl From<io::Error> for DeviceError {
    fn from(error: io::Error) -> Self {
        DeviceError::Connection(error.kind())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for DeviceError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        DeviceError::Channel("the connection actor has shut down".to_string())
    }
}
