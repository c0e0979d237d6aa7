//! Error types for session startup and transport faults.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors that prevent a session from starting.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The listening endpoint could not be opened.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind.
        addr: SocketAddr,
        /// Underlying socket error.
        source: io::Error,
    },
    /// The I/O runtime could not be created.
    #[error("failed to start I/O runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// A transport failure observed by an asynchronous completion.
///
/// Cloneable so the same fault can be logged, queued and kept as the
/// session's termination reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFault {
    /// Accepting the inbound connection failed.
    #[error("accept failed: {0}")]
    Accept(String),
    /// The WebSocket upgrade handshake failed.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),
    /// The remote peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
    /// Read or write failed on the live connection.
    #[error("transport I/O error: {0}")]
    Io(String),
}

impl From<io::Error> for TransportFault {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::Closed,
            _ => Self::Io(err.to_string()),
        }
    }
}
