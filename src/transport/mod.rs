//! Transport: single-accept listener and the live connection handle.
//!
//! [`begin_accept`] binds synchronously and hands the accept to the I/O
//! runtime. The accepted stream comes back through the event queue as an
//! [`ActiveConnection`] inside [`Event::ConnectionEstablished`]; from then on
//! the state machine is its only owner.
//!
//! ```text
//!   begin_accept ──▶ PendingConnection (accept task)
//!                         │ accept (+ websocket handshake)
//!                         ▼
//!   Event::ConnectionEstablished(ActiveConnection) ──▶ LifecycleMachine
//!                                                          │ send / arm_receive
//!                                                          ▼
//!                                   writer task ◀── TaskConnection ──▶ reader task
//! ```

mod link;
mod raw_tcp;
mod websocket;

pub use link::TaskConnection;

use crate::actor::Event;
use crate::error::{SessionError, TransportFault};
use crate::queue::QueueSender;
use bytes::Bytes;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Command payload sent to the peer on each measurement.
pub const COMMAND: &[u8] = b"button clicked\n";

/// Acknowledgment the peer answers each command with.
pub const ACKNOWLEDGMENT: &[u8] = b"received";

/// Transport used for the session's single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// WebSocket frames over TCP.
    WebSocket,
    /// Raw TCP bytes with fixed-length acknowledgments.
    RawTcp,
}

impl ConnectionKind {
    /// Well-known listening port for this transport.
    pub const fn default_port(self) -> u16 {
        match self {
            Self::WebSocket => 9002,
            Self::RawTcp => 9003,
        }
    }

    /// Display name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebSocket => "WebSocket",
            Self::RawTcp => "RawTcp",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the state machine can issue on a live connection.
///
/// Every operation returns immediately; its outcome arrives later as an
/// [`Event`] on the session's queue.
pub trait ConnectionHandle: Send {
    /// Transport kind of this connection.
    fn kind(&self) -> ConnectionKind;

    /// Queue a payload for sending. Completes with
    /// [`Event::SendCompleted`] or [`Event::TransportError`].
    fn send(&mut self, payload: Bytes);

    /// Start the continuous receive loop. Each received message becomes an
    /// [`Event::MessageReceived`]; the loop re-arms itself until the
    /// connection fails or is closed. Calling it again is a no-op.
    fn arm_receive(&mut self);

    /// Cancel all in-flight operations and release the socket.
    fn close(&mut self);
}

/// The session's single live connection. Move-only.
pub struct ActiveConnection {
    inner: Box<dyn ConnectionHandle>,
}

impl ActiveConnection {
    /// Wrap a connection handle.
    pub fn new(handle: impl ConnectionHandle + 'static) -> Self {
        Self {
            inner: Box::new(handle),
        }
    }

    /// Transport kind of this connection.
    pub fn kind(&self) -> ConnectionKind {
        self.inner.kind()
    }

    /// See [`ConnectionHandle::send`].
    pub fn send(&mut self, payload: Bytes) {
        self.inner.send(payload);
    }

    /// See [`ConnectionHandle::arm_receive`].
    pub fn arm_receive(&mut self) {
        self.inner.arm_receive();
    }

    /// See [`ConnectionHandle::close`].
    pub fn close(&mut self) {
        self.inner.close();
    }
}

impl fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveConnection")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// Runtime resources an accept needs.
#[derive(Debug, Clone)]
pub struct AcceptContext {
    /// Runtime the accept and connection tasks run on.
    pub runtime: Handle,
    /// Queue completions are pushed to.
    pub events: QueueSender<Event>,
    /// Session-wide cancellation; every task gets a child of it.
    pub cancel: CancellationToken,
}

/// A bound listener waiting for its one connection.
///
/// Dropping it cancels the accept; the accept task then reports
/// [`Event::Cancelled`].
#[derive(Debug)]
pub struct PendingConnection {
    kind: ConnectionKind,
    local_addr: SocketAddr,
    cancel: CancellationToken,
}

impl PendingConnection {
    /// Transport kind being accepted.
    pub const fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Address the listener is bound to.
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop waiting for a connection.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PendingConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Bind a listener and wait asynchronously for exactly one connection.
///
/// Binding happens before this returns, so an unusable endpoint is a
/// startup error rather than a queued event.
pub fn begin_accept(
    kind: ConnectionKind,
    bind_address: IpAddr,
    port: u16,
    context: &AcceptContext,
) -> Result<PendingConnection, SessionError> {
    let addr = SocketAddr::new(bind_address, port);
    let bind_err = |source| SessionError::Bind { addr, source };

    let std_listener = std::net::TcpListener::bind(addr).map_err(bind_err)?;
    std_listener.set_nonblocking(true).map_err(bind_err)?;
    let local_addr = std_listener.local_addr().map_err(bind_err)?;

    let listener = {
        let _guard = context.runtime.enter();
        TcpListener::from_std(std_listener).map_err(bind_err)?
    };
    info!(%kind, %local_addr, "waiting for peer");

    let accept_cancel = context.cancel.child_token();
    let task = accept_one(kind, listener, context.clone(), accept_cancel.clone());
    context.runtime.spawn(task);

    Ok(PendingConnection {
        kind,
        local_addr,
        cancel: accept_cancel,
    })
}

/// Accept task: one connection, then the listener is dropped.
async fn accept_one(
    kind: ConnectionKind,
    listener: TcpListener,
    context: AcceptContext,
    accept_cancel: CancellationToken,
) {
    let events = context.events.clone();
    let accepted = tokio::select! {
        () = accept_cancel.cancelled() => {
            debug!("accept cancelled");
            events.push(Event::Cancelled);
            return;
        }
        result = listener.accept() => result,
    };
    drop(listener);

    let stream = match accepted {
        Ok((stream, _)) => stream,
        Err(err) => {
            warn!(error = %err, "accept failed");
            events.push(Event::TransportError(TransportFault::Accept(err.to_string())));
            return;
        }
    };

    // A socket that already lost its peer raced with shutdown.
    let peer = match stream.peer_addr() {
        Ok(peer) => peer,
        Err(err) => {
            debug!(error = %err, "accepted socket not open");
            events.push(Event::Cancelled);
            return;
        }
    };
    info!(%kind, %peer, "peer connected");

    let connection_cancel = context.cancel.child_token();
    let connection = match kind {
        ConnectionKind::RawTcp => raw_tcp::adopt(stream, &context, connection_cancel),
        ConnectionKind::WebSocket => {
            let handshake = tokio::select! {
                () = accept_cancel.cancelled() => {
                    debug!("handshake cancelled");
                    events.push(Event::Cancelled);
                    return;
                }
                result = websocket::handshake(stream) => result,
            };
            match handshake {
                Ok(ws) => websocket::adopt(ws, &context, connection_cancel),
                Err(fault) => {
                    warn!(%fault, "websocket handshake failed");
                    events.push(Event::TransportError(fault));
                    return;
                }
            }
        }
    };

    events.push(Event::ConnectionEstablished(connection));
}
