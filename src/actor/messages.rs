//! Message types flowing through the frame loop.
//!
//! [`Event`]s come from asynchronous I/O completions, [`UiIntent`]s from
//! the render step. [`Snapshot`] goes the other way, to the front-end.

use super::machine::{LatencyStats, Phase};
use crate::error::TransportFault;
use crate::transport::{ActiveConnection, ConnectionKind};
use bytes::Bytes;
use std::time::Instant;

/// Outcome of one asynchronous I/O completion.
///
/// Each event is produced once and consumed once; the queue moves it from
/// the producer to the state machine.
#[derive(Debug)]
pub enum Event {
    /// A peer connected. Carries ownership of the live connection.
    ConnectionEstablished(ActiveConnection),

    /// A full message arrived.
    MessageReceived {
        /// Received bytes.
        payload: Bytes,
        /// When the receive completed.
        received_at: Instant,
    },

    /// A queued send was written to the socket.
    SendCompleted {
        /// Bytes written.
        len: usize,
    },

    /// The accept was cancelled or the accepted socket was already gone.
    Cancelled,

    /// The transport failed.
    TransportError(TransportFault),
}

impl Event {
    /// Short name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished(_) => "connection_established",
            Self::MessageReceived { .. } => "message_received",
            Self::SendCompleted { .. } => "send_completed",
            Self::Cancelled => "cancelled",
            Self::TransportError(_) => "transport_error",
        }
    }
}

/// Intents raised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiIntent {
    /// Send one command and time its acknowledgment.
    SendCommand,
}

/// Read-only view of the engine handed to the front-end each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Session transport.
    pub kind: ConnectionKind,
    /// Lifecycle phase.
    pub phase: Phase,
    /// Whether a peer is connected.
    pub connected: bool,
    /// Whether a command awaits its acknowledgment.
    pub pending: bool,
    /// Latest round-trip time in milliseconds (0 until the first sample).
    pub last_round_trip_ms: f64,
    /// Aggregate over all samples.
    pub stats: LatencyStats,
    /// Frame number.
    pub frame: u64,
}

impl Snapshot {
    /// Whether the send control should be enabled.
    pub const fn can_send(&self) -> bool {
        self.connected && !self.pending
    }
}
