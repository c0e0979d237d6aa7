//! Lifecycle state machine: owns the connection and the measurement.
//!
//! ```text
//! AwaitingConnection ──ConnectionEstablished──▶ Connected
//!        │                                     │  ▲
//!  Cancelled / error                SendCommand│  │MessageReceived
//!        │                                     ▼  │
//!        │                           Sending ──▶ AwaitingAck
//!        │                                 SendCompleted
//!        ▼
//!   Terminated ◀──────────── TransportError / shutdown
//! ```
//!
//! Events and intents are applied one at a time in queue order. The machine
//! never blocks: every I/O it starts completes later as another event.

use super::messages::{Event, UiIntent};
use crate::error::TransportFault;
use crate::transport::{
    ActiveConnection, ConnectionKind, PendingConnection, ACKNOWLEDGMENT, COMMAND,
};
use bytes::Bytes;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Listening; no peer yet.
    AwaitingConnection,
    /// Peer connected, idle.
    Connected,
    /// Command queued, not yet written.
    Sending,
    /// Command written, acknowledgment outstanding.
    AwaitingAck,
    /// Session over. Absorbing.
    Terminated,
}

impl Phase {
    /// Whether a peer is connected in this phase.
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::Sending | Self::AwaitingAck)
    }

    /// Human-readable status.
    pub const fn label(self) -> &'static str {
        match self {
            Self::AwaitingConnection => "waiting for connection",
            Self::Connected => "connected",
            Self::Sending => "sending",
            Self::AwaitingAck => "awaiting acknowledgment",
            Self::Terminated => "terminated",
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The external stop signal was set.
    Stopped,
    /// The front-end asked to close.
    WindowClosed,
    /// The accept was cancelled before a peer connected.
    Cancelled,
    /// A fatal transport failure.
    Fault(TransportFault),
}

impl Termination {
    /// Whether the session ended on an error.
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::WindowClosed => f.write_str("closed by user"),
            Self::Cancelled => f.write_str("accept cancelled"),
            Self::Fault(fault) => write!(f, "transport failure: {fault}"),
        }
    }
}

/// State of the current round-trip measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyMeasurement {
    /// A command is out and its acknowledgment not yet consumed.
    pub pending: bool,
    /// When the outstanding (or last) command was issued.
    pub issued_at: Option<Instant>,
    /// Latest completed round trip in milliseconds.
    pub last_round_trip_ms: f64,
}

/// Running aggregate over completed measurements.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyStats {
    /// Completed measurements.
    pub samples: u64,
    /// Fastest round trip (ms).
    pub min_ms: f64,
    /// Slowest round trip (ms).
    pub max_ms: f64,
    /// Mean round trip (ms).
    pub mean_ms: f64,
}

impl LatencyStats {
    /// Fold one sample in.
    pub fn record(&mut self, ms: f64) {
        self.samples += 1;
        if self.samples == 1 {
            self.min_ms = ms;
            self.max_ms = ms;
            self.mean_ms = ms;
            return;
        }
        self.min_ms = self.min_ms.min(ms);
        self.max_ms = self.max_ms.max(ms);
        #[allow(clippy::cast_precision_loss)]
        let n = self.samples as f64;
        self.mean_ms += (ms - self.mean_ms) / n;
    }
}

/// The session's state machine.
#[derive(Debug)]
pub struct LifecycleMachine {
    kind: ConnectionKind,
    phase: Phase,
    pending_connection: Option<PendingConnection>,
    connection: Option<ActiveConnection>,
    measurement: LatencyMeasurement,
    stats: LatencyStats,
    termination: Option<Termination>,
    sends_issued: u64,
}

impl LifecycleMachine {
    /// A machine waiting for a connection of `kind`.
    pub const fn new(kind: ConnectionKind) -> Self {
        Self {
            kind,
            phase: Phase::AwaitingConnection,
            pending_connection: None,
            connection: None,
            measurement: LatencyMeasurement {
                pending: false,
                issued_at: None,
                last_round_trip_ms: 0.0,
            },
            stats: LatencyStats {
                samples: 0,
                min_ms: 0.0,
                max_ms: 0.0,
                mean_ms: 0.0,
            },
            termination: None,
            sends_issued: 0,
        }
    }

    /// A machine that owns the listener accepting its connection.
    pub fn with_pending(pending: PendingConnection) -> Self {
        let mut machine = Self::new(pending.kind());
        machine.pending_connection = Some(pending);
        machine
    }

    /// Session transport.
    pub const fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Current phase.
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a peer is connected.
    pub const fn is_connected(&self) -> bool {
        self.phase.is_connected()
    }

    /// Current measurement state.
    pub const fn measurement(&self) -> &LatencyMeasurement {
        &self.measurement
    }

    /// Aggregate latency statistics.
    pub const fn stats(&self) -> &LatencyStats {
        &self.stats
    }

    /// Why the session ended, once it has.
    pub const fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Number of commands handed to the transport.
    pub const fn sends_issued(&self) -> u64 {
        self.sends_issued
    }

    /// Whether the listener is still waiting for a peer.
    pub const fn is_accepting(&self) -> bool {
        self.pending_connection.is_some()
    }

    /// Apply a front-end intent.
    pub fn apply_intent(&mut self, intent: UiIntent, now: Instant) {
        match intent {
            UiIntent::SendCommand => self.send_command(now),
        }
    }

    /// Apply an I/O completion.
    pub fn apply_event(&mut self, event: Event) {
        if self.phase == Phase::Terminated {
            trace!(event = event.name(), "event after termination ignored");
            return;
        }

        match event {
            Event::ConnectionEstablished(connection) => self.adopt(connection),
            Event::MessageReceived {
                payload,
                received_at,
            } => self.acknowledge(&payload, received_at),
            Event::SendCompleted { len } => {
                trace!(bytes = len, "send completed");
                if self.phase == Phase::Sending {
                    self.phase = Phase::AwaitingAck;
                }
            }
            Event::Cancelled => {
                if self.phase == Phase::AwaitingConnection {
                    info!("accept cancelled before a peer connected");
                    self.terminate(Termination::Cancelled);
                } else {
                    debug!("stray cancellation ignored");
                }
            }
            Event::TransportError(fault) => {
                warn!(%fault, phase = ?self.phase, "transport failed");
                self.terminate(Termination::Fault(fault));
            }
        }
    }

    /// Tear the session down. Keeps an earlier termination reason.
    pub fn shutdown(&mut self, reason: Termination) {
        if self.phase != Phase::Terminated {
            self.terminate(reason);
        }
    }

    fn adopt(&mut self, mut connection: ActiveConnection) {
        if self.phase != Phase::AwaitingConnection || self.connection.is_some() {
            warn!(kind = %connection.kind(), "extra connection refused");
            connection.close();
            return;
        }

        // Listener is done after its one accept.
        self.pending_connection = None;
        connection.arm_receive();
        info!(kind = %connection.kind(), "peer adopted");
        self.connection = Some(connection);
        self.phase = Phase::Connected;
    }

    fn send_command(&mut self, now: Instant) {
        if !self.phase.is_connected() {
            debug!(phase = ?self.phase, "send ignored: not connected");
            return;
        }
        if self.measurement.pending {
            debug!("send ignored: measurement pending");
            return;
        }
        let Some(connection) = self.connection.as_mut() else {
            return;
        };

        self.measurement.issued_at = Some(now);
        self.measurement.pending = true;
        connection.send(Bytes::from_static(COMMAND));
        self.sends_issued += 1;
        self.phase = Phase::Sending;
        debug!(sends = self.sends_issued, "command sent");
    }

    fn acknowledge(&mut self, payload: &[u8], received_at: Instant) {
        if payload != ACKNOWLEDGMENT {
            warn!(
                payload = %String::from_utf8_lossy(payload),
                "unexpected acknowledgment payload"
            );
        }
        if !self.measurement.pending {
            debug!("unsolicited message ignored");
            return;
        }
        let Some(issued_at) = self.measurement.issued_at else {
            return;
        };

        let round_trip_ms = received_at.saturating_duration_since(issued_at).as_secs_f64() * 1000.0;
        self.measurement.last_round_trip_ms = round_trip_ms;
        self.measurement.pending = false;
        self.stats.record(round_trip_ms);
        self.phase = Phase::Connected;
        info!(round_trip_ms, samples = self.stats.samples, "acknowledged");

        if let Some(connection) = self.connection.as_mut() {
            connection.arm_receive();
        }
    }

    fn terminate(&mut self, reason: Termination) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        self.pending_connection = None;
        self.measurement.pending = false;
        self.phase = Phase::Terminated;
        info!(?reason, "session terminated");
        self.termination = Some(reason);
    }
}
