//! C Foreign Function Interface (FFI) for the latency bench.
//!
//! Lets a host written in another language drive a session from its own
//! UI loop: it calls `teleop_engine_tick` once per frame, reads the
//! snapshot, and calls `teleop_engine_send_command` when its button is
//! pressed.
//!
//! # Safety
//!
//! All functions that accept pointers require valid pointers or NULL.
//! The caller owns the handle and must release it with
//! `teleop_engine_destroy`.
//!
//! # Example (C)
//!
//! ```c
//! #include "teleop_latency.h"
//!
//! int main() {
//!     TeleopEngine* engine = teleop_engine_new(TELEOP_KIND_RAW_TCP, 9003);
//!     if (!engine) return 1;
//!
//!     TeleopSnapshot snap;
//!     while (teleop_engine_tick(engine, &snap) == TELEOP_TICK_CONTINUE) {
//!         if (button_pressed() && snap.connected && !snap.pending) {
//!             teleop_engine_send_command(engine);
//!         }
//!         draw(&snap);
//!     }
//!
//!     teleop_engine_destroy(engine);
//!     return 0;
//! }
//! ```

// FFI modules intentionally use unsafe and no_mangle
#![allow(unsafe_op_in_unsafe_fn)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use crate::actor::{Engine, IntentSender, Phase, Snapshot, Termination, TickOutcome, UiIntent};
use crate::config::{ExecutionModel, SessionConfig};
use crate::frontend::Frontend;
use crate::transport::ConnectionKind;
use std::os::raw::c_char;
use std::ptr;

// =============================================================================
// Opaque Handle Types
// =============================================================================

/// Opaque handle to a session engine.
pub struct TeleopEngine {
    engine: Engine,
    host: HostFrontend,
}

/// Front-end whose drawing happens on the C side.
#[derive(Default)]
struct HostFrontend {
    latest: Option<Snapshot>,
}

impl Frontend for HostFrontend {
    fn render(&mut self, snapshot: &Snapshot, _intents: &IntentSender) {
        self.latest = Some(snapshot.clone());
    }
}

// =============================================================================
// Result and Enum Types
// =============================================================================

/// Result codes for FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeleopResult {
    /// Operation succeeded.
    Ok = 0,
    /// Null pointer passed.
    NullPointer = 1,
    /// Engine not running.
    NotRunning = 2,
}

/// Transport selector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeleopKind {
    /// WebSocket (well-known port 9002).
    WebSocket = 0,
    /// Raw TCP (well-known port 9003).
    RawTcp = 1,
}

impl From<TeleopKind> for ConnectionKind {
    fn from(kind: TeleopKind) -> Self {
        match kind {
            TeleopKind::WebSocket => Self::WebSocket,
            TeleopKind::RawTcp => Self::RawTcp,
        }
    }
}

/// Lifecycle phase.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeleopPhase {
    /// Listening.
    AwaitingConnection = 0,
    /// Connected, idle.
    Connected = 1,
    /// Command queued.
    Sending = 2,
    /// Command written, waiting for the acknowledgment.
    AwaitingAck = 3,
    /// Session over.
    Terminated = 4,
}

impl From<Phase> for TeleopPhase {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::AwaitingConnection => Self::AwaitingConnection,
            Phase::Connected => Self::Connected,
            Phase::Sending => Self::Sending,
            Phase::AwaitingAck => Self::AwaitingAck,
            Phase::Terminated => Self::Terminated,
        }
    }
}

/// Outcome of one tick.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeleopTick {
    /// Keep ticking.
    Continue = 0,
    /// Stopped by `teleop_engine_stop`.
    Stopped = 1,
    /// Accept cancelled before a peer connected.
    Cancelled = 2,
    /// Transport failure.
    Fault = 3,
    /// Null pointer passed.
    NullPointer = 4,
}

impl From<&Termination> for TeleopTick {
    fn from(reason: &Termination) -> Self {
        match reason {
            Termination::Stopped | Termination::WindowClosed => Self::Stopped,
            Termination::Cancelled => Self::Cancelled,
            Termination::Fault(_) => Self::Fault,
        }
    }
}

/// Per-frame view handed to the host.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TeleopSnapshot {
    /// Lifecycle phase.
    pub phase: TeleopPhase,
    /// Whether a peer is connected.
    pub connected: bool,
    /// Whether a command awaits its acknowledgment.
    pub pending: bool,
    /// Latest round trip (ms), 0 before the first sample.
    pub last_round_trip_ms: f64,
    /// Completed measurements.
    pub samples: u64,
    /// Fastest round trip (ms).
    pub min_ms: f64,
    /// Mean round trip (ms).
    pub mean_ms: f64,
    /// Slowest round trip (ms).
    pub max_ms: f64,
    /// Frame number.
    pub frame: u64,
}

impl From<&Snapshot> for TeleopSnapshot {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            phase: snapshot.phase.into(),
            connected: snapshot.connected,
            pending: snapshot.pending,
            last_round_trip_ms: snapshot.last_round_trip_ms,
            samples: snapshot.stats.samples,
            min_ms: snapshot.stats.min_ms,
            mean_ms: snapshot.stats.mean_ms,
            max_ms: snapshot.stats.max_ms,
            frame: snapshot.frame,
        }
    }
}

// =============================================================================
// Engine Functions
// =============================================================================

/// Start a session listening on `port` (0 picks a free port).
///
/// I/O runs on a background thread, so the host may tick at any rate.
/// Returns NULL if the port cannot be bound.
#[unsafe(no_mangle)]
pub extern "C" fn teleop_engine_new(kind: TeleopKind, port: u16) -> *mut TeleopEngine {
    let config = SessionConfig::for_kind(kind.into())
        .with_port(port)
        .with_execution(ExecutionModel::Background);
    match Engine::start(config) {
        Ok(engine) => Box::into_raw(Box::new(TeleopEngine {
            engine,
            host: HostFrontend::default(),
        })),
        Err(_) => ptr::null_mut(),
    }
}

/// Stop the session and release the handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn teleop_engine_destroy(engine: *mut TeleopEngine) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Port the session listens on.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn teleop_engine_port(engine: *const TeleopEngine) -> u16 {
    if engine.is_null() {
        return 0;
    }
    (*engine).engine.local_addr().port()
}

/// Well-known port for a transport.
#[unsafe(no_mangle)]
pub extern "C" fn teleop_default_port(kind: TeleopKind) -> u16 {
    ConnectionKind::from(kind).default_port()
}

/// Check if the engine is still running.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn teleop_engine_is_running(engine: *const TeleopEngine) -> bool {
    if engine.is_null() {
        return false;
    }
    (*engine).engine.is_running()
}

/// Run one frame and write the resulting view to `snapshot_out` (may be
/// NULL).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn teleop_engine_tick(
    engine: *mut TeleopEngine,
    snapshot_out: *mut TeleopSnapshot,
) -> TeleopTick {
    if engine.is_null() {
        return TeleopTick::NullPointer;
    }
    let handle = &mut *engine;

    let outcome = handle.engine.tick(&mut handle.host);
    if !snapshot_out.is_null() {
        let snapshot = match outcome {
            TickOutcome::Continue => handle.host.latest.clone(),
            TickOutcome::Stop(_) => None,
        }
        .unwrap_or_else(|| handle.engine.snapshot());
        *snapshot_out = TeleopSnapshot::from(&snapshot);
    }

    match outcome {
        TickOutcome::Continue => TeleopTick::Continue,
        TickOutcome::Stop(reason) => TeleopTick::from(&reason),
    }
}

/// Press the send control. Applied on the next tick; ignored there if no
/// peer is connected or a measurement is pending.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn teleop_engine_send_command(engine: *const TeleopEngine) -> TeleopResult {
    if engine.is_null() {
        return TeleopResult::NullPointer;
    }
    let engine = &(*engine).engine;
    if !engine.is_running() {
        return TeleopResult::NotRunning;
    }
    engine.intent_sender().push(UiIntent::SendCommand);
    TeleopResult::Ok
}

/// Request a stop; the next tick tears the session down.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn teleop_engine_stop(engine: *const TeleopEngine) {
    if !engine.is_null() {
        (*engine).engine.stop_signal().trigger();
    }
}

// =============================================================================
// Version Information
// =============================================================================

/// Get the library version string.
#[unsafe(no_mangle)]
pub extern "C" fn teleop_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr().cast::<c_char>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::net::{SocketAddr, TcpStream};

    #[test]
    fn test_teleop_version() {
        unsafe {
            let version = CStr::from_ptr(teleop_version()).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(teleop_default_port(TeleopKind::WebSocket), 9002);
        assert_eq!(teleop_default_port(TeleopKind::RawTcp), 9003);
    }

    #[test]
    fn test_null_handles() {
        unsafe {
            assert_eq!(teleop_engine_port(ptr::null()), 0);
            assert!(!teleop_engine_is_running(ptr::null()));
            assert_eq!(
                teleop_engine_tick(ptr::null_mut(), ptr::null_mut()),
                TeleopTick::NullPointer
            );
            assert_eq!(
                teleop_engine_send_command(ptr::null()),
                TeleopResult::NullPointer
            );
            teleop_engine_stop(ptr::null());
            teleop_engine_destroy(ptr::null_mut());
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let engine = teleop_engine_new(TeleopKind::RawTcp, 0);
        assert!(!engine.is_null());

        unsafe {
            let port = teleop_engine_port(engine);
            assert_ne!(port, 0);

            let mut snap = TeleopSnapshot::from(&(*engine).engine.snapshot());
            assert_eq!(teleop_engine_tick(engine, &mut snap), TeleopTick::Continue);
            assert_eq!(snap.phase, TeleopPhase::AwaitingConnection);

            // Not connected yet: accepted by the queue, ignored by the machine.
            assert_eq!(teleop_engine_send_command(engine), TeleopResult::Ok);
            teleop_engine_tick(engine, &mut snap);
            assert!(!snap.pending);

            let _peer = TcpStream::connect(SocketAddr::from(([127, 0, 0, 1], port))).unwrap();
            for _ in 0..500 {
                teleop_engine_tick(engine, &mut snap);
                if snap.connected {
                    break;
                }
            }
            assert!(snap.connected);
            assert_eq!(snap.phase, TeleopPhase::Connected);

            teleop_engine_stop(engine);
            assert_eq!(teleop_engine_tick(engine, &mut snap), TeleopTick::Stopped);
            assert_eq!(snap.phase, TeleopPhase::Terminated);
            assert!(!teleop_engine_is_running(engine));
            assert_eq!(
                teleop_engine_send_command(engine),
                TeleopResult::NotRunning
            );

            teleop_engine_destroy(engine);
        }
    }
}
