//! # Teleop Latency
//!
//! A round-trip latency bench for a single embedded peer.
//!
//! The bench listens for exactly one connection (WebSocket on 9002 or raw
//! TCP on 9003), sends a fixed command whenever the operator presses the
//! send control, and times how long the peer takes to acknowledge it.
//!
//! ## Core Concepts
//!
//! - **Frame-paced driver**: one [`Engine::tick`] per frame drains intents,
//!   drains I/O events, renders, then yields to I/O
//! - **Event queue**: asynchronous completions are queued, never applied
//!   from the I/O side
//! - **State machine**: [`LifecycleMachine`] owns the connection and the
//!   measurement; at most one command is ever in flight
//! - **Two execution models**: I/O on the frame thread between frames, or
//!   on a dedicated thread
//!
//! ## Example
//!
//! ```rust,no_run
//! use teleop_latency::{AutoFrontend, ConnectionKind, Engine, SessionConfig};
//! use std::time::Duration;
//!
//! let config = SessionConfig::for_kind(ConnectionKind::RawTcp);
//! let mut engine = Engine::start(config)?;
//! let mut frontend = AutoFrontend::new(Duration::from_millis(500)).with_limit(10);
//! let reason = engine.run(&mut frontend);
//! println!("{reason}: {:?}", engine.machine().stats());
//! # Ok::<(), teleop_latency::SessionError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ffi;
pub mod frontend;
pub mod logging;
pub mod peer;
pub mod queue;
pub mod transport;

// Re-exports for convenience
pub use actor::{
    Engine, Event, IntentSender, LatencyMeasurement, LatencyStats, LifecycleMachine, Phase,
    Snapshot, StopSignal, Termination, TickOutcome, UiIntent,
};
pub use config::{ExecutionModel, SessionConfig};
pub use error::{SessionError, TransportFault};
pub use frontend::{AutoFrontend, ConsoleFrontend, Frontend};
pub use queue::{EventQueue, QueueSender};
pub use transport::{ConnectionKind, ACKNOWLEDGMENT, COMMAND};
