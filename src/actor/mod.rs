//! Actor Model: the frame loop and the I/O it coordinates.
//!
//! Everything that touches the state machine happens on the frame thread.
//! Asynchronous I/O runs on a tokio runtime (on the frame thread between
//! frames, or on its own thread) and reports back through an event queue.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐      UiIntent       ┌──────────────────┐
//! │  Front-end   │ ─────────────────▶  │   Frame Loop     │
//! │  (render)    │ ◀───────────────── │ LifecycleMachine │
//! └──────────────┘      Snapshot       └──────────────────┘
//!                                        ▲           │
//!                                  Event │           │ send / arm_receive
//!                                        │           ▼
//!                                      ┌──────────────────┐
//!                                      │   I/O runtime    │
//!                                      │ accept/read/write│
//!                                      └──────────────────┘
//! ```

mod engine;
mod io;
mod machine;
mod messages;

pub use engine::{Engine, IntentSender, StopSignal, TickOutcome};
pub use io::{IoActor, IoRuntime};
pub use machine::{LatencyMeasurement, LatencyStats, LifecycleMachine, Phase, Termination};
pub use messages::{Event, Snapshot, UiIntent};
