//! Engine: the frame driver.
//!
//! The Engine is the entry point for applications. It owns the I/O runtime,
//! the two queues and the state machine, and advances them one frame per
//! [`Engine::tick`]:
//!
//! 1. stop signal or close request → teardown
//! 2. drain UI intents into the machine
//! 3. drain I/O events into the machine
//! 4. render the snapshot
//! 5. yield to the I/O runtime until the next frame

use super::io::IoRuntime;
use super::machine::{LifecycleMachine, Termination};
use super::messages::{Event, Snapshot, UiIntent};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::frontend::Frontend;
use crate::queue::{EventQueue, QueueSender};
use crate::transport::{begin_accept, AcceptContext};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Producer handle front-ends push intents through.
pub type IntentSender = QueueSender<UiIntent>;

/// External stop flag. Settable from any thread; polled once per tick.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// A cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the engine to stop.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether a stop was requested.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Call `tick` again.
    Continue,
    /// The session is over.
    Stop(Termination),
}

/// The latency bench engine.
pub struct Engine {
    /// Configuration.
    config: SessionConfig,
    /// I/O runtime (taken on teardown).
    io: Option<IoRuntime>,
    /// Lifecycle state machine.
    machine: LifecycleMachine,
    /// I/O completions.
    events: EventQueue<Event>,
    /// Front-end intents.
    intents: EventQueue<UiIntent>,
    intent_tx: IntentSender,
    /// External stop flag.
    stop: StopSignal,
    /// Cancels every I/O task of the session.
    cancel: CancellationToken,
    /// Address the listener bound to.
    local_addr: SocketAddr,
    /// Frame timing.
    frame_start: Instant,
    frame_duration: Duration,
    frame_count: u64,
    /// Whether the engine is still running.
    running: bool,
}

impl Engine {
    /// Start a session: bring up the I/O runtime and begin accepting.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot start or the endpoint cannot
    /// be bound.
    pub fn start(config: SessionConfig) -> Result<Self, SessionError> {
        let io = IoRuntime::start(config.execution)?;
        let events = EventQueue::new();
        let intents = EventQueue::new();
        let cancel = CancellationToken::new();

        let context = AcceptContext {
            runtime: io.handle(),
            events: events.sender(),
            cancel: cancel.clone(),
        };
        let pending = begin_accept(config.kind, config.bind_address, config.port, &context)?;
        let local_addr = pending.local_addr();
        info!(kind = %config.kind, %local_addr, execution = ?config.execution, "session started");

        let frame_duration = config.frame_duration();
        let intent_tx = intents.sender();

        Ok(Self {
            config,
            io: Some(io),
            machine: LifecycleMachine::with_pending(pending),
            events,
            intents,
            intent_tx,
            stop: StopSignal::new(),
            cancel,
            local_addr,
            frame_start: Instant::now(),
            frame_duration,
            frame_count: 0,
            running: true,
        })
    }

    /// Session configuration.
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Address the listener is bound to.
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle to the stop flag.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// A producer for UI intents, usable from any thread.
    pub fn intent_sender(&self) -> IntentSender {
        self.intent_tx.clone()
    }

    /// The state machine.
    pub const fn machine(&self) -> &LifecycleMachine {
        &self.machine
    }

    /// Check if the engine is still running.
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Get the current frame count.
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Current read-only view.
    pub fn snapshot(&self) -> Snapshot {
        let measurement = self.machine.measurement();
        Snapshot {
            kind: self.machine.kind(),
            phase: self.machine.phase(),
            connected: self.machine.is_connected(),
            pending: measurement.pending,
            last_round_trip_ms: measurement.last_round_trip_ms,
            stats: *self.machine.stats(),
            frame: self.frame_count,
        }
    }

    /// Run one frame.
    pub fn tick<F: Frontend + ?Sized>(&mut self, frontend: &mut F) -> TickOutcome {
        if !self.running {
            return TickOutcome::Stop(self.termination());
        }
        self.frame_start = Instant::now();

        if self.stop.is_set() {
            info!("stopping due to stop signal");
            return self.teardown(Termination::Stopped);
        }
        if frontend.close_requested() {
            info!("stopping due to closed front-end");
            return self.teardown(Termination::WindowClosed);
        }

        for intent in self.intents.drain_all() {
            self.machine.apply_intent(intent, Instant::now());
        }
        for event in self.events.drain_all() {
            self.machine.apply_event(event);
        }

        let snapshot = self.snapshot();
        frontend.render(&snapshot, &self.intent_tx);
        self.frame_count += 1;

        if let Some(reason) = self.machine.termination().cloned() {
            return self.teardown(reason);
        }

        self.end_frame();
        TickOutcome::Continue
    }

    /// Tick until the session ends.
    pub fn run<F: Frontend + ?Sized>(&mut self, frontend: &mut F) -> Termination {
        loop {
            if let TickOutcome::Stop(reason) = self.tick(frontend) {
                return reason;
            }
        }
    }

    /// Yield to the I/O runtime for the rest of the frame.
    fn end_frame(&self) {
        let budget = self.frame_duration.saturating_sub(self.frame_start.elapsed());
        if let Some(io) = &self.io {
            io.idle(budget);
        }
    }

    fn termination(&self) -> Termination {
        self.machine
            .termination()
            .cloned()
            .unwrap_or(Termination::Stopped)
    }

    fn teardown(&mut self, reason: Termination) -> TickOutcome {
        self.machine.shutdown(reason);
        self.cancel.cancel();
        if let Some(io) = self.io.take() {
            io.shutdown();
        }
        self.running = false;

        let reason = self.termination();
        info!(?reason, frames = self.frame_count, "session ended");
        TickOutcome::Stop(reason)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.running {
            self.teardown(Termination::Stopped);
        }
    }
}
