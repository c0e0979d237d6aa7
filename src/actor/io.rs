//! I/O runtime placement: on the frame thread or on a dedicated actor thread.
//!
//! Both variants run a tokio current-thread runtime. In the cooperative
//! variant the frame driver lends its thread to the runtime between frames;
//! in the background variant an [`IoActor`] thread drives the runtime and
//! the event queue is the only thing shared with the frame thread.

use crate::config::ExecutionModel;
use crate::error::SessionError;
use crossbeam_channel::bounded;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Dedicated thread running the I/O runtime.
pub struct IoActor {
    /// Handle to the I/O thread.
    handle: Option<JoinHandle<()>>,
    /// Runtime handle for spawning tasks from other threads.
    runtime: Handle,
    /// Signals the runtime to stop.
    shutdown: CancellationToken,
}

impl IoActor {
    /// Spawn the I/O thread and wait for its runtime to come up.
    pub fn spawn() -> Result<Self, SessionError> {
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();
        let (ready_tx, ready_rx) = bounded::<io::Result<Handle>>(1);

        let handle = thread::Builder::new()
            .name("teleop-io".to_string())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(runtime.handle().clone()));
                runtime.block_on(shutdown_clone.cancelled());
                debug!("I/O thread exiting");
            })
            .map_err(SessionError::Runtime)?;

        let runtime = match ready_rx.recv() {
            Ok(Ok(runtime)) => runtime,
            Ok(Err(err)) => {
                let _ = handle.join();
                return Err(SessionError::Runtime(err));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(SessionError::Runtime(io::Error::other(
                    "I/O thread exited during startup",
                )));
            }
        };

        Ok(Self {
            handle: Some(handle),
            runtime,
            shutdown,
        })
    }

    /// Runtime handle.
    pub const fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Signal the I/O thread to stop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Stop the I/O thread and wait for it to finish.
    pub fn join(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for IoActor {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// The session's I/O runtime in either execution model.
pub enum IoRuntime {
    /// Runtime driven by the frame thread between frames.
    Cooperative(Runtime),
    /// Runtime on its own thread.
    Background(IoActor),
}

impl IoRuntime {
    /// Start a runtime for the given model.
    pub fn start(model: ExecutionModel) -> Result<Self, SessionError> {
        match model {
            ExecutionModel::Cooperative => Builder::new_current_thread()
                .enable_all()
                .build()
                .map(Self::Cooperative)
                .map_err(SessionError::Runtime),
            ExecutionModel::Background => IoActor::spawn().map(Self::Background),
        }
    }

    /// Runtime handle.
    pub fn handle(&self) -> Handle {
        match self {
            Self::Cooperative(runtime) => runtime.handle().clone(),
            Self::Background(actor) => actor.runtime().clone(),
        }
    }

    /// Spend the rest of the frame. The cooperative runtime runs its ready
    /// tasks and timers for the whole budget, and at least one scheduling
    /// pass when the budget is already spent.
    ///
    /// The timer is created inside `block_on`: a `Sleep` built outside the
    /// runtime context panics.
    pub fn idle(&self, budget: Duration) {
        match self {
            Self::Cooperative(runtime) => {
                if budget.is_zero() {
                    runtime.block_on(async { tokio::task::yield_now().await });
                } else {
                    runtime.block_on(async { tokio::time::sleep(budget).await });
                }
            }
            Self::Background(_) => {
                if !budget.is_zero() {
                    thread::sleep(budget);
                }
            }
        }
    }

    /// Stop the runtime. Outstanding tasks are dropped; the background
    /// thread is joined.
    pub fn shutdown(self) {
        match self {
            Self::Cooperative(runtime) => runtime.shutdown_timeout(Duration::from_millis(100)),
            Self::Background(actor) => actor.join(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_background_runs_spawned_tasks() {
        let io = IoRuntime::start(ExecutionModel::Background).unwrap();
        let (tx, rx) = bounded(1);
        io.handle().spawn(async move {
            let _ = tx.send(thread::current().name().map(str::to_string));
        });

        let name = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(name.as_deref(), Some("teleop-io"));
        io.shutdown();
    }

    #[test]
    fn test_cooperative_runs_tasks_only_while_idle() {
        let io = IoRuntime::start(ExecutionModel::Cooperative).unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        io.handle().spawn(async move {
            ran_clone.store(true, Ordering::SeqCst);
        });

        assert!(!ran.load(Ordering::SeqCst));
        io.idle(Duration::from_millis(10));
        assert!(ran.load(Ordering::SeqCst));
        io.shutdown();
    }

    #[test]
    fn test_cooperative_idle_from_plain_thread() {
        let io = IoRuntime::start(ExecutionModel::Cooperative).unwrap();
        let started = std::time::Instant::now();

        io.idle(Duration::ZERO);
        io.idle(Duration::from_millis(20));

        assert!(started.elapsed() >= Duration::from_millis(20));
        io.shutdown();
    }

    #[test]
    fn test_actor_join_is_prompt() {
        let actor = IoActor::spawn().unwrap();
        actor.shutdown();
        actor.join();
    }
}
