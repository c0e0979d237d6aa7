//! Input Actor: Dedicated thread for polling terminal key events.
//!
//! Runs crossterm's event polling on its own thread so the frame loop
//! never blocks on the terminal.

use crossbeam_channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// Keys the console reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleKey {
    /// Press the send control.
    Send,
    /// Close the console.
    Quit,
}

impl ConsoleKey {
    /// Map a key press to a console action.
    pub fn from_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Self> {
        match code {
            KeyCode::Enter | KeyCode::Char(' ') => Some(Self::Send),
            KeyCode::Esc | KeyCode::Char('q') => Some(Self::Quit),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Input actor that polls terminal events.
pub struct InputActor {
    /// Handle to the input thread.
    handle: Option<JoinHandle<()>>,
    /// Flag to signal shutdown.
    shutdown: Arc<AtomicBool>,
}

impl InputActor {
    /// Spawn the input actor thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(sender: Sender<ConsoleKey>, poll_timeout: Duration) -> io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::Builder::new()
            .name("teleop-input".to_string())
            .spawn(move || Self::run_loop(&sender, &shutdown_clone, poll_timeout))?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Signal the input thread to shutdown.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Wait for the input thread to finish.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn run_loop(sender: &Sender<ConsoleKey>, shutdown: &AtomicBool, poll_timeout: Duration) {
        while !shutdown.load(Ordering::Relaxed) {
            match event::poll(poll_timeout) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        let Some(action) = ConsoleKey::from_key(key.code, key.modifiers) else {
                            continue;
                        };
                        if sender.send(action).is_err() {
                            // Receiver dropped
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "terminal read failed"),
                },
                Ok(false) => {}
                Err(err) => {
                    warn!(error = %err, "terminal poll failed");
                    let _ = sender.send(ConsoleKey::Quit);
                    break;
                }
            }
        }
    }
}

impl Drop for InputActor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        let none = KeyModifiers::NONE;
        assert_eq!(ConsoleKey::from_key(KeyCode::Enter, none), Some(ConsoleKey::Send));
        assert_eq!(ConsoleKey::from_key(KeyCode::Char(' '), none), Some(ConsoleKey::Send));
        assert_eq!(ConsoleKey::from_key(KeyCode::Char('q'), none), Some(ConsoleKey::Quit));
        assert_eq!(ConsoleKey::from_key(KeyCode::Esc, none), Some(ConsoleKey::Quit));
        assert_eq!(
            ConsoleKey::from_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(ConsoleKey::Quit)
        );
        assert_eq!(ConsoleKey::from_key(KeyCode::Char('c'), none), None);
        assert_eq!(ConsoleKey::from_key(KeyCode::Tab, none), None);
    }
}
