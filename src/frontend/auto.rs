//! Headless front-end that presses the send control on a timer.

use super::traits::Frontend;
use crate::actor::{IntentSender, Snapshot, UiIntent};
use std::time::{Duration, Instant};
use tracing::info;

/// Sends a command every `interval` while the control is enabled, and asks
/// to close once `limit` samples are in.
#[derive(Debug)]
pub struct AutoFrontend {
    interval: Duration,
    limit: Option<u64>,
    last_press: Option<Instant>,
    logged: u64,
    done: bool,
}

impl AutoFrontend {
    /// Press every `interval`, forever.
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            limit: None,
            last_press: None,
            logged: 0,
            done: false,
        }
    }

    /// Stop after `samples` completed measurements.
    #[must_use]
    pub const fn with_limit(mut self, samples: u64) -> Self {
        self.limit = Some(samples);
        self
    }

    fn due(&self, now: Instant) -> bool {
        self.last_press
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }
}

impl Frontend for AutoFrontend {
    fn render(&mut self, snapshot: &Snapshot, intents: &IntentSender) {
        if snapshot.stats.samples > self.logged {
            self.logged = snapshot.stats.samples;
            info!(
                sample = self.logged,
                round_trip_ms = snapshot.last_round_trip_ms,
                "round trip"
            );
        }
        if self.limit.is_some_and(|limit| self.logged >= limit) {
            self.done = true;
            return;
        }

        let now = Instant::now();
        if snapshot.can_send() && self.due(now) {
            self.last_press = Some(now);
            intents.push(UiIntent::SendCommand);
        }
    }

    fn close_requested(&self) -> bool {
        self.done
    }
}
