//! Interactive terminal front-end.
//!
//! Owns the terminal for the lifetime of the session: raw mode, alternate
//! screen and a hidden cursor, all restored on drop. Key presses arrive from
//! an [`InputActor`] and are turned into intents during `render`.

use super::input::{ConsoleKey, InputActor};
use super::traits::Frontend;
use crate::actor::{IntentSender, Phase, Snapshot, UiIntent};
use crossbeam_channel::{bounded, Receiver};
use crossterm::{
    cursor, execute, queue,
    style::Print,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Stdout, Write};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

/// Key poll timeout for the input thread.
const INPUT_POLL: Duration = Duration::from_millis(50);

/// Terminal UI with a single send control.
pub struct ConsoleFrontend {
    listen: SocketAddr,
    keys: Receiver<ConsoleKey>,
    input: Option<InputActor>,
    stdout: Stdout,
    /// Lines currently on screen.
    shown: Vec<String>,
    closed: bool,
}

impl ConsoleFrontend {
    /// Take over the terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if terminal setup fails.
    pub fn new(listen: SocketAddr) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide, Clear(ClearType::All))?;

        let (key_tx, keys) = bounded(16);
        let input = InputActor::spawn(key_tx, INPUT_POLL)?;

        Ok(Self {
            listen,
            keys,
            input: Some(input),
            stdout,
            shown: Vec::new(),
            closed: false,
        })
    }

    fn draw(&mut self, lines: Vec<String>) -> io::Result<()> {
        for (row, line) in lines.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let row = row as u16;
            queue!(
                self.stdout,
                cursor::MoveTo(0, row),
                Clear(ClearType::CurrentLine),
                Print(line)
            )?;
        }
        self.stdout.flush()?;
        self.shown = lines;
        Ok(())
    }
}

impl Frontend for ConsoleFrontend {
    fn render(&mut self, snapshot: &Snapshot, intents: &IntentSender) {
        for key in self.keys.try_iter() {
            match key {
                // Disabled control: presses while not ready are dropped here.
                ConsoleKey::Send if snapshot.can_send() => intents.push(UiIntent::SendCommand),
                ConsoleKey::Send => {}
                ConsoleKey::Quit => self.closed = true,
            }
        }

        let lines = status_lines(snapshot, self.listen);
        if lines != self.shown {
            if let Err(err) = self.draw(lines) {
                warn!(error = %err, "console draw failed");
                self.closed = true;
            }
        }
    }

    fn close_requested(&self) -> bool {
        self.closed
    }
}

impl Drop for ConsoleFrontend {
    fn drop(&mut self) {
        if let Some(input) = self.input.take() {
            input.join();
        }
        let _ = execute!(self.stdout, cursor::Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Text of the status panel for one snapshot.
pub fn status_lines(snapshot: &Snapshot, listen: SocketAddr) -> Vec<String> {
    let control = if snapshot.can_send() {
        "[ Send command ]  (Enter)"
    } else if snapshot.pending {
        "[ waiting for ack ]"
    } else {
        "[ send disabled ]"
    };

    let status = match snapshot.phase {
        Phase::AwaitingConnection => format!("{} on {listen}", snapshot.phase.label()),
        phase => phase.label().to_string(),
    };

    let stats = &snapshot.stats;
    let aggregate = if stats.samples == 0 {
        "samples: 0".to_string()
    } else {
        format!(
            "samples: {}  min {:.3} ms  mean {:.3} ms  max {:.3} ms",
            stats.samples, stats.min_ms, stats.mean_ms, stats.max_ms
        )
    };

    vec![
        format!("teleop-latency  [{}]", snapshot.kind),
        format!("status: {status}"),
        String::new(),
        control.to_string(),
        String::new(),
        format!("last round trip: {:.3} ms", snapshot.last_round_trip_ms),
        aggregate,
        String::new(),
        "q / Esc: quit".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::LatencyStats;
    use crate::transport::ConnectionKind;
    use std::net::{IpAddr, Ipv4Addr};

    fn snapshot(phase: Phase, pending: bool) -> Snapshot {
        Snapshot {
            kind: ConnectionKind::RawTcp,
            phase,
            connected: phase.is_connected(),
            pending,
            last_round_trip_ms: 0.0,
            stats: LatencyStats::default(),
            frame: 0,
        }
    }

    fn listen() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 9003)
    }

    #[test]
    fn test_waiting_shows_endpoint() {
        let lines = status_lines(&snapshot(Phase::AwaitingConnection, false), listen());
        assert_eq!(lines[0], "teleop-latency  [RawTcp]");
        assert_eq!(lines[1], "status: waiting for connection on 0.0.0.0:9003");
        assert_eq!(lines[3], "[ send disabled ]");
    }

    #[test]
    fn test_control_follows_pending() {
        let idle = status_lines(&snapshot(Phase::Connected, false), listen());
        assert!(idle[3].starts_with("[ Send command ]"));

        let busy = status_lines(&snapshot(Phase::AwaitingAck, true), listen());
        assert_eq!(busy[3], "[ waiting for ack ]");
    }

    #[test]
    fn test_stats_line() {
        let mut snap = snapshot(Phase::Connected, false);
        snap.last_round_trip_ms = 1.5;
        snap.stats.record(1.5);
        snap.stats.record(2.5);

        let lines = status_lines(&snap, listen());
        assert_eq!(lines[5], "last round trip: 1.500 ms");
        assert_eq!(
            lines[6],
            "samples: 2  min 1.500 ms  mean 2.000 ms  max 2.500 ms"
        );
    }

    #[test]
    fn test_frame_counter_does_not_change_view() {
        let a = snapshot(Phase::Connected, false);
        let mut b = a.clone();
        b.frame = 99;
        assert_eq!(status_lines(&a, listen()), status_lines(&b, listen()));
    }
}
