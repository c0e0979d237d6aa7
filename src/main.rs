//! Command-line launcher for the latency bench.

use clap::{Parser, ValueEnum};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use teleop_latency::logging::{self, LogConfig, LogLevel};
use teleop_latency::{
    AutoFrontend, ConnectionKind, ConsoleFrontend, Engine, ExecutionModel, SessionConfig,
    Termination,
};
use tracing::warn;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Transport {
    /// WebSocket frames (default port 9002).
    Websocket,
    /// Raw TCP bytes (default port 9003).
    #[value(alias = "custom-tcp")]
    RawTcp,
}

impl From<Transport> for ConnectionKind {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Websocket => Self::WebSocket,
            Transport::RawTcp => Self::RawTcp,
        }
    }
}

/// Measure command round-trip latency to one embedded peer.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Transport the peer connects with.
    #[arg(long, value_enum, default_value = "websocket")]
    transport: Transport,

    /// Address to listen on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Port to listen on (defaults to the transport's well-known port).
    #[arg(long)]
    port: Option<u16>,

    /// Frame rate of the UI loop.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Run socket I/O on a dedicated thread instead of between frames.
    #[arg(long)]
    background_io: bool,

    /// Headless: press send every MS milliseconds instead of opening the console.
    #[arg(long, value_name = "MS")]
    auto: Option<u64>,

    /// Headless: stop after this many samples.
    #[arg(long, requires = "auto")]
    samples: Option<u64>,

    /// Log verbosity.
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Append logs to this file. The console front-end only logs to a file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        let kind = ConnectionKind::from(self.transport);
        let execution = if self.background_io {
            ExecutionModel::Background
        } else {
            ExecutionModel::Cooperative
        };
        SessionConfig::for_kind(kind)
            .with_bind_address(self.bind)
            .with_port(self.port.unwrap_or_else(|| kind.default_port()))
            .with_target_fps(self.fps)
            .with_execution(execution)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let headless = args.auto.is_some();

    if headless || args.log_file.is_some() {
        let config = LogConfig {
            level: args.log_level,
            file: args.log_file.clone(),
        };
        if let Err(err) = logging::init(&config) {
            eprintln!("teleop-latency: {err}");
            return ExitCode::FAILURE;
        }
    }

    let mut engine = match Engine::start(args.session_config()) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("teleop-latency: {err}");
            return ExitCode::FAILURE;
        }
    };

    let stop = engine.stop_signal();
    if let Err(err) = ctrlc::set_handler(move || stop.trigger()) {
        warn!(error = %err, "failed to install Ctrl-C handler");
    }

    let reason = if let Some(interval) = args.auto {
        let mut frontend = AutoFrontend::new(Duration::from_millis(interval));
        if let Some(samples) = args.samples {
            frontend = frontend.with_limit(samples);
        }
        println!(
            "listening for {} on {}",
            engine.config().kind,
            engine.local_addr()
        );
        engine.run(&mut frontend)
    } else {
        match ConsoleFrontend::new(engine.local_addr()) {
            Ok(mut frontend) => engine.run(&mut frontend),
            Err(err) => {
                eprintln!("teleop-latency: terminal setup failed: {err}");
                return ExitCode::FAILURE;
            }
        }
    };

    print_summary(&engine, &reason);
    if reason.is_fault() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_summary(engine: &Engine, reason: &Termination) {
    let stats = engine.machine().stats();
    println!("session ended: {reason}");
    if stats.samples == 0 {
        println!("no round trips measured");
        return;
    }
    println!(
        "{} round trips: last {:.3} ms, min {:.3} ms, mean {:.3} ms, max {:.3} ms",
        stats.samples,
        engine.machine().measurement().last_round_trip_ms,
        stats.min_ms,
        stats.mean_ms,
        stats.max_ms
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["teleop-latency"]);
        let config = args.session_config();
        assert_eq!(config.kind, ConnectionKind::WebSocket);
        assert_eq!(config.port, 9002);
        assert_eq!(config.execution, ExecutionModel::Cooperative);
    }

    #[test]
    fn test_custom_tcp_alias() {
        let args = Args::parse_from(["teleop-latency", "--transport", "custom-tcp"]);
        let config = args.session_config();
        assert_eq!(config.kind, ConnectionKind::RawTcp);
        assert_eq!(config.port, 9003);
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "teleop-latency",
            "--transport",
            "raw-tcp",
            "--port",
            "0",
            "--background-io",
            "--auto",
            "250",
            "--samples",
            "5",
        ]);
        let config = args.session_config();
        assert_eq!(config.port, 0);
        assert_eq!(config.execution, ExecutionModel::Background);
        assert_eq!(args.auto, Some(250));
        assert_eq!(args.samples, Some(5));
    }

    #[test]
    fn test_samples_requires_auto() {
        assert!(Args::try_parse_from(["teleop-latency", "--samples", "3"]).is_err());
    }
}
