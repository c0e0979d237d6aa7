//! Peer Simulator: Stands in for the embedded device.
//!
//! Start the bench first, then:
//!
//! ```text
//! cargo run --example peer_sim -- --transport raw-tcp --addr 127.0.0.1:9003
//! ```
//!
//! Every command is answered with the acknowledgment until the bench closes
//! the connection or Ctrl-C is pressed.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::process::ExitCode;
use teleop_latency::logging::{self, LogConfig, LogLevel};
use teleop_latency::peer::PeerHandle;
use teleop_latency::ConnectionKind;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Transport {
    Websocket,
    RawTcp,
}

#[derive(Debug, Parser)]
#[command(about = "Answer bench commands like the embedded peer would")]
struct Args {
    /// Transport to connect with.
    #[arg(long, value_enum, default_value = "websocket")]
    transport: Transport,

    /// Bench address (defaults to localhost on the transport's port).
    #[arg(long)]
    addr: Option<SocketAddr>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _ = logging::init(&LogConfig {
        level: LogLevel::Info,
        file: None,
    });

    let kind = match args.transport {
        Transport::Websocket => ConnectionKind::WebSocket,
        Transport::RawTcp => ConnectionKind::RawTcp,
    };
    let addr = args
        .addr
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], kind.default_port())));

    let peer = match PeerHandle::spawn(kind, addr) {
        Ok(peer) => peer,
        Err(err) => {
            eprintln!("peer_sim: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("Peer Simulator");
    println!("==============");
    println!("Connecting to {addr} over {kind}. Press Ctrl-C to hang up.\n");

    match peer.join() {
        Ok(report) => {
            println!("answered {} commands", report.commands);
            if let Some(server) = report.server {
                println!("bench identified as {server}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("peer_sim: {err}");
            ExitCode::FAILURE
        }
    }
}
