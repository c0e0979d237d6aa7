//! Session configuration.

use crate::transport::ConnectionKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Where the asynchronous I/O runtime runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionModel {
    /// I/O runs on the frame thread, driven between frames.
    #[default]
    Cooperative,
    /// I/O runs on a dedicated background thread.
    Background,
}

/// Configuration for one benchmark session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Transport the peer connects with.
    pub kind: ConnectionKind,
    /// Address to listen on.
    pub bind_address: IpAddr,
    /// Port to listen on (0 picks an ephemeral port).
    pub port: u16,
    /// Target frames per second for the frame loop.
    pub target_fps: u32,
    /// I/O runtime placement.
    pub execution: ExecutionModel,
}

impl SessionConfig {
    /// Defaults for the given transport: all interfaces, the kind's
    /// well-known port, 60 FPS, cooperative I/O.
    pub const fn for_kind(kind: ConnectionKind) -> Self {
        Self {
            kind,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: kind.default_port(),
            target_fps: 60,
            execution: ExecutionModel::Cooperative,
        }
    }

    /// Override the listening port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the bind address.
    #[must_use]
    pub const fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Override the execution model.
    #[must_use]
    pub const fn with_execution(mut self, execution: ExecutionModel) -> Self {
        self.execution = execution;
        self
    }

    /// Override the frame rate. Zero is clamped to one.
    #[must_use]
    pub const fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = if fps == 0 { 1 } else { fps };
        self
    }

    /// The socket address to bind.
    pub const fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Duration of one frame at the target rate.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::for_kind(ConnectionKind::WebSocket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_kind() {
        let ws = SessionConfig::for_kind(ConnectionKind::WebSocket);
        assert_eq!(ws.port, 9002);
        assert_eq!(ws.bind_addr().to_string(), "0.0.0.0:9002");

        let tcp = SessionConfig::for_kind(ConnectionKind::RawTcp);
        assert_eq!(tcp.port, 9003);
        assert_eq!(tcp.execution, ExecutionModel::Cooperative);
    }

    #[test]
    fn test_frame_duration() {
        let config = SessionConfig::default().with_target_fps(50);
        assert_eq!(config.frame_duration(), Duration::from_millis(20));

        let clamped = SessionConfig::default().with_target_fps(0);
        assert_eq!(clamped.target_fps, 1);
        assert_eq!(clamped.frame_duration(), Duration::from_secs(1));
    }
}
