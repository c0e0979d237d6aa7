//! Peer simulator: stands in for the embedded device.
//!
//! Connects to a listening session, answers every command with the
//! acknowledgment and returns once the session closes the connection.

use crate::transport::{ConnectionKind, ACKNOWLEDGMENT};
use futures_util::{SinkExt, StreamExt};
use std::io;
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How long to keep retrying the initial connect.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_RETRY: Duration = Duration::from_millis(20);

/// What the peer saw during one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerReport {
    /// Commands answered.
    pub commands: u64,
    /// `Server` header of the WebSocket handshake response.
    pub server: Option<String>,
}

/// Peer failure.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Nothing accepted within the connect timeout.
    #[error("could not connect to {addr}: {source}")]
    Connect {
        /// Session address.
        addr: SocketAddr,
        /// Last connect error.
        source: io::Error,
    },
    /// The WebSocket upgrade was rejected.
    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),
    /// Socket error mid-session.
    #[error("peer I/O error: {0}")]
    Io(#[from] io::Error),
    /// The peer thread panicked.
    #[error("peer thread panicked")]
    Panicked,
}

/// Serve one session at `addr` until it ends or `cancel` fires.
pub async fn run(
    kind: ConnectionKind,
    addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<PeerReport, PeerError> {
    let Some(stream) = connect(addr, &cancel).await? else {
        return Ok(PeerReport::default());
    };
    info!(%kind, %addr, "peer connected");

    let session = async {
        match kind {
            ConnectionKind::RawTcp => serve_raw(stream).await,
            ConnectionKind::WebSocket => serve_websocket(stream, addr).await,
        }
    };

    tokio::select! {
        () = cancel.cancelled() => Ok(PeerReport::default()),
        report = session => report,
    }
}

/// `None` when cancelled before connecting.
async fn connect(
    addr: SocketAddr,
    cancel: &CancellationToken,
) -> Result<Option<TcpStream>, PeerError> {
    let deadline = Instant::now() + CONNECT_TIMEOUT;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(Some(stream));
            }
            Err(source) if Instant::now() >= deadline => {
                return Err(PeerError::Connect { addr, source });
            }
            Err(err) => debug!(error = %err, "connect retry"),
        }
        tokio::select! {
            () = cancel.cancelled() => return Ok(None),
            () = tokio::time::sleep(CONNECT_RETRY) => {}
        }
    }
}

async fn serve_raw(stream: TcpStream) -> Result<PeerReport, PeerError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut report = PeerReport::default();

    while let Some(line) = lines.next_line().await? {
        debug!(command = %line, "command");
        report.commands += 1;
        writer.write_all(ACKNOWLEDGMENT).await?;
        writer.flush().await?;
    }
    info!(commands = report.commands, "session closed");
    Ok(report)
}

async fn serve_websocket(stream: TcpStream, addr: SocketAddr) -> Result<PeerReport, PeerError> {
    let url = format!("ws://{addr}/");
    let (mut ws, response) = tokio_tungstenite::client_async(url.as_str(), stream)
        .await
        .map_err(PeerError::Handshake)?;

    let mut report = PeerReport {
        server: response
            .headers()
            .get("server")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned),
        ..PeerReport::default()
    };
    let ack = String::from_utf8_lossy(ACKNOWLEDGMENT).into_owned();

    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(_) | Message::Binary(_)) => {
                report.commands += 1;
                if let Err(err) = ws.send(Message::Text(ack.clone())).await {
                    debug!(error = %err, "reply failed");
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "session ended");
                break;
            }
        }
    }
    info!(commands = report.commands, "session closed");
    Ok(report)
}

/// A peer running on its own thread.
pub struct PeerHandle {
    handle: Option<JoinHandle<Result<PeerReport, PeerError>>>,
    cancel: CancellationToken,
}

impl PeerHandle {
    /// Start a peer for `kind` at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned. Runtime and
    /// connection failures are reported by [`PeerHandle::join`].
    pub fn spawn(kind: ConnectionKind, addr: SocketAddr) -> io::Result<Self> {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = thread::Builder::new()
            .name("teleop-peer".to_string())
            .spawn(move || -> Result<PeerReport, PeerError> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(run(kind, addr, token))
            })?;

        Ok(Self {
            handle: Some(handle),
            cancel,
        })
    }

    /// Ask the peer to hang up.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the session to end.
    pub fn join(mut self) -> Result<PeerReport, PeerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| PeerError::Panicked)?,
            None => Ok(PeerReport::default()),
        }
    }
}

impl Drop for PeerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Event;
    use crate::queue::EventQueue;
    use crate::transport::{begin_accept, AcceptContext, COMMAND};
    use bytes::Bytes;
    use std::io::{Read, Write};
    use std::net::{IpAddr, Ipv4Addr, TcpListener};

    #[test]
    fn test_raw_peer_answers_each_line() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = PeerHandle::spawn(ConnectionKind::RawTcp, addr).unwrap();
        let (mut stream, _) = listener.accept().unwrap();

        let mut ack = [0u8; ACKNOWLEDGMENT.len()];
        for _ in 0..3 {
            stream.write_all(COMMAND).unwrap();
            stream.read_exact(&mut ack).unwrap();
            assert_eq!(&ack, ACKNOWLEDGMENT);
        }
        drop(stream);

        assert_eq!(peer.join().unwrap().commands, 3);
    }

    #[test]
    fn test_websocket_peer_sees_server_header() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let events = EventQueue::new();
        let context = AcceptContext {
            runtime: runtime.handle().clone(),
            events: events.sender(),
            cancel: CancellationToken::new(),
        };
        let pending = begin_accept(
            ConnectionKind::WebSocket,
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
            &context,
        )
        .unwrap();
        let peer = PeerHandle::spawn(ConnectionKind::WebSocket, pending.local_addr()).unwrap();

        let mut connection = None;
        let deadline = Instant::now() + Duration::from_secs(5);
        while connection.is_none() && Instant::now() < deadline {
            runtime.block_on(async { tokio::time::sleep(Duration::from_millis(5)).await });
            for event in events.drain_all() {
                if let Event::ConnectionEstablished(conn) = event {
                    connection = Some(conn);
                }
            }
        }
        let mut connection = connection.unwrap();
        connection.arm_receive();
        connection.send(Bytes::from_static(COMMAND));

        let mut acked = false;
        while !acked && Instant::now() < deadline {
            runtime.block_on(async { tokio::time::sleep(Duration::from_millis(5)).await });
            acked = events.drain_all().iter().any(|event| {
                matches!(
                    event,
                    Event::MessageReceived { payload, .. } if &payload[..] == ACKNOWLEDGMENT
                )
            });
        }
        assert!(acked);

        connection.close();
        drop(connection);
        // Let the runtime flush the close before the peer is joined.
        runtime.block_on(async { tokio::time::sleep(Duration::from_millis(20)).await });
        runtime.shutdown_timeout(Duration::from_millis(100));

        let report = peer.join().unwrap();
        assert_eq!(report.commands, 1);
        assert!(report.server.unwrap().starts_with("teleop-latency/"));
    }

    #[test]
    fn test_cancelled_before_connect() {
        // Bind then drop to get a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = runtime
            .block_on(run(ConnectionKind::RawTcp, addr, cancel))
            .unwrap();
        assert_eq!(report, PeerReport::default());
    }
}
