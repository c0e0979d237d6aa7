//! Raw TCP transport: fixed-length acknowledgments, no framing.

use super::link::TaskConnection;
use super::{AcceptContext, ActiveConnection, ConnectionKind, ACKNOWLEDGMENT};
use crate::actor::Event;
use crate::error::TransportFault;
use crate::queue::QueueSender;
use bytes::Bytes;
use futures_util::FutureExt;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Wrap an accepted stream as the session's connection.
pub(super) fn adopt(
    stream: TcpStream,
    context: &AcceptContext,
    cancel: CancellationToken,
) -> ActiveConnection {
    if let Err(err) = stream.set_nodelay(true) {
        warn!(error = %err, "failed to disable Nagle's algorithm");
    }

    let (read_half, write_half) = stream.into_split();
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let reader = read_loop(read_half, context.events.clone(), cancel.clone()).boxed();
    let writer = write_loop(
        write_half,
        outbound_rx,
        context.events.clone(),
        cancel.clone(),
    )
    .boxed();

    TaskConnection::spawn(
        ConnectionKind::RawTcp,
        context.runtime.clone(),
        context.events.clone(),
        cancel,
        outbound,
        reader,
        writer,
    )
}

/// Read acknowledgments of exactly `ACKNOWLEDGMENT.len()` bytes forever.
///
/// End of stream is the peer closing the socket and ends the loop.
async fn read_loop(
    mut reader: OwnedReadHalf,
    events: QueueSender<Event>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; ACKNOWLEDGMENT.len()];
    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => return,
            result = reader.read_exact(&mut buf) => result,
        };
        match result {
            Ok(n) => {
                trace!(bytes = n, "tcp message received");
                events.push(Event::MessageReceived {
                    payload: Bytes::copy_from_slice(&buf),
                    received_at: Instant::now(),
                });
            }
            Err(err) => {
                let fault = TransportFault::from(err);
                debug!(%fault, "tcp receive ended");
                events.push(Event::TransportError(fault));
                return;
            }
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: UnboundedReceiver<Bytes>,
    events: QueueSender<Event>,
    cancel: CancellationToken,
) {
    loop {
        let payload = tokio::select! {
            () = cancel.cancelled() => break,
            next = outbound.recv() => match next {
                Some(payload) => payload,
                None => break,
            },
        };

        let result = match writer.write_all(&payload).await {
            Ok(()) => writer.flush().await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => events.push(Event::SendCompleted { len: payload.len() }),
            Err(err) => {
                let fault = TransportFault::from(err);
                debug!(%fault, "tcp send failed");
                events.push(Event::TransportError(fault));
                return;
            }
        }
    }
    let _ = writer.shutdown().await;
}
