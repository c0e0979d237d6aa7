//! WebSocket transport: server-side handshake and frame I/O.

use super::link::TaskConnection;
use super::{AcceptContext, ActiveConnection, ConnectionKind};
use crate::actor::Event;
use crate::error::TransportFault;
use crate::queue::QueueSender;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SERVER;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

type WsStream = WebSocketStream<TcpStream>;

/// Value of the `Server` header on the handshake response.
const SERVER_NAME: &str = concat!("teleop-latency/", env!("CARGO_PKG_VERSION"));

/// Run the upgrade handshake on an accepted stream.
pub(super) async fn handshake(stream: TcpStream) -> Result<WsStream, TransportFault> {
    let callback = |_request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        response
            .headers_mut()
            .insert(SERVER, HeaderValue::from_static(SERVER_NAME));
        Ok(response)
    };

    tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .map_err(|err| TransportFault::Handshake(err.to_string()))
}

/// Wrap an upgraded stream as the session's connection.
pub(super) fn adopt(
    ws: WsStream,
    context: &AcceptContext,
    cancel: CancellationToken,
) -> ActiveConnection {
    let (sink, stream) = ws.split();
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let reader = read_loop(stream, context.events.clone(), cancel.clone()).boxed();
    let writer = write_loop(sink, outbound_rx, context.events.clone(), cancel.clone()).boxed();

    TaskConnection::spawn(
        ConnectionKind::WebSocket,
        context.runtime.clone(),
        context.events.clone(),
        cancel,
        outbound,
        reader,
        writer,
    )
}

fn fault_from(err: tungstenite::Error) -> TransportFault {
    match err {
        tungstenite::Error::ConnectionClosed
        | tungstenite::Error::AlreadyClosed
        | tungstenite::Error::Protocol(
            tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
        ) => TransportFault::Closed,
        tungstenite::Error::Io(io) => TransportFault::from(io),
        other => TransportFault::Io(other.to_string()),
    }
}

/// One full frame per receive; empty frames are skipped and the read retried.
async fn read_loop(
    mut stream: SplitStream<WsStream>,
    events: QueueSender<Event>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return,
            next = stream.next() => next,
        };
        let payload = match next {
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(data))) => data,
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "websocket closed by peer");
                events.push(Event::TransportError(TransportFault::Closed));
                return;
            }
            Some(Err(err)) => {
                let fault = fault_from(err);
                debug!(%fault, "websocket receive ended");
                events.push(Event::TransportError(fault));
                return;
            }
            None => {
                events.push(Event::TransportError(TransportFault::Closed));
                return;
            }
        };

        if payload.is_empty() {
            trace!("empty websocket frame, reading again");
            continue;
        }
        trace!(bytes = payload.len(), "websocket message received");
        events.push(Event::MessageReceived {
            payload: Bytes::from(payload),
            received_at: Instant::now(),
        });
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
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

        let len = payload.len();
        let message = match String::from_utf8(payload.to_vec()) {
            Ok(text) => Message::Text(text),
            Err(err) => Message::Binary(err.into_bytes()),
        };
        if let Err(err) = sink.send(message).await {
            let fault = fault_from(err);
            debug!(%fault, "websocket send failed");
            events.push(Event::TransportError(fault));
            return;
        }
        events.push(Event::SendCompleted { len });
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_errors_map_to_closed() {
        assert_eq!(fault_from(tungstenite::Error::ConnectionClosed), TransportFault::Closed);
        assert_eq!(fault_from(tungstenite::Error::AlreadyClosed), TransportFault::Closed);
    }

    #[test]
    fn test_server_name_has_version() {
        assert!(SERVER_NAME.starts_with("teleop-latency/"));
    }
}
