//! Task-backed connection handle shared by both transports.
//!
//! The socket is split into a reader future and a writer future. The writer
//! is spawned immediately and fed through an unbounded channel; the reader
//! is parked until the state machine arms it.

use super::{ActiveConnection, ConnectionHandle, ConnectionKind};
use crate::actor::Event;
use crate::error::TransportFault;
use crate::queue::QueueSender;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Connection whose I/O runs as tasks on the session runtime.
pub struct TaskConnection {
    kind: ConnectionKind,
    runtime: Handle,
    events: QueueSender<Event>,
    outbound: UnboundedSender<Bytes>,
    /// Receive loop, parked until `arm_receive`.
    reader: Option<BoxFuture<'static, ()>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    closed: bool,
}

impl TaskConnection {
    /// Build the handle and spawn its writer.
    pub(crate) fn spawn(
        kind: ConnectionKind,
        runtime: Handle,
        events: QueueSender<Event>,
        cancel: CancellationToken,
        outbound: UnboundedSender<Bytes>,
        reader: BoxFuture<'static, ()>,
        writer: BoxFuture<'static, ()>,
    ) -> ActiveConnection {
        let writer_task = runtime.spawn(writer);
        ActiveConnection::new(Self {
            kind,
            runtime,
            events,
            outbound,
            reader: Some(reader),
            cancel,
            tasks: vec![writer_task],
            closed: false,
        })
    }
}

impl ConnectionHandle for TaskConnection {
    fn kind(&self) -> ConnectionKind {
        self.kind
    }

    fn send(&mut self, payload: Bytes) {
        if self.closed || self.outbound.send(payload).is_err() {
            // Writer already gone; it reported its own fault if it had one.
            self.events.push(Event::TransportError(TransportFault::Closed));
        }
    }

    fn arm_receive(&mut self) {
        if self.closed {
            return;
        }
        if let Some(reader) = self.reader.take() {
            self.tasks.push(self.runtime.spawn(reader));
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cancel.cancel();
        self.reader = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        debug!(kind = %self.kind, "connection closed");
    }
}

impl Drop for TaskConnection {
    fn drop(&mut self) {
        self.close();
    }
}
