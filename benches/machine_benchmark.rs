//! Machine benchmark: Measure one full command/acknowledgment cycle through
//! the state machine, without sockets.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Instant;
use teleop_latency::transport::{ActiveConnection, ConnectionHandle};
use teleop_latency::{ConnectionKind, Event, LifecycleMachine, UiIntent, ACKNOWLEDGMENT};

/// Connection that accepts everything and does nothing.
struct NullConnection;

impl ConnectionHandle for NullConnection {
    fn kind(&self) -> ConnectionKind {
        ConnectionKind::RawTcp
    }
    fn send(&mut self, _payload: Bytes) {}
    fn arm_receive(&mut self) {}
    fn close(&mut self) {}
}

fn connected_machine() -> LifecycleMachine {
    let mut machine = LifecycleMachine::new(ConnectionKind::RawTcp);
    machine.apply_event(Event::ConnectionEstablished(ActiveConnection::new(
        NullConnection,
    )));
    machine
}

fn round_trip_cycle(c: &mut Criterion) {
    let mut machine = connected_machine();

    c.bench_function("machine_round_trip", |b| {
        b.iter(|| {
            machine.apply_intent(UiIntent::SendCommand, Instant::now());
            machine.apply_event(Event::SendCompleted { len: 15 });
            machine.apply_event(Event::MessageReceived {
                payload: Bytes::from_static(ACKNOWLEDGMENT),
                received_at: Instant::now(),
            });
            black_box(machine.measurement().last_round_trip_ms)
        });
    });
}

fn ignored_send(c: &mut Criterion) {
    let mut machine = connected_machine();
    machine.apply_intent(UiIntent::SendCommand, Instant::now());

    c.bench_function("machine_send_while_pending", |b| {
        b.iter(|| machine.apply_intent(black_box(UiIntent::SendCommand), Instant::now()));
    });
}

criterion_group!(benches, round_trip_cycle, ignored_send);
criterion_main!(benches);
