//! Queue benchmark: Measure event queue push and drain cost.
//!
//! Target: draining a frame's worth of events well under 1µs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::thread;
use teleop_latency::{EventQueue, UiIntent};

fn push_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push_drain");

    for count in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let queue = EventQueue::new();
            b.iter(|| {
                for _ in 0..count {
                    queue.push(UiIntent::SendCommand);
                }
                black_box(queue.drain_all())
            });
        });
    }

    group.finish();
}

fn drain_empty(c: &mut Criterion) {
    let queue: EventQueue<UiIntent> = EventQueue::new();
    c.bench_function("queue_drain_empty", |b| b.iter(|| black_box(queue.drain_all())));
}

fn cross_thread(c: &mut Criterion) {
    c.bench_function("queue_cross_thread_1000", |b| {
        b.iter(|| {
            let queue = EventQueue::new();
            let sender = queue.sender();
            let producer = thread::spawn(move || {
                for _ in 0..1000 {
                    sender.push(UiIntent::SendCommand);
                }
            });
            let _ = producer.join();
            black_box(queue.drain_all().len())
        });
    });
}

criterion_group!(benches, push_drain, drain_empty, cross_thread);
criterion_main!(benches);
