//! Event Queue: unbounded FIFO between asynchronous producers and the
//! frame loop.
//!
//! Producers hold a [`QueueSender`] and may live on any thread (I/O tasks,
//! input threads, render callbacks). The single consumer drains the whole
//! queue once per frame with [`EventQueue::drain_all`]. Neither side blocks.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Unbounded, insertion-ordered queue with a single consumer.
#[derive(Debug)]
pub struct EventQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

/// Cloneable producer handle for an [`EventQueue`].
#[derive(Debug)]
pub struct QueueSender<T> {
    tx: Sender<T>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> QueueSender<T> {
    /// Push an item. Never blocks.
    ///
    /// The queue owns its receiver for as long as any consumer exists, so
    /// a failed send only happens after the consumer is gone; the item is
    /// dropped in that case.
    pub fn push(&self, item: T) {
        let _ = self.tx.send(item);
    }
}

impl<T> EventQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Get a producer handle.
    pub fn sender(&self) -> QueueSender<T> {
        QueueSender {
            tx: self.tx.clone(),
        }
    }

    /// Push an item from the consumer side.
    pub fn push(&self, item: T) {
        let _ = self.tx.send(item);
    }

    /// Take every queued item in push order. Returns immediately.
    pub fn drain_all(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_drain_preserves_push_order() {
        let queue = EventQueue::new();
        for i in 0..100 {
            queue.push(i);
        }

        let drained = queue.drain_all();
        assert_eq!(drained, (0..100).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_empty_returns_immediately() {
        let queue: EventQueue<u32> = EventQueue::new();
        assert!(queue.drain_all().is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_drain_only_takes_what_is_queued() {
        let queue = EventQueue::new();
        let sender = queue.sender();
        sender.push("a");
        sender.push("b");
        assert_eq!(queue.drain_all(), vec!["a", "b"]);

        sender.push("c");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_all(), vec!["c"]);
    }

    #[test]
    fn test_cross_thread_producer() {
        let queue = EventQueue::new();
        let sender = queue.sender();

        let producer = thread::spawn(move || {
            for i in 0..1000u32 {
                sender.push(i);
            }
        });

        let mut seen = Vec::new();
        while seen.len() < 1000 {
            seen.extend(queue.drain_all());
            thread::yield_now();
        }
        producer.join().unwrap();

        // Single producer: FIFO holds across drains, nothing lost or duplicated.
        assert_eq!(seen, (0..1000).collect::<Vec<_>>());
        assert!(queue.drain_all().is_empty());
    }
}
