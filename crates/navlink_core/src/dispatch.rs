//! Inter-thread event dispatch.
//!
//! A [`DispatchQueue`] is one bounded FIFO channel of
//! `(payload, handler)` entries. Producers hold [`EventSink`]s (a
//! cloned sender bound to one handler) and a single consumer drains
//! the queue, invoking each entry's handler synchronously on the
//! draining context. FIFO order holds per queue; nothing is ordered
//! across queues. Handlers are expected to be cheap (a display
//! refresh, a small control decision); long work belongs elsewhere.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use crate::lifecycle::LifecycleFlag;

/// Handler invoked with each payload emitted through its sink.
pub type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Entry<T> {
    payload: T,
    handler: Handler<T>,
}

// ──────────────────────────────────────────────
// Queue & sinks
// ──────────────────────────────────────────────

/// A FIFO dispatch queue. Create sinks first, then convert into the
/// single [`DispatchLoop`] consumer; the conversion consumes the
/// queue, so a second drainer cannot exist.
pub struct DispatchQueue<T> {
    tx: Sender<Entry<T>>,
    rx: Receiver<Entry<T>>,
    label: &'static str,
}

impl<T: Send + 'static> DispatchQueue<T> {
    /// Bounded queue. When full, `emit` drops the entry: a stale
    /// event is worth less than a stalled producer thread.
    pub fn bounded(label: &'static str, depth: usize) -> Self {
        let (tx, rx) = bounded(depth);
        Self { tx, rx, label }
    }

    /// Binds a handler to this queue, yielding a producer-side sink.
    pub fn sink(&self, handler: impl Fn(T) + Send + Sync + 'static) -> EventSink<T> {
        EventSink {
            tx: self.tx.clone(),
            handler: Arc::new(handler),
            label: self.label,
        }
    }

    /// Converts the queue into its single draining consumer.
    pub fn into_loop(self, flag: LifecycleFlag, poll: Duration) -> DispatchLoop<T> {
        DispatchLoop {
            rx: self.rx,
            flag,
            poll,
            label: self.label,
        }
    }
}

/// Producer handle: every `emit` enqueues the payload paired with the
/// sink's handler.
pub struct EventSink<T> {
    tx: Sender<Entry<T>>,
    handler: Handler<T>,
    label: &'static str,
}

impl<T> Clone for EventSink<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            handler: self.handler.clone(),
            label: self.label,
        }
    }
}

impl<T: Send> EventSink<T> {
    /// Non-blocking enqueue. A full queue drops the entry with a
    /// debug log; a disconnected queue (consumer gone) likewise.
    pub fn emit(&self, payload: T) {
        let entry = Entry {
            payload,
            handler: self.handler.clone(),
        };
        if self.tx.try_send(entry).is_err() {
            debug!("{} queue full or closed, dropping event", self.label);
        }
    }
}

// ──────────────────────────────────────────────
// Draining loop
// ──────────────────────────────────────────────

/// Single consumer of one queue.
pub struct DispatchLoop<T> {
    rx: Receiver<Entry<T>>,
    flag: LifecycleFlag,
    poll: Duration,
    label: &'static str,
}

impl<T: Send + 'static> DispatchLoop<T> {
    /// Drains until the flag leaves `Running`, blocking at most
    /// `poll` per attempt so the flag stays responsive with an empty
    /// queue. Marks the flag `Stopped` on exit.
    pub fn run(self) {
        info!("{} dispatch loop started", self.label);
        while self.flag.is_running() {
            match self.rx.recv_timeout(self.poll) {
                Ok(entry) => (entry.handler)(entry.payload),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.flag.mark_stopped();
        info!("{} dispatch loop stopped", self.label);
    }

    /// Non-blocking drain for a consumer driven by an external
    /// periodic tick (a UI frame, a test). Runs every queued handler,
    /// returns how many entries were handled.
    pub fn drain_pending(&self) -> usize {
        let mut handled = 0;
        while let Ok(entry) = self.rx.try_recv() {
            (entry.handler)(entry.payload);
            handled += 1;
        }
        handled
    }

    /// Runs the loop on its own named thread.
    pub fn spawn(self, thread_name: &str) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name(thread_name.into())
            .spawn(move || self.run())
            .expect("failed to spawn dispatch thread")
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn drains_in_fifo_order() {
        let queue = DispatchQueue::bounded("test", 16);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_handler = seen.clone();
        let sink = queue.sink(move |n: u32| seen_handler.lock().unwrap().push(n));

        for n in 0..10 {
            sink.emit(n);
        }

        let dispatch = queue.into_loop(LifecycleFlag::new(), Duration::from_millis(10));
        assert_eq!(dispatch.drain_pending(), 10);
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn each_entry_carries_its_own_handler() {
        let queue = DispatchQueue::bounded("test", 16);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_a = seen.clone();
        let sink_a = queue.sink(move |n: u32| seen_a.lock().unwrap().push(("a", n)));
        let seen_b = seen.clone();
        let sink_b = queue.sink(move |n: u32| seen_b.lock().unwrap().push(("b", n)));

        sink_a.emit(1);
        sink_b.emit(2);
        sink_a.emit(3);

        let dispatch = queue.into_loop(LifecycleFlag::new(), Duration::from_millis(10));
        dispatch.drain_pending();
        assert_eq!(*seen.lock().unwrap(), vec![("a", 1), ("b", 2), ("a", 3)]);
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let queue = DispatchQueue::bounded("test", 2);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_handler = seen.clone();
        let sink = queue.sink(move |n: u32| seen_handler.lock().unwrap().push(n));

        for n in 0..5 {
            sink.emit(n); // entries 2..5 are dropped, producer never blocks
        }

        let dispatch = queue.into_loop(LifecycleFlag::new(), Duration::from_millis(10));
        assert_eq!(dispatch.drain_pending(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn loop_thread_handles_entries_and_stops() {
        let queue = DispatchQueue::bounded("test", 16);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_handler = seen.clone();
        let sink = queue.sink(move |n: u32| seen_handler.lock().unwrap().push(n));

        let flag = LifecycleFlag::new();
        let handle = queue
            .into_loop(flag.clone(), Duration::from_millis(20))
            .spawn("test-dispatch");

        sink.emit(7);
        sink.emit(8);

        // Give the loop a chance to drain before stopping it.
        std::thread::sleep(Duration::from_millis(100));
        flag.request_stop();
        assert!(flag.wait_stopped(Duration::from_millis(500)));
        handle.join().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![7, 8]);
    }

    #[test]
    fn stop_latency_is_bounded_by_poll_timeout() {
        let queue: DispatchQueue<u32> = DispatchQueue::bounded("test", 4);
        let flag = LifecycleFlag::new();
        let handle = queue
            .into_loop(flag.clone(), Duration::from_millis(50))
            .spawn("idle-dispatch");

        flag.request_stop();
        // One poll timeout plus margin, with no traffic at all.
        assert!(flag.wait_stopped(Duration::from_millis(500)));
        handle.join().unwrap();
    }
}
