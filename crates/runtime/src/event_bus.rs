use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::broadcast;

const DEFAULT_HISTORY: usize = 64;

/// Sequenced event wrapper for traceability.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    pub seq: u64,
    pub payload: E,
}

struct Inner<E> {
    next_seq: u64,
    history: VecDeque<Event<E>>,
}

/// Fan-out bus for user-facing notices.
///
/// Keeps a bounded history so a late consumer can render the most recent
/// state, and broadcasts each event to live subscribers. Emitting never
/// blocks and never fails when nobody is listening.
pub struct EventBus<E: Clone> {
    inner: Mutex<Inner<E>>,
    capacity: usize,
    tx: broadcast::Sender<Event<E>>,
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    pub fn with_history(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            inner: Mutex::new(Inner {
                next_seq: 0,
                history: VecDeque::with_capacity(capacity),
            }),
            capacity,
            tx,
        }
    }

    pub fn emit(&self, payload: E) -> u64 {
        let event = {
            let mut inner = self.inner.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            let event = Event { seq, payload };
            if inner.history.len() == self.capacity {
                inner.history.pop_front();
            }
            inner.history.push_back(event.clone());
            event
        };
        let seq = event.seq;
        let _ = self.tx.send(event);
        seq
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event<E>> {
        self.tx.subscribe()
    }

    pub fn events(&self) -> Vec<Event<E>> {
        self.inner.lock().history.iter().cloned().collect()
    }

    pub fn drain(&self) -> Vec<Event<E>> {
        self.inner.lock().history.drain(..).collect()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;

    #[test]
    fn records_events_in_sequence() {
        let bus = EventBus::new();
        bus.emit("a");
        bus.emit("b");
        let seqs: Vec<_> = bus.events().iter().map(|e| (e.seq, e.payload)).collect();
        assert_eq!(seqs, vec![(0, "a"), (1, "b")]);
    }

    #[test]
    fn drain_clears_events() {
        let bus = EventBus::new();
        bus.emit(1);
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn history_is_bounded() {
        let bus = EventBus::with_history(2);
        for i in 0..5 {
            bus.emit(i);
        }
        let kept: Vec<_> = bus.events().into_iter().map(|e| e.payload).collect();
        assert_eq!(kept, vec![3, 4]);
    }

    #[tokio::test]
    async fn subscribers_receive_new_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit("hello");
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.payload, "hello");
    }
}
