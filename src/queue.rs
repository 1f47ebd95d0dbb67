//! Bounded event queue between the bridge thread and the application thread.
//!
//! One mutex guards a `VecDeque`. Overflow is handled by clearing the whole queue:
//! a backlog past capacity means the consumer has stalled for a long time, and
//! keeping a partial, stale batch is worse than starting over.

use crate::event::RawEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct EventQueue {
    inner: Mutex<VecDeque<RawEvent>>,
    capacity: usize,
    overflows: AtomicU64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EventQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY) + 1)),
            capacity: capacity.max(1),
            overflows: AtomicU64::new(0),
        }
    }

    /// Append an event.
    ///
    /// Returns `false` if the push took the queue past capacity, in which case the
    /// queue (including `event`) was cleared.
    pub fn push(&self, event: RawEvent) -> bool {
        let dropped = {
            let mut q = self.inner.lock();
            q.push_back(event);
            if q.len() > self.capacity {
                let n = q.len();
                q.clear();
                n
            } else {
                0
            }
        };

        if dropped > 0 {
            let total = self.overflows.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "{} (overflow #{total})",
                crate::error::InputError::QueueOverflow { dropped }
            );
            return false;
        }
        true
    }

    /// Pop and hand to `f` at most `n` events.
    ///
    /// The work is bounded by the queue length observed on entry, so a producer
    /// that keeps pushing cannot keep the consumer here indefinitely. The lock is
    /// re-taken per item and never held while `f` runs. Returns the number of
    /// events handed out.
    pub fn drain_up_to<F>(&self, n: usize, mut f: F) -> usize
    where
        F: FnMut(RawEvent),
    {
        let mut remaining = n.min(self.inner.lock().len());
        let mut handled = 0;
        while remaining > 0 {
            let next = {
                let mut q = self.inner.lock();
                let ev = q.pop_front();
                remaining = (remaining - 1).min(q.len());
                ev
            };
            match next {
                Some(ev) => {
                    f(ev);
                    handled += 1;
                }
                None => break,
            }
        }
        handled
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many times the queue has been cleared because of overflow.
    pub fn overflow_count(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DeviceId;
    use std::sync::Arc;

    fn ev(i: i32) -> RawEvent {
        RawEvent::axis(DeviceId(0), 0, i)
    }

    fn drain_all(q: &EventQueue) -> Vec<i32> {
        let mut out = Vec::new();
        q.drain_up_to(usize::MAX, |e| out.push(e.value));
        out
    }

    #[test]
    fn fifo_order() {
        let q = EventQueue::default();
        for i in 0..5 {
            assert!(q.push(ev(i)));
        }
        assert_eq!(drain_all(&q), vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn overflow_clears_everything() {
        let q = EventQueue::default();
        for i in 0..DEFAULT_CAPACITY as i32 {
            assert!(q.push(ev(i)));
        }
        assert_eq!(q.len(), DEFAULT_CAPACITY);
        assert!(!q.push(ev(-1)));
        assert_eq!(q.len(), 0);
        assert_eq!(q.overflow_count(), 1);
        assert!(drain_all(&q).is_empty());
    }

    #[test]
    fn keeps_working_after_overflow() {
        let q = EventQueue::with_capacity(2);
        q.push(ev(1));
        q.push(ev(2));
        q.push(ev(3));
        q.push(ev(4));
        assert_eq!(drain_all(&q), vec![4]);
    }

    #[test]
    fn drain_respects_limit() {
        let q = EventQueue::default();
        for i in 0..10 {
            q.push(ev(i));
        }
        let mut seen = Vec::new();
        assert_eq!(q.drain_up_to(3, |e| seen.push(e.value)), 3);
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(q.len(), 7);
    }

    #[test]
    fn drain_is_bounded_by_entry_length() {
        let q = EventQueue::default();
        for i in 0..4 {
            q.push(ev(i));
        }
        // Each handled event causes another push; the drain must still stop.
        let mut next = 100;
        let handled = q.drain_up_to(usize::MAX, |_| {
            q.push(ev(next));
            next += 1;
        });
        assert_eq!(handled, 4);
        assert_eq!(q.len(), 4);
    }

    #[test]
    fn concurrent_producer_never_exceeds_capacity() {
        let q = Arc::new(EventQueue::with_capacity(64));
        let producer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    q.push(ev(i));
                }
            })
        };
        let mut last = -1;
        while !producer.is_finished() {
            q.drain_up_to(16, |e| {
                assert!(e.value > last);
                last = e.value;
            });
            assert!(q.len() <= 64);
        }
        producer.join().unwrap();
        assert!(q.len() <= 64);
    }
}
