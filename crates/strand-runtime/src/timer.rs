//! Timer store for the reactor
//!
//! Binary min-heap ordered by deadline with lazy cancellation: a
//! cancelled entry stays in the heap and is skipped when it surfaces,
//! which keeps cancel O(1) instead of O(n) heap surgery. The set of
//! pending handles is tracked on the side so cancellation and the
//! length queries stay exact. Single-threaded; the reactor owns the
//! store and is the only caller.

use std::cmp;
use std::collections::{BinaryHeap, HashSet};
use std::time::Instant;

/// Callback fired when a timer expires
pub type TimerCallback = Box<dyn FnOnce()>;

/// Handle for cancelling a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw handle value, for logging
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct TimerEntry {
    handle: TimerHandle,
    deadline: Instant,
    callback: TimerCallback,
}

/// Wrapper for heap ordering (min-heap by deadline, handle tie-break)
struct HeapEntry(TimerEntry);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.deadline == other.0.deadline && self.0.handle == other.0.handle
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        // Reversed: earliest deadline first, earliest handle on ties
        match other.0.deadline.cmp(&self.0.deadline) {
            cmp::Ordering::Equal => other.0.handle.0.cmp(&self.0.handle.0),
            ord => ord,
        }
    }
}

/// Deadline-ordered timer store
pub(crate) struct TimerHeap {
    heap: BinaryHeap<HeapEntry>,
    /// Handles that have neither fired nor been cancelled
    pending: HashSet<TimerHandle>,
    next_handle: u64,
}

impl TimerHeap {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashSet::new(),
            next_handle: 1,
        }
    }

    pub(crate) fn schedule(&mut self, deadline: Instant, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.insert(handle);
        self.heap.push(HeapEntry(TimerEntry {
            handle,
            deadline,
            callback,
        }));
        handle
    }

    /// Mark a timer cancelled. Returns false when the handle already
    /// fired or was already cancelled; its heap entry is skipped when
    /// it surfaces.
    pub(crate) fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.pending.remove(&handle)
    }

    /// Pop the callback of the earliest due timer, skipping cancelled
    /// entries. Returns None when nothing is due at `now`.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<TimerCallback> {
        while let Some(entry) = self.heap.peek() {
            if entry.0.deadline > now {
                break;
            }
            let entry = self.heap.pop().unwrap().0;
            if !self.pending.remove(&entry.handle) {
                continue;
            }
            return Some(entry.callback);
        }
        None
    }

    /// Earliest deadline still in the heap, for idle-park timeouts.
    ///
    /// Approximate when the head entry is cancelled; the park then just
    /// wakes early and re-evaluates.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.0.deadline)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn test_fires_in_deadline_order() {
        let mut timers = TimerHeap::new();
        let now = Instant::now();
        let fired = Rc::new(Cell::new(0u64));

        for (i, ms) in [(1u64, 30u64), (2, 10), (3, 20)] {
            let fired = fired.clone();
            timers.schedule(
                now + Duration::from_millis(ms),
                Box::new(move || fired.set(fired.get() * 10 + i)),
            );
        }

        while let Some(cb) = timers.pop_due(now + Duration::from_millis(50)) {
            cb();
        }
        assert_eq!(fired.get(), 231);
    }

    #[test]
    fn test_not_due_not_popped() {
        let mut timers = TimerHeap::new();
        let now = Instant::now();
        timers.schedule(now + Duration::from_secs(10), Box::new(|| {}));
        assert!(timers.pop_due(now).is_none());
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_cancel_skips_entry() {
        let mut timers = TimerHeap::new();
        let now = Instant::now();
        let handle = timers.schedule(now, Box::new(|| panic!("cancelled timer fired")));
        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        assert!(timers.pop_due(now + Duration::from_millis(1)).is_none());
        assert!(timers.is_empty());
    }

    #[test]
    fn test_next_deadline() {
        let mut timers = TimerHeap::new();
        let now = Instant::now();
        assert!(timers.next_deadline().is_none());

        timers.schedule(now + Duration::from_millis(100), Box::new(|| {}));
        timers.schedule(now + Duration::from_millis(50), Box::new(|| {}));
        assert_eq!(timers.next_deadline(), Some(now + Duration::from_millis(50)));
    }
}
