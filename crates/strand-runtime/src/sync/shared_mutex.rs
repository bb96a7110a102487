//! Reader/writer lock with writer precedence
//!
//! Once any unique (writer) waiter is queued, new shared (reader)
//! acquirers queue behind it even while readers still hold the lock;
//! this keeps a steady reader stream from starving writers. Ties
//! within a role are FIFO. The fully-unlocked transition wakes the
//! first queued writer if there is one, otherwise every queued reader
//! as a batch, with ownership transferred before the wake in both
//! cases.

use std::cell::{Cell, UnsafeCell};
use std::collections::VecDeque;

use strand_core::FiberId;

use super::scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waiter {
    Unique,
    Shared,
}

/// A fiber-aware reader/writer lock, the backing for
/// `pthread_rwlock_t` at the bridge.
pub struct SharedMutex {
    /// Unique owner, NONE when not write-held
    owner: Cell<FiberId>,
    /// Count of shared holders
    shares: Cell<u32>,
    /// Queued unique waiters; cached so the reader fast path need not
    /// scan the queue
    unique_waiters: Cell<u32>,
    waiters: UnsafeCell<VecDeque<(FiberId, Waiter)>>,
}

impl SharedMutex {
    pub const fn new() -> Self {
        Self {
            owner: Cell::new(FiberId::NONE),
            shares: Cell::new(0),
            unique_waiters: Cell::new(0),
            waiters: UnsafeCell::new(VecDeque::new()),
        }
    }

    /// Acquire unique (writer) ownership, suspending on contention
    pub fn lock(&self) {
        let sched = scheduler();
        let me = sched.current_id().expect("shared_mutex lock outside a fiber");

        if self.owner.get().is_none() && self.shares.get() == 0 {
            self.owner.set(me);
            return;
        }

        unsafe { (*self.waiters.get()).push_back((me, Waiter::Unique)) };
        self.unique_waiters.set(self.unique_waiters.get() + 1);
        sched.suspend();
        debug_assert_eq!(self.owner.get(), me);
    }

    /// Acquire unique ownership only if the lock is entirely free.
    /// Never suspends and never reorders waiters.
    pub fn try_lock(&self) -> bool {
        let me = scheduler()
            .current_id()
            .expect("shared_mutex try_lock outside a fiber");
        if self.owner.get().is_none() && self.shares.get() == 0 {
            self.owner.set(me);
            true
        } else {
            false
        }
    }

    /// Acquire shared (reader) ownership. Queues whenever a writer
    /// holds the lock or is waiting for it.
    pub fn lock_shared(&self) {
        let sched = scheduler();
        let me = sched
            .current_id()
            .expect("shared_mutex lock_shared outside a fiber");

        if self.owner.get().is_none() && self.unique_waiters.get() == 0 {
            self.shares.set(self.shares.get() + 1);
            return;
        }

        unsafe { (*self.waiters.get()).push_back((me, Waiter::Shared)) };
        sched.suspend();
        // Batch handoff already counted our share
        debug_assert!(self.shares.get() > 0);
    }

    /// Shared acquire without suspending; fails under any writer
    /// presence, held or queued.
    pub fn try_lock_shared(&self) -> bool {
        if self.owner.get().is_none() && self.unique_waiters.get() == 0 {
            self.shares.set(self.shares.get() + 1);
            true
        } else {
            false
        }
    }

    /// Release unique ownership.
    ///
    /// Panics when the caller is not the unique owner; the bridge
    /// checks first and returns EPERM.
    pub fn unlock(&self) {
        assert!(
            self.owner.get().is_some() && scheduler().current_id() == Some(self.owner.get()),
            "shared_mutex unlocked by a fiber that does not own it"
        );
        self.owner.set(FiberId::NONE);
        self.release();
    }

    /// Release one shared hold.
    ///
    /// Panics when no shared hold exists; the bridge checks first.
    pub fn unlock_shared(&self) {
        let shares = self.shares.get();
        assert!(shares > 0, "shared_mutex unlock_shared without a share");
        self.shares.set(shares - 1);
        if shares == 1 && self.owner.get().is_none() {
            self.release();
        }
    }

    /// Fully-unlocked transition: drain waiters per the precedence
    /// rule, transferring ownership before any wake.
    fn release(&self) {
        let sched = scheduler();
        let queue = unsafe { &mut *self.waiters.get() };

        if self.unique_waiters.get() > 0 {
            let pos = queue
                .iter()
                .position(|(_, w)| *w == Waiter::Unique)
                .expect("unique waiter count out of sync");
            let (id, _) = queue.remove(pos).unwrap();
            self.unique_waiters.set(self.unique_waiters.get() - 1);
            self.owner.set(id);
            sched.notify(id);
        } else if !queue.is_empty() {
            self.shares.set(self.shares.get() + queue.len() as u32);
            for (id, _) in queue.drain(..) {
                sched.notify(id);
            }
        }
    }

    /// Whether a unique owner holds the lock
    #[inline]
    pub fn unique(&self) -> bool {
        self.owner.get().is_some()
    }

    /// Whether the calling fiber is the unique owner
    #[inline]
    pub fn unique_by_current(&self) -> bool {
        let owner = self.owner.get();
        owner.is_some() && scheduler().current_id() == Some(owner)
    }

    /// Count of shared holders
    #[inline]
    pub fn shares(&self) -> usize {
        self.shares.get() as usize
    }

    /// Count of queued waiters, both roles
    #[inline]
    pub fn waiting(&self) -> usize {
        unsafe { (*self.waiters.get()).len() }
    }

    /// Whether an upgrade to unique ownership could be queued now,
    /// i.e. no unique owner is present
    #[inline]
    pub fn can_lock_upgrade(&self) -> bool {
        self.owner.get().is_none()
    }
}

impl Default for SharedMutex {
    fn default() -> Self {
        Self::new()
    }
}
