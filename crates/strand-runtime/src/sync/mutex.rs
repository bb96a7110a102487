//! Handoff mutex
//!
//! Fair in arrival order: contended lockers queue FIFO and unlock
//! transfers ownership directly to the head of the queue, so a fiber
//! that reaches `lock` first acquires first and newcomers cannot steal
//! the lock between release and wakeup.

use std::cell::{Cell, UnsafeCell};
use std::collections::VecDeque;

use strand_core::FiberId;

use super::scheduler;

/// A fiber-aware mutual exclusion lock.
///
/// Unlike `std::sync::Mutex` this does not guard data; it is the bare
/// lock the POSIX bridge maps `pthread_mutex_t` onto, with explicit
/// `lock`/`unlock` spanning separate calls.
pub struct Mutex {
    owner: Cell<FiberId>,
    waiters: UnsafeCell<VecDeque<FiberId>>,
}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            owner: Cell::new(FiberId::NONE),
            waiters: UnsafeCell::new(VecDeque::new()),
        }
    }

    /// Acquire the lock, suspending the calling fiber on contention.
    ///
    /// Must be called from a fiber.
    pub fn lock(&self) {
        let sched = scheduler();
        let me = sched.current_id().expect("mutex lock outside a fiber");

        if self.owner.get().is_none() {
            self.owner.set(me);
            return;
        }

        unsafe { (*self.waiters.get()).push_back(me) };
        sched.suspend();
        // Handoff: the releaser made us owner before waking us
        debug_assert_eq!(self.owner.get(), me);
    }

    /// Acquire the lock only if it is uncontended. Never suspends.
    pub fn try_lock(&self) -> bool {
        let me = scheduler()
            .current_id()
            .expect("mutex try_lock outside a fiber");
        if self.owner.get().is_none() {
            self.owner.set(me);
            true
        } else {
            false
        }
    }

    /// Release the lock, handing it to the head waiter if any.
    ///
    /// Panics when the caller is not the owner; the POSIX bridge checks
    /// ownership first and returns EPERM instead.
    pub fn unlock(&self) {
        let sched = scheduler();
        assert!(
            self.owned_by_current(),
            "mutex unlocked by a fiber that does not own it"
        );

        match unsafe { (*self.waiters.get()).pop_front() } {
            Some(next) => {
                self.owner.set(next);
                sched.notify(next);
            }
            None => self.owner.set(FiberId::NONE),
        }
    }

    /// Whether any fiber holds the lock
    #[inline]
    pub fn locked(&self) -> bool {
        self.owner.get().is_some()
    }

    /// Whether the calling fiber holds the lock
    #[inline]
    pub fn owned_by_current(&self) -> bool {
        let owner = self.owner.get();
        owner.is_some() && scheduler().current_id() == Some(owner)
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
