//! Condition variable
//!
//! Waiters queue FIFO. The wait path releases the associated mutex and
//! suspends as one uninterruptible step on the runtime thread; a
//! notify performed under that mutex can never slip between the two,
//! so signals are not lost. Timed waits are discriminated from genuine
//! notifications by the fiber's notification epoch: every notify bumps
//! the waiter's epoch before waking it, a timer expiry does not.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::time::Instant;

use strand_core::FiberId;

use super::{Mutex, scheduler};
use crate::tls;

/// Outcome of a timed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Woken by `notify` or `notify_all`
    Notified,

    /// The deadline passed first
    TimedOut,
}

/// A fiber-aware condition variable, the backing for `pthread_cond_t`
/// at the bridge.
pub struct CondVar {
    waiters: UnsafeCell<VecDeque<FiberId>>,
}

impl CondVar {
    pub const fn new() -> Self {
        Self {
            waiters: UnsafeCell::new(VecDeque::new()),
        }
    }

    /// Release `mutex`, suspend until notified, reacquire `mutex`.
    ///
    /// The caller must hold `mutex`.
    pub fn wait(&self, mutex: &Mutex) {
        let sched = scheduler();
        let me = sched.current_id().expect("condvar wait outside a fiber");
        debug_assert!(mutex.owned_by_current(), "condvar wait without the mutex");

        unsafe { (*self.waiters.get()).push_back(me) };
        mutex.unlock();
        sched.suspend();
        mutex.lock();
    }

    /// As `wait`, but resume at `deadline` if not notified first.
    ///
    /// A timed-out waiter removes itself from the queue before
    /// reacquiring the mutex. When a notify and the deadline race, the
    /// epoch decides: whichever reached the waiter first wins.
    pub fn wait_until(&self, mutex: &Mutex, deadline: Instant) -> WaitStatus {
        let rt = tls::current_runtime().expect("condvar wait outside an active runtime");
        let sched = rt.scheduler();
        let me = sched.current_id().expect("condvar wait outside a fiber");
        debug_assert!(mutex.owned_by_current(), "condvar wait without the mutex");

        let epoch = sched.current_epoch();
        unsafe { (*self.waiters.get()).push_back(me) };
        let timer = rt.reactor().schedule_timer(
            deadline,
            Box::new(move || {
                if let Some(rt) = tls::current_runtime() {
                    rt.scheduler().wake_expired(me, epoch);
                }
            }),
        );

        mutex.unlock();
        sched.suspend();
        rt.reactor().cancel_timer(timer);

        // Status must be read before relocking: the lock handoff is
        // itself a notification-style wake and would bump the epoch
        let status = if sched.current_epoch() != epoch {
            WaitStatus::Notified
        } else {
            let queue = unsafe { &mut *self.waiters.get() };
            if let Some(pos) = queue.iter().position(|&id| id == me) {
                queue.remove(pos);
            }
            WaitStatus::TimedOut
        };

        mutex.lock();
        status
    }

    /// Wake the longest-waiting fiber, if any.
    ///
    /// A waiter whose deadline already expired but has not yet run is
    /// still in the queue and counts: notifying it converts its timeout
    /// into a notification.
    pub fn notify(&self) {
        if let Some(id) = unsafe { (*self.waiters.get()).pop_front() } {
            scheduler().notify(id);
        }
    }

    /// Wake every current waiter in FIFO order. The order of re-entry
    /// past the associated mutex is the mutex's own queue order.
    pub fn notify_all(&self) {
        let sched = scheduler();
        let queue = unsafe { &mut *self.waiters.get() };
        for id in queue.drain(..) {
            sched.notify(id);
        }
    }

    /// True when no fiber is waiting
    #[inline]
    pub fn empty(&self) -> bool {
        unsafe { (*self.waiters.get()).is_empty() }
    }
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}
