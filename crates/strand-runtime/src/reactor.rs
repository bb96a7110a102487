//! The reactor: event loop plumbing for the runtime thread
//!
//! The reactor owns three sources of work: a FIFO queue of callbacks,
//! a deadline-ordered timer store, and a lock-free inbox for callbacks
//! posted from other OS threads (I/O completion handlers, signal
//! threads). The run loop in [`crate::runtime`] drains them in that
//! order between fiber dispatches; when everything is idle it parks on
//! a condvar until the next timer deadline or a cross-thread post.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex as StdMutex};
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use strand_core::{FiberId, kdebug};

use crate::timer::{TimerCallback, TimerHandle, TimerHeap};
use crate::tls;

/// Callback queued on the runtime thread
pub(crate) type Callback = Box<dyn FnOnce()>;

/// Callback posted from another OS thread
pub type RemoteCallback = Box<dyn FnOnce() + Send>;

/// State shared with [`ReactorHandle`]s on other threads
struct Shared {
    inbox: SegQueue<RemoteCallback>,
    quit: AtomicBool,
    parker: Parker,
}

/// Condvar-based parking for the idle reactor.
///
/// Single consumer (the runtime thread); any thread may wake it.
struct Parker {
    // bool = wake pending
    mutex: StdMutex<bool>,
    condvar: Condvar,
}

impl Parker {
    fn new() -> Self {
        Self {
            mutex: StdMutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn park(&self, timeout: Option<Duration>) {
        let mut guard = self.mutex.lock().unwrap();
        if *guard {
            *guard = false;
            return;
        }
        match timeout {
            Some(t) => {
                let (g, _) = self.condvar.wait_timeout(guard, t).unwrap();
                guard = g;
            }
            None => {
                guard = self.condvar.wait(guard).unwrap();
            }
        }
        *guard = false;
    }

    fn wake(&self) {
        let mut guard = self.mutex.lock().unwrap();
        *guard = true;
        drop(guard);
        self.condvar.notify_one();
    }
}

/// The per-runtime reactor
pub struct Reactor {
    queue: RefCell<VecDeque<Callback>>,
    timers: RefCell<TimerHeap>,
    shared: Arc<Shared>,
    /// Set while the loop is between dispatches with nothing pending;
    /// suspension observers use it as a switch hint
    idle: Cell<bool>,
}

impl Reactor {
    pub(crate) fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            timers: RefCell::new(TimerHeap::new()),
            shared: Arc::new(Shared {
                inbox: SegQueue::new(),
                quit: AtomicBool::new(false),
                parker: Parker::new(),
            }),
            idle: Cell::new(false),
        }
    }

    /// Enqueue a callback on the runtime thread, FIFO order
    pub fn post(&self, f: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(f));
    }

    /// A cloneable handle for posting work from other threads
    pub fn handle(&self) -> ReactorHandle {
        ReactorHandle {
            shared: self.shared.clone(),
        }
    }

    /// Schedule a callback for an absolute deadline
    pub fn schedule_timer(&self, deadline: Instant, f: TimerCallback) -> TimerHandle {
        self.timers.borrow_mut().schedule(deadline, f)
    }

    /// Cancel a scheduled timer; best-effort, it may already have fired
    pub fn cancel_timer(&self, handle: TimerHandle) -> bool {
        self.timers.borrow_mut().cancel(handle)
    }

    /// Request graceful shutdown of the run loop. Idempotent.
    pub fn quit(&self) {
        self.handle().quit();
    }

    pub fn quit_requested(&self) -> bool {
        self.shared.quit.load(Ordering::Acquire)
    }

    /// True while the loop is parked between dispatches
    pub fn idle(&self) -> bool {
        self.idle.get()
    }

    // ── run-loop plumbing, called from crate::runtime ──

    pub(crate) fn reset_quit(&self) {
        self.shared.quit.store(false, Ordering::Release);
    }

    /// Move cross-thread posts into the FIFO queue
    pub(crate) fn drain_inbox(&self) {
        let mut queue = self.queue.borrow_mut();
        while let Some(cb) = self.shared.inbox.pop() {
            queue.push_back(cb);
        }
    }

    /// Run the callback at the head of the queue, if any
    pub(crate) fn run_one_callback(&self) -> bool {
        // Borrow dropped before the callback runs: callbacks post
        let cb = self.queue.borrow_mut().pop_front();
        match cb {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }

    /// Fire every timer due at `now`; returns how many fired
    pub(crate) fn fire_due_timers(&self, now: Instant) -> usize {
        let mut fired = 0;
        loop {
            // Borrow dropped before the callback runs: callbacks reschedule
            let cb = self.timers.borrow_mut().pop_due(now);
            match cb {
                Some(cb) => {
                    cb();
                    fired += 1;
                }
                None => break,
            }
        }
        fired
    }

    pub(crate) fn has_callbacks(&self) -> bool {
        !self.queue.borrow().is_empty() || !self.shared.inbox.is_empty()
    }

    pub(crate) fn has_timers(&self) -> bool {
        !self.timers.borrow().is_empty()
    }

    /// Park until the next timer deadline, a cross-thread post, or quit
    pub(crate) fn park(&self) {
        let timeout = self
            .timers
            .borrow()
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()));
        self.idle.set(true);
        self.shared.parker.park(timeout);
        self.idle.set(false);
    }

    /// Drop whatever is still queued; used at run() teardown
    pub(crate) fn clear(&self) {
        let pending = {
            let mut queue = self.queue.borrow_mut();
            while let Some(cb) = self.shared.inbox.pop() {
                queue.push_back(cb);
            }
            let n = queue.len();
            queue.clear();
            n
        };
        let timers = {
            let mut t = self.timers.borrow_mut();
            let n = t.len();
            *t = TimerHeap::new();
            n
        };
        if pending > 0 || timers > 0 {
            kdebug!(
                "reactor",
                "dropped {} callbacks and {} timers at shutdown",
                pending,
                timers
            );
        }
    }
}

/// Cross-thread handle to a reactor.
///
/// Cheap to clone; lives independently of the runtime thread.
#[derive(Clone)]
pub struct ReactorHandle {
    shared: Arc<Shared>,
}

impl ReactorHandle {
    /// Post a callback to run on the runtime thread, FIFO with other
    /// posted work. Wakes the loop if it is parked.
    pub fn post(&self, f: impl FnOnce() + Send + 'static) {
        self.shared.inbox.push(Box::new(f));
        self.shared.parker.wake();
    }

    /// Request graceful shutdown. Idempotent, callable from any thread.
    pub fn quit(&self) {
        self.shared.quit.store(true, Ordering::Release);
        self.shared.parker.wake();
    }
}

// ── fiber-facing time functions ──

/// Suspend the current fiber until `deadline`.
///
/// Must be called from a fiber; the wakeup rides the reactor's timer
/// store and is guarded by the fiber's notification epoch.
pub fn sleep_until(deadline: Instant) {
    let rt = tls::current_runtime().expect("sleep outside an active runtime");
    let sched = rt.scheduler();
    let me = sched.current_id().expect("sleep outside a fiber");
    let epoch = sched.current_epoch();

    rt.reactor().schedule_timer(
        deadline,
        Box::new(move || {
            if let Some(rt) = tls::current_runtime() {
                rt.scheduler().wake_expired(me, epoch);
            }
        }),
    );
    sched.suspend();
}

/// Suspend the current fiber for `duration`
pub fn sleep(duration: Duration) {
    sleep_until(Instant::now() + duration);
}

/// Suspend the current fiber for `ms` milliseconds
pub fn sleep_ms(ms: u64) {
    sleep(Duration::from_millis(ms));
}

/// Wake a fiber by id from another OS thread.
///
/// Convenience for I/O completion handlers: posts a wake callback into
/// the reactor inbox. Counts as a notification, so a pending timer on
/// the same wait is superseded.
pub fn wake_remote(handle: &ReactorHandle, id: FiberId) {
    handle.post(move || {
        if let Some(rt) = tls::current_runtime() {
            rt.scheduler().notify(id);
        }
    });
}
