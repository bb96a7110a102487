//! The fiber scheduler
//!
//! Maintains the FIFO ready queue and the current-context pointer, and
//! performs every context switch. All switching funnels through the
//! per-runtime root context: the run loop saves the root register set
//! when it dispatches a fiber, and every suspension (yield, wait,
//! termination) restores it. A fiber spawned in `Dispatch` mode is the
//! one exception: the submitting fiber switches to it directly, with
//! the root save area left untouched so the next suspension still
//! lands back in the run loop.
//!
//! Everything here executes on the runtime thread; the single-thread
//! invariant is what lets the queues live in plain `RefCell`s.

use std::cell::{Cell, RefCell, UnsafeCell};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::{self, NonNull};
use std::time::Instant;

use strand_core::{FiberId, FiberState, JoinError, kdebug, ktrace, kwarn};

use crate::arch;
use crate::config::RuntimeConfig;
use crate::context::{Completion, Context, Entry};
use crate::stack::StackPool;
use crate::tls;

/// How `submit` schedules the new fiber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// Enqueue only; the new fiber cannot run before `submit` returns
    Post,

    /// Run the new fiber immediately when the caller is itself a fiber
    /// willing to yield; degrades to `Post` on the root context
    Dispatch,
}

pub struct Scheduler {
    contexts: RefCell<HashMap<FiberId, NonNull<Context>>>,
    ready: RefCell<VecDeque<FiberId>>,
    /// Terminated fibers whose stacks await reclamation by the loop
    zombies: RefCell<Vec<FiberId>>,
    current: Cell<*mut Context>,
    root_regs: UnsafeCell<arch::SavedRegs>,
    next_id: Cell<u64>,
    pool: RefCell<StackPool>,
    /// Fibers not yet terminated; drives run-loop drain detection
    alive: Cell<usize>,
    default_stack_size: usize,
}

impl Scheduler {
    pub(crate) fn new(config: &RuntimeConfig) -> Self {
        Self {
            contexts: RefCell::new(HashMap::new()),
            ready: RefCell::new(VecDeque::new()),
            zombies: RefCell::new(Vec::new()),
            current: Cell::new(ptr::null_mut()),
            root_regs: UnsafeCell::new(arch::SavedRegs::zeroed()),
            next_id: Cell::new(1),
            pool: RefCell::new(StackPool::new(config.stack_reserve)),
            alive: Cell::new(0),
            default_stack_size: config.stack_size,
        }
    }

    /// Stack size used when the caller does not specify one
    #[inline]
    pub fn default_stack_size(&self) -> usize {
        self.default_stack_size
    }

    /// Id of the running fiber, None on the root context
    #[inline]
    pub fn current_id(&self) -> Option<FiberId> {
        self.current_ctx().map(|c| c.id())
    }

    #[inline]
    pub(crate) fn current_ctx(&self) -> Option<&Context> {
        unsafe { self.current.get().as_ref() }
    }

    /// Notification epoch of the running fiber
    pub(crate) fn current_epoch(&self) -> u64 {
        self.current_ctx().expect("no current fiber").epoch()
    }

    fn lookup(&self, id: FiberId) -> Option<NonNull<Context>> {
        self.contexts.borrow().get(&id).copied()
    }

    /// Create a fiber around `entry` and schedule it.
    ///
    /// Stack allocation failure is fatal to the caller.
    pub fn submit(&self, entry: Entry, stack_size: usize, mode: SubmitMode) -> FiberId {
        let id = FiberId::new(self.next_id.replace(self.next_id.get() + 1));
        let stack = self.pool.borrow_mut().get(stack_size);

        let ctx = Box::new(Context::new(id, stack, entry));
        unsafe {
            arch::init_context(
                ctx.regs(),
                ctx.stack_top(),
                fiber_entry as usize,
                &*ctx as *const Context as usize,
            );
        }

        let ptr = NonNull::from(Box::leak(ctx));
        self.contexts.borrow_mut().insert(id, ptr);
        self.alive.set(self.alive.get() + 1);
        ktrace!("ctx", "fiber {} submitted ({:?}, {} byte stack)", id, mode, stack_size);

        match (mode, self.current_ctx()) {
            (SubmitMode::Dispatch, Some(cur)) => {
                // Caller yields its turn: requeue it behind everything
                // already ready and run the new fiber now
                cur.set_state(FiberState::Ready);
                self.ready.borrow_mut().push_back(cur.id());

                let new = unsafe { ptr.as_ref() };
                new.set_state(FiberState::Running);
                self.current.set(ptr.as_ptr());
                unsafe { arch::switch(cur.regs(), new.regs()) };
            }
            _ => {
                self.ready.borrow_mut().push_back(id);
            }
        }
        id
    }

    /// Requeue the current fiber at the tail and switch to the root.
    ///
    /// On resumption every fiber that was ready ahead of the caller has
    /// had a turn. Panics when called outside a fiber.
    pub fn yield_now(&self) {
        let ctx = self.current_ctx().expect("yield outside a fiber");
        ctx.set_state(FiberState::Ready);
        self.ready.borrow_mut().push_back(ctx.id());
        unsafe { arch::switch(ctx.regs(), self.root_regs.get()) };
    }

    /// Mark the current fiber Waiting and switch to the root. The
    /// caller must have registered a wake path first.
    pub(crate) fn suspend(&self) {
        let ctx = self.current_ctx().expect("suspend outside a fiber");
        ctx.set_state(FiberState::Waiting);
        unsafe { arch::switch(ctx.regs(), self.root_regs.get()) };
    }

    /// Make a Waiting fiber Ready. No-op for any other state, so racing
    /// wake paths collapse to the first one.
    pub(crate) fn wake(&self, id: FiberId) {
        if let Some(ptr) = self.lookup(id) {
            let ctx = unsafe { ptr.as_ref() };
            if ctx.state() == FiberState::Waiting {
                ctx.set_state(FiberState::Ready);
                self.ready.borrow_mut().push_back(id);
            }
        }
    }

    /// Notification-style wake: bump the target's epoch, then wake.
    /// Used by notify, lock handoff and join completion; the bump is
    /// what lets a timed waiter report Notified rather than TimedOut.
    pub(crate) fn notify(&self, id: FiberId) {
        if let Some(ptr) = self.lookup(id) {
            let ctx = unsafe { ptr.as_ref() };
            ctx.bump_epoch();
            if ctx.state() == FiberState::Waiting {
                ctx.set_state(FiberState::Ready);
                self.ready.borrow_mut().push_back(id);
            }
        }
    }

    /// Timer-expiry wake: only acts if the fiber is still Waiting with
    /// an unchanged epoch. A stale timer whose waiter has since been
    /// notified, handed a lock, or moved to another wait is a no-op.
    pub(crate) fn wake_expired(&self, id: FiberId, epoch: u64) {
        if let Some(ptr) = self.lookup(id) {
            let ctx = unsafe { ptr.as_ref() };
            if ctx.state() == FiberState::Waiting && ctx.epoch() == epoch {
                ctx.set_state(FiberState::Ready);
                self.ready.borrow_mut().push_back(id);
            }
        }
    }

    /// Pop the next ready fiber id, FIFO
    pub(crate) fn next_ready(&self) -> Option<FiberId> {
        self.ready.borrow_mut().pop_front()
    }

    /// Count of fibers that have not terminated
    pub(crate) fn live_fibers(&self) -> usize {
        self.alive.get()
    }

    /// Switch from the root context into a ready fiber and back.
    ///
    /// Returns when some fiber (not necessarily `id`, because of
    /// `Dispatch` chains) suspends or terminates.
    pub(crate) fn dispatch(&self, id: FiberId) {
        let ptr = self.lookup(id).expect("ready fiber not in table");
        let ctx = unsafe { ptr.as_ref() };
        debug_assert!(ctx.state().is_runnable(), "dispatch of non-ready fiber");

        ctx.set_state(FiberState::Running);
        self.current.set(ptr.as_ptr());
        unsafe { arch::switch(self.root_regs.get(), ctx.regs()) };
        self.current.set(ptr::null_mut());

        self.reap_zombies();
    }

    /// Terminate the current fiber: record completion bookkeeping done
    /// by the entry shim, wake the joiner, switch away for good.
    pub(crate) fn finish_current(&self) -> ! {
        let ctx = self.current_ctx().expect("finish outside a fiber");
        ctx.set_state(FiberState::Terminated);
        self.alive.set(self.alive.get() - 1);
        self.zombies.borrow_mut().push(ctx.id());

        let joiner = ctx.joiner();
        if joiner.is_some() {
            self.notify(joiner);
        }

        ktrace!("ctx", "fiber {} terminated", ctx.id());
        unsafe { arch::switch(ctx.regs(), self.root_regs.get()) };
        unreachable!("terminated fiber resumed");
    }

    /// Reclaim stacks of terminated fibers. Runs on the root context,
    /// strictly after the owning fiber has switched away.
    fn reap_zombies(&self) {
        loop {
            let id = match self.zombies.borrow_mut().pop() {
                Some(id) => id,
                None => return,
            };
            if let Some(ptr) = self.lookup(id) {
                let ctx = unsafe { ptr.as_ref() };
                if let Some(stack) = ctx.take_stack() {
                    self.pool.borrow_mut().recycle(stack);
                }
            }
        }
    }

    /// Suspend until `id` terminates, then deliver its completion and
    /// drop it. Unknown ids fail immediately; a second joiner panics.
    pub fn join(&self, id: FiberId) -> Result<Completion, JoinError> {
        let me = self.current_ctx().expect("join outside a fiber");
        assert_ne!(me.id(), id, "fiber cannot join itself");

        let Some(ptr) = self.lookup(id) else {
            return Err(JoinError::Unknown);
        };
        let target = unsafe { ptr.as_ref() };

        if !target.state().is_terminated() {
            assert!(
                target.joiner().is_none(),
                "fiber {} joined twice",
                id
            );
            target.set_joiner(me.id());
            self.suspend();
            debug_assert!(target.state().is_terminated());
        }

        let completion = target
            .take_completion()
            .expect("terminated fiber without completion");
        self.remove(id);
        Ok(completion)
    }

    /// `join` with a deadline. On expiry the joiner slot is released
    /// and the target keeps running.
    pub fn join_until(&self, id: FiberId, deadline: Instant) -> Result<Completion, JoinError> {
        let me = self.current_ctx().expect("join outside a fiber");
        assert_ne!(me.id(), id, "fiber cannot join itself");

        let Some(ptr) = self.lookup(id) else {
            return Err(JoinError::Unknown);
        };
        let target = unsafe { ptr.as_ref() };

        if !target.state().is_terminated() {
            assert!(
                target.joiner().is_none(),
                "fiber {} joined twice",
                id
            );
            target.set_joiner(me.id());

            let rt = tls::current_runtime().expect("no active runtime");
            let me_id = me.id();
            let epoch = me.epoch();
            let timer = rt.reactor().schedule_timer(
                deadline,
                Box::new(move || {
                    if let Some(rt) = tls::current_runtime() {
                        rt.scheduler().wake_expired(me_id, epoch);
                    }
                }),
            );
            self.suspend();
            rt.reactor().cancel_timer(timer);

            if !target.state().is_terminated() {
                target.set_joiner(FiberId::NONE);
                return Err(JoinError::TimedOut);
            }
        }

        let completion = target
            .take_completion()
            .expect("terminated fiber without completion");
        self.remove(id);
        Ok(completion)
    }

    /// Drop a context row; the stack goes back to the pool if it is
    /// still attached.
    fn remove(&self, id: FiberId) {
        if let Some(ptr) = self.contexts.borrow_mut().remove(&id) {
            let boxed = unsafe { Box::from_raw(ptr.as_ptr()) };
            if let Some(stack) = boxed.take_stack() {
                self.pool.borrow_mut().recycle(stack);
            }
        }
    }

    /// Drop every remaining context at the end of a run. Fibers that
    /// never terminated lose their stacks without unwinding.
    pub(crate) fn teardown(&self) {
        self.reap_zombies();
        let rows: Vec<FiberId> = self.contexts.borrow().keys().copied().collect();
        let leaked = self.alive.get();
        if leaked > 0 {
            kwarn!("ctx", "{} fibers still live at runtime teardown", leaked);
        } else if !rows.is_empty() {
            kdebug!("ctx", "{} unjoined fibers reclaimed at teardown", rows.len());
        }
        for id in rows {
            self.remove(id);
        }
        self.alive.set(0);
        self.ready.borrow_mut().clear();
    }
}

/// Entry shim every fiber starts in, reached from the architecture
/// trampoline. Runs the boxed closure, records the completion, and
/// never returns.
extern "C" fn fiber_entry(ctx_ptr: usize) {
    let sched = tls::current_runtime()
        .expect("fiber entered without an active runtime")
        .scheduler();
    let ctx = unsafe { &*(ctx_ptr as *const Context) };

    let entry = ctx.take_entry().expect("fiber entry already consumed");
    let completion = match catch_unwind(AssertUnwindSafe(entry)) {
        Ok(Ok(value)) => Completion::Returned(value),
        Ok(Err(e)) => Completion::Failed(e),
        Err(_) => {
            kwarn!("ctx", "fiber {} panicked", ctx.id());
            Completion::Panicked
        }
    };
    ctx.set_completion(completion);
    sched.finish_current()
}
