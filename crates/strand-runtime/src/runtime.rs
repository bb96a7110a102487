//! Runtime assembly and the run loop
//!
//! A [`Runtime`] pairs one scheduler with one reactor and drives them
//! from the thread that calls [`Runtime::run`]. The user function runs
//! as the first fiber and receives a [`Stop`] continuation; invoking it
//! returns control to the runtime for shutdown. The loop also exits on
//! its own once nothing can ever run again: no live fibers, no queued
//! callbacks, no pending timers.

use std::ffi::c_void;
use std::ptr;
use std::time::Instant;

use strand_core::kdebug;

use crate::config::RuntimeConfig;
use crate::reactor::{Reactor, ReactorHandle};
use crate::scheduler::{Scheduler, SubmitMode};
use crate::tls;

/// A single-threaded fiber runtime
pub struct Runtime {
    scheduler: Scheduler,
    reactor: Reactor,
}

impl Runtime {
    /// Create a runtime. Panics on invalid configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        config.validate().expect("invalid runtime configuration");
        config.apply_logging();
        Self {
            scheduler: Scheduler::new(&config),
            reactor: Reactor::new(),
        }
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[inline]
    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// Run `user_main` as the first fiber and drive the loop until
    /// shutdown is requested or all work drains.
    ///
    /// Panics if a runtime is already active on this thread.
    pub fn run<F>(&mut self, user_main: F)
    where
        F: FnOnce(Stop) + 'static,
    {
        tls::set(self as *const Runtime);
        self.reactor.reset_quit();

        let stop = Stop {
            handle: self.reactor.handle(),
        };
        let stack = self.scheduler.default_stack_size();
        self.scheduler.submit(
            Box::new(move || {
                user_main(stop);
                Ok(ptr::null_mut() as *mut c_void)
            }),
            stack,
            SubmitMode::Post,
        );

        self.run_loop();

        tls::clear();
        self.scheduler.teardown();
        self.reactor.clear();
    }

    /// One iteration: callbacks first, then due timers, then one fiber.
    /// Fibers re-enter the loop between dispatches, so queued callbacks
    /// and expirations interleave fairly with fiber turns.
    fn run_loop(&self) {
        let sched = &self.scheduler;
        let reactor = &self.reactor;

        loop {
            if reactor.quit_requested() {
                kdebug!("reactor", "quit requested, loop exiting");
                break;
            }

            reactor.drain_inbox();
            let mut progressed = reactor.run_one_callback();
            progressed |= reactor.fire_due_timers(Instant::now()) > 0;

            if let Some(id) = sched.next_ready() {
                sched.dispatch(id);
                progressed = true;
            }

            if progressed {
                continue;
            }

            // Fully drained and nothing can wake us again: done
            if sched.live_fibers() == 0 && !reactor.has_callbacks() && !reactor.has_timers() {
                kdebug!("reactor", "all work drained, loop exiting");
                break;
            }

            reactor.park();
        }
    }
}

/// Continuation handed to the user main fiber.
///
/// Requesting stop is an idempotent ask for graceful shutdown; it can
/// be cloned and carried into any fiber or thread.
#[derive(Clone)]
pub struct Stop {
    handle: ReactorHandle,
}

impl Stop {
    /// Request shutdown of the owning runtime's loop
    pub fn request(&self) {
        self.handle.quit();
    }
}
