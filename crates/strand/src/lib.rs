//! # strand: a cooperative fiber runtime
//!
//! Stackful fibers multiplexed over a single OS thread by a reactor
//! event loop, with POSIX-shaped synchronization primitives that never
//! block the thread.
//!
//! ## Features
//!
//! - **Stackful**: fibers suspend anywhere, including deep inside
//!   native call stacks, via hand-written register save/restore
//! - **Strictly cooperative**: no preemption; fibers run until a
//!   suspension point (yield, lock, wait, join, sleep)
//! - **FIFO fairness**: ready queue, lock handoff and condition
//!   signalling all preserve arrival order
//! - **Writer precedence**: the shared mutex never starves writers
//! - **POSIX bridge**: the companion `strand-posix` crate routes
//!   `pthread_*` calls from linked native libraries onto fibers
//!
//! ## Quick Start
//!
//! ```ignore
//! use strand::{Runtime, RuntimeConfig, spawn, yield_now};
//!
//! fn main() {
//!     let mut rt = Runtime::new(RuntimeConfig::default());
//!     rt.run(|stop| {
//!         let id = spawn(|| {
//!             println!("hello from a fiber");
//!             yield_now();
//!             println!("back again");
//!         });
//!         strand::join(id).unwrap();
//!         stop.request();
//!     });
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                      User Code                        │
//! │        spawn(), yield_now(), join(), Mutex, CondVar   │
//! └───────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌───────────────────────────────────────────────────────┐
//! │                      Scheduler                        │
//! │        FIFO ready queue, current fiber, switches      │
//! └───────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌───────────────────────────────────────────────────────┐
//! │                       Reactor                         │
//! │      callback queue, timers, cross-thread inbox       │
//! └───────────────────────────────────────────────────────┘
//! ```

use std::ffi::c_void;
use std::ptr;

// Re-export core types
pub use strand_core::{FiberId, FiberState, JoinError, LogLevel, RtResult, RuntimeError};

// Re-export runtime types
pub use strand_runtime::{
    Completion, CondVar, Mutex, Reactor, ReactorHandle, Runtime, RuntimeConfig, Scheduler,
    SharedMutex, Stop, SubmitMode, TimerHandle, WaitStatus, sleep, sleep_ms, sleep_until,
};

use strand_runtime::tls;

/// Spawn a fiber with the default stack size, POST semantics.
///
/// The new fiber will not run before this call returns. Panics when no
/// runtime is active on this thread.
pub fn spawn<F>(f: F) -> FiberId
where
    F: FnOnce() + 'static,
{
    let rt = tls::current_runtime().expect("spawn outside an active runtime");
    let stack = rt.scheduler().default_stack_size();
    submit(f, stack, SubmitMode::Post)
}

/// Spawn with an explicit stack size and submit mode
pub fn submit<F>(f: F, stack_size: usize, mode: SubmitMode) -> FiberId
where
    F: FnOnce() + 'static,
{
    let rt = tls::current_runtime().expect("spawn outside an active runtime");
    rt.scheduler().submit(
        Box::new(move || {
            f();
            Ok(ptr::null_mut() as *mut c_void)
        }),
        stack_size,
        mode,
    )
}

/// Suspend until the fiber `id` terminates and deliver its completion.
///
/// Must be called from a fiber. Unknown ids fail immediately with
/// [`JoinError::Unknown`]; joining the same fiber twice is a
/// programming error and panics.
pub fn join(id: FiberId) -> Result<Completion, JoinError> {
    let rt = tls::current_runtime().expect("join outside an active runtime");
    rt.scheduler().join(id)
}

/// Requeue the current fiber and give every other ready fiber a turn.
///
/// Panics when called outside a fiber.
#[inline]
pub fn yield_now() {
    let rt = tls::current_runtime().expect("yield outside an active runtime");
    rt.scheduler().yield_now()
}

/// Id of the current fiber, `FiberId::NONE` outside any fiber
#[inline]
pub fn current_id() -> FiberId {
    tls::current_id()
}

/// Check whether the calling code is executing inside a fiber
#[inline]
pub fn is_on_fiber() -> bool {
    tls::is_on_fiber()
}
