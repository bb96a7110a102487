//! # strand-runtime
//!
//! Single-threaded cooperative fiber runtime.
//!
//! One OS thread hosts one [`Runtime`]; all fibers of that runtime run
//! serially on it, multiplexed by the [`Reactor`] event loop. A fiber
//! gives up the thread only at a suspension point (yield, lock, wait,
//! join, sleep), so fiber-visible state needs no locking against other
//! fibers of the same runtime. Parallelism, where wanted, comes from
//! running independent runtimes on separate threads.
//!
//! This crate provides:
//! - Context switching (architecture-specific assembly, x86_64/aarch64)
//! - Stack allocation with guard pages, recycled through a pool
//! - The FIFO scheduler: submit, yield, join, suspend/wake
//! - The reactor: callback queue, timers, cross-thread post, quit
//! - Fiber-aware synchronization: `Mutex`, `SharedMutex`, `CondVar`

pub mod arch;
pub mod config;
pub mod context;
pub mod reactor;
pub mod runtime;
pub mod scheduler;
pub mod stack;
pub mod sync;
pub mod timer;
pub mod tls;

// Re-exports
pub use config::RuntimeConfig;
pub use context::{Completion, FiberResult};
pub use reactor::{Reactor, ReactorHandle, sleep, sleep_ms, sleep_until};
pub use runtime::{Runtime, Stop};
pub use scheduler::{Scheduler, SubmitMode};
pub use sync::{CondVar, Mutex, SharedMutex, WaitStatus};
pub use timer::TimerHandle;
