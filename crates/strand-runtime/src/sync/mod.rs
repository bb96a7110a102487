//! Fiber-aware synchronization primitives
//!
//! These never touch OS futexes: contention suspends the calling fiber
//! through the scheduler and ownership moves by direct handoff on the
//! wake path. All three types are sized to fit inside the opaque POSIX
//! storage the bridge overlays them onto; the bridge asserts that at
//! compile time.
//!
//! Single-threaded by construction: the types are `!Send`/`!Sync` and
//! may only be used by fibers of the runtime active on this thread.

mod condvar;
mod mutex;
mod shared_mutex;

pub use condvar::{CondVar, WaitStatus};
pub use mutex::Mutex;
pub use shared_mutex::SharedMutex;

use crate::scheduler::Scheduler;
use crate::tls;

/// The scheduler of the runtime active on this thread
#[inline]
pub(crate) fn scheduler() -> &'static Scheduler {
    tls::current_runtime()
        .expect("synchronization primitive used outside an active runtime")
        .scheduler()
}
