//! Thread-local access to the active runtime
//!
//! One runtime owns one OS thread for the duration of `Runtime::run`.
//! Free functions, the synchronization primitives and the POSIX bridge
//! all reach the scheduler through this pointer instead of threading a
//! handle through every call.

use std::cell::Cell;
use std::ptr;

use strand_core::FiberId;

use crate::runtime::Runtime;

thread_local! {
    static RUNTIME: Cell<*const Runtime> = const { Cell::new(ptr::null()) };
}

pub(crate) fn set(rt: *const Runtime) {
    RUNTIME.with(|cell| {
        assert!(
            cell.get().is_null(),
            "a runtime is already active on this thread"
        );
        cell.set(rt);
    });
}

pub(crate) fn clear() {
    RUNTIME.with(|cell| cell.set(ptr::null()));
}

/// The runtime active on this thread, if any.
///
/// The returned reference is valid for the duration of the enclosing
/// `Runtime::run`; the runtime is `!Send`, so it cannot be observed
/// from any other thread.
#[inline]
pub fn current_runtime() -> Option<&'static Runtime> {
    RUNTIME.with(|cell| unsafe { cell.get().as_ref() })
}

/// The id of the fiber executing on this thread, NONE when the thread
/// is not inside a runtime or is on the reactor's root context.
#[inline]
pub fn current_id() -> FiberId {
    current_runtime()
        .and_then(|rt| rt.scheduler().current_id())
        .unwrap_or(FiberId::NONE)
}

/// Check whether the calling code is executing inside a fiber
#[inline]
pub fn is_on_fiber() -> bool {
    current_id().is_some()
}
