//! # strand-posix
//!
//! This crate exists to mitigate unwanted use of pthreads by
//! third-party libraries linked into a strand process. It is NOT a
//! drop-in libpthread: it covers exactly the subset such libraries
//! need to synchronize among themselves, and everything else fails
//! loudly with EINVAL.
//!
//! Every entry point branches on "is the caller on a fiber?". On a
//! fiber, the call routes to the scheduler and the fiber-aware
//! primitives; otherwise it is indistinguishable from a direct call to
//! the host libc: same return code, same side effects.
//!
//! The dispatch functions are plain `extern "C"` symbols named
//! `strand_pthread_*` and are always callable directly. Builds that
//! want process-wide interception link with `--wrap=pthread_*` and
//! enable the `linker-wrap` feature, which emits the matching
//! `__wrap_pthread_*` shims and reroutes native passthrough via
//! `__real_pthread_*`.

mod cond;
mod mutex;
mod native;
mod overlay;
mod registry;
mod rwlock;
mod thread;
#[cfg(feature = "linker-wrap")]
mod wrap;

pub use cond::*;
pub use mutex::*;
pub use rwlock::*;
pub use thread::*;

/// Subsystem tag used on every log line from this crate
pub(crate) const LOG_TAG: &str = "ctx.posix";

/// Sentinel written through `retval` on join, per the bridge contract:
/// bridged threads do not surface their start routine's return value.
pub(crate) const CANCELED: *mut std::ffi::c_void = -1isize as *mut std::ffi::c_void;

/// Log the rejected call and fail with EINVAL.
///
/// The POSIX contract wants an error code back, so the loudness is an
/// error-level log rather than an abort; nothing that reaches one of
/// these stubs can be supported on fibers.
macro_rules! unsupported {
    ($name:literal) => {{
        strand_core::kerror!(
            $crate::LOG_TAG,
            concat!("unsupported pthread call: ", $name)
        );
        libc::EINVAL
    }};
}
pub(crate) use unsupported;
