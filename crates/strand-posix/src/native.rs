//! Native passthrough
//!
//! When the caller is not on a fiber, every intercepted call must be
//! indistinguishable from a direct call into the host libc. In a plain
//! build that is simply `libc::pthread_*`. Under the `linker-wrap`
//! feature those public symbols resolve to our own wrappers, so the
//! passthrough has to name `__real_pthread_*` instead, but only for
//! the symbols the wrap module actually wraps.

#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_char, c_int, c_void};

pub(crate) type StartRoutine = unsafe extern "C" fn(*mut c_void) -> *mut c_void;

#[cfg(feature = "linker-wrap")]
unsafe extern "C" {
    fn __real_pthread_create(
        thread: *mut libc::pthread_t,
        attr: *const libc::pthread_attr_t,
        start_routine: Option<StartRoutine>,
        arg: *mut c_void,
    ) -> c_int;
    fn __real_pthread_join(thread: libc::pthread_t, retval: *mut *mut c_void) -> c_int;
    fn __real_pthread_timedjoin_np(
        thread: libc::pthread_t,
        retval: *mut *mut c_void,
        abstime: *const libc::timespec,
    ) -> c_int;
    fn __real_pthread_self() -> libc::pthread_t;
    fn __real_pthread_setname_np(thread: libc::pthread_t, name: *const c_char) -> c_int;
    fn __real_pthread_mutex_init(
        mutex: *mut libc::pthread_mutex_t,
        attr: *const libc::pthread_mutexattr_t,
    ) -> c_int;
    fn __real_pthread_mutex_destroy(mutex: *mut libc::pthread_mutex_t) -> c_int;
    fn __real_pthread_mutex_lock(mutex: *mut libc::pthread_mutex_t) -> c_int;
    fn __real_pthread_mutex_trylock(mutex: *mut libc::pthread_mutex_t) -> c_int;
    fn __real_pthread_mutex_unlock(mutex: *mut libc::pthread_mutex_t) -> c_int;
    fn __real_pthread_rwlock_init(
        rwlock: *mut libc::pthread_rwlock_t,
        attr: *const libc::pthread_rwlockattr_t,
    ) -> c_int;
    fn __real_pthread_rwlock_destroy(rwlock: *mut libc::pthread_rwlock_t) -> c_int;
    fn __real_pthread_rwlock_rdlock(rwlock: *mut libc::pthread_rwlock_t) -> c_int;
    fn __real_pthread_rwlock_tryrdlock(rwlock: *mut libc::pthread_rwlock_t) -> c_int;
    fn __real_pthread_rwlock_wrlock(rwlock: *mut libc::pthread_rwlock_t) -> c_int;
    fn __real_pthread_rwlock_trywrlock(rwlock: *mut libc::pthread_rwlock_t) -> c_int;
    fn __real_pthread_rwlock_unlock(rwlock: *mut libc::pthread_rwlock_t) -> c_int;
    fn __real_pthread_cond_init(
        cond: *mut libc::pthread_cond_t,
        attr: *const libc::pthread_condattr_t,
    ) -> c_int;
    fn __real_pthread_cond_destroy(cond: *mut libc::pthread_cond_t) -> c_int;
    fn __real_pthread_cond_signal(cond: *mut libc::pthread_cond_t) -> c_int;
    fn __real_pthread_cond_broadcast(cond: *mut libc::pthread_cond_t) -> c_int;
    fn __real_pthread_cond_wait(
        cond: *mut libc::pthread_cond_t,
        mutex: *mut libc::pthread_mutex_t,
    ) -> c_int;
    fn __real_pthread_cond_timedwait(
        cond: *mut libc::pthread_cond_t,
        mutex: *mut libc::pthread_mutex_t,
        abstime: *const libc::timespec,
    ) -> c_int;
}

// glibc extension; declared here rather than through the libc crate so
// the plain build links it directly.
#[cfg(not(feature = "linker-wrap"))]
unsafe extern "C" {
    #[link_name = "pthread_timedjoin_np"]
    fn host_pthread_timedjoin_np(
        thread: libc::pthread_t,
        retval: *mut *mut c_void,
        abstime: *const libc::timespec,
    ) -> c_int;
}

/// Expands to the `__real_` symbol under `linker-wrap`, the host call
/// otherwise.
macro_rules! real_or {
    ($real:ident($($arg:expr),*), $host:expr) => {{
        #[cfg(feature = "linker-wrap")]
        let ret = unsafe { $real($($arg),*) };
        #[cfg(not(feature = "linker-wrap"))]
        let ret = $host;
        ret
    }};
}

pub(crate) unsafe fn pthread_create(
    thread: *mut libc::pthread_t,
    attr: *const libc::pthread_attr_t,
    start_routine: Option<StartRoutine>,
    arg: *mut c_void,
) -> c_int {
    real_or!(__real_pthread_create(thread, attr, start_routine, arg), {
        // The libc crate declares the start routine as a bare safe fn
        let Some(start) = start_routine else {
            return libc::EINVAL;
        };
        let start: extern "C" fn(*mut c_void) -> *mut c_void =
            unsafe { std::mem::transmute(start) };
        unsafe { libc::pthread_create(thread, attr, start, arg) }
    })
}

pub(crate) unsafe fn pthread_join(thread: libc::pthread_t, retval: *mut *mut c_void) -> c_int {
    real_or!(__real_pthread_join(thread, retval), unsafe {
        libc::pthread_join(thread, retval)
    })
}

pub(crate) unsafe fn pthread_timedjoin_np(
    thread: libc::pthread_t,
    retval: *mut *mut c_void,
    abstime: *const libc::timespec,
) -> c_int {
    real_or!(__real_pthread_timedjoin_np(thread, retval, abstime), unsafe {
        host_pthread_timedjoin_np(thread, retval, abstime)
    })
}

pub(crate) unsafe fn pthread_self() -> libc::pthread_t {
    real_or!(__real_pthread_self(), unsafe { libc::pthread_self() })
}

pub(crate) unsafe fn pthread_setname_np(thread: libc::pthread_t, name: *const c_char) -> c_int {
    real_or!(__real_pthread_setname_np(thread, name), unsafe {
        libc::pthread_setname_np(thread, name)
    })
}

pub(crate) unsafe fn pthread_mutex_init(
    mutex: *mut libc::pthread_mutex_t,
    attr: *const libc::pthread_mutexattr_t,
) -> c_int {
    real_or!(__real_pthread_mutex_init(mutex, attr), unsafe {
        libc::pthread_mutex_init(mutex, attr)
    })
}

pub(crate) unsafe fn pthread_mutex_destroy(mutex: *mut libc::pthread_mutex_t) -> c_int {
    real_or!(__real_pthread_mutex_destroy(mutex), unsafe {
        libc::pthread_mutex_destroy(mutex)
    })
}

pub(crate) unsafe fn pthread_mutex_lock(mutex: *mut libc::pthread_mutex_t) -> c_int {
    real_or!(__real_pthread_mutex_lock(mutex), unsafe {
        libc::pthread_mutex_lock(mutex)
    })
}

pub(crate) unsafe fn pthread_mutex_trylock(mutex: *mut libc::pthread_mutex_t) -> c_int {
    real_or!(__real_pthread_mutex_trylock(mutex), unsafe {
        libc::pthread_mutex_trylock(mutex)
    })
}

pub(crate) unsafe fn pthread_mutex_unlock(mutex: *mut libc::pthread_mutex_t) -> c_int {
    real_or!(__real_pthread_mutex_unlock(mutex), unsafe {
        libc::pthread_mutex_unlock(mutex)
    })
}

pub(crate) unsafe fn pthread_rwlock_init(
    rwlock: *mut libc::pthread_rwlock_t,
    attr: *const libc::pthread_rwlockattr_t,
) -> c_int {
    real_or!(__real_pthread_rwlock_init(rwlock, attr), unsafe {
        libc::pthread_rwlock_init(rwlock, attr)
    })
}

pub(crate) unsafe fn pthread_rwlock_destroy(rwlock: *mut libc::pthread_rwlock_t) -> c_int {
    real_or!(__real_pthread_rwlock_destroy(rwlock), unsafe {
        libc::pthread_rwlock_destroy(rwlock)
    })
}

pub(crate) unsafe fn pthread_rwlock_rdlock(rwlock: *mut libc::pthread_rwlock_t) -> c_int {
    real_or!(__real_pthread_rwlock_rdlock(rwlock), unsafe {
        libc::pthread_rwlock_rdlock(rwlock)
    })
}

pub(crate) unsafe fn pthread_rwlock_tryrdlock(rwlock: *mut libc::pthread_rwlock_t) -> c_int {
    real_or!(__real_pthread_rwlock_tryrdlock(rwlock), unsafe {
        libc::pthread_rwlock_tryrdlock(rwlock)
    })
}

pub(crate) unsafe fn pthread_rwlock_wrlock(rwlock: *mut libc::pthread_rwlock_t) -> c_int {
    real_or!(__real_pthread_rwlock_wrlock(rwlock), unsafe {
        libc::pthread_rwlock_wrlock(rwlock)
    })
}

pub(crate) unsafe fn pthread_rwlock_trywrlock(rwlock: *mut libc::pthread_rwlock_t) -> c_int {
    real_or!(__real_pthread_rwlock_trywrlock(rwlock), unsafe {
        libc::pthread_rwlock_trywrlock(rwlock)
    })
}

pub(crate) unsafe fn pthread_rwlock_unlock(rwlock: *mut libc::pthread_rwlock_t) -> c_int {
    real_or!(__real_pthread_rwlock_unlock(rwlock), unsafe {
        libc::pthread_rwlock_unlock(rwlock)
    })
}

pub(crate) unsafe fn pthread_cond_init(
    cond: *mut libc::pthread_cond_t,
    attr: *const libc::pthread_condattr_t,
) -> c_int {
    real_or!(__real_pthread_cond_init(cond, attr), unsafe {
        libc::pthread_cond_init(cond, attr)
    })
}

pub(crate) unsafe fn pthread_cond_destroy(cond: *mut libc::pthread_cond_t) -> c_int {
    real_or!(__real_pthread_cond_destroy(cond), unsafe {
        libc::pthread_cond_destroy(cond)
    })
}

pub(crate) unsafe fn pthread_cond_signal(cond: *mut libc::pthread_cond_t) -> c_int {
    real_or!(__real_pthread_cond_signal(cond), unsafe {
        libc::pthread_cond_signal(cond)
    })
}

pub(crate) unsafe fn pthread_cond_broadcast(cond: *mut libc::pthread_cond_t) -> c_int {
    real_or!(__real_pthread_cond_broadcast(cond), unsafe {
        libc::pthread_cond_broadcast(cond)
    })
}

pub(crate) unsafe fn pthread_cond_wait(
    cond: *mut libc::pthread_cond_t,
    mutex: *mut libc::pthread_mutex_t,
) -> c_int {
    real_or!(__real_pthread_cond_wait(cond, mutex), unsafe {
        libc::pthread_cond_wait(cond, mutex)
    })
}

pub(crate) unsafe fn pthread_cond_timedwait(
    cond: *mut libc::pthread_cond_t,
    mutex: *mut libc::pthread_mutex_t,
    abstime: *const libc::timespec,
) -> c_int {
    real_or!(__real_pthread_cond_timedwait(cond, mutex, abstime), unsafe {
        libc::pthread_cond_timedwait(cond, mutex, abstime)
    })
}

/// Out-of-fiber `pthread_yield` equivalent
#[inline]
pub(crate) fn sched_yield() -> c_int {
    unsafe { libc::sched_yield() }
}
