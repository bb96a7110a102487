//! Linker-wrap shims
//!
//! Built only under the `linker-wrap` feature, for binaries linked
//! with `-Wl,--wrap=pthread_create` (and the rest of this list). The
//! linker rebinds every reference to `pthread_X` to `__wrap_pthread_X`
//! and provides the host implementation as `__real_pthread_X`, which
//! the passthrough module calls. Each shim simply forwards to the
//! dispatch function, which carries the fiber-or-native branch.

#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_char, c_int, c_void};

use crate::native::StartRoutine;

macro_rules! wrap {
    ($(fn $wrap:ident => $dispatch:ident ( $($arg:ident : $ty:ty),* $(,)? ) -> $ret:ty;)*) => {
        $(
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $wrap($($arg: $ty),*) -> $ret {
                unsafe { crate::$dispatch($($arg),*) }
            }
        )*
    };
}

wrap! {
    fn __wrap_pthread_create => strand_pthread_create(
        thread: *mut libc::pthread_t,
        attr: *const libc::pthread_attr_t,
        start_routine: Option<StartRoutine>,
        arg: *mut c_void,
    ) -> c_int;

    fn __wrap_pthread_join => strand_pthread_join(
        thread: libc::pthread_t,
        retval: *mut *mut c_void,
    ) -> c_int;

    fn __wrap_pthread_timedjoin_np => strand_pthread_timedjoin_np(
        thread: libc::pthread_t,
        retval: *mut *mut c_void,
        abstime: *const libc::timespec,
    ) -> c_int;

    fn __wrap_pthread_self => strand_pthread_self() -> libc::pthread_t;

    fn __wrap_pthread_yield => strand_pthread_yield() -> c_int;

    fn __wrap_pthread_setname_np => strand_pthread_setname_np(
        thread: libc::pthread_t,
        name: *const c_char,
    ) -> c_int;

    fn __wrap_pthread_once => strand_pthread_once(
        once_control: *mut libc::pthread_once_t,
        init_routine: Option<unsafe extern "C" fn()>,
    ) -> c_int;

    fn __wrap_pthread_mutex_init => strand_pthread_mutex_init(
        mutex: *mut libc::pthread_mutex_t,
        attr: *const libc::pthread_mutexattr_t,
    ) -> c_int;

    fn __wrap_pthread_mutex_destroy => strand_pthread_mutex_destroy(
        mutex: *mut libc::pthread_mutex_t,
    ) -> c_int;

    fn __wrap_pthread_mutex_lock => strand_pthread_mutex_lock(
        mutex: *mut libc::pthread_mutex_t,
    ) -> c_int;

    fn __wrap_pthread_mutex_trylock => strand_pthread_mutex_trylock(
        mutex: *mut libc::pthread_mutex_t,
    ) -> c_int;

    fn __wrap_pthread_mutex_unlock => strand_pthread_mutex_unlock(
        mutex: *mut libc::pthread_mutex_t,
    ) -> c_int;

    fn __wrap_pthread_rwlock_init => strand_pthread_rwlock_init(
        rwlock: *mut libc::pthread_rwlock_t,
        attr: *const libc::pthread_rwlockattr_t,
    ) -> c_int;

    fn __wrap_pthread_rwlock_destroy => strand_pthread_rwlock_destroy(
        rwlock: *mut libc::pthread_rwlock_t,
    ) -> c_int;

    fn __wrap_pthread_rwlock_rdlock => strand_pthread_rwlock_rdlock(
        rwlock: *mut libc::pthread_rwlock_t,
    ) -> c_int;

    fn __wrap_pthread_rwlock_tryrdlock => strand_pthread_rwlock_tryrdlock(
        rwlock: *mut libc::pthread_rwlock_t,
    ) -> c_int;

    fn __wrap_pthread_rwlock_wrlock => strand_pthread_rwlock_wrlock(
        rwlock: *mut libc::pthread_rwlock_t,
    ) -> c_int;

    fn __wrap_pthread_rwlock_trywrlock => strand_pthread_rwlock_trywrlock(
        rwlock: *mut libc::pthread_rwlock_t,
    ) -> c_int;

    fn __wrap_pthread_rwlock_unlock => strand_pthread_rwlock_unlock(
        rwlock: *mut libc::pthread_rwlock_t,
    ) -> c_int;

    fn __wrap_pthread_cond_init => strand_pthread_cond_init(
        cond: *mut libc::pthread_cond_t,
        attr: *const libc::pthread_condattr_t,
    ) -> c_int;

    fn __wrap_pthread_cond_destroy => strand_pthread_cond_destroy(
        cond: *mut libc::pthread_cond_t,
    ) -> c_int;

    fn __wrap_pthread_cond_signal => strand_pthread_cond_signal(
        cond: *mut libc::pthread_cond_t,
    ) -> c_int;

    fn __wrap_pthread_cond_broadcast => strand_pthread_cond_broadcast(
        cond: *mut libc::pthread_cond_t,
    ) -> c_int;

    fn __wrap_pthread_cond_wait => strand_pthread_cond_wait(
        cond: *mut libc::pthread_cond_t,
        mutex: *mut libc::pthread_mutex_t,
    ) -> c_int;

    fn __wrap_pthread_cond_timedwait => strand_pthread_cond_timedwait(
        cond: *mut libc::pthread_cond_t,
        mutex: *mut libc::pthread_mutex_t,
        abstime: *const libc::timespec,
    ) -> c_int;

    fn __wrap_pthread_condattr_init => strand_pthread_condattr_init(
        attr: *mut libc::pthread_condattr_t,
    ) -> c_int;

    fn __wrap_pthread_condattr_destroy => strand_pthread_condattr_destroy(
        attr: *mut libc::pthread_condattr_t,
    ) -> c_int;
}
