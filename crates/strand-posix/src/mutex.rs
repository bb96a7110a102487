//! `pthread_mutex_*` onto the fiber mutex
//!
//! `init` placement-constructs a [`Mutex`] inside the caller's opaque
//! `pthread_mutex_t`; the remaining operations reinterpret that
//! storage. Contract violations surface as POSIX error codes: EBUSY
//! from trylock and destroy-in-use, EPERM from unlock-by-non-owner,
//! EDEADLK from self-relock under the `deadlock-check` feature.

#![allow(clippy::missing_safety_doc)]

use std::ffi::c_int;

use strand_runtime::Mutex;
use strand_runtime::tls;

use crate::overlay::{demolish, emplace, overlay};
use crate::{native, unsupported};

const _: () = assert!(size_of::<Mutex>() <= size_of::<libc::pthread_mutex_t>());
const _: () = assert!(align_of::<Mutex>() <= align_of::<libc::pthread_mutex_t>());

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutex_init(
    mutex: *mut libc::pthread_mutex_t,
    attr: *const libc::pthread_mutexattr_t,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_mutex_init(mutex, attr) };
    }
    assert!(!mutex.is_null());
    unsafe { emplace(mutex, Mutex::new()) };
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutex_destroy(mutex: *mut libc::pthread_mutex_t) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_mutex_destroy(mutex) };
    }
    assert!(!mutex.is_null());
    let m: &Mutex = unsafe { overlay(mutex) };
    if m.locked() {
        return libc::EBUSY;
    }
    unsafe { demolish::<Mutex, _>(mutex) };
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutex_trylock(mutex: *mut libc::pthread_mutex_t) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_mutex_trylock(mutex) };
    }
    assert!(!mutex.is_null());
    let m: &Mutex = unsafe { overlay(mutex) };
    if !m.try_lock() {
        return libc::EBUSY;
    }
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutex_lock(mutex: *mut libc::pthread_mutex_t) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_mutex_lock(mutex) };
    }
    assert!(!mutex.is_null());
    let m: &Mutex = unsafe { overlay(mutex) };

    #[cfg(feature = "deadlock-check")]
    if m.owned_by_current() {
        return libc::EDEADLK;
    }

    m.lock();
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutex_unlock(mutex: *mut libc::pthread_mutex_t) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_mutex_unlock(mutex) };
    }
    assert!(!mutex.is_null());
    let m: &Mutex = unsafe { overlay(mutex) };
    if !m.owned_by_current() {
        return libc::EPERM;
    }
    m.unlock();
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutex_timedlock(
    _mutex: *mut libc::pthread_mutex_t,
    _abstime: *const libc::timespec,
) -> c_int {
    unsupported!("pthread_mutex_timedlock")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutex_clocklock(
    _mutex: *mut libc::pthread_mutex_t,
    _clockid: libc::clockid_t,
    _abstime: *const libc::timespec,
) -> c_int {
    unsupported!("pthread_mutex_clocklock")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutex_getprioceiling(
    _mutex: *const libc::pthread_mutex_t,
    _prioceiling: *mut c_int,
) -> c_int {
    unsupported!("pthread_mutex_getprioceiling")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutex_setprioceiling(
    _mutex: *mut libc::pthread_mutex_t,
    _prioceiling: c_int,
    _old_ceiling: *mut c_int,
) -> c_int {
    unsupported!("pthread_mutex_setprioceiling")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutex_consistent(
    _mutex: *mut libc::pthread_mutex_t,
) -> c_int {
    unsupported!("pthread_mutex_consistent")
}

//
// Mutex Attributes
//

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_init(
    _attr: *mut libc::pthread_mutexattr_t,
) -> c_int {
    unsupported!("pthread_mutexattr_init")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_destroy(
    _attr: *mut libc::pthread_mutexattr_t,
) -> c_int {
    unsupported!("pthread_mutexattr_destroy")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_getpshared(
    _attr: *const libc::pthread_mutexattr_t,
    _pshared: *mut c_int,
) -> c_int {
    unsupported!("pthread_mutexattr_getpshared")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_setpshared(
    _attr: *mut libc::pthread_mutexattr_t,
    _pshared: c_int,
) -> c_int {
    unsupported!("pthread_mutexattr_setpshared")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_gettype(
    _attr: *const libc::pthread_mutexattr_t,
    _kind: *mut c_int,
) -> c_int {
    unsupported!("pthread_mutexattr_gettype")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_settype(
    _attr: *mut libc::pthread_mutexattr_t,
    _kind: c_int,
) -> c_int {
    unsupported!("pthread_mutexattr_settype")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_getprotocol(
    _attr: *const libc::pthread_mutexattr_t,
    _protocol: *mut c_int,
) -> c_int {
    unsupported!("pthread_mutexattr_getprotocol")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_setprotocol(
    _attr: *mut libc::pthread_mutexattr_t,
    _protocol: c_int,
) -> c_int {
    unsupported!("pthread_mutexattr_setprotocol")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_getprioceiling(
    _attr: *const libc::pthread_mutexattr_t,
    _prioceiling: *mut c_int,
) -> c_int {
    unsupported!("pthread_mutexattr_getprioceiling")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_setprioceiling(
    _attr: *mut libc::pthread_mutexattr_t,
    _prioceiling: c_int,
) -> c_int {
    unsupported!("pthread_mutexattr_setprioceiling")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_getrobust(
    _attr: *const libc::pthread_mutexattr_t,
    _robustness: *mut c_int,
) -> c_int {
    unsupported!("pthread_mutexattr_getrobust")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_mutexattr_setrobust(
    _attr: *mut libc::pthread_mutexattr_t,
    _robustness: c_int,
) -> c_int {
    unsupported!("pthread_mutexattr_setrobust")
}
