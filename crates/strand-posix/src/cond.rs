//! `pthread_cond_*` onto the condition variable
//!
//! `timedwait` interprets its timespec as an absolute deadline on the
//! system clock and reports ETIMEDOUT on expiry. `destroy` is busy
//! while any fiber waits. The condattr entry points that glibc
//! implements as trivial are no-ops over zeroed storage; the rest fail
//! loudly.

#![allow(clippy::missing_safety_doc)]

use std::ffi::c_int;

use strand_runtime::{CondVar, Mutex, WaitStatus};
use strand_runtime::tls;

use crate::overlay::{demolish, emplace, overlay};
use crate::thread::deadline_from_timespec;
use crate::{native, unsupported};

const _: () = assert!(size_of::<CondVar>() <= size_of::<libc::pthread_cond_t>());
const _: () = assert!(align_of::<CondVar>() <= align_of::<libc::pthread_cond_t>());

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_cond_init(
    cond: *mut libc::pthread_cond_t,
    attr: *const libc::pthread_condattr_t,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_cond_init(cond, attr) };
    }
    assert!(!cond.is_null());
    unsafe { emplace(cond, CondVar::new()) };
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_cond_destroy(cond: *mut libc::pthread_cond_t) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_cond_destroy(cond) };
    }
    assert!(!cond.is_null());
    let cv: &CondVar = unsafe { overlay(cond) };
    if !cv.empty() {
        return libc::EBUSY;
    }
    unsafe { demolish::<CondVar, _>(cond) };
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_cond_signal(cond: *mut libc::pthread_cond_t) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_cond_signal(cond) };
    }
    let cv: &CondVar = unsafe { overlay(cond) };
    cv.notify();
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_cond_broadcast(cond: *mut libc::pthread_cond_t) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_cond_broadcast(cond) };
    }
    let cv: &CondVar = unsafe { overlay(cond) };
    cv.notify_all();
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_cond_wait(
    cond: *mut libc::pthread_cond_t,
    mutex: *mut libc::pthread_mutex_t,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_cond_wait(cond, mutex) };
    }
    assert!(!cond.is_null());
    assert!(!mutex.is_null());

    let cv: &CondVar = unsafe { overlay(cond) };
    let m: &Mutex = unsafe { overlay(mutex) };
    cv.wait(m);
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_cond_timedwait(
    cond: *mut libc::pthread_cond_t,
    mutex: *mut libc::pthread_mutex_t,
    abstime: *const libc::timespec,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_cond_timedwait(cond, mutex, abstime) };
    }
    assert!(!cond.is_null());
    assert!(!mutex.is_null());
    assert!(!abstime.is_null());

    let cv: &CondVar = unsafe { overlay(cond) };
    let m: &Mutex = unsafe { overlay(mutex) };
    let deadline = deadline_from_timespec(unsafe { &*abstime });

    match cv.wait_until(m, deadline) {
        WaitStatus::TimedOut => libc::ETIMEDOUT,
        WaitStatus::Notified => 0,
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_cond_clockwait(
    _cond: *mut libc::pthread_cond_t,
    _mutex: *mut libc::pthread_mutex_t,
    _clockid: libc::clockid_t,
    _abstime: *const libc::timespec,
) -> c_int {
    unsupported!("pthread_cond_clockwait")
}

//
// Condition Variable Attributes
//

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_condattr_init(
    attr: *mut libc::pthread_condattr_t,
) -> c_int {
    assert!(!attr.is_null());
    unsafe { (attr as *mut u8).write_bytes(0, size_of::<libc::pthread_condattr_t>()) };
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_condattr_destroy(
    _attr: *mut libc::pthread_condattr_t,
) -> c_int {
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_condattr_getpshared(
    _attr: *const libc::pthread_condattr_t,
    _pshared: *mut c_int,
) -> c_int {
    unsupported!("pthread_condattr_getpshared")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_condattr_setpshared(
    _attr: *mut libc::pthread_condattr_t,
    _pshared: c_int,
) -> c_int {
    unsupported!("pthread_condattr_setpshared")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_condattr_getclock(
    _attr: *const libc::pthread_condattr_t,
    _clock_id: *mut libc::clockid_t,
) -> c_int {
    unsupported!("pthread_condattr_getclock")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_condattr_setclock(
    _attr: *mut libc::pthread_condattr_t,
    _clock_id: libc::clockid_t,
) -> c_int {
    unsupported!("pthread_condattr_setclock")
}
