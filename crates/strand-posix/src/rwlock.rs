//! `pthread_rwlock_*` onto the shared mutex
//!
//! The pthread interface has no separate read-unlock and write-unlock,
//! so `unlock` inspects the lock: a unique owner must be the caller
//! (EPERM otherwise), and with no unique owner there must be at least
//! one share to release. `destroy` is busy while a writer holds it,
//! readers hold it, or anyone waits.

#![allow(clippy::missing_safety_doc)]

use std::ffi::c_int;

use strand_runtime::SharedMutex;
use strand_runtime::tls;

use crate::overlay::{demolish, emplace, overlay};
use crate::{native, unsupported};

const _: () = assert!(size_of::<SharedMutex>() <= size_of::<libc::pthread_rwlock_t>());
const _: () = assert!(align_of::<SharedMutex>() <= align_of::<libc::pthread_rwlock_t>());

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlock_init(
    rwlock: *mut libc::pthread_rwlock_t,
    attr: *const libc::pthread_rwlockattr_t,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_rwlock_init(rwlock, attr) };
    }
    assert!(!rwlock.is_null());
    unsafe { emplace(rwlock, SharedMutex::new()) };
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlock_destroy(
    rwlock: *mut libc::pthread_rwlock_t,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_rwlock_destroy(rwlock) };
    }
    assert!(!rwlock.is_null());
    let sm: &SharedMutex = unsafe { overlay(rwlock) };

    let busy = !sm.can_lock_upgrade() || sm.shares() > 0 || sm.waiting() > 0;
    if busy {
        return libc::EBUSY;
    }
    unsafe { demolish::<SharedMutex, _>(rwlock) };
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlock_rdlock(
    rwlock: *mut libc::pthread_rwlock_t,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_rwlock_rdlock(rwlock) };
    }
    assert!(!rwlock.is_null());
    let sm: &SharedMutex = unsafe { overlay(rwlock) };
    sm.lock_shared();
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlock_tryrdlock(
    rwlock: *mut libc::pthread_rwlock_t,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_rwlock_tryrdlock(rwlock) };
    }
    assert!(!rwlock.is_null());
    let sm: &SharedMutex = unsafe { overlay(rwlock) };
    if !sm.try_lock_shared() {
        return libc::EBUSY;
    }
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlock_timedrdlock(
    _rwlock: *mut libc::pthread_rwlock_t,
    _abstime: *const libc::timespec,
) -> c_int {
    unsupported!("pthread_rwlock_timedrdlock")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlock_clockrdlock(
    _rwlock: *mut libc::pthread_rwlock_t,
    _clockid: libc::clockid_t,
    _abstime: *const libc::timespec,
) -> c_int {
    unsupported!("pthread_rwlock_clockrdlock")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlock_wrlock(
    rwlock: *mut libc::pthread_rwlock_t,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_rwlock_wrlock(rwlock) };
    }
    assert!(!rwlock.is_null());
    let sm: &SharedMutex = unsafe { overlay(rwlock) };

    #[cfg(feature = "deadlock-check")]
    if sm.unique_by_current() {
        return libc::EDEADLK;
    }

    sm.lock();
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlock_trywrlock(
    rwlock: *mut libc::pthread_rwlock_t,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_rwlock_trywrlock(rwlock) };
    }
    assert!(!rwlock.is_null());
    let sm: &SharedMutex = unsafe { overlay(rwlock) };
    if !sm.try_lock() {
        return libc::EBUSY;
    }
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlock_timedwrlock(
    _rwlock: *mut libc::pthread_rwlock_t,
    _abstime: *const libc::timespec,
) -> c_int {
    unsupported!("pthread_rwlock_timedwrlock")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlock_clockwrlock(
    _rwlock: *mut libc::pthread_rwlock_t,
    _clockid: libc::clockid_t,
    _abstime: *const libc::timespec,
) -> c_int {
    unsupported!("pthread_rwlock_clockwrlock")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlock_unlock(
    rwlock: *mut libc::pthread_rwlock_t,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_rwlock_unlock(rwlock) };
    }
    assert!(!rwlock.is_null());
    let sm: &SharedMutex = unsafe { overlay(rwlock) };

    // No rdunlock()/wrunlock() in the pthread interface, so branch on
    // the lock's own state
    if sm.unique() {
        if !sm.unique_by_current() {
            return libc::EPERM;
        }
        sm.unlock();
        return 0;
    }

    if sm.shares() == 0 {
        return libc::EPERM;
    }
    sm.unlock_shared();
    0
}

//
// Shared Mutex Attributes
//

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlockattr_init(
    _attr: *mut libc::pthread_rwlockattr_t,
) -> c_int {
    unsupported!("pthread_rwlockattr_init")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlockattr_destroy(
    _attr: *mut libc::pthread_rwlockattr_t,
) -> c_int {
    unsupported!("pthread_rwlockattr_destroy")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlockattr_getpshared(
    _attr: *const libc::pthread_rwlockattr_t,
    _pshared: *mut c_int,
) -> c_int {
    unsupported!("pthread_rwlockattr_getpshared")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlockattr_setpshared(
    _attr: *mut libc::pthread_rwlockattr_t,
    _pshared: c_int,
) -> c_int {
    unsupported!("pthread_rwlockattr_setpshared")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlockattr_getkind_np(
    _attr: *const libc::pthread_rwlockattr_t,
    _pref: *mut c_int,
) -> c_int {
    unsupported!("pthread_rwlockattr_getkind_np")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_rwlockattr_setkind_np(
    _attr: *mut libc::pthread_rwlockattr_t,
    _pref: c_int,
) -> c_int {
    unsupported!("pthread_rwlockattr_setkind_np")
}
