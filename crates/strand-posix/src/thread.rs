//! Thread lifecycle, once-init and the unsupported pthread surface
//!
//! `pthread_create` on a fiber submits a new 1 MiB fiber in POST mode
//! and records it in the registry; `pthread_join` routes by registry
//! membership, so ids from the native world always reach the host
//! libc. Joined bridged threads surface the CANCELED sentinel rather
//! than their start routine's return value.

#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_char, c_int, c_void};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use strand_core::{FiberId, JoinError, kdebug};
use strand_runtime::{SubmitMode, tls};

use crate::native::{self, StartRoutine};
use crate::{CANCELED, LOG_TAG, registry, unsupported};

/// Every bridged thread gets this much usable stack
pub(crate) const BRIDGE_STACK_SIZE: usize = 1024 * 1024;

const _: () = assert!(size_of::<AtomicI32>() == size_of::<libc::pthread_once_t>());

/// Absolute system-clock timespec to a monotonic deadline; already
/// expired timespecs clamp to now.
pub(crate) fn deadline_from_timespec(ts: &libc::timespec) -> Instant {
    if ts.tv_sec < 0 {
        return Instant::now();
    }
    let target = UNIX_EPOCH + Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32);
    match target.duration_since(SystemTime::now()) {
        Ok(remaining) => Instant::now() + remaining,
        Err(_) => Instant::now(),
    }
}

//
// pthread supplement
//

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_create(
    thread: *mut libc::pthread_t,
    attr: *const libc::pthread_attr_t,
    start_routine: Option<StartRoutine>,
    arg: *mut c_void,
) -> c_int {
    if !tls::is_on_fiber() {
        return unsafe { native::pthread_create(thread, attr, start_routine, arg) };
    }

    assert!(!thread.is_null());
    let start = start_routine.expect("pthread_create without a start routine");

    let rt = tls::current_runtime().expect("fiber without an active runtime");
    let arg_addr = arg as usize;
    let id = rt.scheduler().submit(
        Box::new(move || Ok(unsafe { start(arg_addr as *mut c_void) })),
        BRIDGE_STACK_SIZE,
        SubmitMode::Post,
    );
    registry::insert(id);
    unsafe { *thread = id.as_u64() as libc::pthread_t };

    kdebug!(
        LOG_TAG,
        "pthread_create id:{} attr:{:p} func:{:p} arg:{:p}",
        id,
        attr,
        start as usize as *const c_void,
        arg
    );
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_join(
    thread: libc::pthread_t,
    retval: *mut *mut c_void,
) -> c_int {
    if !registry::is(thread) {
        return unsafe { native::pthread_join(thread, retval) };
    }

    kdebug!(LOG_TAG, "pthread_join id:{} retval:{:p}", thread, retval);

    let id = FiberId::new(thread as u64);
    let rt = tls::current_runtime().expect("bridged join outside an active runtime");
    // Unknown here means the registry outlived the context row; the
    // contract is the same either way: report a canceled thread.
    let _ = rt.scheduler().join(id);
    registry::remove(id);

    if !retval.is_null() {
        unsafe { *retval = CANCELED };
    }
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_tryjoin_np(
    _thread: libc::pthread_t,
    _retval: *mut *mut c_void,
) -> c_int {
    unsupported!("pthread_tryjoin_np")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_timedjoin_np(
    thread: libc::pthread_t,
    retval: *mut *mut c_void,
    abstime: *const libc::timespec,
) -> c_int {
    if !registry::is(thread) {
        return unsafe { native::pthread_timedjoin_np(thread, retval, abstime) };
    }

    assert!(!abstime.is_null());
    let deadline = deadline_from_timespec(unsafe { &*abstime });

    let id = FiberId::new(thread as u64);
    let rt = tls::current_runtime().expect("bridged join outside an active runtime");
    match rt.scheduler().join_until(id, deadline) {
        Err(JoinError::TimedOut) => return libc::ETIMEDOUT,
        Ok(_) | Err(JoinError::Unknown) => {}
    }
    registry::remove(id);

    if !retval.is_null() {
        unsafe { *retval = CANCELED };
    }
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_exit(_retval: *mut c_void) -> ! {
    strand_core::kerror!(LOG_TAG, "unsupported pthread call: pthread_exit");
    std::process::abort();
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_detach(_thread: libc::pthread_t) -> c_int {
    unsupported!("pthread_detach")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_self() -> libc::pthread_t {
    match tls::current_id().to_option() {
        Some(id) => id.as_u64() as libc::pthread_t,
        None => unsafe { native::pthread_self() },
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_equal(a: libc::pthread_t, b: libc::pthread_t) -> c_int {
    (a == b) as c_int
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_getcpuclockid(
    _thread: libc::pthread_t,
    _clock_id: *mut libc::clockid_t,
) -> c_int {
    unsupported!("pthread_getcpuclockid")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_atfork(
    _prepare: Option<unsafe extern "C" fn()>,
    _parent: Option<unsafe extern "C" fn()>,
    _child: Option<unsafe extern "C" fn()>,
) -> c_int {
    unsupported!("pthread_atfork")
}

//
// Initialization
//

/// Single-shot init on the control word, in or out of a fiber.
///
/// The atomic exchange tolerates genuinely concurrent callers on other
/// OS threads; inside one runtime the semantics collapse to the
/// single-threaded case. The init routine runs on whichever caller
/// observes the 0 -> 1 transition; latecomers do not wait for it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_once(
    once_control: *mut libc::pthread_once_t,
    init_routine: Option<unsafe extern "C" fn()>,
) -> c_int {
    assert!(!once_control.is_null());
    let Some(init) = init_routine else {
        return libc::EINVAL;
    };

    let control = unsafe { AtomicI32::from_ptr(once_control as *mut i32) };
    let previous = control.swap(1, Ordering::AcqRel);
    debug_assert!(previous == 0 || previous == 1);
    if previous == 0 {
        unsafe { init() };
    }
    0
}

//
// Cancellation
//

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_setcancelstate(
    _state: c_int,
    _oldstate: *mut c_int,
) -> c_int {
    unsupported!("pthread_setcancelstate")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_setcanceltype(
    _type: c_int,
    _oldtype: *mut c_int,
) -> c_int {
    unsupported!("pthread_setcanceltype")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_cancel(_thread: libc::pthread_t) -> c_int {
    unsupported!("pthread_cancel")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_testcancel() {
    strand_core::kerror!(LOG_TAG, "unsupported pthread call: pthread_testcancel");
}

//
// Scheduling
//

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_setschedparam(
    _thread: libc::pthread_t,
    _policy: c_int,
    _param: *const libc::sched_param,
) -> c_int {
    unsupported!("pthread_setschedparam")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_getschedparam(
    _thread: libc::pthread_t,
    _policy: *mut c_int,
    _param: *mut libc::sched_param,
) -> c_int {
    unsupported!("pthread_getschedparam")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_setschedprio(
    _thread: libc::pthread_t,
    _prio: c_int,
) -> c_int {
    unsupported!("pthread_setschedprio")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_getname_np(
    _thread: libc::pthread_t,
    _buf: *mut c_char,
    _buflen: usize,
) -> c_int {
    unsupported!("pthread_getname_np")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_setname_np(
    thread: libc::pthread_t,
    name: *const c_char,
) -> c_int {
    if !registry::is(thread) {
        return unsafe { native::pthread_setname_np(thread, name) };
    }
    // Accepted and ignored for fibers
    kdebug!(LOG_TAG, "pthread_setname_np id:{} ignored", thread);
    0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_getconcurrency() -> c_int {
    unsupported!("pthread_getconcurrency")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_setconcurrency(_level: c_int) -> c_int {
    unsupported!("pthread_setconcurrency")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_setaffinity_np(
    _thread: libc::pthread_t,
    _cpusetsize: usize,
    _cpuset: *const libc::cpu_set_t,
) -> c_int {
    unsupported!("pthread_setaffinity_np")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_getaffinity_np(
    _thread: libc::pthread_t,
    _cpusetsize: usize,
    _cpuset: *mut libc::cpu_set_t,
) -> c_int {
    unsupported!("pthread_getaffinity_np")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_yield() -> c_int {
    match tls::current_runtime() {
        Some(rt) if rt.scheduler().current_id().is_some() => {
            rt.scheduler().yield_now();
            0
        }
        _ => native::sched_yield(),
    }
}

//
// Attributes
//

macro_rules! attr_stub {
    ($(fn $fn_name:ident / $name:literal ( $($arg:ident : $ty:ty),* $(,)? );)*) => {
        $(
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $fn_name($(_: $ty),*) -> c_int {
                unsupported!($name)
            }
        )*
    };
}

attr_stub! {
    fn strand_pthread_attr_init / "pthread_attr_init"(attr: *mut libc::pthread_attr_t);
    fn strand_pthread_attr_destroy / "pthread_attr_destroy"(attr: *mut libc::pthread_attr_t);
    fn strand_pthread_attr_getdetachstate / "pthread_attr_getdetachstate"(
        attr: *const libc::pthread_attr_t,
        detachstate: *mut c_int,
    );
    fn strand_pthread_attr_setdetachstate / "pthread_attr_setdetachstate"(
        attr: *mut libc::pthread_attr_t,
        detachstate: c_int,
    );
    fn strand_pthread_attr_getguardsize / "pthread_attr_getguardsize"(
        attr: *const libc::pthread_attr_t,
        guardsize: *mut usize,
    );
    fn strand_pthread_attr_setguardsize / "pthread_attr_setguardsize"(
        attr: *mut libc::pthread_attr_t,
        guardsize: usize,
    );
    fn strand_pthread_attr_getschedparam / "pthread_attr_getschedparam"(
        attr: *const libc::pthread_attr_t,
        param: *mut libc::sched_param,
    );
    fn strand_pthread_attr_setschedparam / "pthread_attr_setschedparam"(
        attr: *mut libc::pthread_attr_t,
        param: *const libc::sched_param,
    );
    fn strand_pthread_attr_getschedpolicy / "pthread_attr_getschedpolicy"(
        attr: *const libc::pthread_attr_t,
        policy: *mut c_int,
    );
    fn strand_pthread_attr_setschedpolicy / "pthread_attr_setschedpolicy"(
        attr: *mut libc::pthread_attr_t,
        policy: c_int,
    );
    fn strand_pthread_attr_getinheritsched / "pthread_attr_getinheritsched"(
        attr: *const libc::pthread_attr_t,
        inherit: *mut c_int,
    );
    fn strand_pthread_attr_setinheritsched / "pthread_attr_setinheritsched"(
        attr: *mut libc::pthread_attr_t,
        inherit: c_int,
    );
    fn strand_pthread_attr_getscope / "pthread_attr_getscope"(
        attr: *const libc::pthread_attr_t,
        scope: *mut c_int,
    );
    fn strand_pthread_attr_setscope / "pthread_attr_setscope"(
        attr: *mut libc::pthread_attr_t,
        scope: c_int,
    );
    fn strand_pthread_attr_getstackaddr / "pthread_attr_getstackaddr"(
        attr: *const libc::pthread_attr_t,
        stackaddr: *mut *mut c_void,
    );
    fn strand_pthread_attr_setstackaddr / "pthread_attr_setstackaddr"(
        attr: *mut libc::pthread_attr_t,
        stackaddr: *mut c_void,
    );
    fn strand_pthread_attr_getstacksize / "pthread_attr_getstacksize"(
        attr: *const libc::pthread_attr_t,
        stacksize: *mut usize,
    );
    fn strand_pthread_attr_setstacksize / "pthread_attr_setstacksize"(
        attr: *mut libc::pthread_attr_t,
        stacksize: usize,
    );
    fn strand_pthread_attr_getstack / "pthread_attr_getstack"(
        attr: *const libc::pthread_attr_t,
        stackaddr: *mut *mut c_void,
        stacksize: *mut usize,
    );
    fn strand_pthread_attr_setstack / "pthread_attr_setstack"(
        attr: *mut libc::pthread_attr_t,
        stackaddr: *mut c_void,
        stacksize: usize,
    );
    fn strand_pthread_attr_setaffinity_np / "pthread_attr_setaffinity_np"(
        attr: *mut libc::pthread_attr_t,
        cpusetsize: usize,
        cpuset: *const libc::cpu_set_t,
    );
    fn strand_pthread_attr_getaffinity_np / "pthread_attr_getaffinity_np"(
        attr: *const libc::pthread_attr_t,
        cpusetsize: usize,
        cpuset: *mut libc::cpu_set_t,
    );
    fn strand_pthread_getattr_default_np / "pthread_getattr_default_np"(
        attr: *mut libc::pthread_attr_t,
    );
    fn strand_pthread_setattr_default_np / "pthread_setattr_default_np"(
        attr: *const libc::pthread_attr_t,
    );
    fn strand_pthread_getattr_np / "pthread_getattr_np"(
        thread: libc::pthread_t,
        attr: *mut libc::pthread_attr_t,
    );
}

//
// Thread-Local
//

attr_stub! {
    fn strand_pthread_key_create / "pthread_key_create"(
        key: *mut libc::pthread_key_t,
        destructor: Option<unsafe extern "C" fn(*mut c_void)>,
    );
    fn strand_pthread_key_delete / "pthread_key_delete"(key: libc::pthread_key_t);
    fn strand_pthread_setspecific / "pthread_setspecific"(
        key: libc::pthread_key_t,
        pointer: *const c_void,
    );
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn strand_pthread_getspecific(_key: libc::pthread_key_t) -> *mut c_void {
    strand_core::kerror!(LOG_TAG, "unsupported pthread call: pthread_getspecific");
    std::ptr::null_mut()
}

//
// Spinlock
//

attr_stub! {
    fn strand_pthread_spin_init / "pthread_spin_init"(
        lock: *mut libc::pthread_spinlock_t,
        pshared: c_int,
    );
    fn strand_pthread_spin_destroy / "pthread_spin_destroy"(lock: *mut libc::pthread_spinlock_t);
    fn strand_pthread_spin_lock / "pthread_spin_lock"(lock: *mut libc::pthread_spinlock_t);
    fn strand_pthread_spin_trylock / "pthread_spin_trylock"(lock: *mut libc::pthread_spinlock_t);
    fn strand_pthread_spin_unlock / "pthread_spin_unlock"(lock: *mut libc::pthread_spinlock_t);
}

//
// Barrier
//

attr_stub! {
    fn strand_pthread_barrier_init / "pthread_barrier_init"(
        barrier: *mut libc::pthread_barrier_t,
        attr: *const libc::pthread_barrierattr_t,
        count: u32,
    );
    fn strand_pthread_barrier_destroy / "pthread_barrier_destroy"(
        barrier: *mut libc::pthread_barrier_t,
    );
    fn strand_pthread_barrier_wait / "pthread_barrier_wait"(barrier: *mut libc::pthread_barrier_t);
    fn strand_pthread_barrierattr_init / "pthread_barrierattr_init"(
        attr: *mut libc::pthread_barrierattr_t,
    );
    fn strand_pthread_barrierattr_destroy / "pthread_barrierattr_destroy"(
        attr: *mut libc::pthread_barrierattr_t,
    );
    fn strand_pthread_barrierattr_getpshared / "pthread_barrierattr_getpshared"(
        attr: *const libc::pthread_barrierattr_t,
        pshared: *mut c_int,
    );
    fn strand_pthread_barrierattr_setpshared / "pthread_barrierattr_setpshared"(
        attr: *mut libc::pthread_barrierattr_t,
        pshared: c_int,
    );
}
