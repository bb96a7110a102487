//! pthread_mutex_* bridge semantics on fibers

use std::cell::{Cell, UnsafeCell};
use std::ptr;
use std::rc::Rc;

use strand::{Runtime, RuntimeConfig, spawn, yield_now};
use strand_posix::{
    strand_pthread_mutex_destroy, strand_pthread_mutex_init, strand_pthread_mutex_lock,
    strand_pthread_mutex_trylock, strand_pthread_mutex_unlock, strand_pthread_mutexattr_init,
};

fn run_fiber(f: impl FnOnce() + 'static) {
    let done = Rc::new(Cell::new(false));
    let flag = done.clone();
    let mut rt = Runtime::new(RuntimeConfig::new().stack_size(256 * 1024));
    rt.run(move |stop| {
        f();
        flag.set(true);
        stop.request();
    });
    assert!(done.get(), "main fiber did not run to completion");
}

fn mutex_storage() -> Rc<UnsafeCell<libc::pthread_mutex_t>> {
    Rc::new(UnsafeCell::new(unsafe { std::mem::zeroed() }))
}

#[test]
fn test_init_then_destroy_is_clean() {
    run_fiber(|| {
        let storage = mutex_storage();
        let m = storage.get();
        unsafe {
            assert_eq!(strand_pthread_mutex_init(m, ptr::null()), 0);
            assert_eq!(strand_pthread_mutex_destroy(m), 0);
        }
    });
}

#[test]
fn test_lock_unlock_roundtrip() {
    run_fiber(|| {
        let storage = mutex_storage();
        let m = storage.get();
        unsafe {
            assert_eq!(strand_pthread_mutex_init(m, ptr::null()), 0);
            assert_eq!(strand_pthread_mutex_lock(m), 0);
            assert_eq!(strand_pthread_mutex_unlock(m), 0);
            assert_eq!(strand_pthread_mutex_destroy(m), 0);
        }
    });
}

#[test]
fn test_trylock_reports_ebusy_when_held() {
    run_fiber(|| {
        let storage = mutex_storage();
        let m = storage.get();
        unsafe {
            assert_eq!(strand_pthread_mutex_init(m, ptr::null()), 0);
            assert_eq!(strand_pthread_mutex_trylock(m), 0);
            assert_eq!(strand_pthread_mutex_trylock(m), libc::EBUSY);
            assert_eq!(strand_pthread_mutex_unlock(m), 0);
            assert_eq!(strand_pthread_mutex_destroy(m), 0);
        }
    });
}

#[test]
fn test_unlock_by_non_owner_is_eperm() {
    run_fiber(|| {
        let storage = mutex_storage();
        let m = storage.get();
        unsafe {
            assert_eq!(strand_pthread_mutex_init(m, ptr::null()), 0);
            assert_eq!(strand_pthread_mutex_lock(m), 0);
        }

        let result = Rc::new(Cell::new(-1));
        let r = result.clone();
        let keep = storage.clone();
        let intruder = spawn(move || {
            r.set(unsafe { strand_pthread_mutex_unlock(keep.get()) });
        });
        strand::join(intruder).unwrap();

        assert_eq!(result.get(), libc::EPERM);
        // Ownership unchanged: the owner can still unlock
        unsafe {
            assert_eq!(strand_pthread_mutex_unlock(m), 0);
            assert_eq!(strand_pthread_mutex_destroy(m), 0);
        }
    });
}

#[test]
fn test_destroy_while_locked_is_ebusy() {
    run_fiber(|| {
        let storage = mutex_storage();
        let m = storage.get();
        unsafe {
            assert_eq!(strand_pthread_mutex_init(m, ptr::null()), 0);
            assert_eq!(strand_pthread_mutex_lock(m), 0);
            assert_eq!(strand_pthread_mutex_destroy(m), libc::EBUSY);
            assert_eq!(strand_pthread_mutex_unlock(m), 0);
            assert_eq!(strand_pthread_mutex_destroy(m), 0);
        }
    });
}

#[test]
fn test_contended_lock_hands_off_in_order() {
    run_fiber(|| {
        let storage = mutex_storage();
        let m = storage.get();
        unsafe {
            assert_eq!(strand_pthread_mutex_init(m, ptr::null()), 0);
            assert_eq!(strand_pthread_mutex_lock(m), 0);
        }

        let order = Rc::new(Cell::new(0u32));
        let ids: Vec<_> = (1..=3u32)
            .map(|i| {
                let keep = storage.clone();
                let order = order.clone();
                spawn(move || {
                    unsafe {
                        assert_eq!(strand_pthread_mutex_lock(keep.get()), 0);
                    }
                    order.set(order.get() * 10 + i);
                    unsafe {
                        assert_eq!(strand_pthread_mutex_unlock(keep.get()), 0);
                    }
                })
            })
            .collect();

        yield_now();
        unsafe {
            assert_eq!(strand_pthread_mutex_unlock(m), 0);
        }
        for id in ids {
            strand::join(id).unwrap();
        }
        assert_eq!(order.get(), 123, "acquisition order equals call order");
        unsafe {
            assert_eq!(strand_pthread_mutex_destroy(m), 0);
        }
    });
}

#[test]
fn test_mutexattr_init_is_unsupported() {
    strand_core::klog::set_log_level(strand_core::LogLevel::Off);
    let mut attr: libc::pthread_mutexattr_t = unsafe { std::mem::zeroed() };
    assert_eq!(unsafe { strand_pthread_mutexattr_init(&mut attr) }, libc::EINVAL);
}
