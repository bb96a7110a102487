//! pthread_rwlock_* bridge semantics on fibers

use std::cell::{Cell, UnsafeCell};
use std::ptr;
use std::rc::Rc;

use strand::{Runtime, RuntimeConfig, spawn, yield_now};
use strand_posix::{
    strand_pthread_rwlock_destroy, strand_pthread_rwlock_init, strand_pthread_rwlock_rdlock,
    strand_pthread_rwlock_tryrdlock, strand_pthread_rwlock_trywrlock, strand_pthread_rwlock_unlock,
    strand_pthread_rwlock_wrlock,
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

fn rwlock_storage() -> Rc<UnsafeCell<libc::pthread_rwlock_t>> {
    Rc::new(UnsafeCell::new(unsafe { std::mem::zeroed() }))
}

#[test]
fn test_init_then_destroy_is_clean() {
    run_fiber(|| {
        let storage = rwlock_storage();
        let rw = storage.get();
        unsafe {
            assert_eq!(strand_pthread_rwlock_init(rw, ptr::null()), 0);
            assert_eq!(strand_pthread_rwlock_destroy(rw), 0);
        }
    });
}

#[test]
fn test_multiple_readers_share() {
    run_fiber(|| {
        let storage = rwlock_storage();
        let rw = storage.get();
        unsafe {
            assert_eq!(strand_pthread_rwlock_init(rw, ptr::null()), 0);
            assert_eq!(strand_pthread_rwlock_rdlock(rw), 0);
            assert_eq!(strand_pthread_rwlock_tryrdlock(rw), 0);
            assert_eq!(strand_pthread_rwlock_unlock(rw), 0);
            assert_eq!(strand_pthread_rwlock_unlock(rw), 0);
            assert_eq!(strand_pthread_rwlock_destroy(rw), 0);
        }
    });
}

#[test]
fn test_trywrlock_fails_under_readers() {
    run_fiber(|| {
        let storage = rwlock_storage();
        let rw = storage.get();
        unsafe {
            assert_eq!(strand_pthread_rwlock_init(rw, ptr::null()), 0);
            assert_eq!(strand_pthread_rwlock_rdlock(rw), 0);
            assert_eq!(strand_pthread_rwlock_trywrlock(rw), libc::EBUSY);
            assert_eq!(strand_pthread_rwlock_unlock(rw), 0);

            assert_eq!(strand_pthread_rwlock_wrlock(rw), 0);
            assert_eq!(strand_pthread_rwlock_tryrdlock(rw), libc::EBUSY);
            assert_eq!(strand_pthread_rwlock_unlock(rw), 0);
            assert_eq!(strand_pthread_rwlock_destroy(rw), 0);
        }
    });
}

#[test]
fn test_unlock_without_hold_is_eperm() {
    run_fiber(|| {
        let storage = rwlock_storage();
        let rw = storage.get();
        unsafe {
            assert_eq!(strand_pthread_rwlock_init(rw, ptr::null()), 0);
            assert_eq!(strand_pthread_rwlock_unlock(rw), libc::EPERM);
            assert_eq!(strand_pthread_rwlock_destroy(rw), 0);
        }
    });
}

#[test]
fn test_write_unlock_by_non_owner_is_eperm() {
    run_fiber(|| {
        let storage = rwlock_storage();
        let rw = storage.get();
        unsafe {
            assert_eq!(strand_pthread_rwlock_init(rw, ptr::null()), 0);
            assert_eq!(strand_pthread_rwlock_wrlock(rw), 0);
        }

        let result = Rc::new(Cell::new(-1));
        let r = result.clone();
        let keep = storage.clone();
        let intruder = spawn(move || {
            r.set(unsafe { strand_pthread_rwlock_unlock(keep.get()) });
        });
        strand::join(intruder).unwrap();
        assert_eq!(result.get(), libc::EPERM);

        unsafe {
            assert_eq!(strand_pthread_rwlock_unlock(rw), 0);
            assert_eq!(strand_pthread_rwlock_destroy(rw), 0);
        }
    });
}

#[test]
fn test_destroy_in_use_is_ebusy() {
    run_fiber(|| {
        let storage = rwlock_storage();
        let rw = storage.get();
        unsafe {
            assert_eq!(strand_pthread_rwlock_init(rw, ptr::null()), 0);

            // Reader held
            assert_eq!(strand_pthread_rwlock_rdlock(rw), 0);
            assert_eq!(strand_pthread_rwlock_destroy(rw), libc::EBUSY);
            assert_eq!(strand_pthread_rwlock_unlock(rw), 0);

            // Writer held
            assert_eq!(strand_pthread_rwlock_wrlock(rw), 0);
            assert_eq!(strand_pthread_rwlock_destroy(rw), libc::EBUSY);
            assert_eq!(strand_pthread_rwlock_unlock(rw), 0);

            assert_eq!(strand_pthread_rwlock_destroy(rw), 0);
        }
    });
}

#[test]
fn test_writer_queued_blocks_new_readers() {
    run_fiber(|| {
        let storage = rwlock_storage();
        let rw = storage.get();
        unsafe {
            assert_eq!(strand_pthread_rwlock_init(rw, ptr::null()), 0);
            assert_eq!(strand_pthread_rwlock_rdlock(rw), 0);
        }

        let order = Rc::new(Cell::new(0u32));
        let writer = {
            let keep = storage.clone();
            let order = order.clone();
            spawn(move || {
                unsafe {
                    assert_eq!(strand_pthread_rwlock_wrlock(keep.get()), 0);
                }
                order.set(order.get() * 10 + 1);
                unsafe {
                    assert_eq!(strand_pthread_rwlock_unlock(keep.get()), 0);
                }
            })
        };
        // Writer queues behind our read hold
        yield_now();
        // With a writer queued, a new reader cannot barge
        assert_eq!(unsafe { strand_pthread_rwlock_tryrdlock(rw) }, libc::EBUSY);

        let reader = {
            let keep = storage.clone();
            let order = order.clone();
            spawn(move || {
                unsafe {
                    assert_eq!(strand_pthread_rwlock_rdlock(keep.get()), 0);
                }
                order.set(order.get() * 10 + 2);
                unsafe {
                    assert_eq!(strand_pthread_rwlock_unlock(keep.get()), 0);
                }
            })
        };

        yield_now();
        unsafe {
            assert_eq!(strand_pthread_rwlock_unlock(rw), 0);
        }
        strand::join(writer).unwrap();
        strand::join(reader).unwrap();

        assert_eq!(order.get(), 12, "writer before the late reader");
        assert_eq!(unsafe { strand_pthread_rwlock_destroy(rw) }, 0);
    });
}
