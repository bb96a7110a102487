//! pthread_cond_* bridge semantics on fibers

use std::cell::{Cell, UnsafeCell};
use std::ptr;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use strand::{Runtime, RuntimeConfig, spawn, yield_now};
use strand_posix::{
    strand_pthread_cond_broadcast, strand_pthread_cond_destroy, strand_pthread_cond_init,
    strand_pthread_cond_signal, strand_pthread_cond_timedwait, strand_pthread_cond_wait,
    strand_pthread_condattr_destroy, strand_pthread_condattr_init, strand_pthread_mutex_init,
    strand_pthread_mutex_lock, strand_pthread_mutex_unlock,
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

type CondStorage = Rc<UnsafeCell<libc::pthread_cond_t>>;
type MutexStorage = Rc<UnsafeCell<libc::pthread_mutex_t>>;

fn cond_pair() -> (CondStorage, MutexStorage) {
    let cond: CondStorage = Rc::new(UnsafeCell::new(unsafe { std::mem::zeroed() }));
    let mutex: MutexStorage = Rc::new(UnsafeCell::new(unsafe { std::mem::zeroed() }));
    unsafe {
        assert_eq!(strand_pthread_cond_init(cond.get(), ptr::null()), 0);
        assert_eq!(strand_pthread_mutex_init(mutex.get(), ptr::null()), 0);
    }
    (cond, mutex)
}

fn timespec_at(when: SystemTime) -> libc::timespec {
    let since_epoch = when
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    libc::timespec {
        tv_sec: since_epoch.as_secs() as libc::time_t,
        tv_nsec: since_epoch.subsec_nanos() as libc::c_long,
    }
}

#[test]
fn test_init_then_destroy_is_clean() {
    run_fiber(|| {
        let (cond, _mutex) = cond_pair();
        assert_eq!(unsafe { strand_pthread_cond_destroy(cond.get()) }, 0);
    });
}

#[test]
fn test_signal_wakes_waiter() {
    run_fiber(|| {
        let (cond, mutex) = cond_pair();
        let woken = Rc::new(Cell::new(false));

        let waiter = {
            let cond = cond.clone();
            let mutex = mutex.clone();
            let woken = woken.clone();
            spawn(move || unsafe {
                assert_eq!(strand_pthread_mutex_lock(mutex.get()), 0);
                assert_eq!(strand_pthread_cond_wait(cond.get(), mutex.get()), 0);
                woken.set(true);
                assert_eq!(strand_pthread_mutex_unlock(mutex.get()), 0);
            })
        };

        yield_now();
        unsafe {
            assert_eq!(strand_pthread_mutex_lock(mutex.get()), 0);
            assert_eq!(strand_pthread_cond_signal(cond.get()), 0);
            assert_eq!(strand_pthread_mutex_unlock(mutex.get()), 0);
        }
        strand::join(waiter).unwrap();
        assert!(woken.get());
        assert_eq!(unsafe { strand_pthread_cond_destroy(cond.get()) }, 0);
    });
}

#[test]
fn test_destroy_with_waiter_is_ebusy_then_clean() {
    run_fiber(|| {
        let (cond, mutex) = cond_pair();

        let waiter = {
            let cond = cond.clone();
            let mutex = mutex.clone();
            spawn(move || unsafe {
                assert_eq!(strand_pthread_mutex_lock(mutex.get()), 0);
                assert_eq!(strand_pthread_cond_wait(cond.get(), mutex.get()), 0);
                assert_eq!(strand_pthread_mutex_unlock(mutex.get()), 0);
            })
        };

        // Exactly one waiter queued: destroy must refuse
        yield_now();
        assert_eq!(unsafe { strand_pthread_cond_destroy(cond.get()) }, libc::EBUSY);

        unsafe {
            assert_eq!(strand_pthread_mutex_lock(mutex.get()), 0);
            assert_eq!(strand_pthread_cond_signal(cond.get()), 0);
            assert_eq!(strand_pthread_mutex_unlock(mutex.get()), 0);
        }
        strand::join(waiter).unwrap();

        // Waiter has exited wait: destroy succeeds now
        assert_eq!(unsafe { strand_pthread_cond_destroy(cond.get()) }, 0);
    });
}

#[test]
fn test_timedwait_past_deadline_is_etimedout() {
    run_fiber(|| {
        let (cond, mutex) = cond_pair();
        let abstime = timespec_at(SystemTime::now() - Duration::from_secs(1));

        unsafe {
            assert_eq!(strand_pthread_mutex_lock(mutex.get()), 0);
            assert_eq!(
                strand_pthread_cond_timedwait(cond.get(), mutex.get(), &abstime),
                libc::ETIMEDOUT
            );
            assert_eq!(strand_pthread_mutex_unlock(mutex.get()), 0);
            assert_eq!(strand_pthread_cond_destroy(cond.get()), 0);
        }
    });
}

#[test]
fn test_timedwait_signalled_before_deadline_returns_zero() {
    run_fiber(|| {
        let (cond, mutex) = cond_pair();
        let result = Rc::new(Cell::new(-1));

        let waiter = {
            let cond = cond.clone();
            let mutex = mutex.clone();
            let result = result.clone();
            spawn(move || unsafe {
                let abstime = timespec_at(SystemTime::now() + Duration::from_secs(30));
                assert_eq!(strand_pthread_mutex_lock(mutex.get()), 0);
                result.set(strand_pthread_cond_timedwait(
                    cond.get(),
                    mutex.get(),
                    &abstime,
                ));
                assert_eq!(strand_pthread_mutex_unlock(mutex.get()), 0);
            })
        };

        yield_now();
        unsafe {
            assert_eq!(strand_pthread_mutex_lock(mutex.get()), 0);
            assert_eq!(strand_pthread_cond_signal(cond.get()), 0);
            assert_eq!(strand_pthread_mutex_unlock(mutex.get()), 0);
        }
        strand::join(waiter).unwrap();
        assert_eq!(result.get(), 0);
    });
}

#[test]
fn test_broadcast_wakes_everyone() {
    run_fiber(|| {
        let (cond, mutex) = cond_pair();
        let woken = Rc::new(Cell::new(0u32));

        let ids: Vec<_> = (0..3)
            .map(|_| {
                let cond = cond.clone();
                let mutex = mutex.clone();
                let woken = woken.clone();
                spawn(move || unsafe {
                    assert_eq!(strand_pthread_mutex_lock(mutex.get()), 0);
                    assert_eq!(strand_pthread_cond_wait(cond.get(), mutex.get()), 0);
                    woken.set(woken.get() + 1);
                    assert_eq!(strand_pthread_mutex_unlock(mutex.get()), 0);
                })
            })
            .collect();

        yield_now();
        unsafe {
            assert_eq!(strand_pthread_mutex_lock(mutex.get()), 0);
            assert_eq!(strand_pthread_cond_broadcast(cond.get()), 0);
            assert_eq!(strand_pthread_mutex_unlock(mutex.get()), 0);
        }
        for id in ids {
            strand::join(id).unwrap();
        }
        assert_eq!(woken.get(), 3);
    });
}

#[test]
fn test_condattr_init_destroy_are_noops() {
    let mut attr: libc::pthread_condattr_t = unsafe { std::mem::zeroed() };
    assert_eq!(unsafe { strand_pthread_condattr_init(&mut attr) }, 0);
    assert_eq!(unsafe { strand_pthread_condattr_destroy(&mut attr) }, 0);
}
