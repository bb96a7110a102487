//! Reactor timers, sleep ordering and cross-thread posting

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use strand::{Completion, FiberId, Runtime, RuntimeConfig, join, sleep, spawn, yield_now};
use strand_runtime::tls;

fn run_main(f: impl FnOnce() + 'static) {
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

fn join_ok(id: FiberId) {
    match join(id) {
        Ok(Completion::Returned(_)) => {}
        other => panic!("fiber {} did not complete cleanly: {:?}", id, other),
    }
}

#[test]
fn test_sleep_suspends_for_at_least_duration() {
    run_main(|| {
        let started = Instant::now();
        sleep(Duration::from_millis(30));
        assert!(started.elapsed() >= Duration::from_millis(30));
    });
}

#[test]
fn test_sleepers_wake_in_deadline_order() {
    run_main(|| {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut ids = Vec::new();
        // Spawned longest-first; wakeups must sort by deadline
        for (tag, ms) in [("slow", 90u64), ("fast", 10), ("mid", 50)] {
            let order = order.clone();
            ids.push(spawn(move || {
                sleep(Duration::from_millis(ms));
                order.borrow_mut().push(tag);
            }));
        }
        for id in ids {
            join_ok(id);
        }
        assert_eq!(&*order.borrow(), &["fast", "mid", "slow"]);
    });
}

#[test]
fn test_cancelled_timer_does_not_fire() {
    run_main(|| {
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let reactor = tls::current_runtime().unwrap().reactor();
        let handle = reactor.schedule_timer(
            Instant::now() + Duration::from_millis(10),
            Box::new(move || flag.set(true)),
        );
        assert!(reactor.cancel_timer(handle));
        sleep(Duration::from_millis(40));
        assert!(!fired.get());
    });
}

#[test]
fn test_timer_callbacks_fire_on_runtime_thread() {
    run_main(|| {
        // Sentinel: distinguishes "never ran" from "ran on the root"
        let seen = Rc::new(Cell::new(FiberId::new(7)));
        let slot = seen.clone();
        let reactor = tls::current_runtime().unwrap().reactor();
        reactor.schedule_timer(
            Instant::now(),
            Box::new(move || {
                // Timer callbacks run on the root context, not a fiber
                slot.set(tls::current_id());
            }),
        );
        sleep(Duration::from_millis(20));
        assert_eq!(seen.get(), FiberId::NONE);
    });
}

#[test]
fn test_loop_is_not_idle_while_dispatching() {
    run_main(|| {
        let reactor = tls::current_runtime().unwrap().reactor();
        assert!(!reactor.idle(), "idle hint must be clear during a fiber turn");
    });
}

#[test]
fn test_local_post_runs_fifo() {
    run_main(|| {
        let log = Rc::new(RefCell::new(Vec::new()));
        let reactor = tls::current_runtime().unwrap().reactor();
        for i in 0..3 {
            let log = log.clone();
            reactor.post(move || log.borrow_mut().push(i));
        }
        yield_now();
        assert_eq!(&*log.borrow(), &[0, 1, 2]);
    });
}

#[test]
fn test_cross_thread_post_wakes_parked_loop() {
    let posted = Arc::new(AtomicBool::new(false));
    let observed = Rc::new(Cell::new(false));

    let mut rt = Runtime::new(RuntimeConfig::new().stack_size(256 * 1024));
    let handle = rt.reactor().handle();

    let flag = posted.clone();
    let worker = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        let inner = flag.clone();
        handle.post(move || inner.store(true, Ordering::Release));
    });

    let obs = observed.clone();
    let flag = posted.clone();
    rt.run(move |stop| {
        // Nothing else is runnable; the loop parks until the remote
        // post arrives
        while !flag.load(Ordering::Acquire) {
            sleep(Duration::from_millis(5));
        }
        obs.set(true);
        stop.request();
    });

    worker.join().unwrap();
    assert!(observed.get());
}

#[test]
fn test_wake_remote_cuts_a_sleep_short() {
    let mut rt = Runtime::new(RuntimeConfig::new().stack_size(256 * 1024));
    let handle = rt.reactor().handle();

    let (tx, rx) = std::sync::mpsc::channel::<u64>();
    let waker = std::thread::spawn(move || {
        let id = rx.recv().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        strand_runtime::reactor::wake_remote(&handle, FiberId::new(id));
    });

    rt.run(move |stop| {
        let started = Instant::now();
        let sleeper = spawn(|| {
            // Far past the external wake; the remote notification
            // must cut this short
            sleep(Duration::from_secs(30));
        });
        tx.send(sleeper.as_u64()).unwrap();
        join(sleeper).unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        stop.request();
    });

    waker.join().unwrap();
}

#[test]
fn test_remote_quit_stops_loop() {
    let mut rt = Runtime::new(RuntimeConfig::new().stack_size(256 * 1024));
    let handle = rt.reactor().handle();

    let quitter = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        handle.quit();
        handle.quit();
    });

    let started = Instant::now();
    rt.run(|_stop| {
        // Sleep far past the external quit; the loop must not wait
        // for this fiber
        sleep(Duration::from_secs(30));
    });
    assert!(started.elapsed() < Duration::from_secs(5));

    quitter.join().unwrap();
}
