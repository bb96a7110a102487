//! POSIX bridge example
//!
//! Runs the same pthread code twice: once from inside a fiber, where
//! the bridge routes it onto the scheduler, and once from the plain
//! main thread, where every call passes through to the host libc.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use strand::{Runtime, RuntimeConfig};
use strand_posix::{strand_pthread_create, strand_pthread_join, strand_pthread_self};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn worker(arg: *mut c_void) -> *mut c_void {
    let rounds = arg as usize;
    for _ in 0..rounds {
        COUNTER.fetch_add(1, Ordering::Relaxed);
    }
    println!("  worker on thread id {} done", unsafe { strand_pthread_self() });
    ptr::null_mut()
}

fn run_pthread_pair(label: &str) {
    println!("{}: self={}", label, unsafe { strand_pthread_self() });

    let mut threads = [0 as libc::pthread_t; 2];
    for (i, th) in threads.iter_mut().enumerate() {
        let rc = unsafe {
            strand_pthread_create(th, ptr::null(), Some(worker), (100 * (i + 1)) as *mut c_void)
        };
        assert_eq!(rc, 0, "pthread_create failed");
    }
    for th in threads {
        let mut retval: *mut c_void = ptr::null_mut();
        let rc = unsafe { strand_pthread_join(th, &mut retval) };
        assert_eq!(rc, 0, "pthread_join failed");
    }
}

fn main() {
    println!("=== strand pthread bridge example ===\n");

    let mut runtime = Runtime::new(RuntimeConfig::default());
    runtime.run(|stop| {
        run_pthread_pair("in-fiber (bridged)");
        stop.request();
    });

    run_pthread_pair("out-of-fiber (native passthrough)");

    println!("\ncounter total: {}", COUNTER.load(Ordering::Relaxed));
    println!("=== example complete ===");
}
