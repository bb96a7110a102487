//! Basic fiber example
//!
//! Spawns a handful of fibers that yield to each other, sleeps one of
//! them on a reactor timer, and joins them all before shutting down.
//!
//! # Environment Variables
//!
//! - `STRAND_FIBERS=<n>` - fibers to spawn (default: 3)
//! - `STRAND_YIELDS=<n>` - yields per fiber (default: 3)
//! - `STRAND_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace

use std::time::Duration;

use strand::{Runtime, RuntimeConfig, join, sleep, spawn, yield_now};
use strand_core::{env_get, kdebug, kinfo};

fn main() {
    println!("=== strand basic example ===\n");

    let num_fibers: usize = env_get("STRAND_FIBERS", 3);
    let num_yields: usize = env_get("STRAND_YIELDS", 3);
    println!("Fibers: {}, yields per fiber: {}\n", num_fibers, num_yields);

    let mut runtime = Runtime::new(RuntimeConfig::default());
    runtime.run(move |stop| {
        kinfo!("basic", "spawning {} fibers", num_fibers);

        let mut ids = Vec::with_capacity(num_fibers + 1);
        for i in 1..=num_fibers {
            let id = spawn(move || {
                kdebug!("basic", "fiber {} started", i);
                for j in 0..num_yields {
                    kdebug!("basic", "fiber {} iteration {}", i, j);
                    yield_now();
                }
                kdebug!("basic", "fiber {} finished", i);
            });
            println!("spawned fiber {} (id={})", i, id);
            ids.push(id);
        }

        // One sleeper exercising the reactor timer path
        ids.push(spawn(|| {
            kdebug!("basic", "sleeper dozing off");
            sleep(Duration::from_millis(20));
            kdebug!("basic", "sleeper woke up");
        }));

        for id in ids {
            join(id).expect("fiber vanished before join");
        }
        kinfo!("basic", "all fibers joined");
        stop.request();
    });

    println!("\n=== example complete ===");
}
