//! Registry of bridge-created fibers
//!
//! Insertion-ordered list of every fiber spawned through
//! `pthread_create`, used to answer "does this thread id belong to a
//! fiber?" and to gate join routing. Only the runtime thread ever
//! touches it, so it lives in thread-local storage rather than behind
//! a lock.

use std::cell::RefCell;

use strand_core::FiberId;

thread_local! {
    static REGISTRY: RefCell<Vec<FiberId>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn insert(id: FiberId) {
    REGISTRY.with(|reg| reg.borrow_mut().push(id));
}

/// Remove an id; true if it was present
pub(crate) fn remove(id: FiberId) -> bool {
    REGISTRY.with(|reg| {
        let mut reg = reg.borrow_mut();
        match reg.iter().position(|&x| x == id) {
            Some(pos) => {
                reg.remove(pos);
                true
            }
            None => false,
        }
    })
}

/// Does this pthread id name a bridge-created fiber?
pub(crate) fn is(th: libc::pthread_t) -> bool {
    let id = FiberId::new(th as u64);
    REGISTRY.with(|reg| reg.borrow().contains(&id))
}
