//! Architecture-specific context switching
//!
//! Each architecture module defines the callee-saved register set
//! ([`SavedRegs`]), how to seed a fresh fiber context
//! ([`init_context`]) and the switch itself ([`switch`]). A switch
//! stores the non-volatile register set plus stack pointer and resume
//! address into the old save area, then restores the same set from the
//! new one; volatile registers are dead across the call boundary by the
//! platform ABI, so nothing else needs saving for a voluntary switch.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub use x86_64::{SavedRegs, init_context, switch};
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use aarch64::{SavedRegs, init_context, switch};
    } else {
        compile_error!("Unsupported architecture");
    }
}
