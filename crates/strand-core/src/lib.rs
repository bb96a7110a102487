//! # strand-core
//!
//! Core types for the strand fiber runtime.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! The scheduler, reactor and context-switch machinery live in
//! `strand-runtime`; this crate only defines what they all share.
//!
//! ## Modules
//!
//! - `id` - fiber identifier type
//! - `state` - fiber lifecycle states
//! - `error` - error types
//! - `klog` - leveled stderr logging macros with a subsystem tag
//! - `env` - environment variable utilities

pub mod env;
pub mod error;
pub mod id;
pub mod klog;
pub mod state;

// Re-exports for convenience
pub use env::{env_get, env_get_bool, env_get_opt};
pub use error::{JoinError, RtResult, RuntimeError};
pub use id::FiberId;
pub use klog::LogLevel;
pub use state::FiberState;
