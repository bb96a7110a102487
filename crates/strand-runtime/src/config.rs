//! Runtime configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! Environment variables (all optional):
//! - `STRAND_STACK_SIZE` - usable bytes per fiber stack
//! - `STRAND_STACK_RESERVE` - recycled stacks kept in the pool
//! - `STRAND_DEBUG` - enable debug logging (0/1)

use strand_core::env::{env_get, env_get_bool};
use strand_core::error::RuntimeError;
use strand_core::klog::{self, LogLevel};

/// Library defaults
pub mod defaults {
    /// Usable stack per fiber; also the size the POSIX bridge uses for
    /// every `pthread_create` fiber
    pub const STACK_SIZE: usize = 1024 * 1024;

    /// Recycled stacks kept mapped in the pool
    pub const STACK_RESERVE: usize = 16;

    pub const DEBUG_LOGGING: bool = false;
}

/// Runtime configuration with builder methods.
///
/// Use `from_env()` to start with the library defaults and apply any
/// environment overrides.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Usable bytes per fiber stack
    pub stack_size: usize,
    /// Recycled stacks kept in the pool
    pub stack_reserve: usize,
    /// Enable debug logging
    pub debug_logging: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Defaults with environment variable overrides applied
    pub fn from_env() -> Self {
        Self {
            stack_size: env_get("STRAND_STACK_SIZE", defaults::STACK_SIZE),
            stack_reserve: env_get("STRAND_STACK_RESERVE", defaults::STACK_RESERVE),
            debug_logging: env_get_bool("STRAND_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Explicit defaults, no env override. Useful in tests.
    pub fn new() -> Self {
        Self {
            stack_size: defaults::STACK_SIZE,
            stack_reserve: defaults::STACK_RESERVE,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn stack_reserve(mut self, n: usize) -> Self {
        self.stack_reserve = n;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.stack_size < 64 * 1024 {
            return Err(RuntimeError::InvalidConfig("stack_size must be >= 64KB"));
        }
        Ok(())
    }

    /// Apply logging-related settings
    pub(crate) fn apply_logging(&self) {
        klog::init();
        if self.debug_logging && !klog::level_enabled(LogLevel::Debug) {
            klog::set_log_level(LogLevel::Debug);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(RuntimeConfig::new().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new().stack_size(256 * 1024).stack_reserve(2);
        assert_eq!(config.stack_size, 256 * 1024);
        assert_eq!(config.stack_reserve, 2);
    }

    #[test]
    fn test_validation_rejects_tiny_stack() {
        let config = RuntimeConfig::new().stack_size(4096);
        assert!(config.validate().is_err());
    }
}
