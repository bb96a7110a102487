//! Error types for the strand runtime

use core::fmt;

/// Result type for runtime operations
pub type RtResult<T> = Result<T, RuntimeError>;

/// Errors that can occur in runtime operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Operation requires a current fiber but none is running
    NotAFiber,

    /// No fiber with the given id exists
    UnknownFiber,

    /// The fiber already has a joiner
    AlreadyJoined,

    /// Operation timed out
    Timeout,

    /// A runtime is already active on this thread
    AlreadyRunning,

    /// Invalid configuration value
    InvalidConfig(&'static str),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::NotAFiber => write!(f, "no current fiber"),
            RuntimeError::UnknownFiber => write!(f, "unknown fiber id"),
            RuntimeError::AlreadyJoined => write!(f, "fiber already joined"),
            RuntimeError::Timeout => write!(f, "operation timed out"),
            RuntimeError::AlreadyRunning => write!(f, "runtime already active on this thread"),
            RuntimeError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Errors returned by `join` and `join_until`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// The id was never created or has already been joined.
    ///
    /// The POSIX bridge maps this to its CANCELED-sentinel contract:
    /// joining an unknown thread id succeeds with a canceled result.
    Unknown,

    /// The deadline passed before the fiber terminated
    TimedOut,
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::Unknown => write!(f, "unknown or already-joined fiber"),
            JoinError::TimedOut => write!(f, "join timed out"),
        }
    }
}

impl std::error::Error for JoinError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = RuntimeError::NotAFiber;
        assert_eq!(format!("{}", e), "no current fiber");

        let e = RuntimeError::InvalidConfig("stack too small");
        assert_eq!(format!("{}", e), "invalid config: stack too small");
    }

    #[test]
    fn test_join_error_display() {
        assert_eq!(format!("{}", JoinError::TimedOut), "join timed out");
    }
}
