//! Error Module - FMON Error Types
//!
//! Defines all error types used in FMON.
//!
//! # Error Categories
//!
//! ## Protocol Violations (fatal)
//! - `MonitorNotFound` - exit on an object that was never entered
//! - `AlreadyLocked` - relock onto a slot or entry that already has a record
//! - `Internal` - broken invariant inside the manager
//!
//! ## Caller Errors (recoverable)
//! - `IllegalMonitorState` - wait/notify by a thread that does not own the monitor
//! - `NotMonitorLock` - condition operation on a plain reentrant lock
//!
//! ## Configuration Errors
//! - `Configuration` - invalid configuration

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for all FMON operations
///
/// # Examples
///
/// ```rust
/// use fmon::error::MonitorError;
///
/// fn handle_error(err: MonitorError) {
///     match err {
///         MonitorError::IllegalMonitorState(msg) => {
///             eprintln!("not the owner: {}", msg);
///         }
///         other if other.is_fatal() => panic!("{}", other),
///         _ => {}
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The calling thread does not own the monitor
    ///
    /// **When returned:** `wait`, `notify` or `ensure_locked` by a non-owner
    ///
    /// **Recovery strategy:** Caller bug in user code; surface it to the
    /// program the same way an illegal-state exception would be raised
    #[error("Illegal monitor state: {0}")]
    IllegalMonitorState(String),

    /// A record is already attached to the object
    ///
    /// **When returned:** `force_relock` onto a populated slot or fallback entry
    ///
    /// **Recovery strategy:** None - the object was materialized twice
    #[error("Object {identity:#x} is already locked ({tier})")]
    AlreadyLocked { identity: usize, tier: &'static str },

    /// No record exists for the object
    ///
    /// **When returned:** `exit` on an object that was never entered
    ///
    /// **Recovery strategy:** None - enter/exit pairing is broken
    #[error("No monitor exists for object {identity:#x}")]
    MonitorNotFound { identity: usize },

    /// Condition operation on a lock that is not an object monitor
    ///
    /// **When returned:** condition lookup on a `MonitorRecord::new_plain()` lock
    #[error("Lock is not an object monitor")]
    NotMonitorLock,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Internal error - indicates a bug in FMON
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Check if this error must terminate the faulting thread
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MonitorError::AlreadyLocked { .. }
                | MonitorError::MonitorNotFound { .. }
                | MonitorError::Internal(_)
        )
    }

    /// Check if the caller can handle this error and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MonitorError::IllegalMonitorState(_) | MonitorError::NotMonitorLock
        )
    }

    pub(crate) fn not_owner() -> Self {
        MonitorError::IllegalMonitorState(
            "Receiver is not locked by the current thread".to_string(),
        )
    }
}

/// Result type alias for FMON operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Report an unrecoverable monitor fault and unwind the faulting thread.
///
/// Monitor enter and exit have no error edge: once the pairing is broken it is
/// unknown whether the object is locked, so the thread must not continue.
#[cold]
pub fn fatal(operation: &str, err: MonitorError) -> ! {
    log::error!("Fatal monitor fault in {}: {}", operation, err);
    crate::logging::log_event(crate::logging::MonitorEvent::ProtocolViolation {
        operation: operation.to_string(),
        reason: err.to_string(),
    });
    panic!("Unexpected error in monitor {}: {}", operation, err);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(MonitorError::MonitorNotFound { identity: 0x10 }.is_fatal());
        assert!(MonitorError::Internal("x".into()).is_fatal());
        assert!(!MonitorError::not_owner().is_fatal());
        assert!(MonitorError::not_owner().is_recoverable());
        assert!(!MonitorError::AlreadyLocked { identity: 1, tier: "slot" }.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = MonitorError::AlreadyLocked {
            identity: 0x1000,
            tier: "reserved slot",
        };
        assert_eq!(err.to_string(), "Object 0x1000 is already locked (reserved slot)");
    }

    #[test]
    #[should_panic(expected = "Unexpected error in monitor exit")]
    fn test_fatal_panics() {
        fatal("exit", MonitorError::MonitorNotFound { identity: 0x20 });
    }
}
