//! # FMON - Object Monitor Manager
//!
//! FMON gives every heap object of a managed runtime the lock and wait-set
//! semantics of a Java-style monitor: reentrant `enter`/`exit`, `wait` with
//! an optional timeout, and `notify`/`notify_all`.
//!
//! ## Overview
//!
//! - **Lazy monitors**: No record exists until an object is first locked
//! - **Two storage tiers**: A reserved per-object slot filled by one
//!   compare-and-swap, or a shared weak-keyed table for objects without one
//! - **Lazy conditions**: A record carries a marker until its first `wait`,
//!   which inflates a real wait set
//! - **Rematerialization**: A record can be installed already held by a
//!   given thread at a given depth
//! - **Diagnostics**: Parked threads are classified as blocked on monitor
//!   enter or in a (timed) object wait
//!
//! ## Quick Start
//!
//! ```rust
//! use fmon::{MonitorConfig, MonitorManager, Object};
//!
//! fn main() -> Result<(), fmon::MonitorError> {
//!     let manager = MonitorManager::new(MonitorConfig::default())?;
//!     let account = Object::instance("Account", 100i64).into_ref();
//!
//!     manager.enter(&account);
//!     manager.enter(&account); // reentrant
//!     manager.exit(&account);
//!     assert!(manager.holds(&account));
//!
//!     // Nobody waits yet: a no-op that allocates nothing
//!     manager.notify(&account, true)?;
//!
//!     manager.exit(&account);
//!     assert!(!manager.holds(&account));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      MonitorManager                        │
//! │  enter / exit / holds / wait / notify / force_relock       │
//! └──────────────┬─────────────────────────────┬───────────────┘
//!                │ slot resolved               │ no slot
//!                ▼                             ▼
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │ MonitorSlot (per object) │   │ FallbackTable                │
//! │ null ──CAS──▶ record     │   │ one lock, weak identity keys │
//! └─────────────┬────────────┘   └───────────────┬──────────────┘
//!               └───────────────┬────────────────┘
//!                               ▼
//!              ┌────────────────────────────────────┐
//!              │ MonitorRecord                      │
//!              │  owner + recursions (reentrant)    │
//!              │  ConditionSlot                     │
//!              │   Absent | Unused | Active(cond)   │
//!              └────────────────────────────────────┘
//! ```
//!
//! ### Which objects get a reserved slot
//!
//! Only plain instances of types that are synchronized on. Strings and type
//! hubs stay immutable and shareable; arrays stay compact. Their monitors
//! live in the fallback table, whose entries die with their objects.
//!
//! ## Error Handling
//!
//! `enter` and `exit` have no error result. Exiting a monitor that does not
//! exist or is not owned is a broken program and panics via
//! [`error::fatal`]. `wait` and `notify` by a non-owner return
//! [`MonitorError::IllegalMonitorState`].
//!
//! ## Thread Safety
//!
//! - `MonitorManager` is `Send + Sync`; share it in an `Arc`
//! - Acquisition is not fair: a newly arriving thread may overtake a parked one
//!
//! ## Modules
//!
//! - [`config`]: Tuning parameters and validation
//! - [`error`]: Error types and the fatal fault path
//! - [`logging`]: Monitor event logger
//! - [`monitor`]: Records, conditions, the fallback table and the manager
//! - [`object`]: Object headers, reserved slots and weak identity maps
//! - [`stats`]: Activity counters and exports
//! - [`status`]: Park blockers and thread status classification
//! - [`util`]: Tagged atomic cells

pub mod config;
pub mod error;
pub mod logging;

pub mod monitor;
pub mod object;

pub mod stats;
pub mod status;

pub mod util;

// Re-export main types for convenience
pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use monitor::{MonitorManager, MonitorRecord, StorageTier, WaitOutcome};
pub use object::{HeapObject, Object, ObjectKind, ObjectRef};
pub use status::{classify_block_reason, BlockKind, Blocker, ThreadStatus};

/// FMON version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a monitor manager with default configuration
///
/// # Examples
///
/// ```rust
/// let manager = fmon::init()?;
/// # Ok::<(), fmon::MonitorError>(())
/// ```
pub fn init() -> Result<MonitorManager> {
    MonitorManager::new(MonitorConfig::default())
}

/// Create a monitor manager with custom configuration
///
/// # Examples
///
/// ```rust
/// use fmon::MonitorConfig;
///
/// let config = MonitorConfig {
///     spin_limit: 0,
///     verbose: true,
///     ..Default::default()
/// };
///
/// let manager = fmon::init_with_config(config)?;
/// # Ok::<(), fmon::MonitorError>(())
/// ```
pub fn init_with_config(config: MonitorConfig) -> Result<MonitorManager> {
    MonitorManager::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_default() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let config = MonitorConfig {
            spin_limit: config::MAX_SPIN_LIMIT + 1,
            ..Default::default()
        };
        assert!(init_with_config(config).is_err());
    }

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
