//! Monitor Module - object monitors
//!
//! Every object can be used as a lock. The record backing an object's
//! monitor is created on first use and lives in one of two places:
//!
//! ```text
//! ┌──────────────┐  reserved slot?  ┌─────────────────────────┐
//! │  enter(obj)  │ ───── yes ─────▶ │ CAS null -> new record  │
//! └──────────────┘                  └─────────────────────────┘
//!        │ no
//!        ▼
//! ┌──────────────────────────────────────────┐
//! │ fallback table (coarse lock, weak keys)  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Callers never branch on the tier; `MonitorManager` hides it.

pub mod condition;
pub mod fallback;
pub mod manager;
pub mod record;

pub use condition::{
    ConditionLookup, ConditionSlot, ConditionState, WaitCondition, MONITOR_WITHOUT_CONDITION,
};
pub use fallback::{FallbackLookup, FallbackTable};
pub use manager::MonitorManager;
pub use record::{current_thread_id, MonitorRecord, WaitOutcome};

use serde::Serialize;
use std::fmt;

/// Where the monitor record of an object is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    /// Per-object reserved slot
    ReservedSlot,
    /// Shared weak identity table
    Fallback,
}

impl StorageTier {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageTier::ReservedSlot => "reserved slot",
            StorageTier::Fallback => "fallback table",
        }
    }
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
