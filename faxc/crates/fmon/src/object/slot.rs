//! Monitor Slots and Slot Resolution
//!
//! A monitor slot is the reserved per-object storage for one monitor record
//! pointer. It starts null and is filled at most once, by compare-and-swap.

use super::header::HeapObject;
use crate::monitor::MonitorRecord;
use crate::util::atomic::{AtomicArcCell, InstallRejected, EMPTY};
use std::fmt;
use std::sync::Arc;

/// MonitorSlot - reserved in-object storage for a monitor record
pub struct MonitorSlot {
    cell: AtomicArcCell<MonitorRecord>,
}

impl MonitorSlot {
    pub const fn new() -> Self {
        Self {
            cell: AtomicArcCell::empty(),
        }
    }

    /// Installed record, if any
    #[inline]
    pub fn get(&self) -> Option<Arc<MonitorRecord>> {
        self.cell.load().into_arc()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cell.is_empty()
    }

    /// Atomically put `record` in place of the null
    pub fn install(
        &self,
        record: Arc<MonitorRecord>,
    ) -> Result<Arc<MonitorRecord>, InstallRejected<MonitorRecord>> {
        self.cell.try_install(EMPTY, record)
    }
}

impl Default for MonitorSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MonitorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MonitorSlot").field(&self.cell).finish()
    }
}

/// Slot Resolver - host object model hook
///
/// Decides where the monitor of an object lives. `None` routes the object
/// to the fallback table.
pub trait SlotResolver: Send + Sync {
    fn resolve_slot<'o>(&self, obj: &'o dyn HeapObject) -> Option<&'o MonitorSlot>;
}

/// Resolves the slot reserved in the object header
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderSlotResolver;

impl SlotResolver for HeaderSlotResolver {
    #[inline]
    fn resolve_slot<'o>(&self, obj: &'o dyn HeapObject) -> Option<&'o MonitorSlot> {
        obj.header().monitor_slot()
    }
}

/// Ignores reserved slots; every object uses the fallback table
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackOnlyResolver;

impl SlotResolver for FallbackOnlyResolver {
    #[inline]
    fn resolve_slot<'o>(&self, _obj: &'o dyn HeapObject) -> Option<&'o MonitorSlot> {
        None
    }
}
