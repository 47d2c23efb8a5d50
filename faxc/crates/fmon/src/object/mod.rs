//! Object Module - the host object model as seen by monitors
//!
//! This module defines how objects expose their reserved monitor slot and
//! how objects without one are tracked by identity.

pub mod header;
pub mod slot;
pub mod weak;

pub use header::{identity, HeapObject, Object, ObjectHeader, ObjectKind, ObjectRef};
pub use slot::{FallbackOnlyResolver, HeaderSlotResolver, MonitorSlot, SlotResolver};
pub use weak::WeakIdentityMap;
