//! Object Header - what the monitor manager sees of a heap object
//!
//! Object Layout:
//! ┌─────────────────────────────────────────┐
//! │  Kind (instance / array / string / hub) │
//! ├─────────────────────────────────────────┤
//! │  Type name                              │
//! ├─────────────────────────────────────────┤
//! │  Monitor slot (optional, reserved)      │  <- null until first enter
//! ├─────────────────────────────────────────┤
//! │  Payload                                │
//! └─────────────────────────────────────────┘
//!
//! Types that static analysis found to be synchronized on get a reserved
//! monitor slot. Strings and type hubs never get one so that prebuilt
//! instances stay immutable and shareable; arrays never get one because it
//! would grow every array. Those objects use the fallback table.

use super::slot::MonitorSlot;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Shape of a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectKind {
    /// Ordinary class instance
    Instance,
    /// Array of any element type
    Array,
    /// Immutable string
    String,
    /// Runtime type descriptor
    Hub,
}

impl ObjectKind {
    /// Check if objects of this kind may carry a reserved monitor slot
    #[inline]
    pub fn can_have_monitor_field(self) -> bool {
        matches!(self, ObjectKind::Instance)
    }
}

/// Object Header
///
/// Every object handed to the monitor manager exposes one of these.
pub struct ObjectHeader {
    kind: ObjectKind,
    type_name: &'static str,
    monitor: Option<MonitorSlot>,
}

impl ObjectHeader {
    /// Create new object header
    ///
    /// # Arguments
    /// * `kind` - Object shape
    /// * `type_name` - Type name, for diagnostics
    /// * `synchronized` - Whether analysis found the type is used as a lock.
    ///   Ignored for kinds that cannot have a monitor field.
    pub fn new(kind: ObjectKind, type_name: &'static str, synchronized: bool) -> Self {
        let monitor = if synchronized && kind.can_have_monitor_field() {
            Some(MonitorSlot::new())
        } else {
            None
        };

        Self {
            kind,
            type_name,
            monitor,
        }
    }

    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Reserved monitor slot, if the type has one
    #[inline]
    pub fn monitor_slot(&self) -> Option<&MonitorSlot> {
        self.monitor.as_ref()
    }

    #[inline]
    pub fn has_monitor_field(&self) -> bool {
        self.monitor.is_some()
    }
}

impl fmt::Debug for ObjectHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeader")
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .field("monitor", &self.monitor)
            .finish()
    }
}

/// A heap object the monitor manager can synchronize on
pub trait HeapObject: Send + Sync + 'static {
    fn header(&self) -> &ObjectHeader;
}

/// Shared reference to a heap object
///
/// Identity is the allocation, never the payload value.
pub type ObjectRef = Arc<dyn HeapObject>;

/// Identity of an object: the address of its allocation
#[inline]
pub fn identity(obj: &ObjectRef) -> usize {
    Arc::as_ptr(obj) as *const () as usize
}

/// Generic heap object: a header plus a payload
pub struct Object<T> {
    header: ObjectHeader,
    value: T,
}

impl<T: Send + Sync + 'static> Object<T> {
    pub fn new(header: ObjectHeader, value: T) -> Self {
        Self { header, value }
    }

    /// Instance of a type that is synchronized on (reserved slot)
    pub fn instance(type_name: &'static str, value: T) -> Self {
        Self::new(ObjectHeader::new(ObjectKind::Instance, type_name, true), value)
    }

    /// Instance of a type analysis never saw synchronized (no slot)
    pub fn unsynchronized_instance(type_name: &'static str, value: T) -> Self {
        Self::new(ObjectHeader::new(ObjectKind::Instance, type_name, false), value)
    }

    pub fn array(value: T) -> Self {
        Self::new(ObjectHeader::new(ObjectKind::Array, "[]", true), value)
    }

    pub fn string(value: T) -> Self {
        Self::new(ObjectHeader::new(ObjectKind::String, "String", true), value)
    }

    pub fn hub(type_name: &'static str, value: T) -> Self {
        Self::new(ObjectHeader::new(ObjectKind::Hub, type_name, true), value)
    }

    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Wrap into a shared object reference
    pub fn into_ref(self) -> ObjectRef {
        Arc::new(self)
    }
}

impl<T: Send + Sync + 'static> HeapObject for Object<T> {
    #[inline]
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_instances_get_slots() {
        assert!(Object::instance("Counter", 0u32).header().has_monitor_field());
        assert!(!Object::unsynchronized_instance("Point", 0u32).header().has_monitor_field());
        assert!(!Object::array(vec![1u8, 2, 3]).header().has_monitor_field());
        assert!(!Object::string("literal").header().has_monitor_field());
        assert!(!Object::hub("Counter", ()).header().has_monitor_field());
    }

    #[test]
    fn test_identity_is_reference_identity() {
        let a = Object::string("same").into_ref();
        let b = Object::string("same").into_ref();
        let a2 = Arc::clone(&a);

        assert_ne!(identity(&a), identity(&b));
        assert_eq!(identity(&a), identity(&a2));
    }

    #[test]
    fn test_header_accessors() {
        let obj = Object::instance("Account", 100i64);
        assert_eq!(obj.header().kind(), ObjectKind::Instance);
        assert_eq!(obj.header().type_name(), "Account");
        assert_eq!(*obj.value(), 100);
        assert!(obj.header().monitor_slot().map(|s| s.is_empty()).unwrap_or(false));
    }
}
