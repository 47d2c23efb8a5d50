//! Weak Identity Map
//!
//! Associates values with objects by reference identity without keeping the
//! objects alive. Keys are `Weak` references; once the last strong reference
//! to a key object is gone the entry is dead and the next sweep drops it.
//!
//! A dead entry's identity cannot be reused by a new object before the sweep:
//! the `Weak` keeps the allocation itself reserved until the entry goes.

use super::header::{identity, HeapObject, ObjectRef};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};

struct WeakEntry<V> {
    key: Weak<dyn HeapObject>,
    value: V,
}

impl<V> WeakEntry<V> {
    #[inline]
    fn is_live(&self) -> bool {
        self.key.strong_count() > 0
    }
}

/// WeakIdentityMap - identity-keyed map with weak keys
///
/// Not synchronized; owners wrap it in a lock.
pub struct WeakIdentityMap<V> {
    entries: FxHashMap<usize, WeakEntry<V>>,
}

impl<V> WeakIdentityMap<V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Value for `obj`, if any
    pub fn get(&self, obj: &ObjectRef) -> Option<&V> {
        self.entries.get(&identity(obj)).map(|entry| &entry.value)
    }

    /// Insert a value for `obj`, returning the previous one
    pub fn insert(&mut self, obj: &ObjectRef, value: V) -> Option<V> {
        let entry = WeakEntry {
            key: Arc::downgrade(obj),
            value,
        };
        self.entries
            .insert(identity(obj), entry)
            .map(|previous| previous.value)
    }

    /// Drop every entry whose key object is gone
    ///
    /// Returns the number of entries removed.
    pub fn expunge_stale(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live());
        before - self.entries.len()
    }

    /// Number of entries, dead ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries whose key is still reachable
    pub fn live_len(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_live()).count()
    }
}

impl<V> Default for WeakIdentityMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    #[test]
    fn test_keys_by_identity_not_value() {
        let mut map = WeakIdentityMap::new();
        let a = Object::string("lock").into_ref();
        let b = Object::string("lock").into_ref();

        map.insert(&a, 1);
        assert_eq!(map.get(&a), Some(&1));
        assert_eq!(map.get(&b), None);

        map.insert(&b, 2);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_insert_returns_previous() {
        let mut map = WeakIdentityMap::new();
        let a = Object::array(vec![0u32]).into_ref();

        assert_eq!(map.insert(&a, "first"), None);
        assert_eq!(map.insert(&a, "second"), Some("first"));
        assert_eq!(map.get(&a), Some(&"second"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_does_not_keep_key_alive() {
        let mut map = WeakIdentityMap::new();
        let a = Object::array(vec![1u8]).into_ref();
        let weak = Arc::downgrade(&a);

        map.insert(&a, ());
        drop(a);

        assert!(weak.upgrade().is_none());
        assert_eq!(map.len(), 1);
        assert_eq!(map.live_len(), 0);
    }

    #[test]
    fn test_expunge_stale() {
        let mut map = WeakIdentityMap::with_capacity(4);
        let keep = Object::string("keep").into_ref();
        let gone = Object::string("gone").into_ref();

        map.insert(&keep, 1);
        map.insert(&gone, 2);
        drop(gone);

        assert_eq!(map.expunge_stale(), 1);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&keep), Some(&1));
        assert_eq!(map.expunge_stale(), 0);
    }
}
