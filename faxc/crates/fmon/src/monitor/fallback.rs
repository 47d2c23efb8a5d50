//! Fallback Table - monitors of objects without a reserved slot
//!
//! One coarse lock guards the whole table. Every lookup and insert for
//! arrays, strings, hubs and unsynchronized instances goes through it, which
//! is acceptable because those objects are rarely synchronized on.
//!
//! Keys are weak: an entry never keeps its object alive. Dead entries are
//! swept every `sweep_interval` inserts, or on demand.

use super::record::MonitorRecord;
use crate::object::{ObjectRef, WeakIdentityMap};
use parking_lot::Mutex;
use std::sync::Arc;

struct TableInner {
    map: WeakIdentityMap<Arc<MonitorRecord>>,
    inserts_since_sweep: usize,
}

/// Outcome of `FallbackTable::get_or_insert_with`
#[derive(Debug)]
pub struct FallbackLookup {
    pub record: Arc<MonitorRecord>,
    /// This call created the record
    pub created: bool,
    /// Dead entries swept during the insert
    pub swept: usize,
}

/// FallbackTable - weak identity map from object to monitor record
pub struct FallbackTable {
    inner: Mutex<TableInner>,
    sweep_interval: usize,
}

impl FallbackTable {
    pub fn new(capacity: usize, sweep_interval: usize) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                map: WeakIdentityMap::with_capacity(capacity),
                inserts_since_sweep: 0,
            }),
            sweep_interval: sweep_interval.max(1),
        }
    }

    /// Record for `obj`, if one was ever installed
    pub fn get(&self, obj: &ObjectRef) -> Option<Arc<MonitorRecord>> {
        self.inner.lock().map.get(obj).cloned()
    }

    /// Record for `obj`, inserting `make()` if there is none
    ///
    /// Lookup and insert happen under one lock hold, so two threads never
    /// install different records for the same object.
    pub fn get_or_insert_with<F>(&self, obj: &ObjectRef, make: F) -> FallbackLookup
    where
        F: FnOnce() -> MonitorRecord,
    {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.map.get(obj) {
            return FallbackLookup {
                record: Arc::clone(existing),
                created: false,
                swept: 0,
            };
        }

        let record = Arc::new(make());
        inner.map.insert(obj, Arc::clone(&record));
        let swept = Self::note_insert(&mut inner, self.sweep_interval);

        FallbackLookup {
            record,
            created: true,
            swept,
        }
    }

    /// Insert `record` for `obj` if no record exists
    ///
    /// On conflict the existing record is returned and the table is unchanged.
    pub fn install(
        &self,
        obj: &ObjectRef,
        record: Arc<MonitorRecord>,
    ) -> std::result::Result<(), Arc<MonitorRecord>> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.map.get(obj) {
            return Err(Arc::clone(existing));
        }
        inner.map.insert(obj, record);
        Self::note_insert(&mut inner, self.sweep_interval);
        Ok(())
    }

    fn note_insert(inner: &mut TableInner, sweep_interval: usize) -> usize {
        inner.inserts_since_sweep += 1;
        if inner.inserts_since_sweep < sweep_interval {
            return 0;
        }
        inner.inserts_since_sweep = 0;
        inner.map.expunge_stale()
    }

    /// Drop entries of dead objects now. Returns the number removed.
    pub fn reclaim(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.inserts_since_sweep = 0;
        inner.map.expunge_stale()
    }

    /// Number of entries, dead ones not yet swept included
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    pub fn live_len(&self) -> usize {
        self.inner.lock().map.live_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    #[test]
    fn test_get_or_insert_once() {
        let table = FallbackTable::new(4, 16);
        let obj = Object::array(vec![0u8; 8]).into_ref();

        let first = table.get_or_insert_with(&obj, MonitorRecord::new_monitor);
        assert!(first.created);
        let second = table.get_or_insert_with(&obj, MonitorRecord::new_monitor);
        assert!(!second.created);
        assert!(Arc::ptr_eq(&first.record, &second.record));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_install_conflict_keeps_existing() {
        let table = FallbackTable::new(0, 16);
        let obj = Object::string("key").into_ref();

        let original = Arc::new(MonitorRecord::new_monitor());
        assert!(table.install(&obj, Arc::clone(&original)).is_ok());

        let existing = table
            .install(&obj, Arc::new(MonitorRecord::new_monitor()))
            .unwrap_err();
        assert!(Arc::ptr_eq(&existing, &original));
        assert!(Arc::ptr_eq(&table.get(&obj).unwrap(), &original));
    }

    #[test]
    fn test_periodic_sweep() {
        let table = FallbackTable::new(0, 2);
        let dead = Object::string("dead").into_ref();
        table.get_or_insert_with(&dead, MonitorRecord::new_monitor);
        drop(dead);

        let live = Object::string("live").into_ref();
        let lookup = table.get_or_insert_with(&live, MonitorRecord::new_monitor);
        assert_eq!(lookup.swept, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reclaim() {
        let table = FallbackTable::new(0, 1000);
        for _ in 0..5 {
            let obj = Object::array([0u64; 2]).into_ref();
            table.get_or_insert_with(&obj, MonitorRecord::new_monitor);
        }
        assert_eq!(table.len(), 5);
        assert_eq!(table.live_len(), 0);
        assert_eq!(table.reclaim(), 5);
        assert!(table.is_empty());
    }
}
