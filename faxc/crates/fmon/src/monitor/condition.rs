//! Monitor Conditions
//!
//! Each monitor record has one condition slot with three states:
//!
//! ```text
//! Absent ──(monitor created)──▶ Unused ──(first wait)──▶ Active(condition)
//! ```
//!
//! `Unused` is a marker word, not an allocation. Most locked objects are
//! never waited on, so the condition object is only built on the first
//! `wait`. A record whose slot is `Absent` is a plain lock, not an object
//! monitor.

use crate::error::{MonitorError, Result};
use crate::util::atomic::{AtomicArcCell, CellValue, EMPTY};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Slot marker: monitor lock without a condition yet
pub const MONITOR_WITHOUT_CONDITION: usize = 1;

/// A thread waiting on a condition
pub(crate) struct Waiter {
    notified: AtomicBool,
}

impl Waiter {
    #[inline]
    pub(crate) fn is_notified(&self) -> bool {
        self.notified.load(Ordering::Acquire)
    }
}

/// WaitCondition - wait set of one monitor
///
/// Waiters are woken in arrival order. Callers hold the owning record's
/// state lock around every operation, so a notification and a timeout can
/// never both claim the same waiter.
pub struct WaitCondition {
    condvar: Condvar,
    waiters: Mutex<VecDeque<Arc<Waiter>>>,
}

impl WaitCondition {
    pub fn new() -> Self {
        Self {
            condvar: Condvar::new(),
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of threads currently in the wait set
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }

    #[inline]
    pub(crate) fn condvar(&self) -> &Condvar {
        &self.condvar
    }

    pub(crate) fn enqueue(&self) -> Arc<Waiter> {
        let waiter = Arc::new(Waiter {
            notified: AtomicBool::new(false),
        });
        self.waiters.lock().push_back(Arc::clone(&waiter));
        waiter
    }

    /// Remove a waiter that gave up. Returns false if it was notified first.
    pub(crate) fn withdraw(&self, waiter: &Arc<Waiter>) -> bool {
        let mut waiters = self.waiters.lock();
        match waiters.iter().position(|w| Arc::ptr_eq(w, waiter)) {
            Some(index) => {
                waiters.remove(index);
                true
            },
            None => false,
        }
    }

    /// Mark one or all waiters notified and wake them. Returns the count.
    pub(crate) fn signal(&self, all: bool) -> usize {
        let mut waiters = self.waiters.lock();
        let count = if all { waiters.len() } else { waiters.len().min(1) };

        for waiter in waiters.drain(..count) {
            waiter.notified.store(true, Ordering::Release);
        }
        drop(waiters);

        if count > 0 {
            // Waiters share the condvar; each re-checks its own flag.
            self.condvar.notify_all();
        }
        count
    }
}

impl Default for WaitCondition {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitCondition")
            .field("waiters", &self.waiter_count())
            .finish()
    }
}

/// Decoded state of a condition slot
#[derive(Debug, Clone)]
pub enum ConditionState {
    /// Not an object monitor
    Absent,
    /// Object monitor, never waited on
    Unused,
    /// Object monitor with a condition
    Active(Arc<WaitCondition>),
}

/// Result of a condition lookup
#[derive(Debug)]
pub enum ConditionLookup {
    /// No condition exists and none was requested
    NotCreated,
    /// Condition already existed
    Existing(Arc<WaitCondition>),
    /// This call installed the condition
    Inflated(Arc<WaitCondition>),
    /// Another thread installed it first; its condition is returned
    RaceLost(Arc<WaitCondition>),
}

impl ConditionLookup {
    pub fn into_condition(self) -> Option<Arc<WaitCondition>> {
        match self {
            ConditionLookup::NotCreated => None,
            ConditionLookup::Existing(c)
            | ConditionLookup::Inflated(c)
            | ConditionLookup::RaceLost(c) => Some(c),
        }
    }
}

/// ConditionSlot - the multiplexed condition field of a monitor record
pub struct ConditionSlot {
    cell: AtomicArcCell<WaitCondition>,
}

impl ConditionSlot {
    /// Slot of a plain lock
    pub fn absent() -> Self {
        Self {
            cell: AtomicArcCell::empty(),
        }
    }

    /// Slot of a fresh object monitor
    pub fn unused() -> Self {
        Self {
            cell: AtomicArcCell::with_marker(MONITOR_WITHOUT_CONDITION),
        }
    }

    pub fn state(&self) -> ConditionState {
        match self.cell.load() {
            CellValue::Empty => ConditionState::Absent,
            CellValue::Marker(_) => ConditionState::Unused,
            CellValue::Occupied(condition) => ConditionState::Active(condition),
        }
    }

    /// Marker or condition present: the owning lock is an object monitor
    #[inline]
    pub fn is_monitor(&self) -> bool {
        !self.cell.is_empty()
    }

    /// Check if `condition` is the one installed here
    #[inline]
    pub fn is_monitor_condition(&self, condition: &Arc<WaitCondition>) -> bool {
        self.cell.holds(condition)
    }

    /// Find the condition, optionally creating it
    ///
    /// Creation swaps the marker for a fresh condition. If another thread
    /// swapped first, the fresh one is dropped and the winner's returned.
    pub fn get_or_create(&self, create: bool) -> Result<ConditionLookup> {
        let expected = match self.cell.load() {
            CellValue::Empty => return Err(MonitorError::NotMonitorLock),
            CellValue::Occupied(existing) => return Ok(ConditionLookup::Existing(existing)),
            CellValue::Marker(marker) => marker,
        };

        if !create {
            return Ok(ConditionLookup::NotCreated);
        }

        match self.cell.try_install(expected, Arc::new(WaitCondition::new())) {
            Ok(installed) => Ok(ConditionLookup::Inflated(installed)),
            Err(rejected) => match rejected.current {
                CellValue::Occupied(winner) => Ok(ConditionLookup::RaceLost(winner)),
                _ => Err(MonitorError::Internal(
                    "race winner must have installed a condition".to_string(),
                )),
            },
        }
    }
}

impl fmt::Debug for ConditionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.cell.raw() {
            EMPTY => "absent",
            MONITOR_WITHOUT_CONDITION => "unused",
            _ => "active",
        };
        write!(f, "ConditionSlot({})", state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_absent_slot_is_not_monitor() {
        let slot = ConditionSlot::absent();
        assert!(!slot.is_monitor());
        assert!(matches!(slot.state(), ConditionState::Absent));
        assert!(matches!(
            slot.get_or_create(true),
            Err(MonitorError::NotMonitorLock)
        ));
    }

    #[test]
    fn test_lookup_without_create_keeps_marker() {
        let slot = ConditionSlot::unused();
        assert!(slot.is_monitor());
        assert!(matches!(
            slot.get_or_create(false).unwrap(),
            ConditionLookup::NotCreated
        ));
        assert!(matches!(slot.state(), ConditionState::Unused));
    }

    #[test]
    fn test_inflate_once() {
        let slot = ConditionSlot::unused();
        let first = slot.get_or_create(true).unwrap();
        assert!(matches!(first, ConditionLookup::Inflated(_)));
        let first = first.into_condition().unwrap();

        let second = slot.get_or_create(true).unwrap();
        assert!(matches!(second, ConditionLookup::Existing(_)));
        assert!(Arc::ptr_eq(&first, &second.into_condition().unwrap()));
        assert!(slot.is_monitor_condition(&first));
    }

    #[test]
    fn test_concurrent_inflation_single_winner() {
        let slot = Arc::new(ConditionSlot::unused());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    slot.get_or_create(true).unwrap()
                })
            })
            .collect();

        let lookups: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("Thread should not panic"))
            .collect();

        let inflated = lookups
            .iter()
            .filter(|l| matches!(l, ConditionLookup::Inflated(_)))
            .count();
        assert_eq!(inflated, 1, "exactly one thread installs the condition");

        let conditions: Vec<_> = lookups
            .into_iter()
            .map(|l| l.into_condition().unwrap())
            .collect();
        assert!(conditions.iter().all(|c| Arc::ptr_eq(c, &conditions[0])));
    }

    #[test]
    fn test_signal_order_and_withdraw() {
        let condition = WaitCondition::new();
        let a = condition.enqueue();
        let b = condition.enqueue();
        let c = condition.enqueue();

        assert!(condition.withdraw(&b));
        assert!(!condition.withdraw(&b));
        assert_eq!(condition.signal(false), 1);
        assert!(a.is_notified());
        assert!(!c.is_notified());

        assert_eq!(condition.signal(true), 1);
        assert!(c.is_notified());
        assert_eq!(condition.signal(true), 0);
        assert_eq!(condition.waiter_count(), 0);
    }
}
