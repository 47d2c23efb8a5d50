//! Thread Status - why is a thread parked?
//!
//! Every time a thread parks inside a monitor it registers a blocker, the
//! thing it is parked on. A thread status reporter can look the blocker up
//! and turn a generic "parked" status into a monitor-specific one:
//!
//! ```text
//! Blocker::Lock(monitor record)      -> BlockedOnMonitorEnter
//! Blocker::Condition(monitor cond)   -> InObjectWait / InObjectWaitTimed
//! anything else                      -> status unchanged
//! ```
//!
//! Classification is a pure query: it reads the record's monitor marker and
//! compares the condition against the one installed in the record.
//!
//! Each thread owns a blocker slot. Parking writes only the caller's own
//! slot; the shared lookup table is touched once when a thread first parks
//! and once when it exits.

use crate::monitor::{MonitorRecord, WaitCondition};
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use serde::Serialize;
use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::Arc;
use std::thread::ThreadId;

/// Thread status as reported to diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ThreadStatus {
    New,
    Runnable,
    /// Parked, no deadline
    Parked,
    /// Parked with a deadline
    ParkedTimed,
    /// Waiting to acquire an object monitor
    BlockedOnMonitorEnter,
    /// In an untimed object wait
    InObjectWait,
    /// In a timed object wait
    InObjectWaitTimed,
    Terminated,
}

/// Monitor-related reason for a thread being parked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlockKind {
    /// Not parked on anything owned by an object monitor
    None,
    MonitorEnter,
    ObjectWaitTimed,
    ObjectWaitUntimed,
}

/// What a parked thread is parked on
///
/// `Debug` prints the owning record before the condition.
#[derive(Clone)]
pub enum Blocker {
    /// Acquiring the mutex of a lock
    Lock(Arc<MonitorRecord>),
    /// Waiting on a condition of a lock
    Condition {
        record: Arc<MonitorRecord>,
        condition: Arc<WaitCondition>,
        timed: bool,
    },
    /// Parked for a reason unrelated to monitors
    Other(&'static str),
}

impl fmt::Debug for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blocker::Lock(record) => write!(f, "Lock({:p})", Arc::as_ptr(record)),
            Blocker::Condition {
                record,
                condition,
                timed,
            } => write!(
                f,
                "Condition(record={:p}, condition={:p}, timed={})",
                Arc::as_ptr(record),
                Arc::as_ptr(condition),
                timed
            ),
            Blocker::Other(reason) => write!(f, "Other({})", reason),
        }
    }
}

/// Classify a blocker
pub fn classify_block_reason(blocker: &Blocker) -> BlockKind {
    match blocker {
        Blocker::Lock(record) if record.is_monitor_lock() => BlockKind::MonitorEnter,
        Blocker::Condition {
            record,
            condition,
            timed,
        } if record.condition().is_monitor_condition(condition) => {
            if *timed {
                BlockKind::ObjectWaitTimed
            } else {
                BlockKind::ObjectWaitUntimed
            }
        },
        _ => BlockKind::None,
    }
}

type BlockerSlot = Arc<Mutex<Option<Blocker>>>;

lazy_static::lazy_static! {
    /// Blocker slots of every thread that has parked at least once
    static ref PARK_BLOCKERS: DashMap<ThreadId, BlockerSlot, BuildHasherDefault<FxHasher>> =
        DashMap::default();
}

/// The calling thread's slot, listed in `PARK_BLOCKERS` while the thread lives
struct ThreadBlocker {
    thread: ThreadId,
    slot: BlockerSlot,
}

impl ThreadBlocker {
    fn register() -> Self {
        let thread = std::thread::current().id();
        let slot = BlockerSlot::default();
        PARK_BLOCKERS.insert(thread, Arc::clone(&slot));
        Self { thread, slot }
    }
}

impl Drop for ThreadBlocker {
    fn drop(&mut self) {
        PARK_BLOCKERS.remove(&self.thread);
    }
}

thread_local! {
    static THREAD_BLOCKER: ThreadBlocker = ThreadBlocker::register();
}

/// Registration of the current thread's blocker, undone on drop
pub struct ParkRegistration {
    slot: BlockerSlot,
    previous: Option<Blocker>,
}

impl Drop for ParkRegistration {
    fn drop(&mut self) {
        *self.slot.lock() = self.previous.take();
    }
}

/// Register `blocker` for the current thread until the registration drops
///
/// Call before taking the lock the thread is about to park on.
pub fn park_on(blocker: Blocker) -> ParkRegistration {
    // During thread teardown the slot is gone; the blocker goes unreported.
    let slot = THREAD_BLOCKER
        .try_with(|own| Arc::clone(&own.slot))
        .unwrap_or_default();
    let previous = slot.lock().replace(blocker);
    ParkRegistration { slot, previous }
}

/// Blocker registered by `thread`, if it is parked
pub fn current_blocker(thread: ThreadId) -> Option<Blocker> {
    let slot = PARK_BLOCKERS.get(&thread).map(|entry| Arc::clone(entry.value()))?;
    let blocker = slot.lock().clone();
    blocker
}

/// Monitor-related reason `thread` is parked
pub fn block_kind(thread: ThreadId) -> BlockKind {
    current_blocker(thread)
        .map(|blocker| classify_block_reason(&blocker))
        .unwrap_or(BlockKind::None)
}

/// Refine a park status using the blocker `thread` registered
pub fn maybe_adjust_park_status(thread: ThreadId, status: ThreadStatus) -> ThreadStatus {
    match block_kind(thread) {
        BlockKind::ObjectWaitTimed => ThreadStatus::InObjectWaitTimed,
        BlockKind::ObjectWaitUntimed => ThreadStatus::InObjectWait,
        BlockKind::MonitorEnter => ThreadStatus::BlockedOnMonitorEnter,
        BlockKind::None => status,
    }
}

/// Best-effort status of a live thread
pub fn thread_status(thread: ThreadId) -> ThreadStatus {
    let base = match current_blocker(thread) {
        Some(Blocker::Condition { timed: true, .. }) => ThreadStatus::ParkedTimed,
        Some(_) => ThreadStatus::Parked,
        None => ThreadStatus::Runnable,
    };
    maybe_adjust_park_status(thread, base)
}
