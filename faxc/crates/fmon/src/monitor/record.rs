//! Monitor Record - reentrant lock plus condition slot
//!
//! The lock is non-fair: a releasing thread wakes one parked thread, but a
//! thread arriving in the meantime may take the lock first. The woken thread
//! then parks again.
//!
//! Ownership is plain data (owner thread + recursion count) behind a short
//! internal mutex, so a record can be built already owned by another thread
//! when a locked frame is rematerialized.

use super::condition::{ConditionSlot, WaitCondition};
use crate::error::{MonitorError, Result};
use crate::status::{self, Blocker};
use crossbeam::utils::Backoff;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

/// How a `wait` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WaitOutcome {
    Notified,
    TimedOut,
}

#[derive(Debug)]
struct LockState {
    owner: Option<ThreadId>,
    recursions: usize,
}

impl LockState {
    #[inline]
    fn try_acquire(&mut self, thread: ThreadId) -> bool {
        match self.owner {
            None => {
                self.owner = Some(thread);
                self.recursions = 1;
                true
            },
            Some(owner) if owner == thread => {
                self.recursions += 1;
                true
            },
            Some(_) => false,
        }
    }

    #[inline]
    fn is_owned_by(&self, thread: ThreadId) -> bool {
        self.owner == Some(thread)
    }
}

/// MonitorRecord - the lock and condition state of one object
pub struct MonitorRecord {
    state: Mutex<LockState>,
    /// Signalled when the lock becomes free
    released: Condvar,
    condition: ConditionSlot,
}

impl MonitorRecord {
    fn build(owner: Option<ThreadId>, recursions: usize, condition: ConditionSlot) -> Self {
        Self {
            state: Mutex::new(LockState { owner, recursions }),
            released: Condvar::new(),
            condition,
        }
    }

    /// New unlocked object monitor
    pub fn new_monitor() -> Self {
        Self::build(None, 0, ConditionSlot::unused())
    }

    /// New unlocked plain reentrant lock, not an object monitor
    pub fn new_plain() -> Self {
        Self::build(None, 0, ConditionSlot::absent())
    }

    /// New object monitor held `recursions` times by `owner`
    ///
    /// With zero recursions the monitor is unlocked.
    pub fn new_locked_for(owner: ThreadId, recursions: usize) -> Self {
        let owner = if recursions > 0 { Some(owner) } else { None };
        Self::build(owner, recursions, ConditionSlot::unused())
    }

    /// Check if this lock belongs to an object monitor
    #[inline]
    pub fn is_monitor_lock(&self) -> bool {
        self.condition.is_monitor()
    }

    #[inline]
    pub fn condition(&self) -> &ConditionSlot {
        &self.condition
    }

    /// Acquire, blocking until available
    ///
    /// Spins up to `spin_limit` times before parking. Returns true if the
    /// lock was contended.
    pub fn lock(self: &Arc<Self>, spin_limit: u32) -> bool {
        let me = current_thread_id();
        if self.state.lock().try_acquire(me) {
            return false;
        }

        if spin_limit > 0 {
            let backoff = Backoff::new();
            for _ in 0..spin_limit {
                backoff.spin();
                if self.state.lock().try_acquire(me) {
                    return true;
                }
            }
        }

        let _parked = status::park_on(Blocker::Lock(Arc::clone(self)));
        let mut state = self.state.lock();
        self.acquire_parked(&mut state, me);
        true
    }

    fn acquire_parked(&self, state: &mut MutexGuard<'_, LockState>, me: ThreadId) {
        while !state.try_acquire(me) {
            self.released.wait(state);
        }
    }

    /// Acquire if free or already owned by the caller
    pub fn try_lock(&self) -> bool {
        self.state.lock().try_acquire(current_thread_id())
    }

    /// Release one recursion level
    pub fn unlock(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.is_owned_by(current_thread_id()) {
            return Err(MonitorError::not_owner());
        }

        state.recursions -= 1;
        if state.recursions == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_one();
        }
        Ok(())
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.is_owner(current_thread_id())
    }

    pub fn is_owner(&self, thread: ThreadId) -> bool {
        self.state.lock().is_owned_by(thread)
    }

    pub fn owner(&self) -> Option<ThreadId> {
        self.state.lock().owner
    }

    pub fn recursions(&self) -> usize {
        self.state.lock().recursions
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// Release fully, wait on `condition`, then reacquire at the same depth
    ///
    /// `None` waits without a deadline. Both the notified and the timed-out
    /// path return with the lock held again.
    pub fn await_condition(
        self: &Arc<Self>,
        condition: &Arc<WaitCondition>,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome> {
        let me = current_thread_id();
        let deadline = timeout.map(|t| Instant::now() + t);

        // Reported as waiting until the monitor is held again.
        let _parked = status::park_on(Blocker::Condition {
            record: Arc::clone(self),
            condition: Arc::clone(condition),
            timed: deadline.is_some(),
        });

        let mut state = self.state.lock();
        if !state.is_owned_by(me) {
            return Err(MonitorError::not_owner());
        }

        let saved_recursions = state.recursions;
        state.owner = None;
        state.recursions = 0;
        self.released.notify_one();

        let waiter = condition.enqueue();
        let outcome = loop {
            if waiter.is_notified() {
                break WaitOutcome::Notified;
            }
            match deadline {
                None => condition.condvar().wait(&mut state),
                Some(deadline) => {
                    let timed_out = condition
                        .condvar()
                        .wait_until(&mut state, deadline)
                        .timed_out();
                    // A notification racing the deadline wins.
                    if timed_out && condition.withdraw(&waiter) {
                        break WaitOutcome::TimedOut;
                    }
                },
            }
        };

        self.acquire_parked(&mut state, me);
        state.recursions = saved_recursions;
        Ok(outcome)
    }

    /// Wake one or all waiters of `condition`. Caller must own the lock.
    pub fn signal(&self, condition: &WaitCondition, all: bool) -> Result<usize> {
        let state = self.state.lock();
        if !state.is_owned_by(current_thread_id()) {
            return Err(MonitorError::not_owner());
        }
        Ok(condition.signal(all))
    }
}

impl fmt::Debug for MonitorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MonitorRecord")
            .field("owner", &state.owner)
            .field("recursions", &state.recursions)
            .field("condition", &self.condition)
            .finish()
    }
}

/// Identity of the calling thread
#[inline]
pub fn current_thread_id() -> ThreadId {
    std::thread::current().id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_reentrant_lock() {
        let record = Arc::new(MonitorRecord::new_monitor());
        assert!(!record.lock(0));
        assert!(!record.lock(0));
        assert_eq!(record.recursions(), 2);

        record.unlock().unwrap();
        assert!(record.is_held_by_current_thread());
        record.unlock().unwrap();
        assert!(!record.is_locked());
        assert_eq!(record.owner(), None);
    }

    #[test]
    fn test_unlock_by_non_owner() {
        let record = Arc::new(MonitorRecord::new_monitor());
        assert!(matches!(
            record.unlock(),
            Err(MonitorError::IllegalMonitorState(_))
        ));

        record.lock(0);
        let other = Arc::clone(&record);
        let result = thread::spawn(move || other.unlock().is_err())
            .join()
            .expect("Thread should not panic");
        assert!(result);
        record.unlock().unwrap();
    }

    #[test]
    fn test_locked_for_other_thread() {
        let other = thread::spawn(|| current_thread_id())
            .join()
            .expect("Thread should not panic");
        let record = Arc::new(MonitorRecord::new_locked_for(other, 3));

        assert!(record.is_owner(other));
        assert!(!record.is_held_by_current_thread());
        assert!(!record.try_lock());
        assert_eq!(record.recursions(), 3);
        assert!(record.is_monitor_lock());
    }

    #[test]
    fn test_locked_for_zero_depth_is_unlocked() {
        let record = MonitorRecord::new_locked_for(current_thread_id(), 0);
        assert!(!record.is_locked());
        assert!(record.try_lock());
    }

    #[test]
    fn test_contended_lock_parks_and_proceeds() {
        let record = Arc::new(MonitorRecord::new_monitor());
        record.lock(0);

        let contender = Arc::clone(&record);
        let handle = thread::spawn(move || {
            let contended = contender.lock(4);
            contender.unlock().unwrap();
            contended
        });

        thread::sleep(Duration::from_millis(20));
        record.unlock().unwrap();
        assert!(handle.join().expect("Thread should not panic"));
    }

    #[test]
    fn test_await_timeout_reacquires() {
        let record = Arc::new(MonitorRecord::new_monitor());
        let condition = record
            .condition()
            .get_or_create(true)
            .unwrap()
            .into_condition()
            .unwrap();

        record.lock(0);
        record.lock(0);
        let outcome = record
            .await_condition(&condition, Some(Duration::from_millis(10)))
            .unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(record.is_held_by_current_thread());
        assert_eq!(record.recursions(), 2);
        assert_eq!(condition.waiter_count(), 0);
    }

    #[test]
    fn test_await_requires_ownership() {
        let record = Arc::new(MonitorRecord::new_monitor());
        let condition = Arc::new(WaitCondition::new());
        assert!(record.await_condition(&condition, None).is_err());
        assert!(record.signal(&condition, true).is_err());
    }
}
