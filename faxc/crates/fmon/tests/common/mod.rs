//! Test Utilities for the FMON Test Suite
//!
//! Fixtures, object builders and STRICT assertion helpers shared by the
//! integration tests. Timing-based helpers poll with a generous deadline so
//! that a slow CI machine never turns a real bug into a flaky pass.

#![allow(dead_code)]

use fmon::status::{block_kind, BlockKind};
use fmon::{MonitorConfig, MonitorManager, Object, ObjectRef};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Maximum test duration before timeout
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval for state observation
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// ============================================================================
/// MONITOR FIXTURE
/// ============================================================================

/// Test fixture for monitor operations
///
/// Provides a fresh manager per test; monitors never leak between tests.
pub struct MonitorFixture {
    pub manager: Arc<MonitorManager>,
    pub config: MonitorConfig,
}

impl MonitorFixture {
    /// Create fixture with default configuration
    pub fn with_defaults() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    /// Create fixture that parks immediately on contention
    ///
    /// **Bug this finds:** Lost wakeups hidden by spinning
    pub fn without_spinning() -> Self {
        Self::with_config(MonitorConfig {
            spin_limit: 0,
            ..Default::default()
        })
    }

    pub fn with_config(config: MonitorConfig) -> Self {
        let manager = Arc::new(
            MonitorManager::new(config.clone())
                .expect("Manager initialization should succeed with valid config"),
        );
        Self { manager, config }
    }

    /// Object with a reserved monitor slot
    pub fn reserved_object(&self) -> ObjectRef {
        Object::instance("Monitored", ()).into_ref()
    }

    /// Object whose monitor must live in the fallback table
    pub fn fallback_object(&self) -> ObjectRef {
        Object::array(vec![0u8; 16]).into_ref()
    }

    /// Both kinds, for tests that must hold on either tier
    pub fn objects_on_both_tiers(&self) -> Vec<ObjectRef> {
        vec![self.reserved_object(), self.fallback_object()]
    }

    /// Enter `depth` times
    pub fn enter_n(&self, obj: &ObjectRef, depth: usize) {
        for _ in 0..depth {
            self.manager.enter(obj);
        }
    }

    /// Exit `depth` times
    pub fn exit_n(&self, obj: &ObjectRef, depth: usize) {
        for _ in 0..depth {
            self.manager.exit(obj);
        }
    }
}

/// ============================================================================
/// THREAD HELPERS
/// ============================================================================

/// Identity of a thread that has already finished
pub fn finished_thread_id() -> ThreadId {
    thread::spawn(|| thread::current().id())
        .join()
        .expect("Thread should not panic")
}

/// Poll until `condition` holds or `timeout` elapses
pub fn eventually<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    condition()
}

/// Wait until `thread` is parked for `expected`
///
/// **Bug this finds:** Blockers not registered, or registered with the wrong kind
#[track_caller]
pub fn await_block_kind(thread: ThreadId, expected: BlockKind, context: &str) {
    assert!(
        eventually(|| block_kind(thread) == expected, TEST_TIMEOUT),
        "{}: thread never reached {:?} (last seen {:?})",
        context,
        expected,
        block_kind(thread)
    );
}

/// ============================================================================
/// ASSERTION HELPERS
/// ============================================================================

/// Assert that operation completed within timeout
///
/// **Bug this finds:** Deadlock, lost wakeup, unbounded wait
#[track_caller]
pub fn assert_completed_within_timeout<F, R>(operation: F, timeout: Duration, context: &str) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let result = operation();
    let elapsed = start.elapsed();

    assert!(
        elapsed < timeout,
        "{}: Operation took {:?}, exceeded timeout of {:?} - possible deadlock",
        context,
        elapsed,
        timeout
    );

    result
}

/// Assert the calling thread holds `obj` at exactly `depth`
#[track_caller]
pub fn assert_held_at_depth(manager: &MonitorManager, obj: &ObjectRef, depth: usize, context: &str) {
    assert!(manager.holds(obj), "{}: monitor should be held", context);
    let record = manager
        .monitor_of(obj)
        .unwrap_or_else(|| panic!("{}: monitor record missing", context));
    assert_eq!(record.recursions(), depth, "{}: wrong recursion depth", context);
}

/// Assert nobody holds `obj`
#[track_caller]
pub fn assert_unlocked(manager: &MonitorManager, obj: &ObjectRef, context: &str) {
    assert!(!manager.holds(obj), "{}: caller still holds monitor", context);
    if let Some(record) = manager.monitor_of(obj) {
        assert!(
            !record.is_locked(),
            "{}: monitor owned by {:?}",
            context,
            record.owner()
        );
    }
}
