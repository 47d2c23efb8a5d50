//! Monitor Manager - enter, exit, wait and notify on arbitrary objects
//!
//! Lazy creation works the same on both tiers:
//! 1. Read the slot or table entry; if a record is there, use it.
//! 2. Otherwise build a record off to the side.
//! 3. Install it only if the place is still empty. A thread that loses
//!    the race drops its record and uses the winner's.
//!
//! The reserved slot install is a single compare-and-swap. The fallback
//! install is a get-or-insert under the table lock. Lock operations on the
//! record itself never happen under the table lock.

use super::condition::{ConditionLookup, WaitCondition};
use super::fallback::FallbackTable;
use super::record::{MonitorRecord, WaitOutcome};
use super::StorageTier;
use crate::config::MonitorConfig;
use crate::error::{fatal, MonitorError, Result};
use crate::logging::{log_event, MonitorEvent};
use crate::object::{identity, HeaderSlotResolver, MonitorSlot, ObjectRef, SlotResolver};
use crate::stats::{Counter, MonitorStats, MonitorStatsSnapshot};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

/// MonitorManager - the runtime's object monitor service
///
/// # Examples
///
/// ```rust
/// use fmon::{MonitorConfig, MonitorManager, Object};
///
/// let manager = MonitorManager::new(MonitorConfig::default()).unwrap();
/// let lock = Object::instance("Counter", 0u64).into_ref();
///
/// manager.enter(&lock);
/// assert!(manager.holds(&lock));
/// manager.exit(&lock);
/// assert!(!manager.holds(&lock));
/// ```
pub struct MonitorManager<R: SlotResolver = HeaderSlotResolver> {
    config: MonitorConfig,
    resolver: R,
    fallback: FallbackTable,
    stats: MonitorStats,
}

impl MonitorManager<HeaderSlotResolver> {
    /// Create a manager that uses the slots reserved in object headers
    pub fn new(config: MonitorConfig) -> Result<Self> {
        Self::with_resolver(config, HeaderSlotResolver)
    }
}

impl<R: SlotResolver> MonitorManager<R> {
    /// Create a manager with a custom slot resolver
    pub fn with_resolver(config: MonitorConfig, resolver: R) -> Result<Self> {
        config.validate()?;

        let fallback = FallbackTable::new(
            config.fallback_initial_capacity,
            config.fallback_sweep_interval,
        );
        let stats = MonitorStats::new(config.stats_enabled);

        log::debug!(
            "Monitor manager created (spin_limit={}, sweep_interval={})",
            config.spin_limit,
            config.fallback_sweep_interval
        );

        Ok(Self {
            config,
            resolver,
            fallback,
            stats,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Acquire the monitor of `obj`, blocking until available
    ///
    /// Reentrant. Panics if no monitor can be produced for the object.
    pub fn enter(&self, obj: &ObjectRef) {
        let record = self
            .get_or_create_monitor(obj)
            .unwrap_or_else(|err| fatal("enter", err));

        if record.lock(self.config.spin_limit) {
            self.stats.record(Counter::ContendedEnter);
        }
    }

    /// Release one level of the monitor of `obj`
    ///
    /// Panics if the object has no monitor or the caller does not own it.
    pub fn exit(&self, obj: &ObjectRef) {
        let record = self
            .monitor_of(obj)
            .ok_or(MonitorError::MonitorNotFound {
                identity: identity(obj),
            })
            .unwrap_or_else(|err| fatal("exit", err));

        if let Err(err) = record.unlock() {
            fatal("exit", err);
        }
    }

    /// Check if the calling thread holds the monitor of `obj`
    pub fn holds(&self, obj: &ObjectRef) -> bool {
        self.monitor_of(obj)
            .map(|record| record.is_held_by_current_thread())
            .unwrap_or(false)
    }

    /// Monitor of `obj` if the calling thread holds it
    pub fn ensure_locked(&self, obj: &ObjectRef) -> Result<Arc<MonitorRecord>> {
        match self.monitor_of(obj) {
            Some(record) if record.is_held_by_current_thread() => Ok(record),
            _ => Err(MonitorError::not_owner()),
        }
    }

    /// Wait on the monitor of `obj` until notified or `timeout_ms` elapses
    ///
    /// A timeout of 0 waits until notified. The monitor is released for the
    /// duration and held again, at the same depth, when this returns.
    pub fn wait(&self, obj: &ObjectRef, timeout_ms: u64) -> Result<WaitOutcome> {
        let record = self.ensure_locked(obj)?;
        let condition = self
            .get_or_create_condition(&record, obj, true)?
            .ok_or_else(|| MonitorError::Internal("condition was not created".to_string()))?;

        self.stats.record(Counter::Wait);
        let timeout = if timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(timeout_ms))
        };

        let outcome = record.await_condition(&condition, timeout)?;
        if outcome == WaitOutcome::TimedOut {
            self.stats.record(Counter::WaitTimeout);
        }
        Ok(outcome)
    }

    /// Wake one waiter, or all waiters, of the monitor of `obj`
    ///
    /// Does nothing, and creates nothing, if nobody ever waited on it.
    pub fn notify(&self, obj: &ObjectRef, all: bool) -> Result<()> {
        let record = self.ensure_locked(obj)?;
        let condition = match self.get_or_create_condition(&record, obj, false)? {
            Some(condition) => condition,
            None => return Ok(()),
        };

        let woken = record.signal(&condition, all)?;
        self.stats.record(Counter::Notify);
        self.stats.record_woken(woken);
        Ok(())
    }

    /// Install a monitor for `obj` already held `depth` times by `owner`
    ///
    /// Used when a frame that held the lock is rebuilt. Fails, leaving the
    /// existing record alone, if the object already has a monitor.
    pub fn force_relock(&self, obj: &ObjectRef, owner: ThreadId, depth: usize) -> Result<()> {
        let record = Arc::new(MonitorRecord::new_locked_for(owner, depth));
        let tier = self.storage_tier(obj);

        let installed = match self.resolver.resolve_slot(&**obj) {
            Some(slot) => slot.install(record).is_ok(),
            None => self.fallback.install(obj, record).is_ok(),
        };

        if !installed {
            let err = MonitorError::AlreadyLocked {
                identity: identity(obj),
                tier: tier.as_str(),
            };
            log::error!("Relock failed: {}", err);
            self.emit(MonitorEvent::ProtocolViolation {
                operation: "force_relock".to_string(),
                reason: err.to_string(),
            });
            return Err(err);
        }

        self.stats.record(Counter::Relock);
        self.stats.record(match tier {
            StorageTier::ReservedSlot => Counter::SlotInstall,
            StorageTier::Fallback => Counter::FallbackInstall,
        });
        self.emit(MonitorEvent::Rematerialized {
            tier,
            identity: identity(obj),
            depth,
        });
        Ok(())
    }

    /// Monitor of `obj`, created if missing
    pub fn monitor_for_testing(&self, obj: &ObjectRef) -> Arc<MonitorRecord> {
        self.get_or_create_monitor(obj)
            .unwrap_or_else(|err| fatal("monitor_for_testing", err))
    }

    /// Existing monitor of `obj`, never creating one
    pub fn monitor_of(&self, obj: &ObjectRef) -> Option<Arc<MonitorRecord>> {
        match self.resolver.resolve_slot(&**obj) {
            Some(slot) => slot.get(),
            None => self.fallback.get(obj),
        }
    }

    /// Tier the monitor of `obj` lives in, whether or not it exists yet
    pub fn storage_tier(&self, obj: &ObjectRef) -> StorageTier {
        if self.resolver.resolve_slot(&**obj).is_some() {
            StorageTier::ReservedSlot
        } else {
            StorageTier::Fallback
        }
    }

    /// Remove fallback entries whose objects are gone
    pub fn reclaim_fallback(&self) -> usize {
        let reclaimed = self.fallback.reclaim();
        self.note_swept(reclaimed);
        reclaimed
    }

    /// Fallback entries, including dead ones not yet swept
    pub fn fallback_len(&self) -> usize {
        self.fallback.len()
    }

    pub fn stats(&self) -> MonitorStatsSnapshot {
        self.stats.snapshot()
    }

    /// Zero every counter. Monitors and their lock state are untouched.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    fn get_or_create_monitor(&self, obj: &ObjectRef) -> Result<Arc<MonitorRecord>> {
        match self.resolver.resolve_slot(&**obj) {
            Some(slot) => self.monitor_from_slot(slot, obj),
            None => Ok(self.monitor_from_table(obj)),
        }
    }

    fn monitor_from_slot(&self, slot: &MonitorSlot, obj: &ObjectRef) -> Result<Arc<MonitorRecord>> {
        if let Some(existing) = slot.get() {
            return Ok(existing);
        }

        match slot.install(Arc::new(MonitorRecord::new_monitor())) {
            Ok(installed) => {
                self.stats.record(Counter::SlotInstall);
                log::trace!("Monitor installed in slot of {:#x}", identity(obj));
                self.emit(MonitorEvent::RecordInstalled {
                    tier: StorageTier::ReservedSlot,
                    identity: identity(obj),
                });
                Ok(installed)
            },
            Err(lost) => {
                self.stats.record(Counter::InstallRaceLost);
                log::trace!("Monitor install race lost for {:#x}", identity(obj));
                self.emit(MonitorEvent::InstallRaceLost {
                    tier: StorageTier::ReservedSlot,
                    identity: identity(obj),
                });
                lost.current.into_arc().ok_or_else(|| {
                    MonitorError::Internal("slot empty after a failed install".to_string())
                })
            },
        }
    }

    fn monitor_from_table(&self, obj: &ObjectRef) -> Arc<MonitorRecord> {
        let lookup = self
            .fallback
            .get_or_insert_with(obj, MonitorRecord::new_monitor);

        if lookup.created {
            self.stats.record(Counter::FallbackInstall);
            log::trace!("Monitor installed in fallback table for {:#x}", identity(obj));
            self.emit(MonitorEvent::RecordInstalled {
                tier: StorageTier::Fallback,
                identity: identity(obj),
            });
        }
        if lookup.swept > 0 {
            self.note_swept(lookup.swept);
        }
        lookup.record
    }

    fn get_or_create_condition(
        &self,
        record: &MonitorRecord,
        obj: &ObjectRef,
        create: bool,
    ) -> Result<Option<Arc<WaitCondition>>> {
        let condition = match record.condition().get_or_create(create)? {
            ConditionLookup::NotCreated => None,
            ConditionLookup::Existing(condition) => Some(condition),
            ConditionLookup::Inflated(condition) => {
                self.stats.record(Counter::ConditionInflation);
                self.emit(MonitorEvent::ConditionInflated {
                    identity: identity(obj),
                });
                Some(condition)
            },
            ConditionLookup::RaceLost(condition) => {
                self.stats.record(Counter::ConditionRaceLost);
                self.emit(MonitorEvent::ConditionRaceLost {
                    identity: identity(obj),
                });
                Some(condition)
            },
        };
        Ok(condition)
    }

    fn note_swept(&self, reclaimed: usize) {
        self.stats.record_reclaimed(reclaimed);
        let remaining = self.fallback.len();
        log::debug!(
            "Fallback sweep reclaimed {} entries, {} remaining",
            reclaimed,
            remaining
        );
        self.emit(MonitorEvent::FallbackSwept {
            reclaimed,
            remaining,
        });
    }

    #[inline]
    fn emit(&self, event: MonitorEvent) {
        if self.config.verbose {
            log_event(event);
        }
    }
}
