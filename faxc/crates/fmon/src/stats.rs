//! Stats Module - Monitor Activity Counters
//!
//! Counts what the monitor manager does so that lock inflation and
//! contention can be observed in production:
//! - Record installs per storage tier, and lost install races
//! - Condition inflations
//! - Contended enters, waits, timeouts, notifications
//! - Rematerialized locks and reclaimed fallback entries
//!
//! Counters are relaxed atomics; a snapshot is not a consistent cut.

use indexmap::IndexMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// MonitorStats - counters shared by one monitor manager
pub struct MonitorStats {
    enabled: bool,
    slot_installs: AtomicU64,
    fallback_installs: AtomicU64,
    install_races_lost: AtomicU64,
    condition_inflations: AtomicU64,
    condition_races_lost: AtomicU64,
    contended_enters: AtomicU64,
    waits: AtomicU64,
    wait_timeouts: AtomicU64,
    notifies: AtomicU64,
    threads_woken: AtomicU64,
    relocks: AtomicU64,
    fallback_reclaimed: AtomicU64,
}

/// Counter selector for `MonitorStats::record`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    SlotInstall,
    FallbackInstall,
    InstallRaceLost,
    ConditionInflation,
    ConditionRaceLost,
    ContendedEnter,
    Wait,
    WaitTimeout,
    Notify,
    Relock,
}

impl MonitorStats {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            slot_installs: AtomicU64::new(0),
            fallback_installs: AtomicU64::new(0),
            install_races_lost: AtomicU64::new(0),
            condition_inflations: AtomicU64::new(0),
            condition_races_lost: AtomicU64::new(0),
            contended_enters: AtomicU64::new(0),
            waits: AtomicU64::new(0),
            wait_timeouts: AtomicU64::new(0),
            notifies: AtomicU64::new(0),
            threads_woken: AtomicU64::new(0),
            relocks: AtomicU64::new(0),
            fallback_reclaimed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn counter(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::SlotInstall => &self.slot_installs,
            Counter::FallbackInstall => &self.fallback_installs,
            Counter::InstallRaceLost => &self.install_races_lost,
            Counter::ConditionInflation => &self.condition_inflations,
            Counter::ConditionRaceLost => &self.condition_races_lost,
            Counter::ContendedEnter => &self.contended_enters,
            Counter::Wait => &self.waits,
            Counter::WaitTimeout => &self.wait_timeouts,
            Counter::Notify => &self.notifies,
            Counter::Relock => &self.relocks,
        }
    }

    /// Increment a counter by one
    #[inline]
    pub fn record(&self, counter: Counter) {
        if self.is_enabled() {
            self.counter(counter).fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record threads woken by one notify
    pub fn record_woken(&self, count: usize) {
        if self.is_enabled() {
            self.threads_woken.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_reclaimed(&self, count: usize) {
        if self.is_enabled() {
            self.fallback_reclaimed
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MonitorStatsSnapshot {
        MonitorStatsSnapshot {
            slot_installs: self.slot_installs.load(Ordering::Relaxed),
            fallback_installs: self.fallback_installs.load(Ordering::Relaxed),
            install_races_lost: self.install_races_lost.load(Ordering::Relaxed),
            condition_inflations: self.condition_inflations.load(Ordering::Relaxed),
            condition_races_lost: self.condition_races_lost.load(Ordering::Relaxed),
            contended_enters: self.contended_enters.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            wait_timeouts: self.wait_timeouts.load(Ordering::Relaxed),
            notifies: self.notifies.load(Ordering::Relaxed),
            threads_woken: self.threads_woken.load(Ordering::Relaxed),
            relocks: self.relocks.load(Ordering::Relaxed),
            fallback_reclaimed: self.fallback_reclaimed.load(Ordering::Relaxed),
        }
    }

    /// Reset statistics
    pub fn reset(&self) {
        for counter in [
            &self.slot_installs,
            &self.fallback_installs,
            &self.install_races_lost,
            &self.condition_inflations,
            &self.condition_races_lost,
            &self.contended_enters,
            &self.waits,
            &self.wait_timeouts,
            &self.notifies,
            &self.threads_woken,
            &self.relocks,
            &self.fallback_reclaimed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStatsSnapshot {
    pub slot_installs: u64,
    pub fallback_installs: u64,
    pub install_races_lost: u64,
    pub condition_inflations: u64,
    pub condition_races_lost: u64,
    pub contended_enters: u64,
    pub waits: u64,
    pub wait_timeouts: u64,
    pub notifies: u64,
    pub threads_woken: u64,
    pub relocks: u64,
    pub fallback_reclaimed: u64,
}

impl MonitorStatsSnapshot {
    /// Records installed across both tiers
    pub fn records_installed(&self) -> u64 {
        self.slot_installs + self.fallback_installs
    }

    fn metrics(&self) -> IndexMap<&'static str, u64> {
        let mut metrics = IndexMap::new();
        metrics.insert("fmon_slot_installs_total", self.slot_installs);
        metrics.insert("fmon_fallback_installs_total", self.fallback_installs);
        metrics.insert("fmon_install_races_lost_total", self.install_races_lost);
        metrics.insert("fmon_condition_inflations_total", self.condition_inflations);
        metrics.insert("fmon_condition_races_lost_total", self.condition_races_lost);
        metrics.insert("fmon_contended_enters_total", self.contended_enters);
        metrics.insert("fmon_waits_total", self.waits);
        metrics.insert("fmon_wait_timeouts_total", self.wait_timeouts);
        metrics.insert("fmon_notifies_total", self.notifies);
        metrics.insert("fmon_threads_woken_total", self.threads_woken);
        metrics.insert("fmon_relocks_total", self.relocks);
        metrics.insert("fmon_fallback_reclaimed_total", self.fallback_reclaimed);
        metrics
    }

    /// Export to JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Export to Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        for (name, value) in self.metrics() {
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, value));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let stats = MonitorStats::new(true);
        stats.record(Counter::SlotInstall);
        stats.record(Counter::FallbackInstall);
        stats.record(Counter::FallbackInstall);
        stats.record_woken(3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.slot_installs, 1);
        assert_eq!(snapshot.fallback_installs, 2);
        assert_eq!(snapshot.records_installed(), 3);
        assert_eq!(snapshot.threads_woken, 3);
    }

    #[test]
    fn test_disabled_stats_do_not_count() {
        let stats = MonitorStats::new(false);
        stats.record(Counter::Wait);
        stats.record_reclaimed(10);
        assert_eq!(stats.snapshot(), MonitorStatsSnapshot::default());
    }

    #[test]
    fn test_reset() {
        let stats = MonitorStats::default();
        stats.record(Counter::Relock);
        stats.reset();
        assert_eq!(stats.snapshot().relocks, 0);
    }

    #[test]
    fn test_exports() {
        let stats = MonitorStats::default();
        stats.record(Counter::ContendedEnter);
        let snapshot = stats.snapshot();

        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json()).unwrap();
        assert_eq!(json["contended_enters"], 1);

        let text = snapshot.to_prometheus();
        assert!(text.contains("fmon_contended_enters_total 1\n"));
        assert!(text.starts_with("# TYPE fmon_slot_installs_total counter"));
    }
}
