//! Monitor Logging and Tracing
//!
//! Event logging for monitor operations, useful for:
//! - Finding objects that inflate monitors unexpectedly
//! - Debugging lock protocol violations
//! - Observing fallback table growth
//!
//! Log Levels:
//! - ERROR: Protocol violations
//! - WARN: Unusual conditions
//! - INFO: Rematerialized locks, fallback sweeps
//! - DEBUG: Record installs, condition inflation
//! - TRACE: Lost install races

use crate::monitor::StorageTier;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Log level for monitor events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    fn as_log_level(self) -> log::Level {
        match self {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Monitor event types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A monitor record was attached to an object
    RecordInstalled { tier: StorageTier, identity: usize },

    /// Another thread attached a record first; ours was discarded
    InstallRaceLost { tier: StorageTier, identity: usize },

    /// First wait on a monitor created its condition
    ConditionInflated { identity: usize },

    /// Another thread created the condition first
    ConditionRaceLost { identity: usize },

    /// A locked monitor was rebuilt for a rematerialized frame
    Rematerialized {
        tier: StorageTier,
        identity: usize,
        depth: usize,
    },

    /// Dead fallback entries were removed
    FallbackSwept { reclaimed: usize, remaining: usize },

    /// Enter/exit pairing or relock protocol broken
    ProtocolViolation { operation: String, reason: String },
}

impl MonitorEvent {
    /// Log level of this event
    pub fn level(&self) -> LogLevel {
        match self {
            MonitorEvent::ProtocolViolation { .. } => LogLevel::Error,
            MonitorEvent::Rematerialized { .. } | MonitorEvent::FallbackSwept { .. } => {
                LogLevel::Info
            },
            MonitorEvent::RecordInstalled { .. } | MonitorEvent::ConditionInflated { .. } => {
                LogLevel::Debug
            },
            MonitorEvent::InstallRaceLost { .. } | MonitorEvent::ConditionRaceLost { .. } => {
                LogLevel::Trace
            },
        }
    }

    /// Human-readable one-line rendering
    pub fn describe(&self) -> String {
        match self {
            MonitorEvent::RecordInstalled { tier, identity } => {
                format!("[MON] Record installed for {:#x} ({})", identity, tier)
            },
            MonitorEvent::InstallRaceLost { tier, identity } => {
                format!("[MON] Install race lost for {:#x} ({})", identity, tier)
            },
            MonitorEvent::ConditionInflated { identity } => {
                format!("[MON] Condition inflated for {:#x}", identity)
            },
            MonitorEvent::ConditionRaceLost { identity } => {
                format!("[MON] Condition race lost for {:#x}", identity)
            },
            MonitorEvent::Rematerialized {
                tier,
                identity,
                depth,
            } => format!(
                "[MON] Relocked {:#x} at depth {} ({})",
                identity, depth, tier
            ),
            MonitorEvent::FallbackSwept {
                reclaimed,
                remaining,
            } => format!(
                "[MON] Fallback sweep: {} reclaimed, {} remaining",
                reclaimed, remaining
            ),
            MonitorEvent::ProtocolViolation { operation, reason } => {
                format!("[MON] Protocol violation in {}: {}", operation, reason)
            },
        }
    }
}

/// Monitor Logger configuration
#[derive(Debug, Clone)]
pub struct MonitorLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Print events to stdout (stderr for errors)
    pub console: bool,

    /// Forward events to the `log` facade
    pub forward_to_log: bool,

    /// Enable JSON format
    pub json: bool,

    /// Enable timestamps
    pub timestamps: bool,

    /// Events retained in memory; oldest are dropped first
    pub capacity: usize,
}

impl Default for MonitorLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: false,
            forward_to_log: true,
            json: false,
            timestamps: true,
            capacity: 4096,
        }
    }
}

/// Monitor Logger - centralized logging for monitor events
pub struct MonitorLogger {
    config: MonitorLoggerConfig,
    events: Mutex<VecDeque<(Instant, MonitorEvent)>>,
    enabled: AtomicBool,
}

impl MonitorLogger {
    pub fn new(config: MonitorLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(VecDeque::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &MonitorLoggerConfig {
        &self.config
    }

    /// Log a monitor event
    pub fn log(&self, event: MonitorEvent) {
        if !self.is_enabled() {
            return;
        }

        let level = event.level();
        if level > self.config.level {
            return;
        }

        if self.config.forward_to_log {
            log::log!(level.as_log_level(), "{}", event.describe());
        }

        if self.config.console {
            self.output_console(&event, level);
        }

        if self.config.capacity > 0 {
            let mut events = self.events.lock();
            if events.len() == self.config.capacity {
                events.pop_front();
            }
            events.push_back((Instant::now(), event));
        }
    }

    fn output_console(&self, event: &MonitorEvent, level: LogLevel) {
        let body = if self.config.json {
            match serde_json::to_string(event) {
                Ok(json) => json,
                Err(_) => return,
            }
        } else {
            event.describe()
        };

        let line = if self.config.timestamps {
            let now = chrono::Local::now();
            format!("[{}] {}", now.format("%Y-%m-%d %H:%M:%S%.3f"), body)
        } else {
            body
        };

        if level == LogLevel::Error {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    /// Retained events, oldest first
    pub fn get_events(&self) -> Vec<(Instant, MonitorEvent)> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for MonitorLogger {
    fn default() -> Self {
        Self::new(MonitorLoggerConfig::default())
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<MonitorLogger> = Mutex::new(MonitorLogger::default());
}

/// Log a monitor event to the global logger
pub fn log_event(event: MonitorEvent) {
    GLOBAL_LOGGER.lock().log(event);
}

/// Replace the global logger
pub fn configure_logger(config: MonitorLoggerConfig) {
    *GLOBAL_LOGGER.lock() = MonitorLogger::new(config);
}

/// Get global logger event count
pub fn get_event_count() -> usize {
    GLOBAL_LOGGER.lock().event_count()
}

/// Retained events of the global logger
pub fn get_events() -> Vec<MonitorEvent> {
    GLOBAL_LOGGER
        .lock()
        .get_events()
        .into_iter()
        .map(|(_, event)| event)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed() -> MonitorEvent {
        MonitorEvent::RecordInstalled {
            tier: StorageTier::ReservedSlot,
            identity: 0x1000,
        }
    }

    #[test]
    fn test_level_filter() {
        let logger = MonitorLogger::default();
        logger.log(installed());
        assert_eq!(logger.event_count(), 0);

        logger.log(MonitorEvent::FallbackSwept {
            reclaimed: 2,
            remaining: 0,
        });
        assert_eq!(logger.event_count(), 1);
    }

    #[test]
    fn test_logger_disable() {
        let logger = MonitorLogger::new(MonitorLoggerConfig {
            level: LogLevel::Trace,
            ..Default::default()
        });

        logger.disable();
        logger.log(installed());
        assert_eq!(logger.event_count(), 0);

        logger.enable();
        logger.log(installed());
        assert_eq!(logger.get_events()[0].1, installed());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let logger = MonitorLogger::new(MonitorLoggerConfig {
            level: LogLevel::Trace,
            capacity: 2,
            ..Default::default()
        });

        for identity in 0..3 {
            logger.log(MonitorEvent::ConditionInflated { identity });
        }

        let events = logger.get_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].1, MonitorEvent::ConditionInflated { identity: 1 });
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(MonitorEvent::Rematerialized {
            tier: StorageTier::Fallback,
            identity: 16,
            depth: 3,
        })
        .unwrap();

        assert_eq!(json["type"], "rematerialized");
        assert_eq!(json["tier"], "fallback");
        assert_eq!(json["depth"], 3);
    }

    #[test]
    fn test_describe() {
        let text = MonitorEvent::ProtocolViolation {
            operation: "exit".to_string(),
            reason: "no monitor".to_string(),
        }
        .describe();
        assert_eq!(text, "[MON] Protocol violation in exit: no monitor");
    }

    #[test]
    fn test_global_logger() {
        log_event(MonitorEvent::ProtocolViolation {
            operation: "enter".to_string(),
            reason: "test".to_string(),
        });
        assert!(get_event_count() > 0);
    }
}
