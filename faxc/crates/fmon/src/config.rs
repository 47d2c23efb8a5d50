//! Configuration Module - Monitor Tuning Parameters
//!
//! Manages the configuration parameters for FMON.

/// Upper bound for `spin_limit`
pub const MAX_SPIN_LIMIT: u32 = 10_000;

/// Main configuration for the monitor manager
///
/// # Examples
///
/// ```rust
/// use fmon::MonitorConfig;
///
/// // Use default configuration
/// let config = MonitorConfig::default();
///
/// // Never spin, always park on contention
/// let config = MonitorConfig {
///     spin_limit: 0,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Spins before a contended enter parks
    ///
    /// Short critical sections are often released before a park/unpark
    /// round trip completes. Spinning is useless on a single core.
    ///
    /// Default: 0 on single-CPU hosts, 64 otherwise
    pub spin_limit: u32,

    /// Initial capacity of the fallback table
    ///
    /// Default: 64
    pub fallback_initial_capacity: usize,

    /// Fallback inserts between sweeps of dead entries
    ///
    /// Default: 64
    pub fallback_sweep_interval: usize,

    /// Forward monitor events to the event logger
    ///
    /// Default: false
    pub verbose: bool,

    /// Maintain monitor statistics
    ///
    /// Default: true
    pub stats_enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let spin_limit = if num_cpus::get() > 1 { 64 } else { 0 };

        MonitorConfig {
            spin_limit,
            fallback_initial_capacity: 64,
            fallback_sweep_interval: 64,
            verbose: false,
            stats_enabled: true,
        }
    }
}

impl MonitorConfig {
    /// Validate configuration
    ///
    /// ```rust
    /// use fmon::MonitorConfig;
    ///
    /// let config = MonitorConfig {
    ///     fallback_sweep_interval: 0,  // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spin_limit > MAX_SPIN_LIMIT {
            return Err(ConfigError::InvalidSpinLimit(format!(
                "spin_limit must be <= {}",
                MAX_SPIN_LIMIT
            )));
        }

        if self.fallback_sweep_interval == 0 {
            return Err(ConfigError::InvalidSweepInterval(
                "fallback_sweep_interval must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - FMON_SPIN_LIMIT
    /// - FMON_FALLBACK_CAPACITY
    /// - FMON_SWEEP_INTERVAL
    /// - FMON_VERBOSE
    /// - FMON_STATS
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FMON_SPIN_LIMIT") {
            if let Ok(spins) = val.parse::<u32>() {
                config.spin_limit = spins;
            }
        }

        if let Ok(val) = std::env::var("FMON_FALLBACK_CAPACITY") {
            if let Ok(capacity) = val.parse::<usize>() {
                config.fallback_initial_capacity = capacity;
            }
        }

        if let Ok(val) = std::env::var("FMON_SWEEP_INTERVAL") {
            if let Ok(interval) = val.parse::<usize>() {
                config.fallback_sweep_interval = interval;
            }
        }

        if let Ok(val) = std::env::var("FMON_VERBOSE") {
            config.verbose = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("FMON_STATS") {
            config.stats_enabled = parse_flag(&val);
        }

        config
    }
}

fn parse_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid spin limit: {0}")]
    InvalidSpinLimit(String),

    #[error("Invalid sweep interval: {0}")]
    InvalidSweepInterval(String),
}
