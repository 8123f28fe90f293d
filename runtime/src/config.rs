//! Configuration for Store instances.

use std::time::Duration;

/// Default periodic save interval
pub const DEFAULT_SAVE_PERIOD: Duration = Duration::from_secs(2);

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use mvi_runtime::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::new("counter")
///     .with_notice_capacity(64)
///     .with_shutdown_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.name, "counter");
/// assert_eq!(config.notice_capacity, 64);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name used in logs
    pub name: String,
    /// Capacity of the notice broadcast channel
    ///
    /// A notice subscriber that falls further behind than this skips the
    /// oldest notices.
    pub notice_capacity: usize,
    /// Timeout used by [`Store::close`](crate::Store::close)
    pub shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Create a configuration with the given name and default settings
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the notice channel capacity (at least 1)
    #[must_use]
    pub fn with_notice_capacity(mut self, capacity: usize) -> Self {
        self.notice_capacity = capacity.max(1);
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
            notice_capacity: 16,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// When the store writes its state to storage
///
/// The default saves every [`DEFAULT_SAVE_PERIOD`] and whenever the last
/// subscriber goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePolicy {
    /// Save on a fixed interval while the store runs (`None` disables it)
    pub periodic: Option<Duration>,
    /// Save when the subscriber count drops to zero
    pub on_unsubscribe: bool,
}

impl SavePolicy {
    /// A policy that never saves on its own
    ///
    /// Saves still happen through [`Store::save_now`](crate::Store::save_now).
    #[must_use]
    pub const fn manual() -> Self {
        Self {
            periodic: None,
            on_unsubscribe: false,
        }
    }

    /// Set the periodic interval
    #[must_use]
    pub const fn with_periodic(mut self, period: Option<Duration>) -> Self {
        self.periodic = period;
        self
    }

    /// Enable or disable saving on last unsubscribe
    #[must_use]
    pub const fn with_on_unsubscribe(mut self, enabled: bool) -> Self {
        self.on_unsubscribe = enabled;
        self
    }
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self {
            periodic: Some(DEFAULT_SAVE_PERIOD),
            on_unsubscribe: true,
        }
    }
}
