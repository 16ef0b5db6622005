use std::time::Duration;

pub const DEFAULT_MAX_AGE_DAYS: u64 = 3650;
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 1000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// How long after creation a session stays valid
///
/// Precision is one millisecond; anything finer is ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaxAge(Duration);

impl MaxAge {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn from_days(days: u64) -> Self {
        Self(Duration::from_secs(days.saturating_mul(SECS_PER_DAY)))
    }

    pub const fn as_duration(self) -> Duration {
        self.0
    }

    pub fn as_millis(self) -> u64 {
        u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX)
    }

    /// Is a session that is `age_ms` old still within the limit
    pub fn admits(self, age_ms: u64) -> bool {
        age_ms < self.as_millis()
    }
}

impl Default for MaxAge {
    fn default() -> Self {
        Self::from_days(DEFAULT_MAX_AGE_DAYS)
    }
}

impl From<Duration> for MaxAge {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

/// Session policy
///
/// Immutable once handed to a [`crate::SessionManager`].
#[derive(Debug, Clone, bon::Builder)]
pub struct SessionConfig {
    #[builder(default)]
    pub max_age: MaxAge,

    /// Maximum number of records removed by a single delete during sweep
    #[builder(default = DEFAULT_SWEEP_BATCH_SIZE)]
    pub sweep_batch_size: usize,

    #[builder(default = Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS))]
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
