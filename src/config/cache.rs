use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Host availability and scheduling constants applied by the cache.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Seconds between retries while a host is unreachable
    #[serde(default = "default_unreachable_delay")]
    pub unreachable_delay: i64,

    /// Seconds of continuous failures before a host is declared unavailable
    #[serde(default = "default_unreachable_period")]
    pub unreachable_period: i64,

    /// Retry delay once a host is unavailable
    #[serde(default = "default_unavailable_delay")]
    pub unavailable_delay: i64,

    /// Number of timer worker buckets for time-based triggers
    #[serde(default = "default_timer_forks")]
    pub timer_forks: usize,

    /// Passive proxy configuration push period in seconds
    #[serde(default = "default_proxyconfig_frequency")]
    pub proxyconfig_frequency: i64,

    /// Passive proxy data poll period in seconds
    #[serde(default = "default_proxydata_frequency")]
    pub proxydata_frequency: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            unreachable_delay: default_unreachable_delay(),
            unreachable_period: default_unreachable_period(),
            unavailable_delay: default_unavailable_delay(),
            timer_forks: default_timer_forks(),
            proxyconfig_frequency: default_proxyconfig_frequency(),
            proxydata_frequency: default_proxydata_frequency(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.unreachable_delay <= 0 {
            return Err(Error::InvalidConfig("unreachable_delay must be positive".into()));
        }
        if self.unreachable_period < self.unreachable_delay {
            return Err(Error::InvalidConfig(format!(
                "unreachable_period {} must not be shorter than unreachable_delay {}",
                self.unreachable_period, self.unreachable_delay
            )));
        }
        if self.unavailable_delay <= 0 {
            return Err(Error::InvalidConfig("unavailable_delay must be positive".into()));
        }
        if self.timer_forks == 0 {
            return Err(Error::InvalidConfig("timer_forks must be at least 1".into()));
        }
        if self.proxyconfig_frequency <= 0 || self.proxydata_frequency <= 0 {
            return Err(Error::InvalidConfig("proxy poll frequencies must be positive".into()));
        }
        Ok(())
    }
}

fn default_unreachable_delay() -> i64 {
    15
}
fn default_unreachable_period() -> i64 {
    45
}
fn default_unavailable_delay() -> i64 {
    60
}
fn default_timer_forks() -> usize {
    1
}
fn default_proxyconfig_frequency() -> i64 {
    3600
}
fn default_proxydata_frequency() -> i64 {
    1
}
