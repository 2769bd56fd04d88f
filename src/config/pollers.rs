use serde::Deserialize;
use serde::Serialize;

use crate::constants::PollerType;
use crate::Error;
use crate::Result;

/// Fork counts per poller class. A class with no forks is never assigned items.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PollerConfig {
    #[serde(default = "default_pollers")]
    pub pollers: usize,

    #[serde(default = "default_unreachable_pollers")]
    pub unreachable_pollers: usize,

    #[serde(default)]
    pub ipmi_pollers: usize,

    #[serde(default = "default_pingers")]
    pub pingers: usize,

    #[serde(default)]
    pub java_pollers: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            pollers: default_pollers(),
            unreachable_pollers: default_unreachable_pollers(),
            ipmi_pollers: 0,
            pingers: default_pingers(),
            java_pollers: 0,
        }
    }
}

impl PollerConfig {
    pub fn forks(
        &self,
        poller_type: PollerType,
    ) -> usize {
        match poller_type {
            PollerType::Normal => self.pollers,
            PollerType::Unreachable => self.unreachable_pollers,
            PollerType::Ipmi => self.ipmi_pollers,
            PollerType::Pinger => self.pingers,
            PollerType::Java => self.java_pollers,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pollers == 0 && self.unreachable_pollers != 0 {
            return Err(Error::InvalidConfig(
                "unreachable_pollers requires at least one regular poller".into(),
            ));
        }
        if self.pollers + self.ipmi_pollers + self.java_pollers > 0 && self.unreachable_pollers == 0 {
            log::warn!("no unreachable pollers configured, unreachable hosts will not be retried");
        }
        Ok(())
    }
}

fn default_pollers() -> usize {
    5
}
fn default_unreachable_pollers() -> usize {
    1
}
fn default_pingers() -> usize {
    1
}
