use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Prometheus scrape endpoint settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus_enabled: bool,

    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: false,
            prometheus_port: default_prometheus_port(),
        }
    }
}

impl MonitoringConfig {
    /// # Errors
    /// Returns `Error::InvalidConfig` when the endpoint is enabled on port 0 or a privileged port.
    pub fn validate(&self) -> Result<()> {
        if !self.prometheus_enabled {
            if self.prometheus_port != default_prometheus_port() {
                log::warn!(
                    "prometheus_port configured to {} but monitoring is disabled",
                    self.prometheus_port
                );
            }
            return Ok(());
        }

        if self.prometheus_port == 0 {
            return Err(Error::InvalidConfig("prometheus_port cannot be 0 when enabled".into()));
        }
        if self.prometheus_port < 1024 {
            return Err(Error::InvalidConfig(format!(
                "prometheus_port {} is a privileged port (requires root)",
                self.prometheus_port
            )));
        }
        Ok(())
    }
}

fn default_prometheus_port() -> u16 {
    8080
}
