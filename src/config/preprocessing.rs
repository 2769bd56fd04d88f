use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PreprocessingConfig {
    /// Number of preprocessing worker tasks
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Manager receive timeout, doubles as the scheduling tick (unit: milliseconds)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Values a client buffers before sending them implicitly
    #[serde(default = "default_max_values_local")]
    pub max_values_local: usize,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            tick_ms: default_tick_ms(),
            max_values_local: default_max_values_local(),
        }
    }
}

impl PreprocessingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("preprocessing workers must be at least 1".into()));
        }
        if self.tick_ms == 0 {
            return Err(Error::InvalidConfig("preprocessing tick_ms cannot be 0".into()));
        }
        if self.max_values_local == 0 {
            return Err(Error::InvalidConfig("max_values_local cannot be 0".into()));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    3
}
fn default_tick_ms() -> u64 {
    1000
}
fn default_max_values_local() -> usize {
    256
}
