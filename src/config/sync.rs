use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncConfig {
    /// Seconds between synchronizer passes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Row document consumed by the file-backed row source
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            source_path: default_source_path(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::InvalidConfig("sync interval_secs cannot be 0".into()));
        }
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("sync source_path cannot be empty".into()));
        }
        Ok(())
    }
}

fn default_interval_secs() -> u64 {
    60
}
fn default_source_path() -> PathBuf {
    PathBuf::from("./config/rows.json")
}
