//! Layered settings for the cache process.
//!
//! Sources, lowest priority first:
//! 1. Compiled defaults
//! 2. TOML file named by `CONFIG_PATH`
//! 3. Environment variables prefixed with `MONITOR_CACHE` (`__` separates sections)

mod cache;
mod logging;
mod monitoring;
mod pollers;
mod preprocessing;
mod sync;
pub use cache::*;
pub use logging::*;
pub use monitoring::*;
pub use pollers::*;
pub use preprocessing::*;
pub use sync::*;

#[cfg(test)]
mod config_test;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

pub(crate) const ENV_PREFIX: &str = "MONITOR_CACHE";

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pollers: PollerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Debug for Settings {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("cache", &self.cache)
            .field("pollers", &self.pollers)
            .field("sync", &self.sync)
            .finish()
    }
}

impl Settings {
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config) // No validation - deferred to validate()
    }

    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(self) -> Result<Self> {
        self.cache.validate()?;
        self.pollers.validate()?;
        self.sync.validate()?;
        self.preprocessing.validate()?;
        self.logging.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}
