use crate::cache::CacheState;
use crate::config::CacheConfig;
use crate::config::PollerConfig;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Empty cache state with default delays and poller forks.
pub fn test_state() -> CacheState {
    CacheState::new(CacheConfig::default(), PollerConfig::default())
}

/// Cache state whose poller classes all have forks, so every item type gets queued.
pub fn test_state_with_all_pollers() -> CacheState {
    let pollers = PollerConfig {
        pollers: 5,
        unreachable_pollers: 1,
        ipmi_pollers: 1,
        pingers: 1,
        java_pollers: 1,
    };
    CacheState::new(CacheConfig::default(), pollers)
}
