use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::SEC_PER_DAY;

/// Second/nanosecond timestamp carried with every collected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timespec {
    pub sec: i64,
    pub ns: i32,
}

impl Timespec {
    pub fn new(
        sec: i64,
        ns: i32,
    ) -> Self {
        Self { sec, ns }
    }

    pub fn now() -> Self {
        let since_epoch = get_duration_since_epoch();
        Self {
            sec: since_epoch.as_secs() as i64,
            ns: since_epoch.subsec_nanos() as i32,
        }
    }

    /// Fractional seconds elapsed since `earlier`
    pub fn seconds_since(
        &self,
        earlier: &Timespec,
    ) -> f64 {
        (self.sec - earlier.sec) as f64 + (self.ns - earlier.ns) as f64 / 1_000_000_000.0
    }
}

pub(crate) fn get_duration_since_epoch() -> std::time::Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// return second
pub fn get_now_as_i64() -> i64 {
    get_duration_since_epoch().as_secs() as i64
}

/// Day of week for a unix timestamp, Monday = 1 .. Sunday = 7 (UTC).
pub fn weekday(ts: i64) -> i64 {
    // 1970-01-01 was a Thursday
    (ts.div_euclid(SEC_PER_DAY) + 3).rem_euclid(7) + 1
}

/// Seconds elapsed since midnight (UTC).
pub fn seconds_of_day(ts: i64) -> i64 {
    ts.rem_euclid(SEC_PER_DAY)
}
