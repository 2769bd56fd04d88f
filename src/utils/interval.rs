//! Flexible update intervals and item nextcheck calculation.
//!
//! A flexible interval overrides the base delay inside a weekly time window:
//! `delay/d1[-d2],hh:mm-hh:mm`, several entries separated by `;`. Days run from
//! Monday = 1 to Sunday = 7 and the window end is exclusive. Calendar fields are
//! evaluated in UTC.

use crate::constants::ItemType;
use crate::constants::JAN_2038;
use crate::constants::SEC_PER_DAY;
use crate::constants::SEC_PER_HOUR;
use crate::constants::SEC_PER_MIN;
use crate::constants::SEC_PER_WEEK;
use crate::constants::SEC_PER_YEAR;
use crate::utils::time::seconds_of_day;
use crate::utils::time::weekday;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePeriod {
    pub start_day: i64,
    pub end_day: i64,
    pub start_time: i64,
    pub end_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlexInterval {
    pub delay: i64,
    pub period: TimePeriod,
}

impl TimePeriod {
    pub fn contains(
        &self,
        ts: i64,
    ) -> bool {
        let day = weekday(ts);
        let time = seconds_of_day(ts);
        self.start_day <= day && day <= self.end_day && self.start_time <= time && time < self.end_time
    }
}

/// Parses a delay with an optional time suffix (`s`, `m`, `h`, `d`, `w`).
pub fn parse_delay(text: &str) -> Option<i64> {
    let text = text.trim();
    let (digits, multiplier) = match text.chars().last()? {
        's' => (&text[..text.len() - 1], 1),
        'm' => (&text[..text.len() - 1], SEC_PER_MIN),
        'h' => (&text[..text.len() - 1], SEC_PER_HOUR),
        'd' => (&text[..text.len() - 1], SEC_PER_DAY),
        'w' => (&text[..text.len() - 1], SEC_PER_WEEK),
        _ => (text, 1),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i64>().ok()?.checked_mul(multiplier)
}

/// `hh:mm`, `h:mm` or `0h:mm` with hours in 0..=24 (24 only as 24:00).
fn parse_time_of_day(text: &str) -> Option<i64> {
    let (hours, minutes) = text.split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i64 = hours.parse().ok()?;
    let minutes: i64 = minutes.parse().ok()?;
    if hours > 24 || minutes > 59 || (hours == 24 && minutes != 0) {
        return None;
    }
    Some(hours * SEC_PER_HOUR + minutes * SEC_PER_MIN)
}

/// `d1[-d2],hh:mm-hh:mm`
pub fn parse_time_period(text: &str) -> Option<TimePeriod> {
    let (days, times) = text.split_once(',')?;
    let parse_day = |d: &str| -> Option<i64> {
        match d.as_bytes() {
            [c @ b'1'..=b'7'] => Some((c - b'0') as i64),
            _ => None,
        }
    };
    let (start_day, end_day) = match days.split_once('-') {
        Some((start, end)) => (parse_day(start)?, parse_day(end)?),
        None => {
            let day = parse_day(days)?;
            (day, day)
        }
    };
    if start_day > end_day {
        return None;
    }

    let (start, end) = times.split_once('-')?;
    let start_time = parse_time_of_day(start)?;
    let end_time = parse_time_of_day(end)?;
    if start_time >= end_time {
        return None;
    }

    Some(TimePeriod {
        start_day,
        end_day,
        start_time,
        end_time,
    })
}

/// Parses `delay/period[;delay/period...]`. Returns `None` when any entry is malformed.
pub fn parse_flex_intervals(text: &str) -> Option<Vec<FlexInterval>> {
    text.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (delay, period) = entry.split_once('/')?;
            Some(FlexInterval {
                delay: parse_delay(delay)?,
                period: parse_time_period(period)?,
            })
        })
        .collect()
}

/// Smallest delay among the windows active at `now`, else `default_delay`.
pub fn current_delay(
    default_delay: i64,
    flex: &[FlexInterval],
    now: i64,
) -> i64 {
    flex.iter()
        .filter(|interval| interval.period.contains(now))
        .map(|interval| interval.delay)
        .min()
        .unwrap_or(default_delay)
}

/// Moment at which the set of active windows changes next.
pub fn next_delay_interval(
    flex: &[FlexInterval],
    now: i64,
) -> Option<i64> {
    let day = weekday(now);
    let time = seconds_of_day(now);

    let next = flex
        .iter()
        .map(|interval| {
            let p = &interval.period;
            if p.start_day <= day && day <= p.end_day && time < p.end_time {
                // active today, either not yet started or running
                if time < p.start_time {
                    p.start_time
                } else {
                    p.end_time
                }
            } else if day < p.end_day {
                if day < p.start_day {
                    SEC_PER_DAY * (p.start_day - day) + p.start_time
                } else {
                    SEC_PER_DAY + p.start_time
                }
            } else {
                SEC_PER_DAY * (p.start_day + 7 - day) + p.start_time
            }
        })
        .min()?;

    Some(now - time + next)
}

/// Next poll time of an item on a reachable host.
///
/// `seed` spreads items across the delay so that checks with the same delay do not
/// all fire on the same second; items sharing a seed fire together.
pub fn calculate_item_nextcheck(
    seed: u64,
    item_type: ItemType,
    delay: i64,
    flex: &[FlexInterval],
    now: i64,
) -> i64 {
    if item_type == ItemType::ZabbixActive {
        return if delay != 0 { now + delay } else { JAN_2038 };
    }

    let mut nextcheck = JAN_2038;
    let mut t = now;
    let tmax = now + SEC_PER_YEAR;
    let mut attempt = 0;

    while t < tmax {
        let delay = current_delay(delay, flex, t);

        if delay != 0 {
            nextcheck = delay * (t / delay) + (seed % delay as u64) as i64;
            if attempt == 0 {
                while nextcheck <= t {
                    nextcheck += delay;
                }
            } else {
                while nextcheck < t {
                    nextcheck += delay;
                }
            }
        } else {
            nextcheck = JAN_2038;
        }

        if flex.is_empty() {
            break;
        }

        match next_delay_interval(flex, t) {
            Some(next_interval) if nextcheck >= next_interval => {
                t = next_interval;
                attempt += 1;
            }
            _ => break,
        }
    }

    nextcheck
}

/// Next poll time of an item whose host is unreachable: the host retry deadline,
/// pushed past any window where polling is switched off.
pub fn calculate_item_nextcheck_unreachable(
    delay: i64,
    flex: &[FlexInterval],
    disable_until: i64,
) -> i64 {
    let mut nextcheck = disable_until;
    let tmax = disable_until + SEC_PER_YEAR;

    if flex.is_empty() {
        return nextcheck;
    }

    while nextcheck < tmax {
        if current_delay(delay, flex, nextcheck) != 0 {
            break;
        }
        match next_delay_interval(flex, nextcheck) {
            Some(next_interval) => nextcheck = next_interval,
            None => return JAN_2038,
        }
    }

    nextcheck
}

/// Next config/data exchange time of a passive proxy.
pub fn calculate_proxy_nextcheck(
    hostid: u64,
    delay: i64,
    now: i64,
) -> i64 {
    let mut nextcheck = delay * (now / delay) + (hostid % delay as u64) as i64;
    while nextcheck <= now {
        nextcheck += delay;
    }
    nextcheck
}
